//! In-memory accessor.

use super::{check_access, check_writable, short_read, MediumAccessor};
use crate::error::{StoreError, StoreResult};
use crate::medium::{Medium, MediumKind};
use crate::offset::MediumOffset;
use crate::stats::AccessStats;
use parking_lot::RwLock;
use std::sync::Arc;

/// Random access to the shared byte buffer of a memory medium.
///
/// Writes go straight into the buffer, so every clone of the medium sees
/// them. Writing past the current end grows the buffer, filling any hole
/// with zeros.
///
/// # Example
///
/// ```rust
/// use mediumstore_core::{Medium, MediumAccess, MediumAccessor, MediumConfig, MemoryAccessor};
///
/// let medium = Medium::memory(b"hello".to_vec(), MediumAccess::ReadWrite, MediumConfig::default()).unwrap();
/// let mut accessor = MemoryAccessor::new(medium.clone());
/// accessor.open().unwrap();
///
/// let mut buffer = [0u8; 3];
/// accessor.read(mediumstore_core::MediumOffset::new(medium.id(), 1), &mut buffer).unwrap();
/// assert_eq!(&buffer, b"ell");
/// ```
#[derive(Debug)]
pub struct MemoryAccessor {
    medium: Medium,
    content: Arc<RwLock<Vec<u8>>>,
    opened: bool,
    stats: AccessStats,
}

impl MemoryAccessor {
    /// Creates a closed accessor for a memory medium.
    ///
    /// A medium of another kind gets an accessor over an empty detached
    /// buffer.
    #[must_use]
    pub fn new(medium: Medium) -> Self {
        let content = match medium.kind() {
            MediumKind::Memory { content } => Arc::clone(content),
            _ => Arc::new(RwLock::new(Vec::new())),
        };
        Self {
            medium,
            content,
            opened: false,
            stats: AccessStats::new(),
        }
    }
}

impl MediumAccessor for MemoryAccessor {
    fn medium(&self) -> &Medium {
        &self.medium
    }

    fn open(&mut self) -> StoreResult<()> {
        if self.opened {
            return Err(StoreError::medium_access(format!(
                "{} is already open",
                self.medium.name()
            )));
        }
        self.opened = true;
        tracing::debug!(medium = %self.medium.name(), "opened memory medium");
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if !self.opened {
            return Err(StoreError::Closed);
        }
        self.opened = false;
        tracing::debug!(medium = %self.medium.name(), "closed memory medium");
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn read(&mut self, offset: MediumOffset, buffer: &mut [u8]) -> StoreResult<()> {
        check_access(&self.medium, self.opened, &offset)?;
        let data = self.content.read();
        let start = (offset.position().min(data.len() as u64)) as usize;
        let available = data.len() - start;
        let read = available.min(buffer.len());
        buffer[..read].copy_from_slice(&data[start..start + read]);
        drop(data);

        self.stats.record_read(read as u64);
        if read < buffer.len() {
            return Err(short_read(offset, buffer, read));
        }
        Ok(())
    }

    fn write(&mut self, offset: MediumOffset, data: &[u8]) -> StoreResult<()> {
        check_access(&self.medium, self.opened, &offset)?;
        check_writable(&self.medium)?;
        let start = usize::try_from(offset.position())
            .map_err(|_| StoreError::invalid_argument("offset exceeds addressable memory"))?;
        let end = start
            .checked_add(data.len())
            .ok_or_else(|| StoreError::invalid_argument("write exceeds addressable memory"))?;

        let mut content = self.content.write();
        if content.len() < end {
            content.resize(end, 0);
        }
        content[start..end].copy_from_slice(data);
        drop(content);

        self.stats.record_write(data.len() as u64);
        Ok(())
    }

    fn truncate(&mut self, new_length: u64) -> StoreResult<()> {
        if !self.opened {
            return Err(StoreError::Closed);
        }
        check_writable(&self.medium)?;
        let mut content = self.content.write();
        if (content.len() as u64) > new_length {
            content.truncate(new_length as usize);
        }
        drop(content);

        self.stats.record_truncate();
        Ok(())
    }

    fn is_at_end_of_medium(&mut self, offset: MediumOffset) -> StoreResult<bool> {
        check_access(&self.medium, self.opened, &offset)?;
        Ok(offset.position() >= self.content.read().len() as u64)
    }

    fn length(&self) -> StoreResult<Option<u64>> {
        if !self.opened {
            return Err(StoreError::Closed);
        }
        Ok(Some(self.content.read().len() as u64))
    }

    fn stats(&self) -> &AccessStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::MediumAccess;
    use crate::MediumConfig;

    fn open_accessor(content: &[u8], access: MediumAccess) -> (Medium, MemoryAccessor) {
        let medium = Medium::memory(content.to_vec(), access, MediumConfig::default()).unwrap();
        let mut accessor = MemoryAccessor::new(medium.clone());
        accessor.open().unwrap();
        (medium, accessor)
    }

    #[test]
    fn write_then_read() {
        let (medium, mut accessor) = open_accessor(b"0123456789", MediumAccess::ReadWrite);
        let at = MediumOffset::new(medium.id(), 3);

        accessor.write(at, b"abc").unwrap();
        let mut buffer = [0u8; 3];
        accessor.read(at, &mut buffer).unwrap();
        assert_eq!(&buffer, b"abc");
        assert_eq!(medium.content().unwrap(), b"012abc6789");
    }

    #[test]
    fn write_past_end_grows_buffer() {
        let (medium, mut accessor) = open_accessor(b"ab", MediumAccess::ReadWrite);
        accessor
            .write(MediumOffset::new(medium.id(), 4), b"cd")
            .unwrap();
        assert_eq!(medium.content().unwrap(), b"ab\0\0cd");
    }

    #[test]
    fn read_empty_medium() {
        let (medium, mut accessor) = open_accessor(b"", MediumAccess::ReadOnly);
        let mut buffer = [0u8; 1];
        let err = accessor
            .read(MediumOffset::new(medium.id(), 0), &mut buffer)
            .unwrap_err();
        let eom = err.as_end_of_medium().unwrap();
        assert_eq!(eom.requested, 1);
        assert_eq!(eom.read, 0);
        assert!(eom.bytes.is_empty());
    }

    #[test]
    fn read_beyond_end() {
        let (medium, mut accessor) = open_accessor(b"abc", MediumAccess::ReadOnly);
        let mut buffer = [0u8; 4];
        let err = accessor
            .read(MediumOffset::new(medium.id(), 10), &mut buffer)
            .unwrap_err();
        assert_eq!(err.as_end_of_medium().unwrap().read, 0);
    }

    #[test]
    fn truncate_shrinks_content() {
        let (medium, mut accessor) = open_accessor(b"abcdef", MediumAccess::ReadWrite);
        accessor.truncate(2).unwrap();
        assert_eq!(medium.content().unwrap(), b"ab");
        assert_eq!(accessor.length().unwrap(), Some(2));
        assert!(accessor
            .is_at_end_of_medium(MediumOffset::new(medium.id(), 2))
            .unwrap());
    }

    #[test]
    fn read_only_rejects_write() {
        let (medium, mut accessor) = open_accessor(b"abc", MediumAccess::ReadOnly);
        assert!(matches!(
            accessor.write(MediumOffset::new(medium.id(), 0), b"x"),
            Err(StoreError::ReadOnly { .. })
        ));
        assert_eq!(medium.content().unwrap(), b"abc");
    }

    #[test]
    fn write_at_address_limit_rejected() {
        let (medium, mut accessor) = open_accessor(b"abc", MediumAccess::ReadWrite);
        assert!(matches!(
            accessor.write(MediumOffset::new(medium.id(), u64::MAX), b"xy"),
            Err(StoreError::InvalidArgument { .. })
        ));
        assert_eq!(medium.content().unwrap(), b"abc");
    }

    #[test]
    fn foreign_offset_rejected() {
        let (_, mut accessor) = open_accessor(b"abc", MediumAccess::ReadOnly);
        let other = Medium::memory(vec![], MediumAccess::ReadOnly, MediumConfig::default()).unwrap();
        let mut buffer = [0u8; 1];
        assert!(matches!(
            accessor.read(MediumOffset::new(other.id(), 0), &mut buffer),
            Err(StoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn stats_count_physical_io() {
        let (medium, mut accessor) = open_accessor(b"abcdef", MediumAccess::ReadWrite);
        let mut buffer = [0u8; 4];
        accessor
            .read(MediumOffset::new(medium.id(), 0), &mut buffer)
            .unwrap();
        accessor
            .write(MediumOffset::new(medium.id(), 0), b"zz")
            .unwrap();

        let snap = accessor.stats().snapshot();
        assert_eq!(snap.reads, 1);
        assert_eq!(snap.bytes_read, 4);
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.bytes_written, 2);
    }
}
