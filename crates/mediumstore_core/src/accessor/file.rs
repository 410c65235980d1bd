//! File-backed accessor.

use super::{check_access, check_writable, short_read, MediumAccessor};
use crate::error::{StoreError, StoreResult};
use crate::medium::Medium;
use crate::offset::MediumOffset;
use crate::stats::AccessStats;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Random access to a file.
///
/// # Locking
///
/// Opening takes an advisory lock on the file: exclusive for writable
/// media, shared for read-only media. A second accessor (in this or another
/// process) that conflicts with the held lock fails to open with
/// `MediumAccess`.
///
/// # Example
///
/// ```no_run
/// use mediumstore_core::{FileAccessor, Medium, MediumAccess, MediumAccessor, MediumConfig};
///
/// let medium = Medium::file("data.bin", MediumAccess::ReadOnly, MediumConfig::default()).unwrap();
/// let mut accessor = FileAccessor::new(medium.clone());
/// accessor.open().unwrap();
/// let mut header = [0u8; 4];
/// accessor.read(mediumstore_core::MediumOffset::new(medium.id(), 0), &mut header).unwrap();
/// ```
#[derive(Debug)]
pub struct FileAccessor {
    medium: Medium,
    path: PathBuf,
    file: Option<File>,
    stats: AccessStats,
}

impl FileAccessor {
    /// Creates a closed accessor for a file medium.
    #[must_use]
    pub fn new(medium: Medium) -> Self {
        let path = medium.path().map(PathBuf::from).unwrap_or_default();
        Self {
            medium,
            path,
            file: None,
            stats: AccessStats::new(),
        }
    }

    fn file(&mut self) -> StoreResult<&mut File> {
        self.file.as_mut().ok_or(StoreError::Closed)
    }
}

impl MediumAccessor for FileAccessor {
    fn medium(&self) -> &Medium {
        &self.medium
    }

    fn open(&mut self) -> StoreResult<()> {
        if self.file.is_some() {
            return Err(StoreError::medium_access(format!(
                "{} is already open",
                self.path.display()
            )));
        }
        if !self.path.is_file() {
            return Err(StoreError::medium_access(format!(
                "file does not exist: {}",
                self.path.display()
            )));
        }

        let writable = !self.medium.is_read_only();
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&self.path)
            .map_err(|e| {
                StoreError::medium_access_io(format!("cannot open {}", self.path.display()), e)
            })?;

        // fs2 semantics, not the inherent `File` locks of newer toolchains
        let locked = if writable {
            FileExt::try_lock_exclusive(&file)
        } else {
            FileExt::try_lock_shared(&file)
        };
        if let Err(e) = locked {
            return Err(StoreError::medium_access_io(
                format!("{} is locked by another accessor", self.path.display()),
                e,
            ));
        }

        tracing::debug!(path = %self.path.display(), writable, "opened file medium");
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        let file = self.file.take().ok_or(StoreError::Closed)?;
        FileExt::unlock(&file)?;
        tracing::debug!(path = %self.path.display(), "closed file medium");
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.file.is_some()
    }

    fn read(&mut self, offset: MediumOffset, buffer: &mut [u8]) -> StoreResult<()> {
        check_access(&self.medium, self.is_opened(), &offset)?;
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset.position()))?;

        let mut read = 0;
        while read < buffer.len() {
            match file.read(&mut buffer[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.stats.record_read(read as u64);
        tracing::trace!(offset = offset.position(), requested = buffer.len(), read, "file read");
        if read < buffer.len() {
            return Err(short_read(offset, buffer, read));
        }
        Ok(())
    }

    fn write(&mut self, offset: MediumOffset, data: &[u8]) -> StoreResult<()> {
        check_access(&self.medium, self.is_opened(), &offset)?;
        check_writable(&self.medium)?;
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset.position()))?;
        file.write_all(data)?;

        self.stats.record_write(data.len() as u64);
        tracing::trace!(offset = offset.position(), len = data.len(), "file write");
        Ok(())
    }

    fn truncate(&mut self, new_length: u64) -> StoreResult<()> {
        if !self.is_opened() {
            return Err(StoreError::Closed);
        }
        check_writable(&self.medium)?;
        let file = self.file()?;
        file.set_len(new_length)?;
        file.sync_all()?;

        self.stats.record_truncate();
        Ok(())
    }

    fn is_at_end_of_medium(&mut self, offset: MediumOffset) -> StoreResult<bool> {
        check_access(&self.medium, self.is_opened(), &offset)?;
        let length = self.length()?.unwrap_or(0);
        Ok(offset.position() >= length)
    }

    fn length(&self) -> StoreResult<Option<u64>> {
        let file = self.file.as_ref().ok_or(StoreError::Closed)?;
        Ok(Some(file.metadata()?.len()))
    }

    fn stats(&self) -> &AccessStats {
        &self.stats
    }
}
