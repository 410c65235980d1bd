//! Contiguous byte ranges on a medium.

use crate::error::{StoreError, StoreResult};
use crate::offset::MediumOffset;
use bytes::Bytes;
use std::fmt;

/// A contiguous, non-empty byte range on a medium.
///
/// A region is *cached* if it carries its bytes (and then its size equals
/// the payload length), otherwise it is an uncached placeholder for a gap.
#[derive(Clone, PartialEq, Eq)]
pub struct MediumRegion {
    start: MediumOffset,
    size: u64,
    bytes: Option<Bytes>,
}

impl MediumRegion {
    /// Creates a cached region holding `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `bytes` is empty.
    pub fn cached(start: MediumOffset, bytes: impl Into<Bytes>) -> StoreResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(StoreError::invalid_argument("region must not be empty"));
        }
        Ok(Self {
            start,
            size: bytes.len() as u64,
            bytes: Some(bytes),
        })
    }

    /// Creates an uncached placeholder of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `size` is zero.
    pub fn uncached(start: MediumOffset, size: u64) -> StoreResult<Self> {
        if size == 0 {
            return Err(StoreError::invalid_argument("region must not be empty"));
        }
        Ok(Self {
            start,
            size,
            bytes: None,
        })
    }

    /// Returns the first offset of the region.
    #[must_use]
    pub fn start(&self) -> MediumOffset {
        self.start
    }

    /// Returns the number of bytes in the region.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the offset just behind the region.
    #[must_use]
    pub fn end(&self) -> MediumOffset {
        self.start.forward(self.size)
    }

    pub(crate) fn end_position(&self) -> u64 {
        self.start.position() + self.size
    }

    /// Returns true if the region holds its bytes.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.bytes.is_some()
    }

    /// Returns the cached bytes, if any.
    #[must_use]
    pub fn bytes(&self) -> Option<&Bytes> {
        self.bytes.as_ref()
    }

    /// Returns true if `offset` lies in `[start, end)`.
    #[must_use]
    pub fn contains(&self, offset: &MediumOffset) -> bool {
        offset.medium() == self.start.medium()
            && offset.position() >= self.start.position()
            && offset.position() < self.end_position()
    }

    /// Returns true if this region overlaps the front of `other`: `other`
    /// starts inside this region and ends at or behind this region's end.
    #[must_use]
    pub fn overlaps_at_front(&self, other: &MediumRegion) -> bool {
        self.same_medium(other)
            && other.start.position() >= self.start.position()
            && other.start.position() < self.end_position()
            && other.end_position() >= self.end_position()
    }

    /// Returns true if this region overlaps the back of `other`.
    #[must_use]
    pub fn overlaps_at_back(&self, other: &MediumRegion) -> bool {
        other.overlaps_at_front(self)
    }

    /// Returns the number of bytes both regions share.
    #[must_use]
    pub fn overlapping_byte_count(&self, other: &MediumRegion) -> u64 {
        if !self.same_medium(other) {
            return 0;
        }
        let start = self.start.position().max(other.start.position());
        let end = self.end_position().min(other.end_position());
        end.saturating_sub(start)
    }

    /// Splits the region at an interior offset into two adjacent regions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `at` lies strictly inside the region.
    pub fn split(&self, at: MediumOffset) -> StoreResult<(MediumRegion, MediumRegion)> {
        self.start.check_same_medium(&at)?;
        let position = at.position();
        if position <= self.start.position() || position >= self.end_position() {
            return Err(StoreError::invalid_argument(format!(
                "split point {} not strictly inside region {:?}",
                position, self
            )));
        }
        let front_size = position - self.start.position();
        let (front, back) = match &self.bytes {
            Some(bytes) => {
                let cut = front_size as usize;
                (Some(bytes.slice(..cut)), Some(bytes.slice(cut..)))
            }
            None => (None, None),
        };
        Ok((
            MediumRegion {
                start: self.start,
                size: front_size,
                bytes: front,
            },
            MediumRegion {
                start: at,
                size: self.size - front_size,
                bytes: back,
            },
        ))
    }

    /// Drops the bytes before `new_start`, moving the region's start there.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for uncached regions or if `new_start` is
    /// not in `[start, end)`.
    pub fn discard_bytes_at_front(&mut self, new_start: MediumOffset) -> StoreResult<()> {
        self.start.check_same_medium(&new_start)?;
        let Some(bytes) = &self.bytes else {
            return Err(StoreError::invalid_argument(
                "cannot discard bytes of an uncached region",
            ));
        };
        if !self.contains(&new_start) {
            return Err(StoreError::invalid_argument(format!(
                "new start {} outside region {:?}",
                new_start.position(),
                self
            )));
        }
        let trimmed = new_start.position() - self.start.position();
        self.bytes = Some(bytes.slice(trimmed as usize..));
        self.start = new_start;
        self.size -= trimmed;
        Ok(())
    }

    /// Drops the bytes at and behind `new_end`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for uncached regions or if `new_end` is not
    /// in `(start, end]`.
    pub fn discard_bytes_at_back(&mut self, new_end: MediumOffset) -> StoreResult<()> {
        self.start.check_same_medium(&new_end)?;
        let Some(bytes) = &self.bytes else {
            return Err(StoreError::invalid_argument(
                "cannot discard bytes of an uncached region",
            ));
        };
        let position = new_end.position();
        if position <= self.start.position() || position > self.end_position() {
            return Err(StoreError::invalid_argument(format!(
                "new end {} outside region {:?}",
                position, self
            )));
        }
        let size = position - self.start.position();
        self.bytes = Some(bytes.slice(..size as usize));
        self.size = size;
        Ok(())
    }

    /// Returns the part of the region within `[start, end)`, if any.
    pub(crate) fn clip(&self, start: u64, end: u64) -> Option<MediumRegion> {
        let clipped_start = self.start.position().max(start);
        let clipped_end = self.end_position().min(end);
        if clipped_start >= clipped_end {
            return None;
        }
        let from = (clipped_start - self.start.position()) as usize;
        let to = (clipped_end - self.start.position()) as usize;
        Some(MediumRegion {
            start: self.start.at(clipped_start),
            size: clipped_end - clipped_start,
            bytes: self.bytes.as_ref().map(|bytes| bytes.slice(from..to)),
        })
    }

    fn same_medium(&self, other: &MediumRegion) -> bool {
        self.start.medium() == other.start.medium()
    }
}

impl fmt::Debug for MediumRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediumRegion")
            .field("start", &self.start.position())
            .field("size", &self.size)
            .field("cached", &self.is_cached())
            .finish()
    }
}
