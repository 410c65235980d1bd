//! Accessors: the only components that touch the physical resource.
//!
//! Every medium kind has exactly one accessor variant. The set is closed:
//! [`Accessor`] is chosen from the [`Medium`] at construction time and
//! forwards to the matching implementation of [`MediumAccessor`].

mod file;
mod memory;
mod stream;

pub use file::FileAccessor;
pub use memory::MemoryAccessor;
pub use stream::StreamAccessor;

use crate::error::{EndOfMedium, StoreError, StoreResult};
use crate::medium::{Medium, MediumKind};
use crate::offset::MediumOffset;
use crate::stats::AccessStats;
use bytes::Bytes;

/// Low-level access to one medium.
///
/// # Invariants
///
/// - `read` either fills the whole buffer or fails with
///   [`StoreError::EndOfMedium`] carrying the bytes obtained so far
/// - `write` consumes the whole buffer on success
/// - every operation except `open` fails with [`StoreError::Closed`] while
///   the accessor is closed
///
/// # Implementors
///
/// - [`FileAccessor`] - random access to a file
/// - [`MemoryAccessor`] - random access to a shared byte buffer
/// - [`StreamAccessor`] - forward-only access to an input stream
pub trait MediumAccessor {
    /// Returns the medium this accessor works on.
    fn medium(&self) -> &Medium;

    /// Acquires the underlying resource.
    ///
    /// # Errors
    ///
    /// Returns `MediumAccess` if the resource is missing, locked by another
    /// writer, or cannot be opened.
    fn open(&mut self) -> StoreResult<()>;

    /// Releases the underlying resource.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the accessor is not open.
    fn close(&mut self) -> StoreResult<()>;

    /// Returns true while the resource is held.
    fn is_opened(&self) -> bool;

    /// Fills `buffer` with the bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `EndOfMedium` if the medium ends before the buffer is full.
    fn read(&mut self, offset: MediumOffset, buffer: &mut [u8]) -> StoreResult<()>;

    /// Writes all of `data` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` for read-only media.
    fn write(&mut self, offset: MediumOffset, data: &[u8]) -> StoreResult<()>;

    /// Cuts the medium to `new_length` bytes.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` for read-only media.
    fn truncate(&mut self, new_length: u64) -> StoreResult<()>;

    /// Returns true if no bytes exist at or after `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be inspected.
    fn is_at_end_of_medium(&mut self, offset: MediumOffset) -> StoreResult<bool>;

    /// Returns the current length, or `None` if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the length cannot be determined.
    fn length(&self) -> StoreResult<Option<u64>>;

    /// Returns the next position a sequential medium will deliver.
    fn stream_position(&self) -> Option<u64> {
        None
    }

    /// Returns the physical I/O counters.
    fn stats(&self) -> &AccessStats;
}

/// The accessor variant matching a medium kind.
#[derive(Debug)]
pub enum Accessor {
    /// File-backed medium.
    File(FileAccessor),
    /// In-memory medium.
    Memory(MemoryAccessor),
    /// Stream medium.
    Stream(StreamAccessor),
}

impl Accessor {
    /// Builds the accessor for `medium`.
    #[must_use]
    pub fn for_medium(medium: Medium) -> Self {
        match medium.kind() {
            MediumKind::File { .. } => Self::File(FileAccessor::new(medium)),
            MediumKind::Memory { .. } => Self::Memory(MemoryAccessor::new(medium)),
            MediumKind::Stream { .. } => Self::Stream(StreamAccessor::new(medium)),
        }
    }

    fn inner(&self) -> &dyn MediumAccessor {
        match self {
            Self::File(a) => a,
            Self::Memory(a) => a,
            Self::Stream(a) => a,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MediumAccessor {
        match self {
            Self::File(a) => a,
            Self::Memory(a) => a,
            Self::Stream(a) => a,
        }
    }
}

impl MediumAccessor for Accessor {
    fn medium(&self) -> &Medium {
        self.inner().medium()
    }

    fn open(&mut self) -> StoreResult<()> {
        self.inner_mut().open()
    }

    fn close(&mut self) -> StoreResult<()> {
        self.inner_mut().close()
    }

    fn is_opened(&self) -> bool {
        self.inner().is_opened()
    }

    fn read(&mut self, offset: MediumOffset, buffer: &mut [u8]) -> StoreResult<()> {
        self.inner_mut().read(offset, buffer)
    }

    fn write(&mut self, offset: MediumOffset, data: &[u8]) -> StoreResult<()> {
        self.inner_mut().write(offset, data)
    }

    fn truncate(&mut self, new_length: u64) -> StoreResult<()> {
        self.inner_mut().truncate(new_length)
    }

    fn is_at_end_of_medium(&mut self, offset: MediumOffset) -> StoreResult<bool> {
        self.inner_mut().is_at_end_of_medium(offset)
    }

    fn length(&self) -> StoreResult<Option<u64>> {
        self.inner().length()
    }

    fn stream_position(&self) -> Option<u64> {
        self.inner().stream_position()
    }

    fn stats(&self) -> &AccessStats {
        self.inner().stats()
    }
}

/// Checks the preconditions shared by all data operations.
pub(crate) fn check_access(
    medium: &Medium,
    opened: bool,
    offset: &MediumOffset,
) -> StoreResult<()> {
    if !opened {
        return Err(StoreError::Closed);
    }
    if offset.medium() != medium.id() {
        return Err(StoreError::invalid_argument(format!(
            "offset {} does not belong to medium {}",
            offset,
            medium.name()
        )));
    }
    Ok(())
}

/// Checks the preconditions of a write or truncation.
pub(crate) fn check_writable(medium: &Medium) -> StoreResult<()> {
    if medium.is_read_only() {
        return Err(StoreError::read_only(medium.name()));
    }
    Ok(())
}

/// Builds the end-of-medium error for a short read into `buffer`.
pub(crate) fn short_read(offset: MediumOffset, buffer: &[u8], read: usize) -> StoreError {
    StoreError::EndOfMedium(EndOfMedium::new(
        offset,
        buffer.len(),
        Bytes::copy_from_slice(&buffer[..read]),
    ))
}
