//! Error types for medium store operations.

use crate::offset::MediumOffset;
use bytes::Bytes;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for medium store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Details of a read that ran out of bytes before its buffer was full.
///
/// The partial data is kept so callers can still use what was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfMedium {
    /// Offset at which the short read began.
    pub offset: MediumOffset,
    /// Number of bytes the caller asked for.
    pub requested: usize,
    /// Number of bytes actually obtained, possibly zero.
    pub read: usize,
    /// The bytes obtained so far, `read` bytes long.
    pub bytes: Bytes,
}

impl EndOfMedium {
    /// Creates a new end-of-medium report.
    #[must_use]
    pub fn new(offset: MediumOffset, requested: usize, bytes: Bytes) -> Self {
        Self {
            offset,
            requested,
            read: bytes.len(),
            bytes,
        }
    }
}

impl fmt::Display for EndOfMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "end of medium at offset {}: requested {} bytes, read {}",
            self.offset.position(),
            self.requested,
            self.read
        )
    }
}

/// Errors that can occur while accessing or editing a medium.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read hit the end of the medium before the requested bytes were read.
    #[error("{0}")]
    EndOfMedium(EndOfMedium),

    /// An argument violated the API contract.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violation.
        message: String,
    },

    /// A write, edit or flush was attempted on a read-only medium.
    #[error("medium is read-only: {medium}")]
    ReadOnly {
        /// Name of the medium.
        medium: String,
    },

    /// The physical resource could not be opened.
    #[error("cannot access medium: {message}")]
    MediumAccess {
        /// Description of the failure.
        message: String,
        /// Underlying I/O error, if any.
        #[source]
        source: Option<io::Error>,
    },

    /// The store is closed.
    #[error("medium store is closed")]
    Closed,

    /// The action is not (or no longer) pending.
    #[error("action #{sequence} is not pending")]
    ActionNotPending {
        /// Sequence number of the action.
        sequence: u64,
    },

    /// A stream read did not complete within the configured timeout.
    #[error("read at offset {offset} timed out after {timeout:?}")]
    ReadTimedOut {
        /// Offset of the read.
        offset: u64,
        /// The configured timeout.
        timeout: Duration,
    },

    /// The operation is not supported by this kind of medium.
    #[error("unsupported operation: {message}")]
    Unsupported {
        /// Description of the operation.
        message: String,
    },

    /// A previous flush failed after it had started rewriting the medium.
    ///
    /// The medium content is neither the old nor the new one. The store
    /// refuses further flushes until its pending actions are discarded.
    #[error("medium was partially rewritten by a failed flush: {medium}")]
    IncompleteFlush {
        /// Name of the medium.
        medium: String,
    },
}

impl StoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a medium access error without an underlying cause.
    pub fn medium_access(message: impl Into<String>) -> Self {
        Self::MediumAccess {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a medium access error caused by an I/O error.
    pub fn medium_access_io(message: impl Into<String>, source: io::Error) -> Self {
        Self::MediumAccess {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a read-only error for the named medium.
    pub fn read_only(medium: impl Into<String>) -> Self {
        Self::ReadOnly {
            medium: medium.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Returns the end-of-medium details if this is an end-of-medium error.
    #[must_use]
    pub fn as_end_of_medium(&self) -> Option<&EndOfMedium> {
        match self {
            Self::EndOfMedium(eom) => Some(eom),
            _ => None,
        }
    }
}
