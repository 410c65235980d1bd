//! Insert, remove and replace command implementations.
//!
//! Each command schedules one action on a writable store and flushes it
//! back to the file.

use mediumstore_core::{Medium, MediumAccess, MediumConfig, Store};
use std::path::Path;

/// One edit given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Insert bytes before `offset`.
    Insert {
        /// Insert position.
        offset: u64,
        /// Inserted bytes.
        bytes: Vec<u8>,
    },
    /// Remove `len` bytes at `offset`.
    Remove {
        /// First removed byte.
        offset: u64,
        /// Number of removed bytes.
        len: u64,
    },
    /// Replace `len` bytes at `offset`.
    Replace {
        /// First replaced byte.
        offset: u64,
        /// Number of replaced bytes.
        len: u64,
        /// Replacement bytes.
        bytes: Vec<u8>,
    },
}

/// Outcome of an applied edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditResult {
    /// File length before the edit.
    pub old_length: u64,
    /// File length after the edit.
    pub new_length: u64,
    /// Bytes written by the flush, moved bytes included.
    pub bytes_written: u64,
}

/// Applies `edit` to `path` and flushes it.
pub fn apply(
    path: &Path,
    config: MediumConfig,
    edit: &Edit,
) -> Result<EditResult, Box<dyn std::error::Error>> {
    let mut store = Store::new(Medium::file(path, MediumAccess::ReadWrite, config)?);
    store.open()?;

    let action = match edit {
        Edit::Insert { offset, bytes } => {
            let at = store.create_medium_offset(*offset)?;
            store.insert_data(at, bytes.clone())?
        }
        Edit::Remove { offset, len } => {
            let at = store.create_medium_offset(*offset)?;
            store.remove_data(at, *len)?
        }
        Edit::Replace { offset, len, bytes } => {
            let at = store.create_medium_offset(*offset)?;
            store.replace_data(at, *len, bytes.clone())?
        }
    };
    tracing::debug!(kind = %action.kind(), sequence = action.sequence(), "scheduled edit");

    let plan = store.flush_plan()?;
    store.flush()?;
    store.close()?;

    Ok(EditResult {
        old_length: plan.old_length(),
        new_length: plan.new_length(),
        bytes_written: store.stats().bytes_written,
    })
}

/// Runs an edit command.
pub fn run(path: &Path, config: MediumConfig, edit: &Edit) -> Result<(), Box<dyn std::error::Error>> {
    let result = apply(path, config, edit)?;
    println!(
        "{}: {} -> {} bytes ({} bytes written)",
        path.display(),
        result.old_length,
        result.new_length,
        result.bytes_written
    );
    Ok(())
}
