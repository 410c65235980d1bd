//! Physical I/O statistics of an accessor.
//!
//! Counts what actually reaches the underlying resource, so tests and
//! tooling can tell cached reads from physical ones.
//!
//! # Usage
//!
//! ```rust,ignore
//! let before = store.stats();
//! store.get_data(offset, 16)?;
//! let after = store.stats();
//! println!("physical reads: {}", after.reads - before.reads);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of physical reads, writes and truncations.
#[derive(Debug, Default)]
pub struct AccessStats {
    /// Number of read calls.
    reads: AtomicU64,
    /// Total bytes obtained by reads.
    bytes_read: AtomicU64,
    /// Number of write calls.
    writes: AtomicU64,
    /// Total bytes written.
    bytes_written: AtomicU64,
    /// Number of truncations.
    truncates: AtomicU64,
}

impl AccessStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_truncate(&self) {
        self.truncates.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of read calls.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the total bytes read.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns the number of write calls.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the total bytes written.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of truncations.
    pub fn truncates(&self) -> u64 {
        self.truncates.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            bytes_read: self.bytes_read(),
            writes: self.writes(),
            bytes_written: self.bytes_written(),
            truncates: self.truncates(),
        }
    }
}

/// A point-in-time snapshot of access statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Number of read calls.
    pub reads: u64,
    /// Total bytes read.
    pub bytes_read: u64,
    /// Number of write calls.
    pub writes: u64,
    /// Total bytes written.
    pub bytes_written: u64,
    /// Number of truncations.
    pub truncates: u64,
}
