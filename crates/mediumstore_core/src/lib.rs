//! # Medium Store Core
//!
//! Cached random and sequential access to binary media, with deferred,
//! byte-precise editing.
//!
//! A *medium* is any byte-addressable data source: a file, a shared
//! in-memory buffer or an input stream. A [`Store`] over a medium reads
//! through a bounded cache, records insert/remove/replace edits without
//! touching the medium, and writes them back in one [`Store::flush`].
//!
//! ## Design Principles
//!
//! - Accessors are the only components performing I/O
//! - Offsets are passive values; the store re-homes tracked ones on flush
//! - Overlapping edits resolve in favor of the later one
//! - One store per medium instance; no internal locking
//!
//! ## Components
//!
//! - [`MediumOffset`] / [`MediumRegion`] - positions and byte ranges
//! - [`Accessor`] - [`FileAccessor`], [`MemoryAccessor`] and [`StreamAccessor`]
//! - [`MediumCache`] - non-overlapping cached regions with oldest-first eviction
//! - [`OffsetFactory`] - issues offsets and tracks them across flushes
//! - [`ChangeManager`] - pending actions and flush-plan compilation
//! - [`Store`] - the facade tying everything together
//!
//! ## Example
//!
//! ```rust
//! use mediumstore_core::{Medium, MediumAccess, MediumConfig, Store};
//!
//! let medium = Medium::memory(b"0123456789".to_vec(), MediumAccess::ReadWrite, MediumConfig::default()).unwrap();
//! let mut store = Store::new(medium.clone());
//! store.open().unwrap();
//!
//! let five = store.create_medium_offset(5).unwrap();
//! let insert = store.insert_data(five, b"XYZ".to_vec()).unwrap();
//! store.flush().unwrap();
//!
//! assert!(!insert.is_pending());
//! assert_eq!(medium.content().unwrap(), b"01234XYZ56789");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accessor;
mod cache;
mod change;
mod config;
mod error;
mod flush;
mod medium;
mod offset;
mod region;
mod stats;
mod store;

pub use accessor::{Accessor, FileAccessor, MediumAccessor, MemoryAccessor, StreamAccessor};
pub use cache::MediumCache;
pub use change::{ActionKind, ChangeManager, MediumAction};
pub use config::{
    MediumConfig, DEFAULT_MAX_CACHE_REGION_SIZE, DEFAULT_MAX_CACHE_SIZE,
    DEFAULT_MAX_READ_WRITE_BLOCK_SIZE, UNLIMITED_CACHE_SIZE,
};
pub use error::{EndOfMedium, StoreError, StoreResult};
pub use flush::{FlushOperation, FlushPlan};
pub use medium::{Medium, MediumAccess, MediumId};
pub use offset::{
    shift_position, MediumOffset, OffsetFactory, OffsetShift, ResolveOffset, TrackedOffset,
};
pub use region::MediumRegion;
pub use stats::{AccessStats, StatsSnapshot};
pub use store::Store;
