//! Property-based test generators using proptest.
//!
//! Provides strategies for media content, configurations and edit scripts
//! that are valid against the pre-edit medium length.

use bytes::Bytes;
use mediumstore_core::{MediumAction, MediumConfig, Store, StoreResult};
use proptest::prelude::*;

/// One scheduled edit, in pre-edit coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Insert `bytes` before position `at`.
    Insert {
        /// Insert position.
        at: u64,
        /// Inserted bytes.
        bytes: Vec<u8>,
    },
    /// Remove `size` bytes at `at`.
    Remove {
        /// First removed position.
        at: u64,
        /// Number of removed bytes.
        size: u64,
    },
    /// Replace `size` bytes at `at` by `bytes`.
    Replace {
        /// First replaced position.
        at: u64,
        /// Number of replaced bytes.
        size: u64,
        /// Replacement bytes.
        bytes: Vec<u8>,
    },
}

impl EditOp {
    /// Schedules this edit on `store`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the edit is rejected.
    pub fn schedule(&self, store: &mut Store) -> StoreResult<MediumAction> {
        match self {
            Self::Insert { at, bytes } => {
                let offset = store.create_medium_offset(*at)?;
                store.insert_data(offset, Bytes::copy_from_slice(bytes))
            }
            Self::Remove { at, size } => {
                let offset = store.create_medium_offset(*at)?;
                store.remove_data(offset, *size)
            }
            Self::Replace { at, size, bytes } => {
                let offset = store.create_medium_offset(*at)?;
                store.replace_data(offset, *size, Bytes::copy_from_slice(bytes))
            }
        }
    }
}

/// Strategy for generating edit payloads (never empty).
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..12)
}

/// Strategy for generating one edit valid on a medium of `len` bytes.
pub fn edit_op_strategy(len: u64) -> BoxedStrategy<EditOp> {
    let insert = (0..=len, payload_strategy())
        .prop_map(|(at, bytes)| EditOp::Insert { at, bytes })
        .boxed();
    if len == 0 {
        return insert;
    }

    let remove = (0..len)
        .prop_flat_map(move |at| (Just(at), 1..=len - at))
        .prop_map(|(at, size)| EditOp::Remove { at, size });
    let replace = (0..len)
        .prop_flat_map(move |at| (Just(at), 1..=len - at, payload_strategy()))
        .prop_map(|(at, size, bytes)| EditOp::Replace { at, size, bytes });

    prop_oneof![insert, remove, replace].boxed()
}

/// Strategy for generating medium content plus an edit script against it.
pub fn edit_script_strategy(
    max_len: usize,
    max_ops: usize,
) -> impl Strategy<Value = (Vec<u8>, Vec<EditOp>)> {
    prop::collection::vec(any::<u8>(), 0..=max_len).prop_flat_map(move |content| {
        let ops = prop::collection::vec(edit_op_strategy(content.len() as u64), 0..=max_ops);
        (Just(content), ops)
    })
}

/// Strategy for generating small, valid configurations that force chunked
/// reads and writes and frequent eviction.
pub fn config_strategy() -> impl Strategy<Value = MediumConfig> {
    (1usize..32, 1u64..32, 0u64..64, any::<bool>()).prop_map(
        |(block_size, region_size, extra, caching)| {
            MediumConfig::new()
                .max_read_write_block_size(block_size)
                .max_cache_region_size(region_size)
                .max_cache_size(region_size + extra)
                .caching_enabled(caching)
        },
    )
}
