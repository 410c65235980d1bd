//! Bounded cache of bytes already read from a medium.
//!
//! The cache holds non-overlapping cached [`MediumRegion`]s indexed by start
//! position. Besides the position index it keeps an insertion-order index,
//! so that eviction always drops the bytes that were added first, no matter
//! where they lie on the medium.
//!
//! ## Invariants
//!
//! After every mutation:
//!
//! - no two cached regions overlap
//! - every cached region is at most `max_cache_region_size` bytes
//! - the total number of cached bytes is at most `max_cache_size`
//!
//! ## Eviction
//!
//! When an addition pushes the total above the limit, the oldest regions are
//! dropped. If dropping only the front of the oldest region is enough, the
//! region is trimmed instead of removed. A single addition larger than the
//! whole cache therefore leaves exactly its trailing `max_cache_size` bytes.

use crate::config::MediumConfig;
use crate::error::{StoreError, StoreResult};
use crate::medium::MediumId;
use crate::offset::MediumOffset;
use crate::region::MediumRegion;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct CacheEntry {
    region: MediumRegion,
    sequence: u64,
}

/// Read cache of one medium.
///
/// # Example
///
/// ```rust
/// use mediumstore_core::{Medium, MediumAccess, MediumCache, MediumConfig, MediumOffset, MediumRegion};
///
/// let config = MediumConfig::new().max_cache_size(16).max_cache_region_size(4);
/// let medium = Medium::memory(vec![], MediumAccess::ReadWrite, config.clone()).unwrap();
/// let mut cache = MediumCache::new(medium.id(), &config);
///
/// let start = MediumOffset::new(medium.id(), 0);
/// cache.add_region(MediumRegion::cached(start, b"abcdef".to_vec()).unwrap()).unwrap();
///
/// assert_eq!(cache.region_count(), 2);
/// assert_eq!(cache.get_cached_byte_count_at(start).unwrap(), 6);
/// ```
#[derive(Debug)]
pub struct MediumCache {
    medium: MediumId,
    enabled: bool,
    max_cache_size: u64,
    max_region_size: u64,
    regions: BTreeMap<u64, CacheEntry>,
    /// `(sequence, start)` of every cached region, oldest first.
    insertion_order: BTreeSet<(u64, u64)>,
    next_sequence: u64,
    cached_size: u64,
}

impl MediumCache {
    /// Creates an empty cache using the limits of `config`.
    #[must_use]
    pub fn new(medium: MediumId, config: &MediumConfig) -> Self {
        Self {
            medium,
            enabled: config.uses_cache(),
            max_cache_size: config.max_cache_size,
            max_region_size: config.max_cache_region_size.max(1),
            regions: BTreeMap::new(),
            insertion_order: BTreeSet::new(),
            next_sequence: 0,
            cached_size: 0,
        }
    }

    /// Returns false if the configuration disables caching.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the maximum total number of cached bytes.
    #[must_use]
    pub fn max_cache_size(&self) -> u64 {
        self.max_cache_size
    }

    /// Returns the maximum size of one cached region.
    #[must_use]
    pub fn max_region_size(&self) -> u64 {
        self.max_region_size
    }

    /// Returns the total number of cached bytes.
    #[must_use]
    pub fn cached_size(&self) -> u64 {
        self.cached_size
    }

    /// Returns the number of cached regions.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Returns all cached regions in offset order.
    #[must_use]
    pub fn all_cached_regions(&self) -> Vec<MediumRegion> {
        self.regions.values().map(|e| e.region.clone()).collect()
    }

    /// Adds a cached region.
    ///
    /// The region is split into pieces of at most the maximum region size.
    /// Cached bytes it overlaps are replaced, and the oldest cached bytes are
    /// evicted until the total fits the limit again. A disabled cache ignores
    /// the call.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for uncached regions or regions of another
    /// medium.
    pub fn add_region(&mut self, region: MediumRegion) -> StoreResult<()> {
        self.check_medium(&region.start())?;
        let Some(bytes) = region.bytes() else {
            return Err(StoreError::invalid_argument(
                "only cached regions can be added to the cache",
            ));
        };
        if !self.enabled {
            return Ok(());
        }

        let start = region.start();
        let mut consumed = 0u64;
        while consumed < region.size() {
            let len = (region.size() - consumed).min(self.max_region_size);
            let piece = MediumRegion::cached(
                start.forward(consumed),
                bytes.slice(consumed as usize..(consumed + len) as usize),
            )?;
            self.insert_piece(piece);
            consumed += len;
        }

        tracing::debug!(
            start = start.position(),
            size = region.size(),
            cached = self.cached_size,
            regions = self.regions.len(),
            "added region to cache"
        );
        debug_assert!(self.check_invariants().is_ok());
        Ok(())
    }

    /// Returns regions exactly covering `[offset, offset + size)`.
    ///
    /// Cached parts are clipped to the range. Gaps are filled with uncached
    /// regions of at most the maximum region size. An empty range yields no
    /// regions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for offsets of another medium or if the
    /// range overflows.
    pub fn get_regions_in_range(
        &self,
        offset: MediumOffset,
        size: u64,
    ) -> StoreResult<Vec<MediumRegion>> {
        self.check_medium(&offset)?;
        let start = offset.position();
        let end = range_end(start, size)?;

        let mut result = Vec::new();
        let mut cursor = start;
        for key in self.overlapping_keys(start, end) {
            let region = &self.regions[&key].region;
            if region.start().position() > cursor {
                self.push_gaps(&mut result, cursor, region.start().position())?;
            }
            if let Some(clipped) = region.clip(start, end) {
                cursor = clipped.end_position();
                result.push(clipped);
            }
        }
        if cursor < end {
            self.push_gaps(&mut result, cursor, end)?;
        }
        Ok(result)
    }

    /// Returns the number of contiguous cached bytes starting at `offset`.
    ///
    /// The run may span several adjoining regions. Zero if `offset` is not
    /// cached.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for offsets of another medium.
    pub fn get_cached_byte_count_at(&self, offset: MediumOffset) -> StoreResult<u64> {
        self.check_medium(&offset)?;
        let position = offset.position();
        let Some((_, entry)) = self.regions.range(..=position).next_back() else {
            return Ok(0);
        };
        let mut run_end = entry.region.end_position();
        if run_end <= position {
            return Ok(0);
        }
        while let Some(next) = self.regions.get(&run_end) {
            run_end = next.region.end_position();
        }
        Ok(run_end - position)
    }

    /// Drops cached bytes within `[offset, offset + size)`, trimming regions
    /// that extend beyond it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for offsets of another medium or if the
    /// range overflows.
    pub fn remove_regions_in_range(&mut self, offset: MediumOffset, size: u64) -> StoreResult<()> {
        self.check_medium(&offset)?;
        let start = offset.position();
        let end = range_end(start, size)?;
        self.remove_range(start, end);
        Ok(())
    }

    /// Empties the cache.
    pub fn clear(&mut self) {
        if !self.regions.is_empty() {
            tracing::debug!(
                regions = self.regions.len(),
                bytes = self.cached_size,
                "cleared cache"
            );
        }
        self.regions.clear();
        self.insertion_order.clear();
        self.cached_size = 0;
    }

    /// Verifies the cache invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` describing the first violated invariant.
    pub fn check_invariants(&self) -> StoreResult<()> {
        let mut previous_end = 0;
        let mut total = 0;
        for (&start, entry) in &self.regions {
            let region = &entry.region;
            if start != region.start().position() || !region.is_cached() {
                return Err(StoreError::invalid_argument(format!(
                    "corrupt cache entry at {start}"
                )));
            }
            if start < previous_end {
                return Err(StoreError::invalid_argument(format!(
                    "cached region at {start} overlaps its predecessor"
                )));
            }
            if region.size() > self.max_region_size {
                return Err(StoreError::invalid_argument(format!(
                    "cached region at {start} exceeds max region size"
                )));
            }
            if !self.insertion_order.contains(&(entry.sequence, start)) {
                return Err(StoreError::invalid_argument(format!(
                    "cached region at {start} missing from insertion order"
                )));
            }
            previous_end = region.end_position();
            total += region.size();
        }
        if total != self.cached_size || total > self.max_cache_size {
            return Err(StoreError::invalid_argument(format!(
                "cached size {total} does not match bookkeeping or limit"
            )));
        }
        if self.insertion_order.len() != self.regions.len() {
            return Err(StoreError::invalid_argument("insertion order out of sync"));
        }
        Ok(())
    }

    fn insert_piece(&mut self, piece: MediumRegion) {
        self.remove_range(piece.start().position(), piece.end_position());
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.insert_entry(piece, sequence);
        self.evict_to_fit();
    }

    fn insert_entry(&mut self, region: MediumRegion, sequence: u64) {
        let start = region.start().position();
        self.cached_size += region.size();
        self.insertion_order.insert((sequence, start));
        self.regions.insert(start, CacheEntry { region, sequence });
    }

    fn take_entry(&mut self, start: u64) -> Option<CacheEntry> {
        let entry = self.regions.remove(&start)?;
        self.insertion_order.remove(&(entry.sequence, start));
        self.cached_size -= entry.region.size();
        Some(entry)
    }

    /// Keys of the regions overlapping `[start, end)`, in offset order.
    fn overlapping_keys(&self, start: u64, end: u64) -> Vec<u64> {
        let mut keys: Vec<u64> = self
            .regions
            .range(..start)
            .next_back()
            .filter(|(_, entry)| entry.region.end_position() > start)
            .map(|(&key, _)| key)
            .into_iter()
            .collect();
        keys.extend(self.regions.range(start..end).map(|(&key, _)| key));
        keys
    }

    fn remove_range(&mut self, start: u64, end: u64) {
        for key in self.overlapping_keys(start, end) {
            let Some(entry) = self.take_entry(key) else {
                continue;
            };
            let region = &entry.region;
            if region.start().position() < start {
                if let Some(front) = region.clip(region.start().position(), start) {
                    self.insert_entry(front, entry.sequence);
                }
            }
            if region.end_position() > end {
                if let Some(back) = region.clip(end, region.end_position()) {
                    self.insert_entry(back, entry.sequence);
                }
            }
        }
    }

    fn evict_to_fit(&mut self) {
        while self.cached_size > self.max_cache_size {
            let Some(&(sequence, start)) = self.insertion_order.first() else {
                break;
            };
            let excess = self.cached_size - self.max_cache_size;
            let Some(entry) = self.take_entry(start) else {
                break;
            };
            let region = entry.region;
            if region.size() > excess {
                if let Some(survivor) = region.clip(start + excess, region.end_position()) {
                    self.insert_entry(survivor, sequence);
                }
                tracing::debug!(start, trimmed = excess, "trimmed oldest cached region");
            } else {
                tracing::debug!(start, size = region.size(), "evicted oldest cached region");
            }
        }
    }

    fn push_gaps(&self, result: &mut Vec<MediumRegion>, start: u64, end: u64) -> StoreResult<()> {
        let mut cursor = start;
        while cursor < end {
            let len = (end - cursor).min(self.max_region_size);
            result.push(MediumRegion::uncached(
                MediumOffset::new(self.medium, cursor),
                len,
            )?);
            cursor += len;
        }
        Ok(())
    }

    fn check_medium(&self, offset: &MediumOffset) -> StoreResult<()> {
        if offset.medium() != self.medium {
            return Err(StoreError::invalid_argument(format!(
                "offset {} does not belong to {}",
                offset, self.medium
            )));
        }
        Ok(())
    }
}

fn range_end(start: u64, size: u64) -> StoreResult<u64> {
    start
        .checked_add(size)
        .ok_or_else(|| StoreError::invalid_argument("range exceeds the addressable medium"))
}
