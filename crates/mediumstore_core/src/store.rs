//! The medium store facade.
//!
//! A [`Store`] ties one [`Medium`] to its accessor, read cache, offset
//! factory and change manager. It is the single entry point for reading,
//! prefetching, editing and flushing.
//!
//! ## Lifecycle
//!
//! A store starts closed. [`Store::open`] acquires the underlying resource,
//! [`Store::close`] releases it and drops all cached bytes and tracked
//! offsets. Every data operation on a closed store fails with
//! [`StoreError::Closed`]. Dropping an open store closes it.
//!
//! ## Reading
//!
//! Reads are served from the cache where possible. Gaps are read from the
//! medium in blocks of at most `max_read_write_block_size` bytes, and every
//! block read is fed to the cache. If the medium ends early, the bytes
//! obtained so far are still cached and the error reports them.
//!
//! ## Editing
//!
//! Inserts, removes and replaces are only recorded. [`Store::flush`] writes
//! them back in one pass, re-homes tracked offsets and clears the cache.
//!
//! Offsets from [`Store::create_medium_offset`] are tracked handles: after
//! a flush they name the same byte they named before it. Plain
//! [`MediumOffset`] values are accepted too and are taken as they are.

use crate::accessor::{Accessor, MediumAccessor};
use crate::cache::MediumCache;
use crate::change::{ChangeManager, MediumAction};
use crate::error::{EndOfMedium, StoreError, StoreResult};
use crate::flush::{FlushOperation, FlushPlan};
use crate::medium::Medium;
use crate::offset::{MediumOffset, OffsetFactory, ResolveOffset, TrackedOffset};
use crate::region::MediumRegion;
use crate::stats::StatsSnapshot;
use bytes::{Bytes, BytesMut};

/// Cached, editable view of one medium.
///
/// # Example
///
/// ```rust
/// use mediumstore_core::{Medium, MediumAccess, MediumConfig, Store};
///
/// let medium = Medium::memory(b"hello world".to_vec(), MediumAccess::ReadWrite, MediumConfig::default()).unwrap();
/// let mut store = Store::new(medium.clone());
/// store.open().unwrap();
///
/// let at = store.create_medium_offset(6).unwrap();
/// assert_eq!(store.get_data(at, 5).unwrap().as_ref(), b"world");
///
/// store.replace_data(at, 5, b"there".to_vec()).unwrap();
/// store.flush().unwrap();
/// assert_eq!(medium.content().unwrap(), b"hello there");
/// store.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Store {
    medium: Medium,
    accessor: Accessor,
    cache: MediumCache,
    offsets: OffsetFactory,
    changes: ChangeManager,
    incomplete_flush: bool,
}

impl Store {
    /// Creates a closed store over `medium`.
    #[must_use]
    pub fn new(medium: Medium) -> Self {
        let id = medium.id();
        Self {
            accessor: Accessor::for_medium(medium.clone()),
            cache: MediumCache::new(id, medium.config()),
            offsets: OffsetFactory::new(id),
            changes: ChangeManager::new(id),
            incomplete_flush: false,
            medium,
        }
    }

    /// Returns the medium of this store.
    #[must_use]
    pub fn medium(&self) -> &Medium {
        &self.medium
    }

    /// Returns true while the store is open.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.accessor.is_opened()
    }

    /// Opens the underlying resource.
    ///
    /// # Errors
    ///
    /// Returns `MediumAccess` if the resource is missing, locked or already
    /// opened by this store. The store stays closed on failure.
    pub fn open(&mut self) -> StoreResult<()> {
        self.accessor.open()?;
        tracing::debug!(medium = %self.medium.name(), "opened store");
        Ok(())
    }

    /// Closes the underlying resource and drops cached bytes and tracked
    /// offsets. Pending actions survive and can still be flushed after
    /// reopening.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the store is not open, or the error of releasing
    /// the resource. Cache and offsets are cleared either way.
    pub fn close(&mut self) -> StoreResult<()> {
        self.check_open()?;
        let result = self.accessor.close();
        self.cache.clear();
        self.offsets.clear();
        tracing::debug!(medium = %self.medium.name(), "closed store");
        result
    }

    /// Returns a tracked offset at `position` on this store's medium.
    ///
    /// The handle follows later flushes and stays valid until the store is
    /// closed. Use [`Store::resolve_offset`] for its current value.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the store is not open.
    pub fn create_medium_offset(&self, position: u64) -> StoreResult<TrackedOffset> {
        self.check_open()?;
        self.offsets.track(self.offsets.create(position))
    }

    /// Starts tracking `offset` so that it follows later flushes.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the store is not open and `InvalidArgument` for
    /// offsets of another medium.
    pub fn track_offset(&self, offset: MediumOffset) -> StoreResult<TrackedOffset> {
        self.check_open()?;
        self.offsets.track(offset)
    }

    /// Returns the current value of a tracked offset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the handle belongs to another medium or
    /// was invalidated by closing the store.
    pub fn resolve_offset(&self, handle: TrackedOffset) -> StoreResult<MediumOffset> {
        self.offsets.resolve(handle)
    }

    /// Returns the `size` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `EndOfMedium` (reporting the bytes obtained) if the medium
    /// ends before `size` bytes were read, `Closed` if the store is not open
    /// and `InvalidArgument` for offsets of another medium or stale handles.
    pub fn get_data(&mut self, offset: impl ResolveOffset, size: usize) -> StoreResult<Bytes> {
        let offset = self.locate(&offset)?;
        self.read_range(offset, size)
    }

    /// Reads `size` bytes starting at `offset` into the cache.
    ///
    /// # Errors
    ///
    /// Same as [`Store::get_data`].
    pub fn cache(&mut self, offset: impl ResolveOffset, size: usize) -> StoreResult<()> {
        let offset = self.locate(&offset)?;
        self.read_range(offset, size).map(drop)
    }

    /// Returns the number of contiguous cached bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the store is not open and `InvalidArgument` for
    /// offsets of another medium.
    pub fn get_cached_byte_count_at(&self, offset: impl ResolveOffset) -> StoreResult<u64> {
        let offset = self.locate(&offset)?;
        self.cache.get_cached_byte_count_at(offset)
    }

    /// Returns the cached regions in offset order.
    #[must_use]
    pub fn cached_regions(&self) -> Vec<MediumRegion> {
        self.cache.all_cached_regions()
    }

    /// Returns true if no bytes exist at or after `offset`.
    ///
    /// On a stream medium that keeps forward gaps, the bytes passed on the
    /// way to `offset` are cached.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the store is not open and `InvalidArgument` for
    /// offsets of another medium.
    pub fn is_at_end_of_medium(&mut self, offset: impl ResolveOffset) -> StoreResult<bool> {
        let offset = self.locate(&offset)?;
        if self.keeps_forward_gaps() && !self.advance_stream(offset.position())? {
            return Ok(true);
        }
        self.accessor.is_at_end_of_medium(offset)
    }

    /// Schedules inserting `bytes` before `offset`.
    ///
    /// # Errors
    ///
    /// Returns `Closed`, `ReadOnly`, or `InvalidArgument` for an empty
    /// payload or an offset behind the medium end.
    pub fn insert_data(
        &mut self,
        offset: impl ResolveOffset,
        bytes: impl Into<Bytes>,
    ) -> StoreResult<MediumAction> {
        self.check_editable()?;
        let offset = self.locate(&offset)?;
        self.check_within_medium(offset.position())?;
        self.changes.schedule_insert(offset, bytes.into())
    }

    /// Schedules removing `size` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `Closed`, `ReadOnly`, or `InvalidArgument` for a zero size or
    /// a range reaching behind the medium end.
    pub fn remove_data(
        &mut self,
        offset: impl ResolveOffset,
        size: u64,
    ) -> StoreResult<MediumAction> {
        self.check_editable()?;
        let offset = self.locate(&offset)?;
        self.check_within_medium(offset.position().saturating_add(size))?;
        self.changes.schedule_remove(offset, size)
    }

    /// Schedules replacing `size` bytes at `offset` by `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `Closed`, `ReadOnly`, or `InvalidArgument` for a zero size,
    /// an empty payload or a range reaching behind the medium end.
    pub fn replace_data(
        &mut self,
        offset: impl ResolveOffset,
        size: u64,
        bytes: impl Into<Bytes>,
    ) -> StoreResult<MediumAction> {
        self.check_editable()?;
        let offset = self.locate(&offset)?;
        self.check_within_medium(offset.position().saturating_add(size))?;
        self.changes.schedule_replace(offset, size, bytes.into())
    }

    /// Discards a pending action.
    ///
    /// # Errors
    ///
    /// Returns `Closed`, `InvalidArgument` for an action of another medium,
    /// or `ActionNotPending` if it was already flushed or undone.
    pub fn undo(&mut self, action: &MediumAction) -> StoreResult<()> {
        self.check_open()?;
        self.changes.undo(action)
    }

    /// Returns the pending actions in flush order.
    #[must_use]
    pub fn pending_actions(&self) -> Vec<MediumAction> {
        self.changes.pending_actions()
    }

    /// Discards every pending action.
    ///
    /// This also lifts the refusal to flush after a failed flush.
    pub fn discard_changes(&mut self) {
        self.changes.clear();
        self.incomplete_flush = false;
    }

    /// Returns the plan the next flush would execute.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the store is not open, or `InvalidArgument` if a
    /// pending action no longer fits the medium.
    pub fn flush_plan(&self) -> StoreResult<FlushPlan> {
        self.check_open()?;
        let length = self.accessor.length()?.unwrap_or(0);
        self.changes
            .create_flush_plan(self.medium.config().max_read_write_block_size, length)
    }

    /// Writes all pending actions back to the medium.
    ///
    /// Without pending actions nothing is read or written. Afterwards every
    /// flushed action reports `is_pending() == false`, tracked offsets point
    /// at their post-edit positions and the cache is empty.
    ///
    /// A flush rewrites the medium in place. If it fails midway, the medium
    /// holds a mix of old and new content, the actions stay pending and
    /// every later flush fails with `IncompleteFlush` until
    /// [`Store::discard_changes`] is called.
    ///
    /// # Errors
    ///
    /// Returns `Closed`, `Unsupported` for sequential media, `ReadOnly`,
    /// `IncompleteFlush` after a failed flush, or the I/O error that
    /// interrupted the flush.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.check_open()?;
        if !self.medium.is_random_access() {
            return Err(StoreError::unsupported(format!(
                "flush of sequential medium {}",
                self.medium.name()
            )));
        }
        self.check_editable()?;
        if self.incomplete_flush {
            return Err(StoreError::IncompleteFlush {
                medium: self.medium.name().to_string(),
            });
        }
        if !self.changes.has_pending() {
            return Ok(());
        }

        let plan = self.flush_plan()?;
        self.apply_plan(&plan)
    }

    /// Returns the physical I/O counters of the accessor.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.accessor.stats().snapshot()
    }

    fn apply_plan(&mut self, plan: &FlushPlan) -> StoreResult<()> {
        let result = self.execute(plan);
        self.cache.clear();
        if let Err(e) = result {
            self.incomplete_flush = true;
            tracing::warn!(
                medium = %self.medium.name(),
                error = %e,
                "flush failed, medium is partially rewritten"
            );
            return Err(e);
        }

        self.offsets.apply_shifts(plan.shifts());
        self.changes.mark_all_done();
        tracing::debug!(
            medium = %self.medium.name(),
            old_length = plan.old_length(),
            new_length = plan.new_length(),
            "flushed pending actions"
        );
        Ok(())
    }

    fn execute(&mut self, plan: &FlushPlan) -> StoreResult<()> {
        for operation in plan.operations() {
            match operation {
                FlushOperation::Copy { source, target, len } => {
                    let mut buffer = vec![0u8; *len as usize];
                    self.accessor
                        .read(self.offsets.create(*source), &mut buffer)?;
                    self.accessor
                        .write(self.offsets.create(*target), &buffer)?;
                }
                FlushOperation::Write { target, bytes } => {
                    self.accessor.write(self.offsets.create(*target), bytes)?;
                }
                FlushOperation::Truncate { new_length } => {
                    self.accessor.truncate(*new_length)?;
                }
            }
        }
        Ok(())
    }

    fn read_range(&mut self, offset: MediumOffset, size: usize) -> StoreResult<Bytes> {
        if size == 0 {
            return Ok(Bytes::new());
        }
        let end_of_medium = || {
            StoreError::EndOfMedium(EndOfMedium::new(offset, size, Bytes::new()))
        };

        if let Some(length) = self.accessor.length()? {
            if offset.position() >= length {
                return Err(end_of_medium());
            }
        }
        if self.keeps_forward_gaps() && !self.advance_stream(offset.position())? {
            return Err(end_of_medium());
        }

        let block_size = self.medium.config().max_read_write_block_size;
        let regions = self.cache.get_regions_in_range(offset, size as u64)?;
        let mut collected = BytesMut::with_capacity(size);
        for region in regions {
            if let Some(bytes) = region.bytes() {
                collected.extend_from_slice(bytes);
                continue;
            }

            let mut position = region.start().position();
            let end = region.end_position();
            while position < end {
                let chunk = ((end - position) as usize).min(block_size);
                let at = self.offsets.create(position);
                let mut buffer = vec![0u8; chunk];
                match self.accessor.read(at, &mut buffer) {
                    Ok(()) => {
                        let bytes = Bytes::from(buffer);
                        collected.extend_from_slice(&bytes);
                        self.cache.add_region(MediumRegion::cached(at, bytes)?)?;
                    }
                    Err(StoreError::EndOfMedium(partial)) => {
                        if !partial.bytes.is_empty() {
                            collected.extend_from_slice(&partial.bytes);
                            self.cache
                                .add_region(MediumRegion::cached(at, partial.bytes)?)?;
                        }
                        tracing::debug!(
                            offset = offset.position(),
                            requested = size,
                            read = collected.len(),
                            "read hit end of medium"
                        );
                        return Err(StoreError::EndOfMedium(EndOfMedium::new(
                            offset,
                            size,
                            collected.freeze(),
                        )));
                    }
                    Err(e) => return Err(e),
                }
                position += chunk as u64;
            }
        }
        Ok(collected.freeze())
    }

    fn keeps_forward_gaps(&self) -> bool {
        let config = self.medium.config();
        self.accessor.stream_position().is_some()
            && config.uses_cache()
            && !config.skip_on_forward_read
    }

    /// Reads the stream up to `target` block by block into the cache.
    ///
    /// Returns false if the stream ends before `target`.
    fn advance_stream(&mut self, target: u64) -> StoreResult<bool> {
        let block_size = self.medium.config().max_read_write_block_size as u64;
        while let Some(position) = self.accessor.stream_position().filter(|&p| p < target) {
            let at = self.offsets.create(position);
            let mut buffer = vec![0u8; (target - position).min(block_size) as usize];
            match self.accessor.read(at, &mut buffer) {
                Ok(()) => self
                    .cache
                    .add_region(MediumRegion::cached(at, Bytes::from(buffer))?)?,
                Err(StoreError::EndOfMedium(partial)) => {
                    if !partial.bytes.is_empty() {
                        self.cache
                            .add_region(MediumRegion::cached(at, partial.bytes)?)?;
                    }
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    fn locate(&self, offset: &impl ResolveOffset) -> StoreResult<MediumOffset> {
        self.check_open()?;
        let offset = offset.resolve_in(&self.offsets)?;
        self.check_offset(&offset)?;
        Ok(offset)
    }

    fn check_open(&self) -> StoreResult<()> {
        if !self.accessor.is_opened() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn check_editable(&self) -> StoreResult<()> {
        self.check_open()?;
        if self.medium.is_read_only() {
            return Err(StoreError::read_only(self.medium.name()));
        }
        Ok(())
    }

    fn check_offset(&self, offset: &MediumOffset) -> StoreResult<()> {
        if offset.medium() != self.medium.id() {
            return Err(StoreError::invalid_argument(format!(
                "offset {} does not belong to medium {}",
                offset,
                self.medium.name()
            )));
        }
        Ok(())
    }

    fn check_within_medium(&self, position: u64) -> StoreResult<()> {
        if let Some(length) = self.accessor.length()? {
            if position > length {
                return Err(StoreError::invalid_argument(format!(
                    "position {} is behind the medium end {}",
                    position, length
                )));
            }
        }
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.is_opened() {
            if let Err(e) = self.close() {
                tracing::warn!(medium = %self.medium.name(), error = %e, "failed to close store");
            }
        }
    }
}
