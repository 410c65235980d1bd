//! Medium offsets and the factory that re-homes them after a flush.

use crate::error::{StoreError, StoreResult};
use crate::medium::MediumId;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;

/// An absolute byte position on one medium.
///
/// Offsets are passive values. Comparing or measuring two offsets of
/// different media is a contract violation: [`PartialOrd`] yields `None`
/// and the checked operations return `InvalidArgument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediumOffset {
    medium: MediumId,
    position: u64,
}

impl MediumOffset {
    /// Creates an offset on the given medium.
    #[must_use]
    pub const fn new(medium: MediumId, position: u64) -> Self {
        Self { medium, position }
    }

    /// Returns the medium this offset belongs to.
    #[must_use]
    pub const fn medium(&self) -> MediumId {
        self.medium
    }

    /// Returns the absolute byte position.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Fails unless `other` belongs to the same medium.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a medium mismatch.
    pub fn check_same_medium(&self, other: &MediumOffset) -> StoreResult<()> {
        if self.medium != other.medium {
            return Err(StoreError::invalid_argument(format!(
                "offsets of different media: {} and {}",
                self.medium, other.medium
            )));
        }
        Ok(())
    }

    /// Returns true if this offset lies strictly before `other`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a medium mismatch.
    pub fn before(&self, other: &MediumOffset) -> StoreResult<bool> {
        self.check_same_medium(other)?;
        Ok(self.position < other.position)
    }

    /// Returns true if this offset lies at or behind `other`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a medium mismatch.
    pub fn behind_or_equal(&self, other: &MediumOffset) -> StoreResult<bool> {
        self.check_same_medium(other)?;
        Ok(self.position >= other.position)
    }

    /// Returns the signed byte distance `self - other`.
    ///
    /// Positive if this offset lies behind `other`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a medium mismatch.
    pub fn distance_to(&self, other: &MediumOffset) -> StoreResult<i64> {
        self.check_same_medium(other)?;
        Ok(self.position as i64 - other.position as i64)
    }

    /// Returns a new offset moved by `delta` bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the result would be negative.
    pub fn advance(&self, delta: i64) -> StoreResult<MediumOffset> {
        let position = self.position.checked_add_signed(delta).ok_or_else(|| {
            StoreError::invalid_argument(format!(
                "advancing offset {} by {} leaves the medium",
                self.position, delta
            ))
        })?;
        Ok(Self::new(self.medium, position))
    }

    /// Returns a new offset `count` bytes behind this one.
    pub(crate) const fn forward(&self, count: u64) -> MediumOffset {
        Self::new(self.medium, self.position + count)
    }

    pub(crate) const fn at(&self, position: u64) -> MediumOffset {
        Self::new(self.medium, position)
    }
}

impl PartialOrd for MediumOffset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.medium == other.medium).then(|| self.position.cmp(&other.position))
    }
}

impl fmt::Display for MediumOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.medium, self.position)
    }
}

/// One piece of the position mapping produced by a flush.
///
/// Pre-flush positions in `[anchor, next anchor)` move to
/// `target + min(position - anchor, span)`. A span of zero collapses a
/// removed range onto a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetShift {
    /// First pre-flush position covered by this shift.
    pub anchor: u64,
    /// Post-flush position of `anchor`.
    pub target: u64,
    /// Number of positions that keep advancing with the input.
    pub span: u64,
}

impl OffsetShift {
    /// Maps a position covered by this shift.
    #[must_use]
    pub fn apply(&self, position: u64) -> u64 {
        self.target + (position - self.anchor).min(self.span)
    }
}

/// Maps a pre-flush position through an ordered shift list.
///
/// Positions before the first anchor are left unchanged.
#[must_use]
pub fn shift_position(shifts: &[OffsetShift], position: u64) -> u64 {
    let index = shifts.partition_point(|shift| shift.anchor <= position);
    if index == 0 {
        return position;
    }
    shifts[index - 1].apply(position)
}

/// Handle of an offset whose position the factory keeps up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackedOffset {
    medium: MediumId,
    index: usize,
    generation: u64,
}

impl TrackedOffset {
    /// Returns the medium this handle belongs to.
    #[must_use]
    pub const fn medium(&self) -> MediumId {
        self.medium
    }
}

/// Anything that names a position on a medium: a plain offset, or a
/// tracked handle resolved through the factory that issued it.
pub trait ResolveOffset {
    /// Returns the current offset against `factory`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a handle is stale or was issued for
    /// another medium.
    fn resolve_in(&self, factory: &OffsetFactory) -> StoreResult<MediumOffset>;
}

impl ResolveOffset for MediumOffset {
    fn resolve_in(&self, _factory: &OffsetFactory) -> StoreResult<MediumOffset> {
        Ok(*self)
    }
}

impl ResolveOffset for TrackedOffset {
    fn resolve_in(&self, factory: &OffsetFactory) -> StoreResult<MediumOffset> {
        factory.resolve(*self)
    }
}

/// Issues offsets for one medium and re-homes tracked ones after flushes.
///
/// Tracked offsets live in an arena; callers hold [`TrackedOffset`]
/// handles and resolve them to current [`MediumOffset`] values. The arena
/// only grows until [`OffsetFactory::clear`].
#[derive(Debug)]
pub struct OffsetFactory {
    medium: MediumId,
    tracked: Mutex<Vec<u64>>,
    generation: u64,
}

impl OffsetFactory {
    /// Creates a factory for the given medium.
    #[must_use]
    pub fn new(medium: MediumId) -> Self {
        Self {
            medium,
            tracked: Mutex::new(Vec::new()),
            generation: 0,
        }
    }

    /// Returns the medium of all issued offsets.
    #[must_use]
    pub fn medium(&self) -> MediumId {
        self.medium
    }

    /// Issues an untracked offset at `position`.
    #[must_use]
    pub fn create(&self, position: u64) -> MediumOffset {
        MediumOffset::new(self.medium, position)
    }

    /// Starts tracking `offset` across later flushes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the offset belongs to another medium.
    pub fn track(&self, offset: MediumOffset) -> StoreResult<TrackedOffset> {
        self.check_medium(&offset)?;
        let mut tracked = self.tracked.lock();
        tracked.push(offset.position());
        Ok(TrackedOffset {
            medium: self.medium,
            index: tracked.len() - 1,
            generation: self.generation,
        })
    }

    /// Returns the current value of a tracked offset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the handle belongs to another medium or
    /// was invalidated by [`OffsetFactory::clear`].
    pub fn resolve(&self, handle: TrackedOffset) -> StoreResult<MediumOffset> {
        if handle.medium != self.medium {
            return Err(StoreError::invalid_argument(format!(
                "tracked offset of {} does not belong to {}",
                handle.medium, self.medium
            )));
        }
        if handle.generation != self.generation {
            return Err(StoreError::invalid_argument(
                "tracked offset was invalidated by closing the store",
            ));
        }
        self.tracked
            .lock()
            .get(handle.index)
            .map(|&position| self.create(position))
            .ok_or_else(|| StoreError::invalid_argument("unknown tracked offset"))
    }

    /// Returns the number of tracked offsets.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Re-homes every tracked offset through the given shift list.
    pub fn apply_shifts(&mut self, shifts: &[OffsetShift]) {
        if shifts.is_empty() {
            return;
        }
        let tracked = self.tracked.get_mut();
        for position in tracked.iter_mut() {
            *position = shift_position(shifts, *position);
        }
        tracing::debug!(
            medium = %self.medium,
            tracked = tracked.len(),
            shifts = shifts.len(),
            "re-homed tracked offsets"
        );
    }

    /// Discards all tracked offsets and invalidates their handles.
    pub fn clear(&mut self) {
        self.tracked.get_mut().clear();
        self.generation += 1;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::{Medium, MediumAccess};
    use crate::MediumConfig;

    fn medium_id() -> MediumId {
        Medium::memory(vec![], MediumAccess::ReadWrite, MediumConfig::default())
            .unwrap()
            .id()
    }

    #[test]
    fn offset_arithmetic() {
        let id = medium_id();
        let a = MediumOffset::new(id, 10);
        let b = MediumOffset::new(id, 25);

        assert!(a.before(&b).unwrap());
        assert!(b.behind_or_equal(&a).unwrap());
        assert!(a.behind_or_equal(&a).unwrap());
        assert_eq!(b.distance_to(&a).unwrap(), 15);
        assert_eq!(a.distance_to(&b).unwrap(), -15);
        assert_eq!(a.advance(5).unwrap().position(), 15);
        assert_eq!(a.advance(-10).unwrap().position(), 0);
    }

    #[test]
    fn advance_below_zero_fails() {
        let a = MediumOffset::new(medium_id(), 3);
        assert!(matches!(
            a.advance(-4),
            Err(StoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn cross_medium_operations_fail() {
        let a = MediumOffset::new(medium_id(), 1);
        let b = MediumOffset::new(medium_id(), 1);

        assert_eq!(a.partial_cmp(&b), None);
        assert!(a.before(&b).is_err());
        assert!(a.distance_to(&b).is_err());
    }

    #[test]
    fn shift_position_maps_ranges() {
        // 3 bytes inserted at 5, bytes [20, 23) removed
        let shifts = [
            OffsetShift {
                anchor: 0,
                target: 0,
                span: u64::MAX,
            },
            OffsetShift {
                anchor: 5,
                target: 8,
                span: u64::MAX,
            },
            OffsetShift {
                anchor: 20,
                target: 23,
                span: 0,
            },
            OffsetShift {
                anchor: 23,
                target: 23,
                span: u64::MAX,
            },
        ];

        assert_eq!(shift_position(&shifts, 4), 4);
        assert_eq!(shift_position(&shifts, 5), 8);
        assert_eq!(shift_position(&shifts, 19), 22);
        assert_eq!(shift_position(&shifts, 21), 23);
        assert_eq!(shift_position(&shifts, 23), 23);
        assert_eq!(shift_position(&shifts, 30), 30);
    }

    #[test]
    fn tracked_offsets_follow_shifts() {
        let mut factory = OffsetFactory::new(medium_id());
        let early = factory.track(factory.create(2)).unwrap();
        let late = factory.track(factory.create(12)).unwrap();

        factory.apply_shifts(&[
            OffsetShift {
                anchor: 0,
                target: 0,
                span: 10,
            },
            OffsetShift {
                anchor: 10,
                target: 14,
                span: u64::MAX,
            },
        ]);

        assert_eq!(factory.resolve(early).unwrap().position(), 2);
        assert_eq!(factory.resolve(late).unwrap().position(), 16);
    }

    #[test]
    fn clear_invalidates_handles() {
        let mut factory = OffsetFactory::new(medium_id());
        let handle = factory.track(factory.create(7)).unwrap();
        factory.clear();

        assert_eq!(factory.tracked_count(), 0);
        assert!(factory.resolve(handle).is_err());
    }

    #[test]
    fn track_rejects_foreign_offset() {
        let factory = OffsetFactory::new(medium_id());
        let foreign = MediumOffset::new(medium_id(), 0);
        assert!(factory.track(foreign).is_err());
    }

    #[test]
    fn resolve_rejects_foreign_handle() {
        let factory = OffsetFactory::new(medium_id());
        let other = OffsetFactory::new(medium_id());
        let handle = other.track(other.create(3)).unwrap();

        assert!(matches!(
            factory.resolve(handle),
            Err(StoreError::InvalidArgument { .. })
        ));
        assert!(handle.resolve_in(&factory).is_err());
        assert_eq!(handle.resolve_in(&other).unwrap().position(), 3);
    }
}
