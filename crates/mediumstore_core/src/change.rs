//! Pending edits and their bookkeeping.

use crate::error::{StoreError, StoreResult};
use crate::flush::{self, FlushPlan};
use crate::medium::MediumId;
use crate::offset::MediumOffset;
use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Kind of a scheduled edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    /// Bytes inserted before the target offset.
    Insert,
    /// Bytes removed from the medium.
    Remove,
    /// Bytes replaced by a payload of possibly different length.
    Replace,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Remove => write!(f, "remove"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// Handle of a scheduled edit.
///
/// Clones share the pending flag, so a handle kept by the caller observes
/// the transition to done after a successful flush.
///
/// The size of an action is the number of pre-edit bytes it covers: the
/// payload length for inserts, and the removed or replaced byte count
/// otherwise.
#[derive(Clone)]
pub struct MediumAction {
    kind: ActionKind,
    start: MediumOffset,
    size: u64,
    sequence: u64,
    payload: Bytes,
    pending: Arc<AtomicBool>,
}

impl MediumAction {
    fn new(
        kind: ActionKind,
        start: MediumOffset,
        size: u64,
        sequence: u64,
        payload: Bytes,
    ) -> Self {
        Self {
            kind,
            start,
            size,
            sequence,
            payload,
            pending: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the kind of edit.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Returns the pre-edit offset the edit applies at.
    #[must_use]
    pub fn start(&self) -> MediumOffset {
        self.start
    }

    /// Returns the number of bytes the edit covers.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the pre-edit offset just behind the covered bytes.
    #[must_use]
    pub fn end(&self) -> MediumOffset {
        match self.kind {
            ActionKind::Insert => self.start,
            ActionKind::Remove | ActionKind::Replace => self.start.forward(self.size),
        }
    }

    /// Returns the scheduling sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the bytes written by an insert or replace.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns true until the action is flushed or undone.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(AtomicOrdering::Acquire)
    }

    /// Returns the change in medium length this action causes.
    #[must_use]
    pub fn size_delta(&self) -> i64 {
        match self.kind {
            ActionKind::Insert => self.payload.len() as i64,
            ActionKind::Remove => -(self.size as i64),
            ActionKind::Replace => self.payload.len() as i64 - self.size as i64,
        }
    }

    pub(crate) fn mark_done(&self) {
        self.pending.store(false, AtomicOrdering::Release);
    }

    fn sort_key(&self) -> (MediumId, u64, u64, ActionKind, u64) {
        (
            self.start.medium(),
            self.start.position(),
            self.sequence,
            self.kind,
            self.size,
        )
    }
}

impl PartialEq for MediumAction {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for MediumAction {}

impl PartialOrd for MediumAction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Start offset first, then sequence number; kind and size break any
/// remaining tie.
impl Ord for MediumAction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Debug for MediumAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediumAction")
            .field("kind", &self.kind)
            .field("start", &self.start.position())
            .field("size", &self.size)
            .field("sequence", &self.sequence)
            .field("payload_len", &self.payload.len())
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Records the pending edits of one medium.
#[derive(Debug)]
pub struct ChangeManager {
    medium: MediumId,
    actions: BTreeMap<u64, MediumAction>,
    next_sequence: u64,
}

impl ChangeManager {
    /// Creates a manager without pending actions.
    #[must_use]
    pub fn new(medium: MediumId) -> Self {
        Self {
            medium,
            actions: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    /// Schedules the insertion of `bytes` before `offset`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty payload or a foreign offset.
    pub fn schedule_insert(&mut self, offset: MediumOffset, bytes: Bytes) -> StoreResult<MediumAction> {
        self.check_medium(&offset)?;
        if bytes.is_empty() {
            return Err(StoreError::invalid_argument("insert payload must not be empty"));
        }
        let size = bytes.len() as u64;
        Ok(self.schedule(ActionKind::Insert, offset, size, bytes))
    }

    /// Schedules the removal of `size` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero size or a foreign offset.
    pub fn schedule_remove(&mut self, offset: MediumOffset, size: u64) -> StoreResult<MediumAction> {
        self.check_medium(&offset)?;
        check_range(&offset, size)?;
        Ok(self.schedule(ActionKind::Remove, offset, size, Bytes::new()))
    }

    /// Schedules replacing `size` bytes at `offset` by `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero size, an empty payload or a
    /// foreign offset.
    pub fn schedule_replace(
        &mut self,
        offset: MediumOffset,
        size: u64,
        bytes: Bytes,
    ) -> StoreResult<MediumAction> {
        self.check_medium(&offset)?;
        check_range(&offset, size)?;
        if bytes.is_empty() {
            return Err(StoreError::invalid_argument(
                "replacement payload must not be empty",
            ));
        }
        Ok(self.schedule(ActionKind::Replace, offset, size, bytes))
    }

    /// Discards a pending action.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an action of another medium and
    /// `ActionNotPending` if the action was already flushed or undone.
    pub fn undo(&mut self, action: &MediumAction) -> StoreResult<()> {
        self.check_medium(&action.start)?;
        let known = self
            .actions
            .get(&action.sequence)
            .is_some_and(|a| Arc::ptr_eq(&a.pending, &action.pending));
        if !known || !action.is_pending() {
            return Err(StoreError::ActionNotPending {
                sequence: action.sequence,
            });
        }
        if let Some(removed) = self.actions.remove(&action.sequence) {
            removed.mark_done();
        }
        tracing::debug!(sequence = action.sequence, kind = %action.kind, "undid action");
        Ok(())
    }

    /// Returns the pending actions in flush order.
    #[must_use]
    pub fn pending_actions(&self) -> Vec<MediumAction> {
        let mut actions: Vec<MediumAction> = self.actions.values().cloned().collect();
        actions.sort();
        actions
    }

    /// Returns the number of pending actions.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if any action is pending.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Compiles the pending actions into a flush plan.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `block_size` is zero or an action lies
    /// beyond `total_medium_size`.
    pub fn create_flush_plan(&self, block_size: usize, total_medium_size: u64) -> StoreResult<FlushPlan> {
        if block_size == 0 {
            return Err(StoreError::invalid_argument("block size must be at least 1"));
        }
        for action in self.actions.values() {
            if action.end().position() > total_medium_size {
                return Err(StoreError::invalid_argument(format!(
                    "{} #{} ends at {}, behind the medium end {}",
                    action.kind,
                    action.sequence,
                    action.end().position(),
                    total_medium_size
                )));
            }
        }
        let in_sequence: Vec<&MediumAction> = self.actions.values().collect();
        Ok(flush::compile(&in_sequence, block_size as u64, total_medium_size))
    }

    /// Marks every pending action done and forgets it.
    pub fn mark_all_done(&mut self) {
        for action in std::mem::take(&mut self.actions).into_values() {
            action.mark_done();
        }
    }

    /// Drops every pending action without applying it.
    pub fn clear(&mut self) {
        if !self.actions.is_empty() {
            tracing::debug!(discarded = self.actions.len(), "discarded pending actions");
        }
        self.mark_all_done();
    }

    fn schedule(
        &mut self,
        kind: ActionKind,
        start: MediumOffset,
        size: u64,
        payload: Bytes,
    ) -> MediumAction {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let action = MediumAction::new(kind, start, size, sequence, payload);
        self.actions.insert(sequence, action.clone());
        tracing::debug!(
            sequence,
            %kind,
            start = start.position(),
            size,
            "scheduled action"
        );
        action
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

fn check_range(offset: &MediumOffset, size: u64) -> StoreResult<()> {
    if size == 0 {
        return Err(StoreError::invalid_argument("size must be positive"));
    }
    if offset.position().checked_add(size).is_none() {
        return Err(StoreError::invalid_argument("range exceeds the addressable medium"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::{Medium, MediumAccess};
    use crate::MediumConfig;

    fn manager() -> (MediumId, ChangeManager) {
        let id = Medium::memory(vec![], MediumAccess::ReadWrite, MediumConfig::default())
            .unwrap()
            .id();
        (id, ChangeManager::new(id))
    }

    #[test]
    fn actions_start_pending() {
        let (id, mut changes) = manager();
        let action = changes
            .schedule_insert(MediumOffset::new(id, 3), Bytes::from_static(b"abc"))
            .unwrap();

        assert!(action.is_pending());
        assert_eq!(action.kind(), ActionKind::Insert);
        assert_eq!(action.size(), 3);
        assert_eq!(action.end().position(), 3);
        assert_eq!(action.size_delta(), 3);
        assert_eq!(changes.pending_count(), 1);
    }

    #[test]
    fn ordering_by_offset_then_sequence() {
        let (id, mut changes) = manager();
        let late = changes.schedule_remove(MediumOffset::new(id, 10), 2).unwrap();
        let first = changes
            .schedule_insert(MediumOffset::new(id, 5), Bytes::from_static(b"x"))
            .unwrap();
        let second = changes
            .schedule_replace(MediumOffset::new(id, 5), 1, Bytes::from_static(b"yy"))
            .unwrap();

        assert_eq!(changes.pending_actions(), vec![first, second, late]);
    }

    #[test]
    fn undo_discards_pending_action() {
        let (id, mut changes) = manager();
        let action = changes.schedule_remove(MediumOffset::new(id, 0), 4).unwrap();

        changes.undo(&action).unwrap();
        assert!(!action.is_pending());
        assert!(!changes.has_pending());
        assert!(matches!(
            changes.undo(&action),
            Err(StoreError::ActionNotPending { .. })
        ));
    }

    #[test]
    fn undo_rejects_done_action() {
        let (id, mut changes) = manager();
        let action = changes.schedule_remove(MediumOffset::new(id, 0), 4).unwrap();
        changes.mark_all_done();

        assert!(!action.is_pending());
        assert!(matches!(
            changes.undo(&action),
            Err(StoreError::ActionNotPending { sequence: 0 })
        ));
    }

    #[test]
    fn undo_rejects_foreign_action() {
        let (_, mut changes) = manager();
        let (other_id, mut other) = manager();
        let action = other.schedule_remove(MediumOffset::new(other_id, 0), 1).unwrap();

        assert!(matches!(
            changes.undo(&action),
            Err(StoreError::InvalidArgument { .. })
        ));
        assert!(action.is_pending());
    }

    #[test]
    fn invalid_schedules_rejected() {
        let (id, mut changes) = manager();
        let at = MediumOffset::new(id, 0);
        assert!(changes.schedule_insert(at, Bytes::new()).is_err());
        assert!(changes.schedule_remove(at, 0).is_err());
        assert!(changes.schedule_replace(at, 1, Bytes::new()).is_err());
        assert!(changes
            .schedule_remove(MediumOffset::new(id, u64::MAX), 2)
            .is_err());
        assert_eq!(changes.pending_count(), 0);
    }

    #[test]
    fn flush_plan_rejects_actions_past_end() {
        let (id, mut changes) = manager();
        changes.schedule_remove(MediumOffset::new(id, 8), 4).unwrap();

        assert!(changes.create_flush_plan(4, 10).is_err());
        assert!(changes.create_flush_plan(0, 20).is_err());
        assert!(changes.create_flush_plan(4, 12).is_ok());
    }

    #[test]
    fn clear_marks_actions_done() {
        let (id, mut changes) = manager();
        let action = changes
            .schedule_insert(MediumOffset::new(id, 0), Bytes::from_static(b"a"))
            .unwrap();
        changes.clear();
        assert!(!action.is_pending());
        assert_eq!(changes.pending_count(), 0);
    }
}
