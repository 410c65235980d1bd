//! Compilation of pending actions into physical write operations.
//!
//! The planner keeps a list of pieces describing the post-edit medium in
//! pre-edit coordinates. Every piece is either a range of the original
//! content or literal bytes anchored at a pre-edit range; an anchor of
//! zero length marks inserted bytes. Actions are applied to the list in
//! sequence order:
//!
//! - a remove or replace of `[s, e)` clips every piece overlapping it and
//!   drops inserts strictly inside it; a replace then adds its payload
//!   anchored at `[s, e)`
//! - an insert at `p` splits the piece containing `p` and lands behind
//!   earlier inserts at `p`, but before any range starting at `p`
//!
//! A replace's payload maps byte by byte onto its anchor, surplus bytes
//! belonging to its last position. Clipping a replace therefore keeps
//! exactly the payload bytes of the surviving positions, so the later
//! action always wins where two actions overlap.
//!
//! Walking the final list yields the post-edit layout. Original ranges
//! that moved become copies, literals become writes.

use crate::change::{ActionKind, MediumAction};
use crate::offset::OffsetShift;
use bytes::Bytes;

/// One physical step of a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOperation {
    /// Moves `len` unchanged bytes from `source` to `target`.
    Copy {
        /// Position the bytes are read from.
        source: u64,
        /// Position the bytes are written to.
        target: u64,
        /// Number of bytes, at most the block size.
        len: u64,
    },
    /// Writes literal bytes.
    Write {
        /// Position the bytes are written to.
        target: u64,
        /// The bytes, at most the block size.
        bytes: Bytes,
    },
    /// Cuts the medium to its post-edit length.
    Truncate {
        /// The post-edit length.
        new_length: u64,
    },
}

/// The operations turning the current medium content into the post-edit
/// content, in execution order.
///
/// Copies moving bytes towards the start run first in ascending order, then
/// copies moving bytes towards the end in descending order. Neither kind
/// overwrites bytes that a later copy still has to read. Literal writes and
/// the final truncation follow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushPlan {
    operations: Vec<FlushOperation>,
    shifts: Vec<OffsetShift>,
    old_length: u64,
    new_length: u64,
}

impl FlushPlan {
    /// Returns the operations in execution order.
    #[must_use]
    pub fn operations(&self) -> &[FlushOperation] {
        &self.operations
    }

    /// Returns the position mapping from pre-flush to post-flush offsets.
    #[must_use]
    pub fn shifts(&self) -> &[OffsetShift] {
        &self.shifts
    }

    /// Returns the medium length before the flush.
    #[must_use]
    pub fn old_length(&self) -> u64 {
        self.old_length
    }

    /// Returns the medium length after the flush.
    #[must_use]
    pub fn new_length(&self) -> u64 {
        self.new_length
    }

    /// Returns true if the plan touches nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the number of bytes the plan writes, copies included.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.operations
            .iter()
            .map(|op| match op {
                FlushOperation::Copy { len, .. } => *len,
                FlushOperation::Write { bytes, .. } => bytes.len() as u64,
                FlushOperation::Truncate { .. } => 0,
            })
            .sum()
    }
}

#[derive(Debug, Clone)]
enum Content {
    Original,
    Literal(Bytes),
}

#[derive(Debug, Clone)]
struct Piece {
    start: u64,
    end: u64,
    content: Content,
}

impl Piece {
    fn is_point(&self) -> bool {
        self.start == self.end
    }

    fn len(&self) -> u64 {
        match &self.content {
            Content::Original => self.end - self.start,
            Content::Literal(bytes) => bytes.len() as u64,
        }
    }

    /// The part of this range piece anchored in `[from, to)`.
    fn slice(&self, from: u64, to: u64) -> Option<Piece> {
        let content = match &self.content {
            Content::Original => Content::Original,
            Content::Literal(bytes) => {
                let len = bytes.len() as u64;
                let head = (from - self.start).min(len) as usize;
                let tail = if to >= self.end {
                    bytes.len()
                } else {
                    (to - self.start).min(len) as usize
                };
                if head >= tail {
                    return None;
                }
                Content::Literal(bytes.slice(head..tail))
            }
        };
        Some(Piece {
            start: from,
            end: to,
            content,
        })
    }
}

/// Applies `actions` (in sequence order) to a medium of `old_length` bytes.
pub(crate) fn compile(actions: &[&MediumAction], block_size: u64, old_length: u64) -> FlushPlan {
    if actions.is_empty() {
        return FlushPlan {
            old_length,
            new_length: old_length,
            ..FlushPlan::default()
        };
    }

    let mut pieces = Vec::new();
    if old_length > 0 {
        pieces.push(Piece {
            start: 0,
            end: old_length,
            content: Content::Original,
        });
    }
    for action in actions {
        let start = action.start().position();
        match action.kind() {
            ActionKind::Insert => insert(&mut pieces, start, action.payload().clone()),
            ActionKind::Remove => overwrite(&mut pieces, start, start + action.size(), None),
            ActionKind::Replace => overwrite(
                &mut pieces,
                start,
                start + action.size(),
                Some(action.payload().clone()),
            ),
        }
    }

    let plan = layout(&pieces, block_size.max(1), old_length);
    tracing::debug!(
        actions = actions.len(),
        operations = plan.operations.len(),
        old_length = plan.old_length,
        new_length = plan.new_length,
        "compiled flush plan"
    );
    plan
}

fn insert(pieces: &mut Vec<Piece>, at: u64, payload: Bytes) {
    if let Some(index) = pieces
        .iter()
        .position(|p| !p.is_point() && p.start < at && at < p.end)
    {
        let piece = pieces.remove(index);
        let halves = [piece.slice(piece.start, at), piece.slice(at, piece.end)];
        for (offset, half) in halves.into_iter().flatten().enumerate() {
            pieces.insert(index + offset, half);
        }
    }

    let index = pieces
        .iter()
        .position(|p| p.start > at || (p.start == at && !p.is_point()))
        .unwrap_or(pieces.len());
    pieces.insert(
        index,
        Piece {
            start: at,
            end: at,
            content: Content::Literal(payload),
        },
    );
}

fn overwrite(pieces: &mut Vec<Piece>, start: u64, end: u64, payload: Option<Bytes>) {
    let mut kept = Vec::with_capacity(pieces.len() + 2);
    for piece in pieces.drain(..) {
        if piece.is_point() {
            if piece.start <= start || piece.start >= end {
                kept.push(piece);
            }
        } else if piece.end <= start || piece.start >= end {
            kept.push(piece);
        } else {
            if piece.start < start {
                kept.extend(piece.slice(piece.start, start));
            }
            if piece.end > end {
                kept.extend(piece.slice(end, piece.end));
            }
        }
    }

    if let Some(payload) = payload {
        let index = kept
            .iter()
            .position(|p| p.start >= end)
            .unwrap_or(kept.len());
        kept.insert(
            index,
            Piece {
                start,
                end,
                content: Content::Literal(payload),
            },
        );
    }
    *pieces = kept;
}

fn layout(pieces: &[Piece], block_size: u64, old_length: u64) -> FlushPlan {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut writes = Vec::new();
    let mut shifts = Vec::new();

    let mut target = 0u64;
    let mut covered = 0u64;
    for piece in pieces {
        if piece.start > covered {
            // removed bytes collapse onto the next surviving position
            shifts.push(OffsetShift {
                anchor: covered,
                target,
                span: 0,
            });
            covered = piece.start;
        }
        let len = piece.len();
        match &piece.content {
            Content::Original => {
                if piece.start > target {
                    left.push((piece.start, target, len));
                } else if piece.start < target {
                    right.push((piece.start, target, len));
                }
            }
            Content::Literal(bytes) => writes.push((target, bytes.clone())),
        }
        if !piece.is_point() {
            shifts.push(OffsetShift {
                anchor: piece.start,
                target,
                span: len,
            });
            covered = piece.end;
        }
        target += len;
    }
    if covered < old_length {
        shifts.push(OffsetShift {
            anchor: covered,
            target,
            span: 0,
        });
    }
    shifts.push(OffsetShift {
        anchor: old_length,
        target,
        span: u64::MAX,
    });
    let new_length = target;

    let mut operations = Vec::new();
    for &(source, target, len) in &left {
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(block_size);
            operations.push(FlushOperation::Copy {
                source: source + done,
                target: target + done,
                len: chunk,
            });
            done += chunk;
        }
    }
    for &(source, target, len) in right.iter().rev() {
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(block_size);
            remaining -= chunk;
            operations.push(FlushOperation::Copy {
                source: source + remaining,
                target: target + remaining,
                len: chunk,
            });
        }
    }
    for (target, bytes) in writes {
        let mut done = 0;
        while done < bytes.len() {
            let chunk = (bytes.len() - done).min(block_size as usize);
            operations.push(FlushOperation::Write {
                target: target + done as u64,
                bytes: bytes.slice(done..done + chunk),
            });
            done += chunk;
        }
    }
    if new_length < old_length {
        operations.push(FlushOperation::Truncate { new_length });
    }

    FlushPlan {
        operations,
        shifts,
        old_length,
        new_length,
    }
}
