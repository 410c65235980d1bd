//! A naive reference model of scheduled edits.
//!
//! The model keeps, for every pre-edit position, the bytes that currently
//! stand for it and the bytes inserted in front of it. Applying an edit
//! rewrites those slots directly, which makes the expected post-flush
//! content easy to read off.

use crate::generators::EditOp;

/// Expected medium content after a sequence of edits.
#[derive(Debug, Clone)]
pub struct EditModel {
    content: Vec<Vec<u8>>,
    inserts: Vec<Vec<u8>>,
}

impl EditModel {
    /// Creates a model of an unedited medium.
    pub fn new(original: &[u8]) -> Self {
        Self {
            content: original.iter().map(|b| vec![*b]).collect(),
            inserts: vec![Vec::new(); original.len() + 1],
        }
    }

    /// Applies one edit given in pre-edit coordinates.
    pub fn apply(&mut self, op: &EditOp) {
        match op {
            EditOp::Insert { at, bytes } => {
                self.inserts[*at as usize].extend_from_slice(bytes);
            }
            EditOp::Remove { at, size } => {
                let (start, end) = (*at as usize, (*at + *size) as usize);
                self.clear(start, end);
            }
            EditOp::Replace { at, size, bytes } => {
                let (start, end) = (*at as usize, (*at + *size) as usize);
                self.clear(start, end);
                for (i, slot) in self.content[start..end].iter_mut().enumerate() {
                    if let Some(b) = bytes.get(i) {
                        slot.push(*b);
                    }
                }
                if bytes.len() > end - start {
                    self.content[end - 1].extend_from_slice(&bytes[end - start..]);
                }
            }
        }
    }

    /// Applies a whole script in order.
    pub fn apply_script(&mut self, ops: &[EditOp]) {
        for op in ops {
            self.apply(op);
        }
    }

    /// Returns the content the medium should hold after a flush.
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (position, inserted) in self.inserts.iter().enumerate() {
            out.extend_from_slice(inserted);
            if let Some(bytes) = self.content.get(position) {
                out.extend_from_slice(bytes);
            }
        }
        out
    }

    fn clear(&mut self, start: usize, end: usize) {
        for slot in &mut self.content[start..end] {
            slot.clear();
        }
        for slot in &mut self.inserts[start + 1..end] {
            slot.clear();
        }
    }
}
