//! Byte-level text patching
//!
//! Global invariants enforced:
//! - Offsets always refer to the original buffer and are never shifted
//! - Output length = input length + total inserted length
//! - Bytes outside insertion points are copied verbatim, in order
//! - Either the whole file is patched or nothing is produced

use crate::error::EditOutOfRange;
use crate::planner::TextEdit;

/// Original bytes of one file plus the insertions planned for it
#[derive(Debug, Clone)]
pub struct SourceBuffer<'a> {
    original: &'a [u8],
    edits: Vec<TextEdit>,
}

impl<'a> SourceBuffer<'a> {
    pub fn new(original: &'a [u8]) -> Self {
        SourceBuffer {
            original,
            edits: Vec::new(),
        }
    }

    /// Register an insertion; later registrations at the same offset land
    /// after earlier ones
    pub fn insert(&mut self, edit: TextEdit) {
        self.edits.push(edit);
    }

    pub fn original(&self) -> &'a [u8] {
        self.original
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    /// Produce the patched bytes
    pub fn render(mut self) -> Result<Vec<u8>, EditOutOfRange> {
        self.edits.sort_by_key(|e| e.offset);
        apply(self.original, &self.edits)
    }
}

/// Merge `edits` (sorted by offset) into `original`
///
/// Every offset must lie in `[previous offset, original.len()]`. The check
/// runs over all edits before any output is built.
pub fn apply(original: &[u8], edits: &[TextEdit]) -> Result<Vec<u8>, EditOutOfRange> {
    let mut lower = 0;
    for edit in edits {
        if edit.offset < lower || edit.offset > original.len() {
            return Err(EditOutOfRange {
                offset: edit.offset,
                lower,
                upper: original.len(),
            });
        }
        lower = edit.offset;
    }

    let inserted: usize = edits.iter().map(|e| e.text.len()).sum();
    let mut out = Vec::with_capacity(original.len() + inserted);
    let mut copied = 0;
    for edit in edits {
        out.extend_from_slice(&original[copied..edit.offset]);
        out.extend_from_slice(edit.text.as_bytes());
        copied = edit.offset;
    }
    out.extend_from_slice(&original[copied..]);

    Ok(out)
}
