//! Front-end-neutral source span representation

use serde::{Deserialize, Serialize};

/// Front-end-neutral source code span
///
/// Represents a contiguous region of the original byte buffer. Every
/// front-end must convert its native node positions to this representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Byte offset of the start of the span (inclusive)
    pub start: usize,
    /// Byte offset of the end of the span (exclusive)
    pub end: usize,
    /// Line number of the start (1-indexed)
    pub start_line: u32,
    /// Column number of the start (0-indexed, in bytes)
    pub start_col: u32,
}

impl SourceSpan {
    /// Create a new source span
    pub fn new(start: usize, end: usize, start_line: u32, start_col: u32) -> Self {
        SourceSpan {
            start,
            end,
            start_line,
            start_col,
        }
    }

    /// Get the length of the span in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if the span is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Convert a tree-sitter node's position to a SourceSpan
impl From<tree_sitter::Node<'_>> for SourceSpan {
    fn from(node: tree_sitter::Node<'_>) -> Self {
        let start = node.start_position();
        SourceSpan {
            start: node.start_byte(),
            end: node.end_byte(),
            start_line: start.row as u32 + 1, // tree-sitter uses 0-indexed rows
            start_col: start.column as u32,
        }
    }
}
