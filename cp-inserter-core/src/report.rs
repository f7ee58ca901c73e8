//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Reports follow input file order, edits follow offset order
//! - Byte-for-byte identical output across runs

use serde::{Deserialize, Serialize};

use crate::planner::{EditKind, PlannedEdit};

/// One inserted checkpoint call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EditRecord {
    pub function: String,
    pub kind: EditKind,
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl From<&PlannedEdit> for EditRecord {
    fn from(planned: &PlannedEdit) -> Self {
        EditRecord {
            function: planned.function.clone(),
            kind: planned.edit.kind,
            line: planned.line,
            column: planned.column,
            offset: planned.edit.offset,
        }
    }
}

/// Instrumentation outcome for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileReport {
    pub file: String,
    pub language: String,
    pub changed: bool,
    pub edits: Vec<EditRecord>,
}

impl FileReport {
    pub fn entry_count(&self) -> usize {
        self.count(EditKind::Entry)
    }

    pub fn exit_count(&self) -> usize {
        self.count(EditKind::Exit)
    }

    fn count(&self, kind: EditKind) -> usize {
        self.edits.iter().filter(|e| e.kind == kind).count()
    }
}

/// Totals over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub files: usize,
    pub changed: usize,
    pub failed: usize,
    pub edits: usize,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} file(s) processed, {} changed, {} failed, {} checkpoint call(s) inserted",
            self.files, self.changed, self.failed, self.edits
        )
    }
}

/// Render reports as a text table
pub fn render_text(reports: &[FileReport]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<30} {:<6} {:<6} {}\n",
        "File", "Line", "Kind", "Function"
    ));
    for report in reports {
        for edit in &report.edits {
            output.push_str(&format!(
                "{:<30} {:<6} {:<6} {}\n",
                truncate_or_pad(&report.file, 30),
                edit.line,
                edit.kind.label(),
                edit.function
            ));
        }
    }
    output
}

/// Render reports as JSON output
pub fn render_json(reports: &[FileReport]) -> String {
    serde_json::to_string_pretty(reports).unwrap_or_else(|_| "[]".to_string())
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let keep: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", keep)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
