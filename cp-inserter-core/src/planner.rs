//! Edit planning
//!
//! Turns matched functions and returns into insertions at fixed offsets of
//! the original buffer. The exit call goes in front of the `return`
//! keyword, so it runs before the return expression is evaluated and has
//! no access to the returned value.

use serde::{Deserialize, Serialize};

use crate::matcher::Matches;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Entry,
    Exit,
}

impl EditKind {
    /// Label passed as the first argument of the checkpoint call
    pub fn label(&self) -> &'static str {
        match self {
            EditKind::Entry => "entry",
            EditKind::Exit => "exit",
        }
    }
}

/// A single insertion into the original buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Offset into the original buffer
    pub offset: usize,
    pub text: String,
    pub kind: EditKind,
}

/// A text edit plus where it came from, for reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEdit {
    pub edit: TextEdit,
    pub function: String,
    /// 1-indexed line of the insertion point
    pub line: u32,
    /// 0-indexed byte column of the insertion point
    pub column: u32,
}

/// Fixed call template around the configured checkpoint symbol
///
/// The runtime hook has the shape `void cp(const char *label, const void
/// *addr, size_t len)`; the address and length are always placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointTemplate {
    symbol: String,
}

impl CheckpointTemplate {
    pub fn new(symbol: impl Into<String>) -> Self {
        CheckpointTemplate {
            symbol: symbol.into(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn call(&self, kind: EditKind) -> String {
        format!("{}(\"{}\", NULL, 0);", self.symbol, kind.label())
    }

    /// Inserted right after the opening brace
    pub fn entry_text(&self) -> String {
        format!("\n    {}", self.call(EditKind::Entry))
    }

    /// Inserted right before the `return` keyword
    pub fn exit_text(&self) -> String {
        format!("{}\n    ", self.call(EditKind::Exit))
    }
}

impl Default for CheckpointTemplate {
    fn default() -> Self {
        CheckpointTemplate::new("cp")
    }
}

/// Plan all edits for a file, sorted by offset
///
/// Entries are registered before exits and the sort is stable, so when a
/// one-line body puts an entry and an exit at the same offset the entry
/// call comes first.
pub fn plan_edits(matches: &Matches<'_>, template: &CheckpointTemplate) -> Vec<PlannedEdit> {
    let mut planned = Vec::with_capacity(matches.functions.len() + matches.returns.len());

    for function in &matches.functions {
        let (Some(body), Some(offset)) = (function.body, function.body_open()) else {
            continue;
        };
        planned.push(PlannedEdit {
            edit: TextEdit {
                offset,
                text: template.entry_text(),
                kind: EditKind::Entry,
            },
            function: function.display_name(),
            line: body.start_line,
            column: body.start_col + 1,
        });
    }

    for site in &matches.returns {
        planned.push(PlannedEdit {
            edit: TextEdit {
                offset: site.offset(),
                text: template.exit_text(),
                kind: EditKind::Exit,
            },
            function: matches.owner(site).display_name(),
            line: site.span.start_line,
            column: site.span.start_col,
        });
    }

    planned.sort_by_key(|p| p.edit.offset);
    planned
}
