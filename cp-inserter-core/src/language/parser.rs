//! Front-end-neutral syntax tree and parser trait

use std::path::Path;

use crate::compile_db::CompileFlags;
use crate::error::InstrumentError;
use crate::language::{Language, SourceSpan};

/// Front-end interface
///
/// A front-end turns the bytes of one file into a [`TranslationUnit`]. Any
/// implementation that reports accurate byte offsets can be substituted
/// without touching matching or planning.
pub trait FrontEnd: Send + Sync {
    /// Parse `source` (the full contents of `path`) into a translation unit
    ///
    /// # Arguments
    ///
    /// * `path` - The file being parsed (for language detection and errors)
    /// * `source` - The original bytes of the file
    /// * `flags` - Compiler flags supplied by the caller
    fn parse(
        &self,
        path: &Path,
        source: &[u8],
        flags: &CompileFlags,
    ) -> Result<TranslationUnit, InstrumentError>;
}

/// Index of a node inside a [`TranslationUnit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// Shape of a function definition as seen by the front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionShape {
    /// Plain identifier of the function, `None` for lambdas, operators and destructors
    pub name: Option<String>,
    /// Span of the compound-statement body including both braces
    pub body: Option<SourceSpan>,
}

/// The node variants the matcher cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxKind {
    FunctionDefinition(FunctionShape),
    ReturnStatement,
    Other,
}

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    pub span: SourceSpan,
    pub parent: Option<NodeId>,
}

/// A parsed file, lowered to the nodes that matter for instrumentation
///
/// Nodes are stored in pre-order, so a node's parent always has a smaller id.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub language: Language,
    nodes: Vec<SyntaxNode>,
    syntax_errors: Vec<SourceSpan>,
}

impl TranslationUnit {
    pub fn new(language: Language) -> Self {
        TranslationUnit {
            language,
            nodes: Vec::new(),
            syntax_errors: Vec::new(),
        }
    }

    /// Append a node; `parent` must already be present.
    pub fn push(&mut self, kind: SyntaxKind, span: SourceSpan, parent: Option<NodeId>) -> NodeId {
        if let Some(p) = parent {
            debug_assert!(p.0 < self.nodes.len());
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(SyntaxNode { kind, span, parent });
        id
    }

    pub fn record_syntax_error(&mut self, span: SourceSpan) {
        self.syntax_errors.push(span);
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    /// Byte range of a node in the original buffer
    pub fn source_range(&self, id: NodeId) -> std::ops::Range<usize> {
        let span = self.nodes[id.0].span;
        span.start..span.end
    }

    /// Nodes in pre-order with their ids
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SyntaxNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Spans of regions the front-end could only recover from
    pub fn syntax_errors(&self) -> &[SourceSpan] {
        &self.syntax_errors
    }
}
