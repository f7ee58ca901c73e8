//! Function and return-statement matching
//!
//! Global invariants enforced:
//! - A return belongs to its nearest lexically enclosing function, never to
//!   an outer one
//! - Discovery order is source (pre-order) order

use crate::language::{NodeId, SourceSpan, SyntaxKind, TranslationUnit};
use crate::targets::TargetSet;

/// Index of a function in [`Discovery::functions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSymbol {
    pub id: FunctionId,
    pub name: Option<String>,
    pub span: SourceSpan,
    /// Compound-statement body including braces
    pub body: Option<SourceSpan>,
}

impl FunctionSymbol {
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Offset of the first byte inside the opening brace
    pub fn body_open(&self) -> Option<usize> {
        self.body.map(|b| b.start + 1)
    }

    /// Name for reports; unnamed functions get a position-based label
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("<anonymous>@{}:{}", self.span.start_line, self.span.start_col),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSite {
    /// Span of the whole statement; `span.start` is the `return` keyword
    pub span: SourceSpan,
    pub owner: FunctionId,
}

impl ReturnSite {
    pub fn offset(&self) -> usize {
        self.span.start
    }
}

/// Every function definition and owned return in one translation unit
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub functions: Vec<FunctionSymbol>,
    pub returns: Vec<ReturnSite>,
}

/// The subset of a [`Discovery`] selected by a target set
#[derive(Debug, Clone)]
pub struct Matches<'a> {
    /// Target functions that have a body
    pub functions: Vec<&'a FunctionSymbol>,
    /// Returns whose owner is a target
    pub returns: Vec<&'a ReturnSite>,
    discovery: &'a Discovery,
}

impl<'a> Matches<'a> {
    pub fn owner(&self, site: &ReturnSite) -> &'a FunctionSymbol {
        self.discovery.function(site.owner)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.returns.is_empty()
    }
}

/// Walk a translation unit once, binding each return to its nearest
/// enclosing function
pub fn discover(unit: &TranslationUnit) -> Discovery {
    let mut discovery = Discovery::default();
    // Lowered node id -> function id, for nodes that are functions
    let mut function_of_node: Vec<Option<FunctionId>> = vec![None; unit.len()];

    for (node_id, node) in unit.iter() {
        match &node.kind {
            SyntaxKind::FunctionDefinition(shape) => {
                let id = FunctionId(discovery.functions.len());
                function_of_node[node_id.0] = Some(id);
                discovery.functions.push(FunctionSymbol {
                    id,
                    name: shape.name.clone(),
                    span: node.span,
                    body: shape.body,
                });
            }
            SyntaxKind::ReturnStatement => {
                match enclosing_function(unit, node.parent, &function_of_node) {
                    Some(owner) => discovery.returns.push(ReturnSite {
                        span: node.span,
                        owner,
                    }),
                    None => tracing::debug!(
                        "return at line {} is outside any function",
                        node.span.start_line
                    ),
                }
            }
            SyntaxKind::Other => {}
        }
    }

    discovery
}

/// Nearest ancestor that is a function
fn enclosing_function(
    unit: &TranslationUnit,
    mut current: Option<NodeId>,
    function_of_node: &[Option<FunctionId>],
) -> Option<FunctionId> {
    while let Some(id) = current {
        if let Some(function) = function_of_node[id.0] {
            return Some(function);
        }
        current = unit.node(id).parent;
    }
    None
}

impl Discovery {
    pub fn function(&self, id: FunctionId) -> &FunctionSymbol {
        &self.functions[id.0]
    }

    /// Keep target functions with a body, and returns owned by targets
    pub fn select<'a>(&'a self, targets: &TargetSet) -> Matches<'a> {
        let functions = self
            .functions
            .iter()
            .filter(|f| f.has_body() && targets.matches(f.name.as_deref()))
            .collect();
        let returns = self
            .returns
            .iter()
            .filter(|r| targets.matches(self.function(r.owner).name.as_deref()))
            .collect();
        Matches {
            functions,
            returns,
            discovery: self,
        }
    }
}
