//! C and C++ front-end using tree-sitter
//!
//! Lowers a tree-sitter concrete syntax tree into a [`TranslationUnit`]
//! holding only function definitions, lambdas and return statements, each
//! linked to its nearest lowered ancestor.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tree_sitter::{Node, ParseOptions, ParseState, Parser, Point, Tree};

use crate::compile_db::CompileFlags;
use crate::error::InstrumentError;
use crate::language::parser::{FrontEnd, FunctionShape, NodeId, SyntaxKind, TranslationUnit};
use crate::language::tree_sitter_utils::{find_child_by_kind, inner_declarator, node_text};
use crate::language::{Language, SourceSpan};

/// C/C++ parser using tree-sitter
#[derive(Debug, Clone, Default)]
pub struct CFamilyParser {
    parse_timeout: Option<Duration>,
}

impl CFamilyParser {
    /// Create a new parser without a parse timeout
    pub fn new() -> Result<Self> {
        // Just validate that both grammars load into a parser
        let mut parser = Parser::new();
        for language in [Language::C, Language::Cpp] {
            parser
                .set_language(&language.grammar())
                .with_context(|| format!("Failed to set {} language for parser", language.name()))?;
        }
        Ok(CFamilyParser::default())
    }

    /// Bound the time spent parsing a single file
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.parse_timeout = timeout;
        self
    }

    fn parse_tree(&self, language: Language, source: &[u8]) -> Result<Tree, String> {
        // Need a fresh parser per call: tree-sitter parsers are not Sync
        let mut parser = Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|e| format!("failed to load {} grammar: {}", language.name(), e))?;

        match self.parse_timeout {
            None => parser
                .parse(source, None)
                .ok_or_else(|| "parser produced no syntax tree".to_string()),
            Some(limit) => {
                let started = Instant::now();
                let mut progress = |_: &ParseState| started.elapsed() >= limit;
                let options = ParseOptions::new().progress_callback(&mut progress);
                parser
                    .parse_with_options(
                        &mut |offset: usize, _: Point| source.get(offset..).unwrap_or(&[]),
                        None,
                        Some(options),
                    )
                    .ok_or_else(|| format!("parse timed out after {} ms", limit.as_millis()))
            }
        }
    }
}

impl FrontEnd for CFamilyParser {
    fn parse(
        &self,
        path: &Path,
        source: &[u8],
        flags: &CompileFlags,
    ) -> Result<TranslationUnit, InstrumentError> {
        let language = Language::detect(path, flags);
        let tree = self
            .parse_tree(language, source)
            .map_err(|message| InstrumentError::Parse {
                path: path.to_path_buf(),
                message,
            })?;

        let unit = lower_tree(&tree, source, language);
        tracing::debug!(
            "parsed {} as {}: {} relevant nodes, {} syntax errors",
            path.display(),
            language.name(),
            unit.len(),
            unit.syntax_errors().len()
        );
        Ok(unit)
    }
}

/// Walk the tree in pre-order and keep only the nodes the matcher needs.
///
/// Iterative so that deeply nested sources cannot exhaust the stack.
fn lower_tree(tree: &Tree, source: &[u8], language: Language) -> TranslationUnit {
    let mut unit = TranslationUnit::new(language);
    let mut cursor = tree.walk();
    // (tree depth, lowered id) of every open lowered ancestor
    let mut scopes: Vec<(usize, NodeId)> = Vec::new();
    let mut depth = 0usize;

    'walk: loop {
        let node = cursor.node();
        while scopes.last().is_some_and(|(d, _)| *d >= depth) {
            scopes.pop();
        }

        if node.is_error() || node.is_missing() {
            unit.record_syntax_error(SourceSpan::from(node));
        }

        let kind = classify(node, source);
        if kind != SyntaxKind::Other {
            let parent = scopes.last().map(|(_, id)| *id);
            let id = unit.push(kind, SourceSpan::from(node), parent);
            scopes.push((depth, id));
        }

        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
            depth -= 1;
        }
    }

    unit
}

/// Map a tree-sitter node onto the variants the matcher dispatches on
fn classify(node: Node, source: &[u8]) -> SyntaxKind {
    match node.kind() {
        "function_definition" => SyntaxKind::FunctionDefinition(FunctionShape {
            name: function_name(node, source),
            body: compound_body(node),
        }),
        "lambda_expression" => SyntaxKind::FunctionDefinition(FunctionShape {
            name: None,
            body: compound_body(node),
        }),
        "return_statement" => SyntaxKind::ReturnStatement,
        _ => SyntaxKind::Other,
    }
}

/// Body span, only when it is a plain compound statement.
///
/// `= default`, `= delete` and function-try-blocks have no such body.
fn compound_body(node: Node) -> Option<SourceSpan> {
    node.child_by_field_name("body")
        .or_else(|| find_child_by_kind(node, "compound_statement"))
        .filter(|body| body.kind() == "compound_statement")
        .map(SourceSpan::from)
}

/// Identifier of a function definition, if it has one
///
/// Constructors are named after their class but have no identifier of
/// their own, both in-class (`struct S { S() {} };`) and out-of-line
/// (`S::S() {}`).
fn function_name(node: Node, source: &[u8]) -> Option<String> {
    let declarator = node.child_by_field_name("declarator")?;
    let name = declarator_name(declarator, source)?;
    let class = declarator_scope(declarator, source).or_else(|| enclosing_class(node, source));
    if class == Some(name.as_str()) {
        return None;
    }
    Some(name)
}

/// Innermost scope of a qualified declarator: `Shape` for `geo::Shape::area`
fn declarator_scope<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    match node.kind() {
        "qualified_identifier" => {
            let name = node.child_by_field_name("name")?;
            if name.kind() == "qualified_identifier" {
                return declarator_scope(name, source);
            }
            node.child_by_field_name("scope")
                .and_then(|scope| type_name(scope, source))
        }
        "function_declarator"
        | "pointer_declarator"
        | "reference_declarator"
        | "parenthesized_declarator"
        | "attributed_declarator" => {
            inner_declarator(node).and_then(|inner| declarator_scope(inner, source))
        }
        _ => None,
    }
}

/// Name of the class, struct or union whose body directly holds `node`
fn enclosing_class<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    let mut parent = node.parent()?;
    while parent.kind() == "template_declaration" {
        parent = parent.parent()?;
    }
    if parent.kind() != "field_declaration_list" {
        return None;
    }
    let class = parent.parent()?;
    match class.kind() {
        "class_specifier" | "struct_specifier" | "union_specifier" => class
            .child_by_field_name("name")
            .and_then(|name| type_name(name, source)),
        _ => None,
    }
}

/// Unqualified name of a type: `Vec` for `Vec<T>` and `ns::Vec`
fn type_name<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    match node.kind() {
        "type_identifier" | "namespace_identifier" | "identifier" => node_text(node, source),
        "template_type" | "qualified_identifier" => node
            .child_by_field_name("name")
            .and_then(|name| type_name(name, source)),
        _ => None,
    }
}

/// Extract the plain identifier a declarator introduces
///
/// `ns::Widget::draw` yields `draw` and `max<int>` yields `max`. Operators,
/// destructors and conversion functions have no identifier.
fn declarator_name(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" => node_text(node, source).map(str::to_string),
        "qualified_identifier" | "template_function" | "template_method" => node
            .child_by_field_name("name")
            .and_then(|name| declarator_name(name, source)),
        "function_declarator"
        | "pointer_declarator"
        | "reference_declarator"
        | "parenthesized_declarator"
        | "attributed_declarator" => {
            inner_declarator(node).and_then(|inner| declarator_name(inner, source))
        }
        _ => None,
    }
}
