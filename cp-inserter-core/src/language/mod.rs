//! Language detection and front-end abstraction layer
//!
//! This module provides the front-end-neutral syntax representation the
//! matcher works on, and the tree-sitter front-end that produces it for
//! C and C++ sources.

pub mod c_family;
pub mod parser;
pub mod span;
pub mod tree_sitter_utils;

use std::path::Path;

use crate::compile_db::CompileFlags;

pub use c_family::CFamilyParser;
pub use parser::{FrontEnd, FunctionShape, NodeId, SyntaxKind, SyntaxNode, TranslationUnit};
pub use span::SourceSpan;

/// Supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// C (.c, .h)
    C,
    /// C++ (.cc, .cpp, .cxx, .c++, .hpp, .hh, .hxx, .ipp, .tpp)
    Cpp,
}

impl Language {
    /// Detect language from file extension
    ///
    /// Returns `None` if the extension is not recognized.
    ///
    /// # Examples
    ///
    /// ```
    /// use cp_inserter_core::language::Language;
    ///
    /// assert_eq!(Language::from_extension("c"), Some(Language::C));
    /// assert_eq!(Language::from_extension("cpp"), Some(Language::Cpp));
    /// assert_eq!(Language::from_extension("rs"), None);
    /// ```
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "c" | "h" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "c++" | "C" | "hpp" | "hh" | "hxx" | "h++" | "ipp" | "tpp" => {
                Some(Language::Cpp)
            }
            _ => None,
        }
    }

    /// Detect language from file path
    ///
    /// Returns `None` if the file has no extension or the extension is not recognized.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Pick the language for a file, letting compiler flags win over the
    /// extension. Unknown files are parsed as C++, whose grammar accepts
    /// most C.
    pub fn detect(path: &Path, flags: &CompileFlags) -> Self {
        flags
            .language_hint()
            .or_else(|| Self::from_path(path))
            .unwrap_or(Language::Cpp)
    }

    /// Get the canonical name of the language
    pub fn name(&self) -> &'static str {
        match self {
            Language::C => "C",
            Language::Cpp => "C++",
        }
    }

    /// The tree-sitter grammar for this language
    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::C => tree_sitter_c::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}
