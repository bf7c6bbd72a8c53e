//! Parsed source representation

use std::fmt;
use tree_sitter::{Node, Tree};

use crate::shared::models::Span;

/// Source languages with an SSA front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Go,
    Python,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Go => "go",
            Language::Python => "python",
        }
    }

    /// Diagnostic tag used by the language's builder
    pub fn tag(&self) -> &'static str {
        match self {
            Language::C => "ssa-c",
            Language::Go => "ssa-go",
            Language::Python => "ssa-python",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.') {
            "c" | "h" => Some(Language::C),
            "go" => Some(Language::Go),
            "py" | "pyi" => Some(Language::Python),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse error reported by the grammar (ERROR or MISSING node)
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

/// A parsed source file. The tree borrows nothing; nodes are tied to it.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub tree: Tree,
    /// Text the tree was built from (after preprocessing, for C)
    pub source: String,
    pub language: Language,
    pub errors: Vec<SyntaxError>,
}

impl ParsedSource {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.source.lines().count()
    }
}
