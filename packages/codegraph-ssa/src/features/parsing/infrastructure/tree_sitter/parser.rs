//! Tree-sitter parser implementation

use tree_sitter::{Node, Parser as TSParser};

use crate::features::parsing::domain::{Language, ParsedSource, SyntaxError};
use crate::features::parsing::ports::Parser;
use crate::shared::models::{CodegraphError, Result};
use crate::shared::utils::tree_sitter::{node_text, node_to_span};

/// Upper bound on collected errors; one broken construct can cascade
const MAX_SYNTAX_ERRORS: usize = 64;

/// Tree-sitter based parser
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterParser {
    language: Language,
}

impl TreeSitterParser {
    pub fn c() -> Self {
        Self::for_language(Language::C)
    }

    pub fn go() -> Self {
        Self::for_language(Language::Go)
    }

    pub fn python() -> Self {
        Self::for_language(Language::Python)
    }

    pub fn for_language(language: Language) -> Self {
        Self { language }
    }

    fn ts_language(&self) -> tree_sitter::Language {
        match self.language {
            Language::C => tree_sitter_c::language(),
            Language::Go => tree_sitter_go::language(),
            Language::Python => tree_sitter_python::language(),
        }
    }

    /// Collect ERROR / MISSING nodes, skipping subtrees without errors
    fn collect_errors(node: Node<'_>, source: &str, errors: &mut Vec<SyntaxError>) {
        if errors.len() >= MAX_SYNTAX_ERRORS {
            return;
        }
        if node.is_missing() {
            errors.push(SyntaxError {
                message: format!("missing {}", node.kind()),
                span: node_to_span(&node),
            });
            return;
        }
        if node.is_error() {
            let text: String = node_text(&node, source).chars().take(40).collect();
            errors.push(SyntaxError {
                message: format!("unexpected {:?}", text),
                span: node_to_span(&node),
            });
            return;
        }
        if !node.has_error() {
            return;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            Self::collect_errors(child, source, errors);
        }
    }
}

impl Parser for TreeSitterParser {
    fn parse(&self, source: &str) -> Result<ParsedSource> {
        let mut parser = TSParser::new();
        parser
            .set_language(&self.ts_language())
            .map_err(|e| CodegraphError::parse(format!("Failed to set language: {}", e)))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| CodegraphError::parse("Failed to parse source code"))?;

        let mut errors = Vec::new();
        Self::collect_errors(tree.root_node(), source, &mut errors);

        Ok(ParsedSource {
            tree,
            source: source.to_string(),
            language: self.language,
            errors,
        })
    }

    fn language(&self) -> Language {
        self.language
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_language() {
        let cases = [
            (TreeSitterParser::c(), "int main(void) { return 0; }\n"),
            (TreeSitterParser::go(), "package main\nfunc main() {}\n"),
            (TreeSitterParser::python(), "def hello():\n    pass\n"),
        ];
        for (parser, source) in cases {
            let parsed = parser.parse(source).expect("parse");
            assert!(!parsed.has_errors(), "{} should parse", parser.language());
            assert_eq!(parsed.language, parser.language());
        }
    }

    #[test]
    fn test_syntax_errors_are_collected() {
        let parsed = TreeSitterParser::go()
            .parse("package main\nfunc main() { x := }\n")
            .expect("parse");
        assert!(parsed.has_errors());
        assert!(parsed.errors[0].span.start_line >= 2);
    }

    #[test]
    fn test_supports_extension() {
        let parser = TreeSitterParser::python();
        assert!(parser.supports_extension("py"));
        assert!(!parser.supports_extension("go"));
    }
}
