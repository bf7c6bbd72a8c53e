//! Parsing infrastructure
//!
//! This is where the tree-sitter grammars and the external C preprocessor
//! live.

mod preprocessor;
pub mod tree_sitter;

pub use preprocessor::{filter_preprocessed, PreprocessorSession};
pub use tree_sitter::TreeSitterParser;
