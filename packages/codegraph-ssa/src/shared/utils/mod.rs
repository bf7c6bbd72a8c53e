//! Utility modules shared across features
//!
//! - `scope_stack`: Lexical scope frames for symbol resolution
//! - `tree_sitter`: Tree-sitter node helpers used by every front-end

pub mod scope_stack;
pub mod tree_sitter;
