//! Feature modules
//!
//! - parsing   : tree-sitter front door and C preprocessing
//! - ssa       : SSA program model and builder
//! - frontends : per-language AST → SSA translation

pub mod frontends;
pub mod parsing;
pub mod ssa;
