//! Parsing Feature
//!
//! Turns source text into a tree-sitter tree for the SSA front-ends.
//!
//! ## Structure
//! - `domain/` - Language, ParsedSource, SyntaxError
//! - `ports/` - Parser trait
//! - `infrastructure/` - TreeSitterParser, PreprocessorSession (C)
//! - `application/` - `frontend`: preprocess + parse + syntax error policy

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::{frontend, Frontend, FrontendOutput};
pub use domain::{Language, ParsedSource, SyntaxError};
pub use infrastructure::{filter_preprocessed, PreprocessorSession, TreeSitterParser};
pub use ports::Parser;
