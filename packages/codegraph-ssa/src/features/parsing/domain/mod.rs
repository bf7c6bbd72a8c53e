//! Parsing domain models

mod parsed_source;

pub use parsed_source::{Language, ParsedSource, SyntaxError};
