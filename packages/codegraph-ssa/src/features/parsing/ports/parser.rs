//! Parser port (interface)
//!
//! Defines the contract for parsing source code.

use crate::features::parsing::domain::{Language, ParsedSource};
use crate::shared::models::Result;

/// Parser trait - abstraction over parsing implementation
pub trait Parser: Send + Sync {
    /// Parse source code. Syntax errors are collected, not returned as `Err`.
    fn parse(&self, source: &str) -> Result<ParsedSource>;

    fn language(&self) -> Language;

    /// Check if this parser supports the given file extension
    fn supports_extension(&self, ext: &str) -> bool {
        Language::from_extension(ext) == Some(self.language())
    }
}
