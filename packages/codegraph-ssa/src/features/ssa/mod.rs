//! SSA feature
//!
//! Program representation (domain) and its incremental builder
//! (infrastructure).

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::*;
