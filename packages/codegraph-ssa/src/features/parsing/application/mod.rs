//! Parsing application layer

mod frontend;

pub use frontend::{frontend, Frontend, FrontendOutput};
