//! Build configuration
//!
//! `BuildConfig` is a plain value passed to `build_*`. It can be built in
//! code (`BuildConfig::default()` plus field updates) or loaded from a
//! versioned YAML file:
//!
//! ```yaml
//! version: 1
//! force: false
//! unroll:
//!   enabled: true
//!   max_range_iterations: 256
//!   max_while_iterations: 128
//! preprocessor:
//!   enabled: true
//!   candidates: [gcc, clang, cc]
//!   include_dirs: []
//!   timeout_ms: 10000
//!   fallback_to_raw: true
//! ```

pub mod build_config;
pub mod error;

pub use build_config::{BuildConfig, ConfigFileV1, PreprocessorConfig, UnrollConfig};
pub use error::{ConfigError, ConfigResult};
