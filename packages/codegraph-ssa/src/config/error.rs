//! Errors raised while loading or validating a `BuildConfig`

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting outside its accepted bounds
    #[error("{field} = {value} is out of range ({min}..={max}). {hint}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
        hint: String,
    },

    #[error("Build config has no 'version' key; start the file with 'version: 1'.")]
    MissingVersion,

    #[error("Build config version {found} is not supported (known: {})", supported.iter().map(u32::to_string).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    #[error("Cannot read build config: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed YAML, wrong value types and unknown keys
    #[error("Invalid build config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
