//! Build configuration values and their YAML schema

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{ConfigError, ConfigResult};

const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Static loop unrolling (Python front-end)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct UnrollConfig {
    pub enabled: bool,
    /// Cap for `for x in range(...)` with constant bounds
    pub max_range_iterations: usize,
    /// Cap for `while` loops whose condition folds to `true`
    pub max_while_iterations: usize,
}

impl Default for UnrollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_range_iterations: 256,
            max_while_iterations: 128,
        }
    }
}

/// External C preprocessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PreprocessorConfig {
    pub enabled: bool,
    /// Compilers tried in order (bare names are looked up on PATH)
    pub candidates: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub timeout_ms: u64,
    /// Parse the raw source (with a warning) when preprocessing fails
    pub fallback_to_raw: bool,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            candidates: vec!["gcc".into(), "clang".into(), "cc".into()],
            include_dirs: Vec::new(),
            timeout_ms: 10_000,
            fallback_to_raw: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuildConfig {
    /// Build even when the parser reported syntax errors
    pub force: bool,
    pub unroll: UnrollConfig,
    pub preprocessor: PreprocessorConfig,
}

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileV1 {
    /// Schema version (always 1 for v1)
    pub version: Option<u32>,

    #[serde(default)]
    pub force: bool,

    #[serde(default)]
    pub unroll: UnrollConfig,

    #[serde(default)]
    pub preprocessor: PreprocessorConfig,
}

impl BuildConfig {
    /// Best-effort build on malformed input
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn without_preprocessor(mut self) -> Self {
        self.preprocessor.enabled = false;
        self
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config = Self {
            force: file.force,
            unroll: file.unroll,
            preprocessor: file.preprocessor,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: Some(1),
            force: self.force,
            unroll: self.unroll.clone(),
            preprocessor: self.preprocessor.clone(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range(
            "unroll.max_range_iterations",
            self.unroll.max_range_iterations as u64,
            1,
            4096,
            "Large unroll caps blow up program size; keep it at a few hundred.",
        )?;
        check_range(
            "unroll.max_while_iterations",
            self.unroll.max_while_iterations as u64,
            1,
            4096,
            "Large unroll caps blow up program size; keep it at a few hundred.",
        )?;
        check_range(
            "preprocessor.timeout_ms",
            self.preprocessor.timeout_ms,
            1,
            600_000,
            "Use a timeout between 1ms and 10 minutes.",
        )?;
        if self.preprocessor.enabled {
            check_range(
                "preprocessor.candidates",
                self.preprocessor.candidates.len() as u64,
                1,
                16,
                "List at least one compiler (gcc, clang, cc).",
            )?;
        }
        Ok(())
    }
}

fn check_range(field: &str, value: u64, min: u64, max: u64, hint: &str) -> ConfigResult<()> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Range {
        field: field.to_string(),
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
        hint: hint.to_string(),
    })
}
