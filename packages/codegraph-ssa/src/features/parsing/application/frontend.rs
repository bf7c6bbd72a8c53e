//! Frontend: source text to parse tree
//!
//! C sources go through the external preprocessor first (falling back to
//! the raw text when allowed). Syntax errors abort the build unless the
//! config asks for a forced, best-effort build.

use tracing::{debug, warn};

use crate::config::BuildConfig;
use crate::features::parsing::domain::{Language, ParsedSource};
use crate::features::parsing::infrastructure::{PreprocessorSession, TreeSitterParser};
use crate::features::parsing::ports::Parser;
use crate::features::ssa::domain::messages;
use crate::shared::models::{CodegraphError, Result};

/// Parse result plus messages to be recorded as `Warn` diagnostics
#[derive(Debug)]
pub struct FrontendOutput {
    pub parsed: ParsedSource,
    pub warnings: Vec<String>,
}

/// Preprocess-and-parse pipeline for one configuration.
///
/// The C preprocessor session is created on first use and kept, so a
/// source seen before is served from its cache.
pub struct Frontend {
    config: BuildConfig,
    preprocessor: Option<PreprocessorSession>,
}

impl Frontend {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            config: config.clone(),
            preprocessor: None,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Outputs held by the preprocessor cache (0 before the first C unit)
    pub fn cached_preprocessor_outputs(&self) -> usize {
        self.preprocessor
            .as_ref()
            .map_or(0, PreprocessorSession::cached_outputs)
    }

    pub fn run(&mut self, language: Language, source: &str) -> Result<FrontendOutput> {
        let mut warnings = Vec::new();

        let text = match language {
            Language::C if self.config.preprocessor.enabled => match self.preprocess(source) {
                Ok(expanded) => expanded,
                Err(err) if self.config.preprocessor.fallback_to_raw => {
                    warn!(error = %err, "C preprocessing failed, parsing raw source");
                    warnings.push(messages::preprocess_fallback(&err.message));
                    source.to_string()
                }
                Err(err) => return Err(err),
            },
            _ => source.to_string(),
        };

        let parsed = TreeSitterParser::for_language(language).parse(&text)?;
        if let Some(first) = parsed.errors.first() {
            if !self.config.force {
                return Err(CodegraphError::parse(format!(
                    "{} syntax error(s) in {} source, first: {}",
                    parsed.errors.len(),
                    language,
                    first.message
                ))
                .with_line(first.span.start_line));
            }
            debug!(errors = parsed.errors.len(), "forced build over syntax errors");
            warnings.extend(
                parsed
                    .errors
                    .iter()
                    .map(|e| format!("{} at {}", messages::syntax_error(&e.message), e.span)),
            );
        }

        Ok(FrontendOutput { parsed, warnings })
    }

    fn preprocess(&mut self, source: &str) -> Result<String> {
        let session = match self.preprocessor.take() {
            Some(session) => session,
            None => PreprocessorSession::new(&self.config.preprocessor)?,
        };
        self.preprocessor.insert(session).preprocess(source)
    }
}

/// One-shot [`Frontend::run`]
pub fn frontend(language: Language, source: &str, config: &BuildConfig) -> Result<FrontendOutput> {
    Frontend::new(config).run(language, source)
}
