//! Language front-ends: syntax tree → SSA program
//!
//! Every front-end follows the same pipeline:
//! 1. `parsing::Frontend` parses (and for C, preprocesses) the source
//! 2. a declaration pass registers functions, methods and types and queues
//!    their bodies in a `DeclarationTable`
//! 3. top-level code is built into the entry function `@init`
//! 4. the queue is drained, building one body at a time
//!
//! Problems in the translated source become diagnostics on the returned
//! program; only parse, preprocess and configuration failures are errors.

pub mod c;
mod common;
pub mod go;
pub mod literals;
pub mod python;

use tracing::info;

use crate::config::BuildConfig;
use crate::features::parsing::{Frontend, Language};
use crate::features::ssa::domain::Program;
use crate::shared::models::Result;

/// Builds SSA programs under one configuration, sharing the C
/// preprocessor session (and its cache) between sources
pub struct ProgramFactory {
    frontend: Frontend,
}

impl ProgramFactory {
    pub fn new(config: &BuildConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            frontend: Frontend::new(config),
        })
    }

    pub fn frontend(&self) -> &Frontend {
        &self.frontend
    }

    pub fn build(&mut self, language: Language, source: &str) -> Result<Program> {
        let output = self.frontend.run(language, source)?;
        let program = match language {
            Language::C => c::build_program(&output)?,
            Language::Go => go::build_program(&output)?,
            Language::Python => python::build_program(&output, &self.frontend.config().unroll)?,
        };
        info!(
            language = %language,
            functions = program.functions.len(),
            values = program.values.len(),
            errors = program.errors().count(),
            "SSA build complete"
        );
        Ok(program)
    }
}

/// Build the SSA program for `source`
pub fn build(language: Language, source: &str, config: &BuildConfig) -> Result<Program> {
    ProgramFactory::new(config)?.build(language, source)
}

pub fn build_c(source: &str, config: &BuildConfig) -> Result<Program> {
    build(Language::C, source, config)
}

pub fn build_go(source: &str, config: &BuildConfig) -> Result<Program> {
    build(Language::Go, source, config)
}

pub fn build_python(source: &str, config: &BuildConfig) -> Result<Program> {
    build(Language::Python, source, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ErrorKind;

    #[test]
    fn test_invalid_config_is_rejected_before_parsing() {
        let mut config = BuildConfig::default();
        config.unroll.max_range_iterations = 0;
        let err = build_python("x = 1\n", &config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn test_factory_builds_several_sources() {
        let config = BuildConfig::default().without_preprocessor();
        let mut factory = ProgramFactory::new(&config).unwrap();
        let first = factory.build(Language::Python, "x = 1\n").unwrap();
        let second = factory.build(Language::C, "int y = 2;\n").unwrap();
        assert_eq!(first.language, "python");
        assert_eq!(second.language, "c");
        assert_eq!(factory.frontend().cached_preprocessor_outputs(), 0);
    }

    #[test]
    fn test_program_carries_language_and_entry() {
        let program = build_go("package main\n", &BuildConfig::default()).unwrap();
        assert_eq!(program.language, "go");
        assert_eq!(program.entry_function().name, "@init");
        assert_eq!(program.package.as_deref(), Some("main"));
    }
}
