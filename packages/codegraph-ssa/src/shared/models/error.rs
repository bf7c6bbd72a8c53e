//! Fatal errors for SSA builds
//!
//! A `CodegraphError` stops a build. Anything the builder can recover from
//! (unknown names, bad arity, unreachable code) becomes a `Diagnostic` on
//! the `Program` instead.

use std::fmt;

/// Which stage gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// tree-sitter rejected the source
    Parse,
    /// The external C preprocessor failed or timed out
    Preprocess,
    /// The builder hit a state it cannot continue from
    SSA,
    /// `BuildConfig` loading or validation
    Config,
    IO,
    /// A bug in this crate
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Preprocess => "preprocess",
            Self::SSA => "ssa",
            Self::Config => "config",
            Self::IO => "io",
            Self::Internal => "internal",
        }
    }
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub struct CodegraphError {
    pub kind: ErrorKind,
    pub message: String,
    /// 1-based source line the failure points at, when known
    pub line: Option<u32>,
    pub source: Option<BoxedSource>,
}

impl CodegraphError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            source: None,
        }
    }

    pub fn with_line(self, line: u32) -> Self {
        Self {
            line: Some(line),
            ..self
        }
    }

    pub fn with_source(self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..self
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn preprocess(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Preprocess, message)
    }

    pub fn ssa(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SSA, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for CodegraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} error (line {}): {}", self.kind.as_str(), line, self.message),
            None => write!(f, "{} error: {}", self.kind.as_str(), self.message),
        }
    }
}

impl std::error::Error for CodegraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            Some(inner) => Some(inner.as_ref()),
            None => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodegraphError>;

impl From<std::io::Error> for CodegraphError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::IO, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for CodegraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("cannot serialize program: {}", err)).with_source(err)
    }
}

impl From<crate::config::ConfigError> for CodegraphError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::config(err.to_string()).with_source(err)
    }
}
