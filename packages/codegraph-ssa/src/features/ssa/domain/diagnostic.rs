//! Build diagnostics
//!
//! Diagnostics are data: the builders record them and keep going with a
//! placeholder value. Callers decide whether they fail a pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::models::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub tag: String,
    pub message: String,
    pub span: Span,
    /// Function being built when the diagnostic was raised
    pub function: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        write!(
            f,
            "[{}][{}] {} ({} in {})",
            level, self.tag, self.message, self.span, self.function
        )
    }
}

/// Message constructors shared by every front-end
pub mod messages {
    pub fn unreachable() -> String {
        "unreachable: syntax shape not handled by the builder".to_string()
    }

    pub fn unsupported(what: &str) -> String {
        format!("unsupported construct: {}", what)
    }

    pub fn value_undefined(name: &str) -> String {
        format!("value undefined: {}", name)
    }

    pub fn multiple_assign_failed(left: usize, right: usize) -> String {
        format!(
            "multi-assign failed: left value length[{}] != right value length[{}]",
            left, right
        )
    }

    pub fn call_assignment_mismatch(left: usize, ty: &str) -> String {
        format!(
            "assignment mismatch: {} variable(s) but call returns {}",
            left, ty
        )
    }

    pub fn assign_to_const(name: &str) -> String {
        format!("cannot assign to constant: {}", name)
    }

    pub fn unexpected_break() -> String {
        "unexpected break: not in a loop or switch".to_string()
    }

    pub fn unexpected_continue() -> String {
        "unexpected continue: not in a loop".to_string()
    }

    pub fn unexpected_fallthrough() -> String {
        "unexpected fallthrough: not in a switch case".to_string()
    }

    pub fn undefined_label(name: &str) -> String {
        format!("label {} not defined", name)
    }

    pub fn label_redefined(name: &str) -> String {
        format!("label {} already defined", name)
    }

    pub fn go_defer_needs_call(stmt: &str) -> String {
        format!("expression in {} must be a function call", stmt)
    }

    pub fn inheritance_cycle(child: &str, parent: &str) -> String {
        format!(
            "inheritance cycle: {} cannot extend {} (it already derives from it)",
            child, parent
        )
    }

    pub fn preprocess_fallback(reason: &str) -> String {
        format!(
            "C macro preprocessing failed, using original source: {}",
            reason
        )
    }

    pub fn syntax_error(detail: &str) -> String {
        format!("syntax error: {}", detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic {
            severity: Severity::Error,
            tag: "ssa-go".into(),
            message: messages::multiple_assign_failed(2, 3),
            span: Span::new(4, 1, 4, 9),
            function: "main".into(),
        };
        let text = d.to_string();
        assert!(text.starts_with("[error][ssa-go]"));
        assert!(text.contains("left value length[2]"));
        assert!(text.contains("4:1-4:9"));
    }
}
