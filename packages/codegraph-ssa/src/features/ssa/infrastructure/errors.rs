/*
 * SSA Error Types
 *
 * Invariant violations raised by the SSA builder itself:
 * - Function stack misuse
 * - Unknown arena ids
 * - Inheritance cycles
 *
 * User-facing problems in the source being translated are diagnostics,
 * not errors; see `domain::Diagnostic`.
 */

use std::fmt;

use crate::shared::models::CodegraphError;

/// SSA Error Type
#[derive(Debug, Clone, PartialEq)]
pub enum SSAError {
    /// Push/pop on the function stack that would leave it inconsistent
    FunctionStack { operation: String },

    /// Function id outside the program arena
    FunctionNotFound { function_id: String },

    /// Block id outside the program arena
    BlockNotFound { block_id: String },

    /// Blueprint looked up by name but never declared
    BlueprintNotFound { name: String },

    /// Adding the parent would make the blueprint its own ancestor
    InheritanceCycle { child: String, parent: String },

    /// Invalid CFG structure (e.g. edge out of a terminated block)
    InvalidCFG { reason: String },

    /// Internal error (shouldn't happen in production)
    Internal { message: String },
}

impl fmt::Display for SSAError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SSAError::FunctionStack { operation } => {
                write!(f, "Function stack misuse: {}", operation)
            }
            SSAError::FunctionNotFound { function_id } => {
                write!(f, "Function not found: '{}'", function_id)
            }
            SSAError::BlockNotFound { block_id } => {
                write!(f, "Block not found: '{}'", block_id)
            }
            SSAError::BlueprintNotFound { name } => {
                write!(f, "Blueprint not found: '{}'", name)
            }
            SSAError::InheritanceCycle { child, parent } => {
                write!(
                    f,
                    "Inheritance cycle: '{}' cannot extend '{}'",
                    child, parent
                )
            }
            SSAError::InvalidCFG { reason } => {
                write!(f, "Invalid CFG: {}", reason)
            }
            SSAError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for SSAError {}

/// Result type for SSA operations
pub type SSAResult<T> = Result<T, SSAError>;

impl From<SSAError> for CodegraphError {
    fn from(err: SSAError) -> Self {
        CodegraphError::ssa(err.to_string()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ErrorKind;

    #[test]
    fn test_ssa_error_converts_to_codegraph_error() {
        let err = SSAError::InheritanceCycle {
            child: "A".into(),
            parent: "B".into(),
        };
        let converted: CodegraphError = err.into();
        assert_eq!(converted.kind, ErrorKind::SSA);
        assert!(converted.message.contains("'A' cannot extend 'B'"));
    }
}
