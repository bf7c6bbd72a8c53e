//! SSA domain models
//!
//! Pure data: ids, values, types, blocks, functions, blueprints and the
//! program that owns them all.

mod blueprint;
mod diagnostic;
mod function;
mod ids;
mod program;
mod types;
mod value;

pub use blueprint::{Blueprint, BlueprintField, BlueprintKind, BlueprintState};
pub use diagnostic::{messages, Diagnostic, Severity};
pub use function::{BasicBlock, Function, SideEffectRecord, Terminator};
pub use ids::{BlockId, BlueprintId, FunctionId, ValueId};
pub use program::{CfgView, Program};
pub use types::{FunctionType, Type};
pub use value::{BinaryOp, Constant, UnaryOp, Value, ValueKind};
