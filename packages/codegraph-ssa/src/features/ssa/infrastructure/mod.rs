//! SSA infrastructure
//!
//! The program builder (Braun on-the-fly SSA) and the structured
//! control-flow helpers front-ends drive it through.

pub mod builder;
pub mod declaration_table;
pub mod errors;
pub mod if_builder;
pub mod labels;
pub mod loop_builder;
pub mod switch_builder;

pub use builder::{BuilderContext, PendingCall, ProgramBuilder, Variable, ENTRY_FUNCTION};
pub use declaration_table::{DeclarationState, DeclarationTable};
pub use errors::*;
pub use if_builder::IfBuilder;
pub use labels::{LabelTable, TargetFrame};
pub use loop_builder::LoopBuilder;
pub use switch_builder::SwitchBuilder;
