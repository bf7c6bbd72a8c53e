/*
 * Codegraph SSA - Multi-language AST-to-SSA Construction
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Common models (Span, CodegraphError) and utilities
 * - features/    : Vertical slices (parsing → ssa → frontends)
 * - config/      : Build configuration (YAML)
 *
 * Front-ends:
 * - C      : tree-sitter-c + optional external preprocessor
 * - Go     : tree-sitter-go
 * - Python : tree-sitter-python (with constant-driven loop unrolling)
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Builder entry points thread a lot of context
#![allow(clippy::type_complexity)] // Boxed builder thunks
#![allow(clippy::upper_case_acronyms)] // SSA naming
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::single_match)] // Single match for readability
#![allow(clippy::collapsible_else_if)] // else if clarity
#![allow(clippy::match_like_matches_macro)] // Match for readability

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models and utilities
pub mod shared;

/// Feature modules (parsing, ssa, frontends)
pub mod features;

/// Configuration system
pub mod config;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::BuildConfig;
pub use features::frontends::{build, build_c, build_go, build_python, ProgramFactory};
pub use features::parsing::domain::Language;
pub use features::ssa::domain::{
    BasicBlock, BinaryOp, Blueprint, BlueprintKind, Constant, Diagnostic, Function, Program,
    Severity, Terminator, Type, UnaryOp, Value, ValueKind,
};
pub use shared::models::{CodegraphError, ErrorKind, Result, Span};
