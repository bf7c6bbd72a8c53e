//! Common test utilities for codegraph-ssa
//!
//! Builders with a deterministic configuration (no external preprocessor)
//! and lookups over the resulting program.

#![allow(dead_code)]

use codegraph_ssa::features::ssa::domain::{BlockId, ValueId};
use codegraph_ssa::{
    build_c, build_go, build_python, BasicBlock, BuildConfig, Constant, Function, Program,
    Severity, Terminator, ValueKind,
};

/// Configuration used by every integration test: raw C source, default caps
pub fn config() -> BuildConfig {
    BuildConfig::default().without_preprocessor()
}

pub fn c(source: &str) -> Program {
    build_c(source, &config()).expect("C source should build")
}

pub fn go(source: &str) -> Program {
    build_go(source, &config()).expect("Go source should build")
}

pub fn python(source: &str) -> Program {
    build_python(source, &config()).expect("Python source should build")
}

pub fn function<'p>(program: &'p Program, name: &str) -> &'p Function {
    program.function_by_name(name).unwrap_or_else(|| {
        panic!(
            "function '{name}' not found, available: {:?}",
            program.functions.iter().map(|f| &f.name).collect::<Vec<_>>()
        )
    })
}

/// First block of `f` with the given name
pub fn block<'p>(program: &'p Program, f: &Function, name: &str) -> &'p BasicBlock {
    f.blocks
        .iter()
        .map(|b| program.block(*b))
        .find(|b| b.name == name)
        .unwrap_or_else(|| panic!("block '{name}' not found in {}", f.name))
}

pub fn blocks_named(program: &Program, f: &Function, name: &str) -> Vec<BlockId> {
    f.blocks
        .iter()
        .copied()
        .filter(|b| program.block(*b).name == name)
        .collect()
}

/// First value of every `return` in `f`
pub fn returned(program: &Program, f: &Function) -> Vec<ValueId> {
    f.blocks
        .iter()
        .filter_map(|b| match &program.block(*b).terminator {
            Some(Terminator::Return(values)) => values.first().copied(),
            _ => None,
        })
        .collect()
}

/// Integer constants bound to `name` in `f`, in emission order
pub fn int_assignments(program: &Program, f: &Function, name: &str) -> Vec<i64> {
    program
        .assignments(f.id, name)
        .iter()
        .filter_map(|v| v.as_const().and_then(Constant::as_int))
        .collect()
}

pub fn export_const(program: &Program, name: &str) -> Option<Constant> {
    program
        .export_value(name)
        .and_then(|v| program.const_value(v))
        .cloned()
}

pub fn is_phi(program: &Program, value: ValueId) -> bool {
    matches!(program.value(value).kind, ValueKind::Phi { .. })
}

/// Assert the program carries no Error diagnostics
pub fn assert_no_errors(program: &Program) {
    let errors: Vec<_> = program
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| &d.message)
        .collect();
    assert!(errors.is_empty(), "Expected no errors, got: {errors:?}");
}

/// Structural SSA checks that hold for every built function:
/// phis sit in blocks with several predecessors, one operand per edge,
/// and every operand is defined in the same function
pub fn assert_well_formed(program: &Program) {
    for f in &program.functions {
        for block_id in &f.blocks {
            let block = program.block(*block_id);
            for phi in &block.phis {
                match &program.value(*phi).kind {
                    ValueKind::Phi { edges, variable } => {
                        assert!(
                            block.preds.len() >= 2,
                            "phi for '{variable}' in {}:{} with {} predecessor(s)",
                            f.name,
                            block.name,
                            block.preds.len()
                        );
                        assert_eq!(
                            edges.len(),
                            block.preds.len(),
                            "phi for '{variable}' in {}:{} has one operand per edge",
                            f.name,
                            block.name
                        );
                        for (pred, _) in edges {
                            assert!(block.preds.contains(pred));
                        }
                    }
                    other => panic!("non-phi {other:?} in phi list of {}", block.name),
                }
            }
            for inst in &block.insts {
                assert_eq!(program.value(*inst).function, f.id);
            }
        }
    }
}
