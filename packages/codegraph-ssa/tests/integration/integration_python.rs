//! Integration tests for the Python front-end
//!
//! Test scenarios:
//! - straight-line references
//! - constant if-chains
//! - range unrolling and its cap
//! - non-tuple multi-assignment
//! - class hierarchies, including cycles

#[path = "../common/mod.rs"]
mod common;

use codegraph_ssa::{BinaryOp, BlueprintKind, Constant, Severity, ValueKind};
use common::*;
use pretty_assertions::assert_eq;

fn binops(program: &codegraph_ssa::Program, op: BinaryOp) -> usize {
    let init = program.entry_function();
    program
        .instructions(init.id)
        .into_iter()
        .filter(|v| matches!(&v.kind, ValueKind::BinOp { op: o, .. } if *o == op))
        .count()
}

// ========================================
// References resolve to one value
// ========================================

#[test]
fn test_copy_and_add_share_the_literal() {
    let program = python("x = 1\ny = x\nz = x + y\n");
    assert_no_errors(&program);
    let init = program.entry_function();

    let x = program.assignments(init.id, "x");
    let y = program.assignments(init.id, "y");
    assert_eq!(x.len(), 1);
    assert_eq!(y.len(), 1);
    assert_eq!(x[0].id, y[0].id);
    assert_eq!(x[0].as_const(), Some(&Constant::Int(1)));

    let z = program.assignments(init.id, "z");
    match &z[0].kind {
        ValueKind::BinOp { op, lhs, rhs } => {
            assert_eq!(*op, BinaryOp::Add);
            assert_eq!(*lhs, x[0].id);
            assert_eq!(*rhs, x[0].id);
        }
        other => panic!("expected x + y, got {other:?}"),
    }
}

// ========================================
// Constant if-chains
// ========================================

fn chain(a: bool, b: bool) -> Vec<i64> {
    let py = |v: bool| if v { "True" } else { "False" };
    let source = format!(
        "a = {}\nb = {}\nif a:\n    r = 1\nelif b:\n    r = 2\nelse:\n    r = 3\n",
        py(a),
        py(b)
    );
    let program = python(&source);
    assert_no_errors(&program);
    let init = program.entry_function();
    int_assignments(&program, init, "r")
}

#[test]
fn test_constant_if_chain_visits_exactly_one_branch() {
    assert_eq!(chain(true, true), vec![1]);
    assert_eq!(chain(true, false), vec![1]);
    assert_eq!(chain(false, true), vec![2]);
    assert_eq!(chain(false, false), vec![3]);
}

#[test]
fn test_unknown_condition_merges_all_branches() {
    let program = python(
        "def f(a, b):\n    if a:\n        r = 1\n    elif b:\n        r = 2\n    else:\n        r = 3\n    return r\n",
    );
    let f = function(&program, "f");
    let mut written = int_assignments(&program, f, "r");
    written.sort_unstable();
    assert_eq!(written, vec![1, 2, 3]);
    let values = returned(&program, f);
    assert!(is_phi(&program, values[0]));
    assert_well_formed(&program);
}

#[test]
fn test_negative_modulo_takes_the_divisor_sign() {
    let program = python("if -7 % 2 == 1:\n    a = 1\nelse:\n    b = 1\n");
    let init = program.entry_function();
    assert_eq!(int_assignments(&program, init, "a"), vec![1]);
    assert!(program.assignments(init.id, "b").is_empty());
}

#[test]
fn test_overflowing_condition_is_left_unknown() {
    let program = python("if 9223372036854775808 // -1:\n    a = 1\nelse:\n    a = 2\n");
    let init = program.entry_function();
    let mut written = int_assignments(&program, init, "a");
    written.sort_unstable();
    assert_eq!(written, vec![1, 2]);

    let program = python("if (-9223372036854775807 - 1) // -1:\n    a = 1\n");
    let init = program.entry_function();
    assert!(init.built);
    assert_eq!(int_assignments(&program, init, "a"), vec![1]);
    assert_eq!(blocks_named(&program, init, "if.true").len(), 1);
}

// ========================================
// Range unrolling
// ========================================

#[test]
fn test_range_bounds_use_floor_division() {
    let program = python("for i in range(7 // -2, 0):\n    pass\n");
    let init = program.entry_function();
    assert_eq!(int_assignments(&program, init, "i"), vec![-4, -3, -2, -1]);
}

#[test]
fn test_range_body_repeats_per_iteration() {
    let program = python("total = 0\nfor i in range(0, 5):\n    total = total + i\n");
    assert_no_errors(&program);
    assert_eq!(binops(&program, BinaryOp::Add), 5);
    let init = program.entry_function();
    assert_eq!(int_assignments(&program, init, "i"), vec![0, 1, 2, 3, 4]);
    assert!(blocks_named(&program, init, "loop.header").is_empty());
}

#[test]
fn test_range_unroll_is_capped() {
    let program = python("total = 0\nfor i in range(1000):\n    total = total + i\n");
    let init = program.entry_function();
    let unrolled = int_assignments(&program, init, "i");
    assert_eq!(unrolled.len(), 256);
    assert_eq!(unrolled.last(), Some(&255));
    // the remaining iterations run through an ordinary loop
    assert_eq!(blocks_named(&program, init, "loop.header").len(), 1);
    assert_eq!(binops(&program, BinaryOp::Add), 257);
    assert_well_formed(&program);
}

// ========================================
// Multi-assignment from a non-tuple call
// ========================================

#[test]
fn test_non_tuple_call_fills_every_target() {
    let program = python("def g():\n    return 1\n\na, b = g()\n");
    let init = program.entry_function();
    let a = program.assignments(init.id, "a");
    let b = program.assignments(init.id, "b");
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].id, b[0].id);
    assert!(a[0].is_call());
    assert!(program
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warn && d.message.contains("assignment mismatch")));
    assert_no_errors(&program);
}

// ========================================
// Classes
// ========================================

#[test]
fn test_inheritance_cycle_does_not_loop() {
    let program = python(
        "class A(B):\n    def run(self):\n        return 1\n\nclass B(A):\n    pass\n\nr = B().run()\nq = A().missing()\n",
    );
    assert!(program.has_diagnostic("inheritance cycle"));
    let a = program.blueprint_by_name("A").expect("A");
    let b = program.blueprint_by_name("B").expect("B");
    assert!(!(a.parents.contains(&b.id) && b.parents.contains(&a.id)));
    assert!(program.entry_function().built);
}

const MODULE: &str = r#"
import json

class Account:
    rate = 2

    def __init__(self, owner, balance=0):
        self.owner = owner
        self.balance = balance

    def deposit(self, amount):
        if amount <= 0:
            raise ValueError("amount")
        self.balance += amount
        return self.balance

class Savings(Account):
    def interest(self):
        return self.balance * self.rate

def total(accounts):
    result = 0
    for acc in accounts:
        result = result + acc.balance
    return result

accounts = [Savings("ann", 10), Account("bob")]
summary = json.dumps({"total": total(accounts)})
"#;

#[test]
fn test_module_builds_cleanly() {
    let program = python(MODULE);
    assert_no_errors(&program);
    assert_well_formed(&program);
    assert!(program.libraries.contains_key("json"));
    assert!(program.functions.iter().all(|f| f.built));
}

#[test]
fn test_module_class_hierarchy() {
    let program = python(MODULE);
    let account = program.blueprint_by_name("Account").expect("Account");
    let savings = program.blueprint_by_name("Savings").expect("Savings");
    assert_eq!(account.kind, BlueprintKind::Class);
    assert_eq!(savings.parents, vec![account.id]);
    assert!(account.field("rate").is_some());
    assert!(account.methods.contains_key("deposit"));
    assert!(savings.methods.contains_key("interest"));

    let deposit = function(&program, "Account.deposit");
    assert_eq!(deposit.method_of, Some(account.id));
    assert_eq!(deposit.params.len(), 2);
}

#[test]
fn test_module_loop_over_parameter() {
    let program = python(MODULE);
    let total = function(&program, "total");
    let header = block(&program, total, "loop.header");
    assert!(header.phis.iter().any(|p| matches!(
        &program.value(*p).kind,
        ValueKind::Phi { variable, .. } if variable == "result"
    )));
    assert!(program
        .instructions(total.id)
        .iter()
        .any(|v| matches!(v.kind, ValueKind::Next { .. })));
}
