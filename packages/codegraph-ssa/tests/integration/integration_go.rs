//! Integration tests for the Go front-end
//!
//! Test scenarios:
//! - counting loop with an accumulator
//! - tuple-returning calls
//! - closures, go and defer
//! - iota constants, methods and switch on one package

#[path = "../common/mod.rs"]
mod common;

use codegraph_ssa::{BinaryOp, Constant, Terminator, ValueKind};
use common::*;
use pretty_assertions::assert_eq;

// ========================================
// Counting loop
// ========================================

#[test]
fn test_counting_loop_shape() {
    let program = go(
        "package main\nfunc f() int {\n\tsum := 0\n\tfor i := 0; i < 3; i++ {\n\t\tsum = sum + i\n\t}\n\treturn sum\n}\n",
    );
    assert_no_errors(&program);
    assert_well_formed(&program);

    let f = function(&program, "f");
    let header = block(&program, f, "loop.header");
    let latch = block(&program, f, "loop.latch");
    let exit = block(&program, f, "loop.exit");

    // i < 3 is evaluated in the header on every iteration
    match &header.terminator {
        Some(Terminator::Branch { cond, .. }) => assert!(matches!(
            program.value(*cond).kind,
            ValueKind::BinOp { op: BinaryOp::Lt, .. }
        )),
        other => panic!("header should branch, got {other:?}"),
    }
    assert_eq!(header.preds.len(), 2);
    assert!(header.preds.contains(&latch.id));

    // i = i + 1 lives in the latch
    assert!(latch.insts.iter().any(|v| matches!(
        program.value(*v).kind,
        ValueKind::BinOp { op: BinaryOp::Add, .. }
    )));

    assert!(program.has_path(f.id, f.entry, exit.id));

    // the returned sum is the header phi merging the initial 0 and the addition
    let values = returned(&program, f);
    assert_eq!(values.len(), 1);
    let phi = program.value(values[0]);
    assert_eq!(phi.block, Some(header.id));
    let ops = phi.kind.operands();
    assert_eq!(ops.len(), 2);
    assert!(ops.iter().any(|o| program.const_value(*o) == Some(&Constant::Int(0))));
    assert!(ops.iter().any(|o| matches!(
        program.value(*o).kind,
        ValueKind::BinOp { op: BinaryOp::Add, .. }
    )));
}

// ========================================
// Tuple-returning calls
// ========================================

#[test]
fn test_tuple_call_assigns_fields_by_index() {
    let program = go(
        "package main\nfunc divmod(a, b int) (int, int) { return a / b, a % b }\nfunc f() int {\n\tq, r := divmod(7, 2)\n\treturn q + r\n}\n",
    );
    assert_no_errors(&program);
    let f = function(&program, "f");
    let q = program.assignments(f.id, "q");
    let r = program.assignments(f.id, "r");
    assert_eq!(q.len(), 1);
    assert_eq!(r.len(), 1);
    assert_ne!(q[0].id, r[0].id);
    for (value, index) in [(q[0], 0), (r[0], 1)] {
        match &value.kind {
            ValueKind::Member { key, .. } => {
                assert_eq!(program.const_value(*key), Some(&Constant::Int(index)))
            }
            other => panic!("expected tuple member, got {other:?}"),
        }
    }
}

#[test]
fn test_tuple_call_with_wrong_arity_is_error() {
    let program = go(
        "package main\nfunc pair() (int, int) { return 1, 2 }\nfunc f() {\n\ta, b, c := pair()\n\t_, _, _ = a, b, c\n}\n",
    );
    assert!(program.errors().count() > 0);
    assert!(function(&program, "f").built);
}

// ========================================
// Closures, go and defer
// ========================================

#[test]
fn test_closure_captures_and_writes_outer_variable() {
    let program = go(
        "package main\nfunc f() int {\n\tcount := 0\n\tinc := func() { count++ }\n\tinc()\n\tinc()\n\treturn count\n}\n",
    );
    assert_no_errors(&program);
    let closure = function(&program, "f$func1");
    assert_eq!(closure.free_values.len(), 1);
    assert_eq!(closure.side_effects.len(), 1);
    assert_eq!(closure.side_effects[0].variable, "count");

    assert!(matches!(
        &program.value(closure.free_values[0]).kind,
        ValueKind::FreeValue { name, .. } if name == "count"
    ));
    assert_eq!(closure.parent, Some(function(&program, "f").id));

    // each call rebinds count; the return sees the second call's write
    let f = function(&program, "f");
    let calls: Vec<_> = program
        .instructions(f.id)
        .into_iter()
        .filter(|v| v.is_call())
        .map(|v| v.id)
        .collect();
    assert_eq!(calls.len(), 2);
    let values = returned(&program, f);
    match &program.value(values[0]).kind {
        ValueKind::SideEffect { call, variable, .. } => {
            assert_eq!(*call, calls[1]);
            assert_eq!(variable, "count");
        }
        other => panic!("expected side effect of the second call, got {other:?}"),
    }
}

#[test]
fn test_go_and_defer_statements() {
    let program = go(
        "package main\nimport \"fmt\"\nfunc worker(id int) {}\nfunc f() {\n\tfor i := 0; i < 2; i++ {\n\t\tgo worker(i)\n\t}\n\tdefer fmt.Println(\"done\")\n}\n",
    );
    assert_no_errors(&program);
    let f = function(&program, "f");
    let async_calls: Vec<_> = program
        .instructions(f.id)
        .into_iter()
        .filter(|v| matches!(v.kind, ValueKind::Call { is_async: true, .. }))
        .collect();
    assert_eq!(async_calls.len(), 1);
    assert_eq!(f.defers.len(), 1);
}

// ========================================
// A small package
// ========================================

const PACKAGE: &str = r#"package main

import "fmt"

const (
	Idle = iota
	Running
	Stopped
)

type Stack struct {
	items []int
}

func (s *Stack) Push(v int) {
	s.items = append(s.items, v)
}

func (s *Stack) Len() int {
	return len(s.items)
}

func state(code int) string {
	switch code {
	case Idle:
		return "idle"
	case Running:
		return "running"
	default:
		return "stopped"
	}
}

func main() {
	s := &Stack{}
	for i := 0; i < 3; i++ {
		s.Push(i)
	}
	fmt.Println(state(s.Len()))
}
"#;

#[test]
fn test_package_builds_cleanly() {
    let program = go(PACKAGE);
    assert_no_errors(&program);
    assert_well_formed(&program);
    assert_eq!(program.package.as_deref(), Some("main"));
    assert!(program.libraries.contains_key("fmt"));
    assert!(program.functions.iter().all(|f| f.built));
}

#[test]
fn test_package_iota_constants() {
    let program = go(PACKAGE);
    assert_eq!(program.constant("Idle"), Some(&Constant::Int(0)));
    assert_eq!(program.constant("Running"), Some(&Constant::Int(1)));
    assert_eq!(program.constant("Stopped"), Some(&Constant::Int(2)));
}

#[test]
fn test_package_methods_hang_off_blueprint() {
    let program = go(PACKAGE);
    let stack = program.blueprint_by_name("Stack").expect("Stack blueprint");
    assert!(stack.field("items").is_some());
    let mut methods: Vec<&str> = stack.methods.keys().map(String::as_str).collect();
    methods.sort_unstable();
    assert_eq!(methods, vec!["Len", "Push"]);

    let push = function(&program, "Stack$Push");
    assert_eq!(push.method_of, Some(stack.id));
    assert_eq!(push.params.len(), 2);
}

#[test]
fn test_package_switch_dispatches_on_constants() {
    let program = go(PACKAGE);
    let state = function(&program, "state");
    let cases = state
        .blocks
        .iter()
        .find_map(|b| match &program.block(*b).terminator {
            Some(Terminator::Switch { cases, .. }) => Some(cases.clone()),
            _ => None,
        })
        .expect("switch");
    let labels: Vec<_> = cases
        .iter()
        .map(|(value, _)| program.const_value(*value).cloned())
        .collect();
    assert_eq!(labels, vec![Some(Constant::Int(0)), Some(Constant::Int(1))]);
    assert_eq!(returned(&program, state).len(), 3);
}
