//! Integration tests for the C front-end
//!
//! Test scenarios:
//! - enum constants
//! - integer literal radices
//! - forward goto resolution
//! - libc side effects
//! - structs, pointers, loops and switch on one translation unit

#[path = "../common/mod.rs"]
mod common;

use codegraph_ssa::{BlueprintKind, Constant, Terminator, Type, ValueKind};
use common::*;
use pretty_assertions::assert_eq;

// ========================================
// Enum constants
// ========================================

#[test]
fn test_enum_binds_sequential_constants() {
    let program = c("enum Color { RED, GREEN=5, BLUE };\n");

    assert_eq!(program.constant("RED"), Some(&Constant::Int(0)));
    assert_eq!(program.constant("GREEN"), Some(&Constant::Int(5)));
    assert_eq!(program.constant("BLUE"), Some(&Constant::Int(6)));
    assert_no_errors(&program);
}

#[test]
fn test_enum_constant_used_in_function() {
    let program = c(
        "enum Color { RED, GREEN=5, BLUE };\nint pick(void) { return BLUE; }\n",
    );
    let pick = function(&program, "pick");
    let values = returned(&program, pick);
    assert_eq!(values.len(), 1);
    assert_eq!(program.const_value(values[0]), Some(&Constant::Int(6)));
}

// ========================================
// Integer literal radices
// ========================================

#[test]
fn test_integer_radices_agree() {
    let program = c("int hex = 0x1F;\nint bin = 0b101;\nint oct = 017;\nint dec = 42;\n");

    assert_eq!(export_const(&program, "hex"), Some(Constant::Int(31)));
    assert_eq!(export_const(&program, "bin"), Some(Constant::Int(5)));
    assert_eq!(export_const(&program, "oct"), Some(Constant::Int(15)));
    assert_eq!(export_const(&program, "dec"), Some(Constant::Int(42)));
}

// ========================================
// Goto forward reference
// ========================================

#[test]
fn test_goto_skips_code_before_label() {
    let program = c(
        "int f(void) {\n  int x = 0;\n  int y = 0;\n  goto end;\n  x = 1;\nend:\n  y = 2;\n  return x + y;\n}\n",
    );
    let f = function(&program, "f");
    let end = block(&program, f, "label.end");

    // the goto edge is the only way in: `x = 1` sits in a dead block
    let dead = blocks_named(&program, f, "goto.after");
    assert_eq!(dead.len(), 1);
    assert!(!program.has_path(f.id, f.entry, dead[0]));
    assert!(program.has_path(f.id, f.entry, end.id));
    assert!(!program.has_path(f.id, dead[0], end.id));

    let x_writes = int_assignments(&program, f, "x");
    assert!(x_writes.contains(&1));

    // on the reachable path x is still 0 when the label is reached
    let values = returned(&program, f);
    match &program.value(values[0]).kind {
        ValueKind::BinOp { lhs, .. } => {
            assert!(!is_phi(&program, *lhs));
            assert_eq!(program.const_value(*lhs), Some(&Constant::Int(0)));
        }
        other => panic!("expected x + y, got {other:?}"),
    }
    assert_no_errors(&program);
}

#[test]
fn test_backward_goto_forms_loop() {
    let program = c(
        "int f(int n) {\n  int i = 0;\nagain:\n  i = i + 1;\n  if (i < n) goto again;\n  return i;\n}\n",
    );
    let f = function(&program, "f");
    let again = block(&program, f, "label.again");
    assert_eq!(again.preds.len(), 2);
    assert!(again
        .phis
        .iter()
        .any(|p| matches!(&program.value(*p).kind, ValueKind::Phi { variable, .. } if variable == "i")));
    assert_well_formed(&program);
}

// ========================================
// Libc side effects
// ========================================

#[test]
fn test_strcpy_rebinds_destination_to_side_effect() {
    let program = c(
        "void copy(char *src) {\n  char dst[32];\n  strcpy(dst, src);\n  printf(\"%s\", dst);\n}\n",
    );
    let f = function(&program, "copy");
    let effect = program
        .instructions(f.id)
        .into_iter()
        .find(|v| matches!(&v.kind, ValueKind::SideEffect { variable, .. } if variable == "dst"))
        .expect("side effect for dst");
    assert!(effect.variables.iter().any(|v| v == "dst"));

    let printf_args = program
        .instructions(f.id)
        .into_iter()
        .find_map(|v| match &v.kind {
            ValueKind::Call { callee, args, .. } => match &program.value(*callee).kind {
                ValueKind::ExternFunction { name } if name == "printf" => Some(args.clone()),
                _ => None,
            },
            _ => None,
        })
        .expect("printf call");
    assert_eq!(printf_args[1], effect.id);
}

#[test]
fn test_scanf_address_arguments() {
    let program = c("int read_two(void) {\n  int a, b;\n  scanf(\"%d%d\", &a, &b);\n  return a * b;\n}\n");
    let f = function(&program, "read_two");
    let written: Vec<String> = program
        .instructions(f.id)
        .into_iter()
        .filter_map(|v| match &v.kind {
            ValueKind::SideEffect { variable, .. } => Some(variable.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(written, vec!["a".to_string(), "b".to_string()]);
}

// ========================================
// Structs, pointers and control flow
// ========================================

#[test]
fn test_linked_list_translation_unit() {
    let source = r#"
#define MAX 8

typedef struct node {
    int value;
    struct node *next;
} Node;

static int count;

Node *push(Node *head, int value) {
    Node *n = malloc(sizeof(Node));
    n->value = value;
    n->next = head;
    count++;
    return n;
}

int sum(Node *head) {
    int total = 0;
    while (head != NULL) {
        total += head->value;
        head = head->next;
    }
    return total;
}

int classify(int v) {
    switch (v) {
    case 0:
        return 0;
    case 1:
    case 2:
        return 1;
    default:
        break;
    }
    return v > MAX ? 2 : 3;
}
"#;
    let program = c(source);
    assert_no_errors(&program);
    assert_well_formed(&program);

    assert_eq!(program.constant("MAX"), Some(&Constant::Int(8)));
    let node = program.blueprint_by_name("node").expect("node blueprint");
    assert_eq!(node.kind, BlueprintKind::Struct);
    assert!(node.field("value").is_some());
    assert!(program.export_types.contains_key("Node"));

    let push = function(&program, "push");
    assert!(push.built);
    assert_eq!(push.params.len(), 2);
    assert_eq!(push.side_effects.len(), 1);
    assert_eq!(push.side_effects[0].variable, "count");
    let make = program
        .instructions(push.id)
        .into_iter()
        .find(|v| matches!(v.kind, ValueKind::Make { .. }))
        .expect("malloc container");
    assert_eq!(make.ty.as_blueprint(), Some(node.id));

    let sum = function(&program, "sum");
    let header = block(&program, sum, "loop.header");
    assert!(header.phis.len() >= 2);
    assert!(program.has_path(sum.id, sum.entry, block(&program, sum, "loop.exit").id));

    let classify = function(&program, "classify");
    let cases = classify
        .blocks
        .iter()
        .find_map(|b| match &program.block(*b).terminator {
            Some(Terminator::Switch { cases, .. }) => Some(cases.len()),
            _ => None,
        })
        .expect("switch");
    assert_eq!(cases, 3);
}

#[test]
fn test_pointer_parameter_store_and_load() {
    let program = c(
        "void set(int *out) { *out = 7; }\nint get(void) { int v = 0; int *p = &v; *p = *p + 1; return v; }\n",
    );
    let get = function(&program, "get");
    let values = returned(&program, get);
    match &program.value(values[0]).kind {
        ValueKind::BinOp { lhs, .. } => {
            assert_eq!(program.const_value(*lhs), Some(&Constant::Int(0)))
        }
        other => panic!("expected v + 1, got {other:?}"),
    }

    let set = function(&program, "set");
    assert_eq!(program.value(set.params[0]).ty, Type::pointer(Type::Number));
    assert!(program
        .assignments(set.id, "*out")
        .iter()
        .any(|v| v.as_const() == Some(&Constant::Int(7))));
}

#[test]
fn test_undefined_callee_warns_but_builds() {
    let program = c("int f(void) { return mystery(1); }\n");
    assert!(program.has_diagnostic("value undefined: mystery"));
    assert!(function(&program, "f").built);
}

#[test]
fn test_program_serializes_to_json() {
    let program = c("int x = 1;\nint f(void) { return x; }\n");
    let json = program.to_json().expect("json");
    assert!(json.contains("\"language\":\"c\"") || json.contains("\"language\": \"c\""));
}
