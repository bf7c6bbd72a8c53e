//! Property-based tests for SSA construction
//!
//! - randomly nested if/while programs stay well-formed in C and Python
//! - integer literals agree across radices
//! - range unrolling scales with the range and stops at the cap
//! - YAML configuration round-trips and rejects unknown keys

#[path = "../common/mod.rs"]
mod common;

use codegraph_ssa::config::{BuildConfig, ConfigError};
use codegraph_ssa::features::frontends::literals::parse_int;
use codegraph_ssa::{BinaryOp, Constant, Language, ValueKind};
use common::*;
use proptest::prelude::*;

// ========================================
// Program generator
// ========================================

const VARS: [&str; 3] = ["a", "b", "c"];

#[derive(Debug, Clone)]
enum Stmt {
    /// `target = source + k`
    Assign(usize, usize, i64),
    If(Vec<Stmt>, Vec<Stmt>),
    While(Vec<Stmt>),
}

fn assign() -> impl Strategy<Value = Stmt> {
    (0..VARS.len(), 0..VARS.len(), 0..10i64).prop_map(|(t, s, k)| Stmt::Assign(t, s, k))
}

fn stmt() -> impl Strategy<Value = Stmt> {
    assign().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            2 => assign(),
            1 => (
                prop::collection::vec(inner.clone(), 1..4),
                prop::collection::vec(inner.clone(), 0..3)
            )
                .prop_map(|(then, otherwise)| Stmt::If(then, otherwise)),
            1 => prop::collection::vec(inner, 1..4).prop_map(Stmt::While),
        ]
    })
}

fn body() -> impl Strategy<Value = Vec<Stmt>> {
    prop::collection::vec(stmt(), 1..6)
}

fn render_python(stmts: &[Stmt], depth: usize, out: &mut String) {
    let pad = "    ".repeat(depth);
    for stmt in stmts {
        match stmt {
            Stmt::Assign(t, s, k) => {
                out.push_str(&format!("{pad}{} = {} + {k}\n", VARS[*t], VARS[*s]))
            }
            Stmt::If(then, otherwise) => {
                out.push_str(&format!("{pad}if p > {depth}:\n"));
                render_python(then, depth + 1, out);
                if !otherwise.is_empty() {
                    out.push_str(&format!("{pad}else:\n"));
                    render_python(otherwise, depth + 1, out);
                }
            }
            Stmt::While(inner) => {
                out.push_str(&format!("{pad}while p > {depth}:\n"));
                render_python(inner, depth + 1, out);
            }
        }
    }
}

fn render_c(stmts: &[Stmt], out: &mut String) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign(t, s, k) => out.push_str(&format!("{} = {} + {k};\n", VARS[*t], VARS[*s])),
            Stmt::If(then, otherwise) => {
                out.push_str("if (p > 0) {\n");
                render_c(then, out);
                out.push('}');
                if !otherwise.is_empty() {
                    out.push_str(" else {\n");
                    render_c(otherwise, out);
                    out.push('}');
                }
                out.push('\n');
            }
            Stmt::While(inner) => {
                out.push_str("while (p > 0) {\n");
                render_c(inner, out);
                out.push_str("}\n");
            }
        }
    }
}

fn python_function(stmts: &[Stmt]) -> String {
    let mut source = String::from("def f(p):\n    a = 0\n    b = 0\n    c = 0\n");
    render_python(stmts, 1, &mut source);
    source.push_str("    return a + b + c\n");
    source
}

fn c_function(stmts: &[Stmt]) -> String {
    let mut source = String::from("int f(int p) {\nint a = 0, b = 0, c = 0;\n");
    render_c(stmts, &mut source);
    source.push_str("return a + b + c;\n}\n");
    source
}

fn count_binops(program: &codegraph_ssa::Program, op: BinaryOp) -> usize {
    let init = program.entry_function();
    program
        .instructions(init.id)
        .into_iter()
        .filter(|v| matches!(&v.kind, ValueKind::BinOp { op: o, .. } if *o == op))
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every read has exactly one reaching definition per edge
    #[test]
    fn prop_python_programs_are_well_formed(stmts in body()) {
        let program = python(&python_function(&stmts));
        assert_well_formed(&program);
        assert_no_errors(&program);
        prop_assert!(!program.has_diagnostic("value undefined"));
        prop_assert!(function(&program, "f").built);
    }

    #[test]
    fn prop_c_programs_are_well_formed(stmts in body()) {
        let program = c(&c_function(&stmts));
        assert_well_formed(&program);
        assert_no_errors(&program);
        prop_assert!(!program.has_diagnostic("value undefined"));
    }

    /// Property: every radix spells the same number
    #[test]
    fn prop_integer_radices_agree(n in any::<u32>()) {
        let expected = Some(i64::from(n));
        for language in [Language::C, Language::Go, Language::Python] {
            prop_assert_eq!(parse_int(&format!("0x{n:X}"), language), expected);
            prop_assert_eq!(parse_int(&format!("0b{n:b}"), language), expected);
            prop_assert_eq!(parse_int(&n.to_string(), language), expected);
        }
        prop_assert_eq!(parse_int(&format!("0{n:o}"), Language::C), expected);
        prop_assert_eq!(parse_int(&format!("0o{n:o}"), Language::Go), expected);
        prop_assert_eq!(parse_int(&format!("0o{n:o}"), Language::Python), expected);
    }

    #[test]
    fn prop_c_literals_build_to_constants(n in 0u32..1_000_000) {
        let program = c(&format!("int h = 0x{n:x};\nint o = 0{n:o};\nint d = {n};\n"));
        for name in ["h", "o", "d"] {
            prop_assert_eq!(export_const(&program, name), Some(Constant::Int(i64::from(n))));
        }
    }

    /// Property: a range body is emitted once per value, up to the cap
    #[test]
    fn prop_range_unroll_scales_linearly(n in 0usize..300) {
        let program = python(&format!("total = 0\nfor i in range({n}):\n    total = total + i\n"));
        let init = program.entry_function();
        let unrolled = n.min(256);
        prop_assert_eq!(int_assignments(&program, init, "i").len(), unrolled);
        let rest = usize::from(n > 256);
        prop_assert_eq!(count_binops(&program, BinaryOp::Add), unrolled + rest);
        prop_assert_eq!(blocks_named(&program, init, "loop.header").len(), rest);
    }

    /// Property: any valid configuration survives a YAML round trip
    #[test]
    fn prop_config_yaml_roundtrip(
        force in any::<bool>(),
        enabled in any::<bool>(),
        range_cap in 1usize..=4096,
        while_cap in 1usize..=4096,
        timeout_ms in 1u64..=600_000,
        fallback in any::<bool>(),
    ) {
        let mut config = BuildConfig::default();
        config.force = force;
        config.unroll.enabled = enabled;
        config.unroll.max_range_iterations = range_cap;
        config.unroll.max_while_iterations = while_cap;
        config.preprocessor.timeout_ms = timeout_ms;
        config.preprocessor.fallback_to_raw = fallback;

        let yaml = config.to_yaml().expect("serialize");
        let parsed = BuildConfig::from_yaml_str(&yaml).expect("parse");
        prop_assert_eq!(parsed, config);
    }

    #[test]
    fn prop_config_rejects_unknown_keys(key in "[a-z]{3,12}") {
        prop_assume!(!matches!(key.as_str(), "version" | "force" | "unroll" | "preprocessor"));
        let result = BuildConfig::from_yaml_str(&format!("version: 1\n{key}: 1\n"));
        prop_assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn prop_config_rejects_out_of_range_caps(cap in 4097usize..100_000) {
        let result = BuildConfig::from_yaml_str(&format!(
            "version: 1\nunroll:\n  max_range_iterations: {cap}\n"
        ));
        prop_assert!(
            matches!(result, Err(ConfigError::Range { .. })),
            "Expected a range error"
        );
    }
}
