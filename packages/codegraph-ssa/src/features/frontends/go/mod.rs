//! Go front-end
//!
//! Pass order over a `source_file`:
//! 1. package clause and imports
//! 2. type specs (blueprint placeholders first, so types may refer to
//!    each other in any order, then aliases, then struct bodies)
//! 3. function and method signatures; bodies are queued
//! 4. top-level `var`/`const` specs, built into `@init`
//! 5. queued bodies, in declaration order
//!
//! Func literals are built on the spot as closures of the function that
//! contains them.

mod declaration;
mod expression;
mod statement;

use once_cell::sync::Lazy;
use tracing::debug;
use tree_sitter::Node;

use super::common::{record_warnings, with_range};
use crate::features::parsing::{FrontendOutput, Language};
use crate::features::ssa::domain::{BlueprintId, FunctionId, FunctionType, Program, Type};
use crate::features::ssa::infrastructure::{
    BuilderContext, DeclarationTable, ProgramBuilder, Variable,
};
use crate::shared::models::Result;
use crate::shared::utils::tree_sitter::named_children;

/// A function or method whose body is waiting in the queue
#[derive(Debug, Clone)]
pub(crate) struct PendingBody<'t> {
    pub func: FunctionId,
    pub node: Node<'t>,
    pub receiver: Option<BlueprintId>,
}

static BUILTINS: Lazy<Vec<(&'static str, FunctionType)>> = Lazy::new(|| {
    let f = |params: Vec<Type>, returns: Vec<Type>, variadic: bool| FunctionType {
        params,
        returns,
        variadic,
    };
    vec![
        ("len", f(vec![Type::Any], vec![Type::Number], false)),
        ("cap", f(vec![Type::Any], vec![Type::Number], false)),
        ("append", f(vec![Type::Any, Type::Any], vec![Type::Any], true)),
        ("copy", f(vec![Type::Any, Type::Any], vec![Type::Number], false)),
        ("delete", f(vec![Type::Any, Type::Any], vec![], false)),
        ("close", f(vec![Type::Any], vec![], false)),
        ("clear", f(vec![Type::Any], vec![], false)),
        ("panic", f(vec![Type::Any], vec![], false)),
        ("recover", f(vec![], vec![Type::Any], false)),
        ("print", f(vec![Type::Any], vec![], true)),
        ("println", f(vec![Type::Any], vec![], true)),
        ("min", f(vec![Type::Number], vec![Type::Number], true)),
        ("max", f(vec![Type::Number], vec![Type::Number], true)),
        ("complex", f(vec![Type::Number, Type::Number], vec![Type::Number], false)),
        ("real", f(vec![Type::Any], vec![Type::Number], false)),
        ("imag", f(vec![Type::Any], vec![Type::Number], false)),
    ]
});

pub struct GoBuilder<'t> {
    b: ProgramBuilder,
    src: &'t str,
    queue: DeclarationTable<PendingBody<'t>>,
    /// Index of the const spec being built (`iota`)
    iota: Option<i64>,
    /// Label of the labeled statement whose loop/switch is being built
    pending_label: Option<String>,
    /// Named results of the functions being built, innermost last
    results: Vec<Vec<Variable>>,
    closures: usize,
}

impl<'t> BuilderContext for GoBuilder<'t> {
    fn builder(&mut self) -> &mut ProgramBuilder {
        &mut self.b
    }
}

pub(crate) fn build_program(output: &FrontendOutput) -> Result<Program> {
    let parsed = &output.parsed;
    let mut builder = GoBuilder::new(&parsed.source);
    record_warnings(&mut builder.b, &output.warnings);
    builder.build_source_file(parsed.root())?;
    Ok(builder.b.finish())
}

impl<'t> GoBuilder<'t> {
    fn new(src: &'t str) -> Self {
        let mut b = ProgramBuilder::new("main", Language::Go.name(), Language::Go.tag());
        for (name, signature) in BUILTINS.iter() {
            let value = b.emit_extern_function(name, Some(signature.clone()));
            b.register_builtin(name, value);
        }
        Self {
            b,
            src,
            queue: DeclarationTable::new(),
            iota: None,
            pending_label: None,
            results: Vec::new(),
            closures: 0,
        }
    }

    fn text(&self, node: Node<'_>) -> &'t str {
        self.src.get(node.byte_range()).unwrap_or("")
    }

    fn build_source_file(&mut self, root: Node<'t>) -> Result<()> {
        let items = named_children(root);

        for item in &items {
            match item.kind() {
                "package_clause" => {
                    if let Some(name) = named_children(*item).first() {
                        let name = self.text(*name);
                        self.b.set_package(name);
                    }
                }
                "import_declaration" => with_range(self, item, |ctx| ctx.build_imports(*item)),
                _ => {}
            }
        }

        let type_specs: Vec<Node<'t>> = items
            .iter()
            .filter(|n| n.kind() == "type_declaration")
            .flat_map(|n| named_children(*n))
            .collect();
        self.declare_types(&type_specs);

        for item in &items {
            match item.kind() {
                "function_declaration" | "method_declaration" => {
                    with_range(self, item, |ctx| ctx.declare_function(*item))
                }
                _ => {}
            }
        }

        for item in &items {
            match item.kind() {
                "var_declaration" | "const_declaration" => {
                    with_range(self, item, |ctx| ctx.build_statement(*item))
                }
                _ => {}
            }
        }

        debug!(queued = self.queue.pending(), "draining Go function bodies");
        while let Some((name, pending)) = self.queue.next() {
            self.build_function_body(&pending)?;
            self.queue.mark_built(&name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BuildConfig;
    use crate::features::frontends::build_go;
    use crate::features::ssa::domain::{Constant, Program, ValueKind};

    fn build(source: &str) -> Program {
        build_go(source, &BuildConfig::default()).expect("go build")
    }

    #[test]
    fn test_functions_are_declared_before_bodies() {
        let program = build(
            "package main\nfunc a() int { return b() }\nfunc b() int { return 1 }\n",
        );
        let a = program.function_by_name("a").expect("a");
        assert!(a.built);
        let calls: Vec<_> = program
            .instructions(a.id)
            .into_iter()
            .filter(|v| v.is_call())
            .collect();
        assert_eq!(calls.len(), 1);
        match &calls[0].kind {
            ValueKind::Call { callee, .. } => {
                assert!(matches!(program.value(*callee).kind, ValueKind::Function(_)))
            }
            other => panic!("expected call, got {:?}", other),
        }
        assert_eq!(program.errors().count(), 0);
    }

    #[test]
    fn test_builtins_resolve() {
        let program = build("package main\nfunc f(xs []int) int { return len(xs) }\n");
        assert!(!program.has_diagnostic("value undefined"));
        assert!(program.builtins.contains_key("append"));
    }

    #[test]
    fn test_top_level_const_is_folded_program_constant() {
        let program = build("package main\nconst Answer = 6 * 7\n");
        assert_eq!(program.constant("Answer"), Some(&Constant::Int(42)));
        let program = build("package main\nconst Name = \"x\"\n");
        assert_eq!(program.constant("Name"), Some(&Constant::Str("x".into())));
    }
}
