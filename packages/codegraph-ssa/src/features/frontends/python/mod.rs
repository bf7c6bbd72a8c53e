//! Python front-end
//!
//! Module-level code is built into `@init`. Before that, every top-level
//! `def` gets its function object and every top-level `class` a blueprint
//! placeholder, so code may refer to them before their definition runs.
//! Bodies of top-level functions and of methods of top-level classes are
//! queued and built after the module; nested defs and lambdas are built
//! on the spot as closures.
//!
//! Python has no block scopes: a name assigned anywhere in a function is
//! local to it unless a `global`/`nonlocal` statement says otherwise.

mod declaration;
mod expression;
mod statement;
mod unroll;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use tracing::debug;
use tree_sitter::Node;

use super::common::record_warnings;
use crate::config::UnrollConfig;
use crate::features::parsing::{FrontendOutput, Language};
use crate::features::ssa::domain::{
    BlueprintId, Constant, FunctionId, FunctionType, Program, Type,
};
use crate::features::ssa::infrastructure::{
    BuilderContext, DeclarationTable, ProgramBuilder, Variable,
};
use crate::shared::models::Result;

#[derive(Debug, Clone)]
pub(crate) struct PendingBody<'t> {
    pub func: FunctionId,
    /// `function_definition` node
    pub node: Node<'t>,
    /// Class the function is a method of
    pub class: Option<BlueprintId>,
}

static BUILTINS: Lazy<Vec<(&'static str, FunctionType)>> = Lazy::new(|| {
    let f = |params: Vec<Type>, returns: Vec<Type>, variadic: bool| FunctionType {
        params,
        returns,
        variadic,
    };
    vec![
        ("print", f(vec![Type::Any], vec![], true)),
        ("len", f(vec![Type::Any], vec![Type::Number], false)),
        ("range", f(vec![Type::Number], vec![Type::slice(Type::Number)], true)),
        ("str", f(vec![Type::Any], vec![Type::String], false)),
        ("repr", f(vec![Type::Any], vec![Type::String], false)),
        ("int", f(vec![Type::Any], vec![Type::Number], true)),
        ("float", f(vec![Type::Any], vec![Type::Number], false)),
        ("bool", f(vec![Type::Any], vec![Type::Boolean], false)),
        ("bytes", f(vec![Type::Any], vec![Type::Bytes], true)),
        ("abs", f(vec![Type::Number], vec![Type::Number], false)),
        ("min", f(vec![Type::Any], vec![Type::Any], true)),
        ("max", f(vec![Type::Any], vec![Type::Any], true)),
        ("sum", f(vec![Type::Any], vec![Type::Number], true)),
        ("ord", f(vec![Type::String], vec![Type::Number], false)),
        ("chr", f(vec![Type::Number], vec![Type::String], false)),
        ("isinstance", f(vec![Type::Any, Type::Any], vec![Type::Boolean], false)),
        ("hasattr", f(vec![Type::Any, Type::String], vec![Type::Boolean], false)),
        ("getattr", f(vec![Type::Any, Type::String], vec![Type::Any], true)),
        ("setattr", f(vec![Type::Any, Type::String, Type::Any], vec![], false)),
        ("open", f(vec![Type::String], vec![Type::Any], true)),
        ("input", f(vec![], vec![Type::String], true)),
        ("list", f(vec![], vec![Type::slice(Type::Any)], true)),
        ("tuple", f(vec![], vec![Type::slice(Type::Any)], true)),
        ("set", f(vec![], vec![Type::slice(Type::Any)], true)),
        ("dict", f(vec![], vec![Type::map(Type::Any, Type::Any)], true)),
        ("enumerate", f(vec![Type::Any], vec![Type::Any], true)),
        ("zip", f(vec![Type::Any], vec![Type::Any], true)),
        ("iter", f(vec![Type::Any], vec![Type::Any], false)),
        ("next", f(vec![Type::Any], vec![Type::Any], true)),
        ("sorted", f(vec![Type::Any], vec![Type::slice(Type::Any)], true)),
        ("super", f(vec![], vec![Type::Any], true)),
        ("exec", f(vec![Type::Any], vec![], true)),
        ("eval", f(vec![Type::Any], vec![Type::Any], true)),
    ]
});

pub struct PythonBuilder<'t> {
    b: ProgramBuilder,
    src: &'t str,
    queue: DeclarationTable<PendingBody<'t>>,
    unroll: UnrollConfig,
    /// Top-level `def` nodes whose function was created by the
    /// declaration pass, keyed by node id
    declared: AHashMap<usize, FunctionId>,
    lambdas: usize,
}

impl<'t> BuilderContext for PythonBuilder<'t> {
    fn builder(&mut self) -> &mut ProgramBuilder {
        &mut self.b
    }
}

pub(crate) fn build_program(output: &FrontendOutput, unroll: &UnrollConfig) -> Result<Program> {
    let parsed = &output.parsed;
    let mut builder = PythonBuilder::new(&parsed.source, unroll.clone());
    record_warnings(&mut builder.b, &output.warnings);
    builder.build_module(parsed.root())?;
    Ok(builder.b.finish())
}

impl<'t> PythonBuilder<'t> {
    fn new(src: &'t str, unroll: UnrollConfig) -> Self {
        let mut b = ProgramBuilder::new("__main__", Language::Python.name(), Language::Python.tag());
        for (name, signature) in BUILTINS.iter() {
            let value = b.emit_extern_function(name, Some(signature.clone()));
            b.register_builtin(name, value);
        }
        let main = b.emit_const(Constant::Str("__main__".to_string()));
        b.set_constant("__name__", main);
        Self {
            b,
            src,
            queue: DeclarationTable::new(),
            unroll,
            declared: AHashMap::new(),
            lambdas: 0,
        }
    }

    fn text(&self, node: Node<'_>) -> &'t str {
        self.src.get(node.byte_range()).unwrap_or("")
    }

    /// Building `@init` directly, not a function body
    fn at_top_level(&self) -> bool {
        self.b.function_depth() == 1
    }

    /// Write target for a plain name: the function's own binding, a
    /// `global`/`nonlocal` capture, or a new local
    fn name_variable(&mut self, name: &str) -> Variable {
        if self.b.is_declared(name) {
            self.b.create_variable(name)
        } else {
            self.b.create_local_variable(name)
        }
    }

    fn build_module(&mut self, root: Node<'t>) -> Result<()> {
        self.declare_module(root);
        self.build_block(root);

        debug!(queued = self.queue.pending(), "draining Python function bodies");
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
    use crate::features::frontends::build_python;
    use crate::features::ssa::domain::{Program, ValueKind};

    fn build(source: &str) -> Program {
        build_python(source, &BuildConfig::default()).expect("python build")
    }

    #[test]
    fn test_call_before_definition_resolves() {
        let program = build("def a():\n    return b()\n\ndef b():\n    return 1\n");
        let a = program.function_by_name("a").expect("a");
        assert!(a.built);
        let call = program
            .instructions(a.id)
            .into_iter()
            .find(|v| v.is_call())
            .expect("call");
        match &call.kind {
            ValueKind::Call { callee, .. } => {
                assert!(matches!(program.value(*callee).kind, ValueKind::Function(_)))
            }
            other => panic!("expected call, got {:?}", other),
        }
        assert!(!program.has_diagnostic("value undefined"));
    }

    #[test]
    fn test_builtins_resolve() {
        let program = build("print(len([1, 2]))\n");
        assert!(!program.has_diagnostic("value undefined"));
        assert_eq!(program.errors().count(), 0);
    }

    #[test]
    fn test_module_assignment_is_local_to_init() {
        let program = build("x = 1\ny = x + 2\n");
        let init = program.entry_function();
        let y = program.assignments(init.id, "y");
        assert_eq!(y.len(), 1);
        assert!(matches!(y[0].kind, ValueKind::BinOp { .. }));
    }
}
