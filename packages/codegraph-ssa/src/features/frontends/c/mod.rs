//! C front-end
//!
//! Pass order over a `translation_unit`:
//! 1. object-like `#define`s with literal values (only present when the
//!    preprocessor did not run)
//! 2. struct/union/enum specifiers and typedefs
//! 3. function definitions and prototypes; bodies are queued
//! 4. global variable declarations, built into `@init`
//! 5. queued bodies, in declaration order
//!
//! `#if`/`#ifdef` groups left in raw source are flattened: every branch is
//! visited.

mod builtins;
mod declaration;
mod expression;
mod statement;

use ahash::{AHashMap, AHashSet};
use tracing::debug;
use tree_sitter::Node;

use super::common::{record_warnings, with_range};
use crate::features::parsing::{FrontendOutput, Language};
use crate::features::ssa::domain::{FunctionId, Program, Type, ValueId};
use crate::features::ssa::infrastructure::{
    BuilderContext, DeclarationTable, ProgramBuilder, Variable,
};
use crate::shared::models::Result;
use crate::shared::utils::tree_sitter::named_children;

/// A function definition whose body is waiting in the queue
#[derive(Debug, Clone)]
pub(crate) struct PendingBody<'t> {
    pub func: FunctionId,
    /// `function_definition` node
    pub node: Node<'t>,
    /// `parameter_list` of the declarator naming the function
    pub params: Option<Node<'t>>,
}

const PREPROC_GROUPS: &[&str] = &[
    "preproc_if",
    "preproc_ifdef",
    "preproc_else",
    "preproc_elif",
    "preproc_elifdef",
];

pub struct CBuilder<'t> {
    b: ProgramBuilder,
    src: &'t str,
    queue: DeclarationTable<PendingBody<'t>>,
    /// Functions by name, so a prototype and its definition share one
    functions: AHashMap<String, FunctionId>,
    /// Variable a pointer value was taken from (`p = &x`)
    origins: AHashMap<ValueId, Variable>,
    /// struct/union/enum specifiers already declared, by node id
    specifiers: AHashMap<usize, Type>,
    /// Anonymous struct/union counter
    anonymous: usize,
}

impl<'t> BuilderContext for CBuilder<'t> {
    fn builder(&mut self) -> &mut ProgramBuilder {
        &mut self.b
    }
}

pub(crate) fn build_program(output: &FrontendOutput) -> Result<Program> {
    let parsed = &output.parsed;
    let mut builder = CBuilder::new(&parsed.source);
    record_warnings(&mut builder.b, &output.warnings);
    builder.build_translation_unit(parsed.root())?;
    Ok(builder.b.finish())
}

/// Top-level items, with preprocessor conditional groups flattened
fn flatten_items<'t>(node: Node<'t>, items: &mut Vec<Node<'t>>) {
    let skip: AHashSet<usize> = ["condition", "name"]
        .iter()
        .filter_map(|field| node.child_by_field_name(field))
        .map(|n| n.id())
        .collect();
    for child in named_children(node) {
        if skip.contains(&child.id()) && PREPROC_GROUPS.contains(&node.kind()) {
            continue;
        }
        if PREPROC_GROUPS.contains(&child.kind()) {
            flatten_items(child, items);
        } else {
            items.push(child);
        }
    }
}

impl<'t> CBuilder<'t> {
    fn new(src: &'t str) -> Self {
        let mut b = ProgramBuilder::new("main", Language::C.name(), Language::C.tag());
        for function in builtins::LIBC.iter() {
            let value = b.emit_extern_function(function.name, Some(function.signature.clone()));
            b.register_builtin(function.name, value);
        }
        for (name, constant) in builtins::CONSTANTS.iter() {
            let value = b.emit_const(constant.clone());
            b.set_constant(name, value);
        }
        Self {
            b,
            src,
            queue: DeclarationTable::new(),
            functions: AHashMap::new(),
            origins: AHashMap::new(),
            specifiers: AHashMap::new(),
            anonymous: 0,
        }
    }

    fn text(&self, node: Node<'_>) -> &'t str {
        self.src.get(node.byte_range()).unwrap_or("")
    }

    /// Building `@init` directly, not a function body
    fn at_top_level(&self) -> bool {
        self.b.function_depth() == 1
    }

    fn build_translation_unit(&mut self, root: Node<'t>) -> Result<()> {
        let mut items = Vec::new();
        flatten_items(root, &mut items);

        for item in &items {
            if item.kind() == "preproc_def" {
                with_range(self, item, |ctx| ctx.build_define(*item));
            }
        }

        for item in &items {
            match item.kind() {
                "type_definition" => with_range(self, item, |ctx| ctx.build_typedef(*item)),
                "declaration" => {
                    if let Some(ty) = item.child_by_field_name("type") {
                        with_range(self, item, |ctx| {
                            ctx.c_type(ty);
                        });
                    }
                }
                "struct_specifier" | "union_specifier" | "enum_specifier" => {
                    with_range(self, item, |ctx| {
                        ctx.c_type(*item);
                    });
                }
                _ => {}
            }
        }

        for item in &items {
            match item.kind() {
                "function_definition" => {
                    with_range(self, item, |ctx| ctx.declare_function(*item, true))
                }
                "declaration" => with_range(self, item, |ctx| ctx.declare_function(*item, false)),
                _ => {}
            }
        }

        for item in &items {
            if item.kind() == "declaration" {
                with_range(self, item, |ctx| ctx.build_declaration(*item));
            }
        }

        debug!(queued = self.queue.pending(), "draining C function bodies");
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
    use crate::features::frontends::build_c;
    use crate::features::ssa::domain::{Constant, Program, ValueKind};

    fn build(source: &str) -> Program {
        build_c(source, &BuildConfig::default().without_preprocessor()).expect("c build")
    }

    #[test]
    fn test_call_before_definition_resolves() {
        let program = build("int a(void) { return b(); }\nint b(void) { return 1; }\n");
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
    fn test_builtin_constants() {
        let program = build("int f(void) { return EOF + BUFSIZ; }\n");
        assert_eq!(program.constant("EOF"), Some(&Constant::Int(-1)));
        assert_eq!(program.constant("SEEK_END"), Some(&Constant::Int(2)));
        assert_eq!(program.constant("NULL"), Some(&Constant::Nil));
        assert!(!program.has_diagnostic("value undefined"));
    }

    #[test]
    fn test_raw_defines_and_conditional_groups() {
        let program = build(
            "#define SIZE 16\n#define NAME \"demo\"\n#ifdef DEBUG\nint debug_level = 1;\n#else\nint debug_level = 0;\n#endif\nint size(void) { return SIZE; }\n",
        );
        assert_eq!(program.constant("SIZE"), Some(&Constant::Int(16)));
        assert_eq!(program.constant("NAME"), Some(&Constant::Str("demo".into())));
        assert!(program.export_value("debug_level").is_some());
        assert!(program.function_by_name("size").expect("size").built);
    }

    #[test]
    fn test_program_metadata() {
        let program = build("int x;\n");
        assert_eq!(program.language, "c");
        assert_eq!(program.entry_function().name, "@init");
        assert!(program.builtins.contains_key("strcpy"));
    }
}
