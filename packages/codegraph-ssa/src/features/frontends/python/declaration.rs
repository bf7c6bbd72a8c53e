//! Python functions, parameters and classes

use tree_sitter::Node;

use super::{PendingBody, PythonBuilder};
use crate::features::frontends::common::with_range;
use crate::features::ssa::domain::{
    messages, BlueprintId, BlueprintKind, Constant, FunctionId, FunctionType, Severity, Type,
    ValueId, ValueKind,
};
use crate::features::ssa::infrastructure::SSAResult;
use crate::shared::utils::tree_sitter::{children_by_field, named_children};

/// The `def`/`class` a (possibly decorated) statement defines
pub(super) fn definition_of(node: Node<'_>) -> Node<'_> {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

fn decorators(def: Node<'_>) -> Vec<Node<'_>> {
    def.parent()
        .filter(|p| p.kind() == "decorated_definition")
        .map(|p| {
            named_children(p)
                .into_iter()
                .filter(|c| c.kind() == "decorator")
                .collect()
        })
        .unwrap_or_default()
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

impl<'t> PythonBuilder<'t> {
    /// Function objects for top-level defs, placeholders and class objects
    /// for top-level classes
    pub(super) fn declare_module(&mut self, root: Node<'t>) {
        for item in named_children(root) {
            let def = definition_of(item);
            match def.kind() {
                "function_definition" => {
                    let func = with_range(self, &def, |ctx| ctx.declare_function(def, None));
                    self.declared.insert(def.id(), func);
                }
                "class_definition" => {
                    let Some(name) = def.child_by_field_name("name") else {
                        continue;
                    };
                    let name = self.text(name);
                    let bp = self.b.get_or_create_blueprint(name, BlueprintKind::Class);
                    let object = self.b.blueprint_object(bp);
                    self.b.set_export_value(name, object);
                }
                _ => {}
            }
        }
    }

    /// Python annotation to SSA type; unknown names are `Any`
    pub(super) fn annotation_type(&self, node: Node<'_>) -> Type {
        let text = self.text(node).trim();
        match text {
            "int" | "float" | "complex" => Type::Number,
            "str" => Type::String,
            "bytes" | "bytearray" => Type::Bytes,
            "bool" => Type::Boolean,
            "None" => Type::Null,
            _ => self.b.export_type(text).cloned().unwrap_or_default(),
        }
    }

    fn signature(&self, def: Node<'_>) -> FunctionType {
        let mut signature = FunctionType::default();
        if let Some(params) = def.child_by_field_name("parameters") {
            for param in named_children(params) {
                match param.kind() {
                    "keyword_separator" | "positional_separator" => {}
                    "list_splat_pattern" => {
                        signature.variadic = true;
                        signature.params.push(Type::slice(Type::Any));
                    }
                    "typed_parameter" | "typed_default_parameter" => signature.params.push(
                        param
                            .child_by_field_name("type")
                            .map(|t| self.annotation_type(t))
                            .unwrap_or_default(),
                    ),
                    _ => signature.params.push(Type::Any),
                }
            }
        }
        let result = def
            .child_by_field_name("return_type")
            .map(|t| self.annotation_type(t))
            .unwrap_or_default();
        signature.returns = vec![result];
        signature
    }

    /// Create the function object of a `def`. Its body is queued when the
    /// `def` sits at module level (directly or in a top-level class).
    ///
    /// Methods are named `Class.method` and registered on the blueprint;
    /// plain functions are exported under their name.
    pub(super) fn declare_function(
        &mut self,
        def: Node<'t>,
        class: Option<BlueprintId>,
    ) -> FunctionId {
        let name = def
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or("<anonymous>");
        let qualified = match class {
            Some(bp) => format!("{}.{}", self.b.program().blueprint(bp).name, name),
            None => name.to_string(),
        };
        let func = self.b.new_function(qualified.clone());
        let signature = self.signature(def);
        self.b.set_signature(func, signature);

        match class {
            Some(bp) if is_dunder(name) => self.b.add_magic_method(bp, name, func),
            Some(bp) => self.b.add_method(bp, name, func),
            None if self.at_top_level() => {
                let value = self.b.function_value(func);
                self.b.set_export_value(name, value);
            }
            None => {}
        }

        if !self.at_top_level() {
            return func;
        }
        let mut key = qualified.clone();
        let mut n = 1;
        while self.queue.get(&key).is_some() {
            key = format!("{}#{}", qualified, n);
            n += 1;
        }
        self.queue.declare(
            key,
            PendingBody {
                func,
                node: def,
                class,
            },
        );
        func
    }

    pub(super) fn build_function_body(&mut self, pending: &PendingBody<'t>) -> SSAResult<()> {
        self.b.push_function(pending.func)?;
        with_range(self, &pending.node, |ctx| {
            ctx.build_callable(pending.node, pending.class)
        });
        self.b.pop_function()?;
        Ok(())
    }

    /// Build a function right away, as a closure of the current one.
    /// Builder stack errors become diagnostics.
    fn build_now(&mut self, func: FunctionId, def: Node<'t>, class: Option<BlueprintId>) {
        let pending = PendingBody {
            func,
            node: def,
            class,
        };
        if let Err(err) = self.build_function_body(&pending) {
            let tag = self.b.tag();
            self.b.new_error(Severity::Error, tag, err.to_string());
        }
    }

    fn build_callable(&mut self, def: Node<'t>, class: Option<BlueprintId>) {
        if let Some(params) = def.child_by_field_name("parameters") {
            self.build_params(params);
        }
        let is_static = decorators(def)
            .iter()
            .any(|d| self.text(*d).trim_start_matches('@').trim() == "staticmethod");
        if let (Some(bp), false) = (class, is_static) {
            let func = self.b.current_function();
            if let Some(receiver) = self.b.program().function(func).params.first().copied() {
                self.b.set_type(receiver, Type::Blueprint(bp));
            }
        }
        if let Some(body) = def.child_by_field_name("body") {
            self.build_block(body);
        }
    }

    /// Parameters of a `def` or `lambda`
    pub(super) fn build_params(&mut self, params: Node<'t>) {
        for param in named_children(params) {
            match param.kind() {
                "identifier" => {
                    let name = self.text(param);
                    self.b.new_param(name);
                }
                "default_parameter" | "typed_default_parameter" => {
                    let Some(name) = param.child_by_field_name("name") else {
                        continue;
                    };
                    let name = self.text(name);
                    let value = self.b.new_param(name);
                    if let Some(ty) = param.child_by_field_name("type") {
                        let ty = self.annotation_type(ty);
                        self.b.set_type(value, ty);
                    }
                }
                "typed_parameter" => {
                    let ty = param
                        .child_by_field_name("type")
                        .map(|t| self.annotation_type(t))
                        .unwrap_or_default();
                    let Some(inner) = named_children(param).into_iter().next() else {
                        continue;
                    };
                    let value = self.build_splat_param(inner);
                    if !ty.is_any() && inner.kind() == "identifier" {
                        self.b.set_type(value, ty);
                    }
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    self.build_splat_param(param);
                }
                _ => {}
            }
        }
    }

    /// `name`, `*args` or `**kwargs`
    fn build_splat_param(&mut self, node: Node<'t>) -> ValueId {
        let name_node = match node.kind() {
            "identifier" => node,
            _ => named_children(node).into_iter().next().unwrap_or(node),
        };
        let name = self.text(name_node);
        let value = self.b.new_param(name);
        match node.kind() {
            "list_splat_pattern" => {
                self.b.set_type(value, Type::slice(Type::Any));
                self.b.set_variadic(true);
            }
            "dictionary_splat_pattern" => {
                self.b.set_type(value, Type::map(Type::String, Type::Any))
            }
            _ => {}
        }
        value
    }

    /// A `def` statement: top-level functions already exist, nested ones
    /// are built here. Decorators are applied innermost first.
    pub(super) fn build_def_statement(&mut self, def: Node<'t>) {
        let Some(name) = def.child_by_field_name("name").map(|n| self.text(n)) else {
            return;
        };
        let func = match self.declared.get(&def.id()) {
            Some(func) => *func,
            None => {
                let qualified = if self.at_top_level() {
                    name.to_string()
                } else {
                    format!("{}.{}", self.b.function_name(), name)
                };
                let func = self.b.new_function(qualified);
                let signature = self.signature(def);
                self.b.set_signature(func, signature);
                self.build_now(func, def, None);
                func
            }
        };

        let function = self.b.function_value(func);
        let value = self.apply_decorators(def, function);
        if self.at_top_level() {
            self.b.set_export_value(name, value);
        } else {
            let variable = self.name_variable(name);
            self.b.assign_variable(&variable, value);
        }
    }

    fn apply_decorators(&mut self, def: Node<'t>, mut value: ValueId) -> ValueId {
        for decorator in decorators(def).into_iter().rev() {
            let Some(expr) = named_children(decorator).into_iter().next() else {
                continue;
            };
            let callee = self.build_expr(expr);
            let call = self.b.new_call(callee, vec![value]);
            value = self.b.emit_call(call);
        }
        value
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Classes
    // ═══════════════════════════════════════════════════════════════════════

    /// `class Name(Bases): body`
    pub(super) fn build_class(&mut self, node: Node<'t>) {
        let Some(name) = node.child_by_field_name("name").map(|n| self.text(n)) else {
            return;
        };
        let bp = self.b.create_blueprint(name, BlueprintKind::Class);
        self.b.begin_blueprint(bp);

        if let Some(bases) = node.child_by_field_name("superclasses") {
            for base in named_children(bases) {
                let parent_name = match base.kind() {
                    "identifier" => self.text(base),
                    "attribute" => base
                        .child_by_field_name("attribute")
                        .map(|a| self.text(a))
                        .unwrap_or(""),
                    // `metaclass=...` and friends
                    _ => continue,
                };
                if parent_name.is_empty() || parent_name == "object" {
                    continue;
                }
                let parent = self.b.get_or_create_blueprint(parent_name, BlueprintKind::Class);
                if self.b.add_parent(bp, parent).is_err() {
                    let tag = self.b.tag();
                    self.b.new_error(
                        Severity::Error,
                        tag,
                        messages::inheritance_cycle(name, parent_name),
                    );
                }
            }
        }

        let object = self.b.blueprint_object(bp);
        if self.at_top_level() {
            self.b.set_export_value(name, object);
        } else {
            let variable = self.name_variable(name);
            self.b.assign_variable(&variable, object);
        }

        if let Some(body) = node.child_by_field_name("body") {
            for item in named_children(body) {
                with_range(self, &item, |ctx| ctx.build_class_item(bp, item));
            }
        }
        self.b.complete_blueprint(bp);
    }

    fn build_class_item(&mut self, bp: BlueprintId, item: Node<'t>) {
        let def = definition_of(item);
        match def.kind() {
            "function_definition" => {
                let func = self.declare_function(def, Some(bp));
                if !self.at_top_level() {
                    self.build_now(func, def, Some(bp));
                }
            }
            "expression_statement" => {
                let fields: Vec<Node<'t>> = named_children(item)
                    .into_iter()
                    .filter(|c| c.kind() == "assignment")
                    .collect();
                if fields.is_empty() {
                    self.build_statement(item);
                }
                for assignment in fields {
                    self.build_class_field(bp, assignment);
                }
            }
            _ => self.build_statement(item),
        }
    }

    /// `name = value` / `name: T = value` in a class body
    fn build_class_field(&mut self, bp: BlueprintId, assignment: Node<'t>) {
        let Some(left) = assignment.child_by_field_name("left") else {
            return;
        };
        let annotated = assignment
            .child_by_field_name("type")
            .map(|t| self.annotation_type(t));
        let value = assignment
            .child_by_field_name("right")
            .map(|r| self.build_expr(r));
        if left.kind() != "identifier" {
            if let Some(value) = value {
                self.assign_target(left, value);
            }
            return;
        }
        let name = self.text(left);
        let ty = match (annotated, value) {
            (Some(ty), _) if !ty.is_any() => ty,
            (_, Some(v)) => self.b.value_type(v).clone(),
            _ => Type::Any,
        };
        self.b.add_field(bp, name, ty, value);
    }

    /// Record `obj.attr = value` as a field when `obj` is an instance
    pub(super) fn record_attribute(&mut self, object: ValueId, attr: &str, value: ValueId) {
        if matches!(self.b.value(object).kind, ValueKind::ClassObject(_)) {
            return;
        }
        let Some(bp) = self.b.value_type(object).as_blueprint() else {
            return;
        };
        if self.b.program().blueprint(bp).field(attr).is_none() {
            let ty = self.b.value_type(value).clone();
            self.b.add_field(bp, attr, ty, None);
        }
    }

    /// Fields with class-level defaults, as `Make` members
    pub(super) fn default_members(&mut self, bp: BlueprintId) -> Vec<(ValueId, ValueId)> {
        let defaults: Vec<(String, ValueId)> = self
            .b
            .program()
            .blueprint(bp)
            .fields
            .iter()
            .filter_map(|f| f.default.map(|d| (f.name.clone(), d)))
            .collect();
        defaults
            .into_iter()
            .map(|(name, default)| {
                let key = self.b.emit_const(Constant::Str(name));
                (key, default)
            })
            .collect()
    }

    /// Names listed by a `global`/`nonlocal` statement
    pub(super) fn scope_names(&self, node: Node<'t>) -> Vec<&'t str> {
        let mut names: Vec<&'t str> = children_by_field(node, "name")
            .into_iter()
            .map(|n| self.text(n))
            .collect();
        if names.is_empty() {
            names = named_children(node)
                .into_iter()
                .filter(|n| n.kind() == "identifier")
                .map(|n| self.text(n))
                .collect();
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BuildConfig;
    use crate::features::frontends::build_python;
    use crate::features::ssa::domain::{BlueprintKind, Program, Type, ValueKind};

    fn build(source: &str) -> Program {
        build_python(source, &BuildConfig::default()).expect("python build")
    }

    #[test]
    fn test_class_fields_methods_and_init() {
        let program = build(
            "class Point:\n    dims = 2\n    def __init__(self, x):\n        self.x = x\n    def norm(self):\n        return self.x\n",
        );
        let bp = program.blueprint_by_name("Point").expect("blueprint");
        assert_eq!(bp.kind, BlueprintKind::Class);
        assert!(bp.field("dims").is_some());
        assert!(bp.field("x").is_some());
        assert!(bp.methods.contains_key("norm"));
        let init = bp.constructor().expect("__init__");
        assert_eq!(program.function(init).name, "Point.__init__");
        let norm = program.function_by_name("Point.norm").expect("method");
        let receiver = norm.params[0];
        assert_eq!(program.value(receiver).ty, Type::Blueprint(bp.id));
    }

    #[test]
    fn test_calling_class_makes_object_and_calls_init() {
        let program = build(
            "class A:\n    def __init__(self, v):\n        self.v = v\n\na = A(1)\n",
        );
        let bp = program.blueprint_by_name("A").expect("A");
        let init = program.entry_function();
        let a = program.assignments(init.id, "a");
        assert_eq!(a.len(), 1);
        assert!(matches!(a[0].kind, ValueKind::Make { .. }));
        assert_eq!(a[0].ty, Type::Blueprint(bp.id));
        let ctor = bp.constructor().expect("__init__");
        let ctor_value = program.function(ctor).value;
        let calls_init = program.instructions(init.id).into_iter().any(|v| match &v.kind {
            ValueKind::Call { callee, args, .. } => *callee == ctor_value && args[0] == a[0].id,
            _ => false,
        });
        assert!(calls_init);
    }

    #[test]
    fn test_inheritance_cycle_is_reported() {
        let program = build("class A(B):\n    pass\n\nclass B(A):\n    pass\n");
        assert!(program.has_diagnostic("inheritance cycle"));
        let a = program.blueprint_by_name("A").expect("A");
        let b = program.blueprint_by_name("B").expect("B");
        assert_eq!(a.parents, vec![b.id]);
        assert!(b.parents.is_empty());
    }

    #[test]
    fn test_inherited_method_resolves_on_instance() {
        let program = build(
            "class Base:\n    def hello(self):\n        return 1\n\nclass Child(Base):\n    pass\n\nc = Child()\nr = c.hello()\n",
        );
        let hello = program.function_by_name("Base.hello").expect("method");
        let init = program.entry_function();
        let r = program.assignments(init.id, "r");
        match &r[0].kind {
            ValueKind::Call { callee, args, .. } => {
                assert_eq!(*callee, hello.value);
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_def_is_closure_with_capture() {
        let program = build(
            "def outer():\n    n = 1\n    def inner():\n        return n\n    return inner\n",
        );
        let inner = program.function_by_name("outer.inner").expect("inner");
        assert!(inner.built);
        assert_eq!(inner.free_values.len(), 1);
        let outer = program.function_by_name("outer").expect("outer");
        assert_eq!(inner.parent, Some(outer.id));
    }

    #[test]
    fn test_params_defaults_splats_and_annotations() {
        let program = build("def f(a, b: int, c=1, *rest, **kw) -> str:\n    return a\n");
        let f = program.function_by_name("f").expect("f");
        assert_eq!(f.params.len(), 5);
        assert!(f.is_variadic());
        assert_eq!(program.value(f.params[1]).ty, Type::Number);
        assert_eq!(f.signature.returns, vec![Type::String]);
    }

    #[test]
    fn test_decorator_wraps_function() {
        let program = build("def deco(f):\n    return f\n\n@deco\ndef g():\n    pass\n");
        let g = program.export_value("g").expect("g");
        assert!(program.value(g).is_call());
    }
}
