//! Go declarations: imports, types, functions, methods, var and const specs

use tree_sitter::Node;

use super::{GoBuilder, PendingBody};
use crate::features::frontends::common::with_range;
use crate::features::frontends::literals::unquote_double;
use crate::features::ssa::domain::{
    messages, BlueprintId, BlueprintKind, Constant, FunctionType, Severity, Type, ValueId,
};
use crate::features::ssa::infrastructure::SSAResult;
use crate::shared::utils::tree_sitter::{
    children_by_field, find_descendants_by_kind, named_children, node_to_span,
};

/// Go predeclared types
fn basic_type(name: &str) -> Option<Type> {
    Some(match name {
        "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32"
        | "uint64" | "uintptr" | "float32" | "float64" | "complex64" | "complex128" | "byte"
        | "rune" => Type::Number,
        "string" => Type::String,
        "bool" => Type::Boolean,
        "error" => Type::Interface,
        "any" => Type::Any,
        _ => return None,
    })
}

impl<'t> GoBuilder<'t> {
    // ═══════════════════════════════════════════════════════════════════════
    // Imports
    // ═══════════════════════════════════════════════════════════════════════

    pub(super) fn build_imports(&mut self, node: Node<'t>) {
        for spec in find_descendants_by_kind(node, "import_spec", |_| false) {
            let Some(path_node) = spec.child_by_field_name("path") else {
                continue;
            };
            let path = unquote_double(self.text(path_node));
            let name = match spec.child_by_field_name("name") {
                Some(alias) => self.text(alias).to_string(),
                None => path.rsplit('/').next().unwrap_or(&path).to_string(),
            };
            if name == "_" || name == "." {
                continue;
            }
            self.b.import_lib(&name, &path);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Types
    // ═══════════════════════════════════════════════════════════════════════

    /// Register `type` specs. Struct and interface names get their
    /// blueprint up front so any spec may refer to any other.
    pub(super) fn declare_types(&mut self, specs: &[Node<'t>]) {
        let mut structs = Vec::new();
        for spec in specs {
            let (Some(name), Some(ty)) = (
                spec.child_by_field_name("name"),
                spec.child_by_field_name("type"),
            ) else {
                continue;
            };
            let name = self.text(name);
            match ty.kind() {
                "struct_type" => {
                    let id = self.b.get_or_create_blueprint(name, BlueprintKind::Struct);
                    structs.push((id, ty));
                }
                "interface_type" => {
                    let id = self.b.create_blueprint(name, BlueprintKind::Interface);
                    self.b.complete_blueprint(id);
                }
                _ => {}
            }
        }

        for spec in specs {
            let (Some(name), Some(ty)) = (
                spec.child_by_field_name("name"),
                spec.child_by_field_name("type"),
            ) else {
                continue;
            };
            if matches!(ty.kind(), "struct_type" | "interface_type") {
                continue;
            }
            let name = self.text(name);
            let inner = self.go_type(ty);
            self.b.set_export_type(
                name,
                Type::Alias {
                    name: name.to_string(),
                    inner: Box::new(inner),
                },
            );
        }

        for (id, ty) in structs {
            with_range(self, &ty, |ctx| {
                ctx.b.begin_blueprint(id);
                ctx.build_struct_fields(id, ty);
                ctx.b.complete_blueprint(id);
            });
        }
    }

    fn build_struct_fields(&mut self, id: BlueprintId, ty: Node<'t>) {
        for field in find_descendants_by_kind(ty, "field_declaration", |n| n.kind() == "struct_type") {
            let Some(type_node) = field.child_by_field_name("type") else {
                continue;
            };
            let mut field_ty = self.go_type(type_node);
            let names = children_by_field(field, "name");
            if names.is_empty() {
                // embedded field: named after its type, fields and methods promoted
                let pointer = self.text(field).trim_start().starts_with('*');
                if pointer {
                    field_ty = Type::pointer(field_ty);
                }
                let type_name = self.text(type_node);
                let short = type_name.rsplit('.').next().unwrap_or(type_name);
                self.b.add_anonymous_field(id, short, field_ty.clone());
                if let Some(parent) = field_ty.as_blueprint() {
                    if let Err(err) = self.b.add_parent(id, parent) {
                        self.report_cycle(&err.to_string());
                    }
                }
                continue;
            }
            for name in names {
                let name = self.text(name);
                self.b.add_field(id, name, field_ty.clone(), None);
            }
        }
    }

    fn report_cycle(&mut self, detail: &str) {
        let tag = self.b.tag();
        self.b.new_error(Severity::Error, tag, detail.to_string());
    }

    /// Type bound to a type name, if any
    pub(super) fn named_type(&self, name: &str) -> Option<Type> {
        basic_type(name).or_else(|| self.b.export_type(name).cloned())
    }

    /// Type denoted by a type node
    pub(super) fn go_type(&mut self, node: Node<'t>) -> Type {
        match node.kind() {
            "type_identifier" | "identifier" => {
                let name = self.text(node);
                self.named_type(name).unwrap_or_default()
            }
            "pointer_type" => match named_children(node).first() {
                Some(inner) => Type::pointer(self.go_type(*inner)),
                None => Type::pointer(Type::Any),
            },
            "slice_type" | "array_type" | "implicit_length_array_type" => {
                match node.child_by_field_name("element") {
                    Some(element) => {
                        let element = self.go_type(element);
                        if element == Type::Number && self.text(node).ends_with("byte") {
                            Type::Bytes
                        } else {
                            Type::slice(element)
                        }
                    }
                    None => Type::slice(Type::Any),
                }
            }
            "map_type" => {
                let key = node
                    .child_by_field_name("key")
                    .map(|k| self.go_type(k))
                    .unwrap_or_default();
                let value = node
                    .child_by_field_name("value")
                    .map(|v| self.go_type(v))
                    .unwrap_or_default();
                Type::map(key, value)
            }
            "channel_type" => {
                let value = node
                    .child_by_field_name("value")
                    .map(|v| self.go_type(v))
                    .unwrap_or_default();
                Type::Chan(Box::new(value))
            }
            "function_type" => Type::function(self.signature(node)),
            "struct_type" => {
                let mut fields = Vec::new();
                for field in
                    find_descendants_by_kind(node, "field_declaration", |n| n.kind() == "struct_type")
                {
                    let ty = field
                        .child_by_field_name("type")
                        .map(|t| self.go_type(t))
                        .unwrap_or_default();
                    for name in children_by_field(field, "name") {
                        fields.push((self.text(name).to_string(), ty.clone()));
                    }
                }
                Type::Struct(fields)
            }
            "interface_type" => Type::Interface,
            "generic_type" => node
                .child_by_field_name("type")
                .map(|t| self.go_type(t))
                .unwrap_or_default(),
            "parenthesized_type" => named_children(node)
                .first()
                .map(|t| self.go_type(*t))
                .unwrap_or_default(),
            "qualified_type" => Type::Alias {
                name: self.text(node).to_string(),
                inner: Box::new(Type::Any),
            },
            _ => Type::Any,
        }
    }

    /// Signature of a function declaration, method, literal or func type
    pub(super) fn signature(&mut self, node: Node<'t>) -> FunctionType {
        let mut signature = FunctionType::default();
        if let Some(params) = node.child_by_field_name("parameters") {
            for param in named_children(params) {
                let variadic = param.kind() == "variadic_parameter_declaration";
                let mut ty = param
                    .child_by_field_name("type")
                    .map(|t| self.go_type(t))
                    .unwrap_or_default();
                if variadic {
                    ty = Type::slice(ty);
                    signature.variadic = true;
                }
                let count = children_by_field(param, "name").len().max(1);
                signature.params.extend(std::iter::repeat(ty).take(count));
            }
        }
        if let Some(result) = node.child_by_field_name("result") {
            if result.kind() == "parameter_list" {
                for param in named_children(result) {
                    let ty = param
                        .child_by_field_name("type")
                        .map(|t| self.go_type(t))
                        .unwrap_or_default();
                    let count = children_by_field(param, "name").len().max(1);
                    signature.returns.extend(std::iter::repeat(ty).take(count));
                }
            } else {
                let ty = self.go_type(result);
                signature.returns.push(ty);
            }
        }
        signature
    }

    /// Zero value of a type (`var x T`, omitted struct fields)
    pub(super) fn zero_value(&mut self, ty: &Type) -> ValueId {
        match ty.unalias() {
            Type::Number => self.b.emit_const(Constant::Int(0)),
            Type::String => self.b.emit_const(Constant::Str(String::new())),
            Type::Boolean => self.b.emit_const(Constant::Bool(false)),
            Type::Blueprint(_) | Type::Struct(_) => self.b.emit_make(ty.clone(), Vec::new()),
            _ => {
                let nil = self.b.emit_const(Constant::Nil);
                self.b.set_type(nil, ty.clone());
                nil
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Functions and methods
    // ═══════════════════════════════════════════════════════════════════════

    /// Create the function, publish its name and queue its body
    pub(super) fn declare_function(&mut self, node: Node<'t>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);

        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|r| self.receiver_blueprint(r));
        let qualified = match receiver {
            Some(bp) => format!("{}${}", self.b.program().blueprint(bp).name, name),
            None => name.to_string(),
        };

        let signature = self.signature(node);
        let func = self.b.new_function(qualified.as_str());
        self.b.set_signature(func, signature);

        match receiver {
            Some(bp) => self.b.add_method(bp, name, func),
            None if name == "init" || name == "_" => {}
            None => {
                let value = self.b.function_value(func);
                self.b.set_export_value(name, value);
            }
        }

        if node.child_by_field_name("body").is_none() {
            return;
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
                node,
                receiver,
            },
        );
    }

    /// `(r *T)` / `(r T)` / `(T)` → blueprint of `T`, created if unseen
    fn receiver_blueprint(&mut self, receiver: Node<'t>) -> Option<BlueprintId> {
        let param = named_children(receiver).into_iter().next()?;
        let mut ty = param.child_by_field_name("type")?;
        loop {
            match ty.kind() {
                "pointer_type" | "parenthesized_type" => ty = *named_children(ty).first()?,
                "generic_type" => ty = ty.child_by_field_name("type")?,
                _ => break,
            }
        }
        let name = self.text(ty);
        Some(self.b.get_or_create_blueprint(name, BlueprintKind::Struct))
    }

    pub(super) fn build_function_body(&mut self, pending: &PendingBody<'t>) -> SSAResult<()> {
        let node = pending.node;
        self.b.push_function(pending.func)?;
        self.b.push_range(node_to_span(&node));

        if let Some(receiver) = node.child_by_field_name("receiver") {
            self.build_params(receiver);
            if let (Some(bp), Some(first)) = (
                pending.receiver,
                self.b.program().function(pending.func).params.first().copied(),
            ) {
                let ty = self.b.value_type(first).clone();
                if ty.as_blueprint().is_none() {
                    self.b.set_type(first, Type::Blueprint(bp));
                }
            }
        }
        self.build_callable(node);

        self.b.pop_range();
        self.b.pop_function()?;
        Ok(())
    }

    /// Params, named results, labels and body of the current function
    fn build_callable(&mut self, node: Node<'t>) {
        if let Some(params) = node.child_by_field_name("parameters") {
            self.build_params(params);
        }

        let mut named = Vec::new();
        if let Some(result) = node
            .child_by_field_name("result")
            .filter(|r| r.kind() == "parameter_list")
        {
            for param in named_children(result) {
                let ty = param
                    .child_by_field_name("type")
                    .map(|t| self.go_type(t))
                    .unwrap_or_default();
                for name in children_by_field(param, "name") {
                    let name = self.text(name);
                    let variable = self.b.create_local_variable(name);
                    let zero = self.zero_value(&ty);
                    self.b.assign_variable(&variable, zero);
                    named.push(variable);
                }
            }
        }
        self.results.push(named);

        if let Some(body) = node.child_by_field_name("body") {
            for label in find_descendants_by_kind(body, "labeled_statement", |n| {
                n.kind() == "func_literal"
            }) {
                if let Some(name) = label.child_by_field_name("label") {
                    let name = self.text(name);
                    self.b.declare_label(name);
                }
            }
            self.build_statement_list(body);
        }
        self.results.pop();
    }

    fn build_params(&mut self, params: Node<'t>) {
        for param in named_children(params) {
            let variadic = param.kind() == "variadic_parameter_declaration";
            let mut ty = param
                .child_by_field_name("type")
                .map(|t| self.go_type(t))
                .unwrap_or_default();
            if variadic {
                ty = Type::slice(ty);
            }
            let names = children_by_field(param, "name");
            if names.is_empty() {
                let index = self.b.program().function(self.b.current_function()).params.len();
                let value = self.b.new_param(&format!("$param{}", index));
                self.b.set_type(value, ty.clone());
            }
            for name in names {
                let name = self.text(name);
                let value = self.b.new_param(name);
                self.b.set_type(value, ty.clone());
            }
            if variadic {
                self.b.set_variadic(true);
            }
        }
    }

    /// `func(...) {...}` built in place as a child of the current function
    pub(super) fn build_closure(&mut self, node: Node<'t>) -> ValueId {
        self.closures += 1;
        let name = format!("{}$func{}", self.b.function_name(), self.closures);
        let signature = self.signature(node);
        let func = self.b.new_function(name);
        self.b.set_signature(func, signature);
        let value = self.b.function_value(func);

        if let Err(err) = self.b.push_function(func) {
            let tag = self.b.tag();
            self.b.new_error(Severity::Error, tag, err.to_string());
            return value;
        }
        self.build_callable(node);
        if let Err(err) = self.b.pop_function() {
            let tag = self.b.tag();
            self.b.new_error(Severity::Error, tag, err.to_string());
        }
        value
    }

    // ═══════════════════════════════════════════════════════════════════════
    // var / const
    // ═══════════════════════════════════════════════════════════════════════

    /// Building `@init` directly, not a function body
    fn at_top_level(&self) -> bool {
        self.b.function_depth() == 1
    }

    pub(super) fn build_var_declaration(&mut self, node: Node<'t>) {
        for spec in find_descendants_by_kind(node, "var_spec", |n| n.kind() == "func_literal") {
            with_range(self, &spec, |ctx| ctx.build_var_spec(spec));
        }
    }

    fn build_var_spec(&mut self, spec: Node<'t>) {
        let names = children_by_field(spec, "name");
        let ty = spec.child_by_field_name("type").map(|t| self.go_type(t));
        let values = match spec.child_by_field_name("value") {
            Some(list) => self.build_rhs(list, names.len()),
            None => {
                let ty = ty.clone().unwrap_or_default();
                names.iter().map(|_| self.zero_value(&ty)).collect()
            }
        };
        let top_level = self.at_top_level();
        for (name, value) in names.iter().zip(values) {
            let name = self.text(*name);
            if name == "_" {
                continue;
            }
            let variable = self.b.create_local_variable(name);
            self.b.assign_variable(&variable, value);
            if top_level {
                self.b.set_export_value(name, value);
            }
        }
    }

    /// Const block: `iota` counts specs; a spec without values repeats the
    /// expression list of the previous one
    pub(super) fn build_const_declaration(&mut self, node: Node<'t>) {
        let top_level = self.at_top_level();
        let mut previous: Option<Node<'t>> = None;
        let specs = find_descendants_by_kind(node, "const_spec", |_| false);
        for (index, spec) in specs.into_iter().enumerate() {
            let names = children_by_field(spec, "name");
            let Some(list) = spec.child_by_field_name("value").or(previous) else {
                let tag = self.b.tag();
                self.b.new_error(Severity::Error, tag, messages::unsupported("const without value"));
                continue;
            };
            previous = Some(list);

            self.iota = Some(index as i64);
            let values = with_range(self, &spec, |ctx| ctx.build_rhs(list, names.len()));
            self.iota = None;

            for (name, value) in names.iter().zip(values) {
                let name = self.text(*name);
                if name == "_" {
                    continue;
                }
                let value = match self.b.evaluate_constant(value) {
                    Some(folded) if self.b.value(value).as_const().is_none() => {
                        self.b.emit_const(folded)
                    }
                    _ => value,
                };
                if top_level {
                    self.b.set_constant(name, value);
                } else {
                    self.b.declare_constant(name, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BuildConfig;
    use crate::features::frontends::build_go;
    use crate::features::ssa::domain::{Constant, Program, Terminator, Type, ValueKind};

    fn build(source: &str) -> Program {
        build_go(source, &BuildConfig::default()).expect("go build")
    }

    #[test]
    fn test_iota_counts_specs() {
        let program = build("package main\nconst (\n\tA = iota\n\tB\n\tC\n)\n");
        assert_eq!(program.constant("A"), Some(&Constant::Int(0)));
        assert_eq!(program.constant("B"), Some(&Constant::Int(1)));
        assert_eq!(program.constant("C"), Some(&Constant::Int(2)));
    }

    #[test]
    fn test_repeated_expression_list_with_iota() {
        let program = build("package main\nconst (\n\tKB = 1 << (10 * (iota + 1))\n\tMB\n)\n");
        assert_eq!(program.constant("KB"), Some(&Constant::Int(1024)));
        assert_eq!(program.constant("MB"), Some(&Constant::Int(1024 * 1024)));
    }

    #[test]
    fn test_struct_blueprint_and_method() {
        let program = build(
            "package main\n\
             type Point struct { X, Y int; Name string }\n\
             func (p *Point) Norm() int { return p.X*p.X + p.Y*p.Y }\n",
        );
        let point = program.blueprint_by_name("Point").expect("blueprint");
        assert_eq!(point.fields.len(), 3);
        assert_eq!(point.field("Name").map(|f| f.ty.clone()), Some(Type::String));
        let method = point.methods.get("Norm").copied().expect("method");
        let function = program.function(method);
        assert_eq!(function.name, "Point$Norm");
        assert_eq!(function.params.len(), 1);
        assert_eq!(function.method_of, Some(point.id));
        assert!(function.built);
    }

    #[test]
    fn test_method_before_type_uses_placeholder() {
        let program = build(
            "package main\n\
             func (s Stack) Len() int { return len(s.items) }\n\
             type Stack struct { items []int }\n",
        );
        let stacks: Vec<_> = program
            .blueprints
            .iter()
            .filter(|b| b.name == "Stack")
            .collect();
        assert_eq!(stacks.len(), 1);
        assert!(stacks[0].methods.contains_key("Len"));
        assert!(stacks[0].field("items").is_some());
    }

    #[test]
    fn test_embedded_field_is_anonymous_parent() {
        let program = build(
            "package main\ntype Base struct { ID int }\ntype User struct { Base; Name string }\n",
        );
        let user = program.blueprint_by_name("User").expect("User");
        let base = program.blueprint_by_name("Base").expect("Base");
        assert!(user.field("Base").map(|f| f.anonymous).unwrap_or(false));
        assert_eq!(user.parents, vec![base.id]);
    }

    #[test]
    fn test_named_results_and_bare_return() {
        let program = build("package main\nfunc f() (n int, err error) {\n\tn = 3\n\treturn\n}\n");
        let f = program.function_by_name("f").expect("f");
        assert_eq!(f.signature.returns.len(), 2);
        let returns: Vec<_> = f
            .blocks
            .iter()
            .filter_map(|b| match &program.block(*b).terminator {
                Some(Terminator::Return(values)) if !values.is_empty() => {
                    Some(values.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(returns.len(), 1);
        assert_eq!(program.const_value(returns[0][0]), Some(&Constant::Int(3)));
    }

    #[test]
    fn test_top_level_var_is_exported() {
        let program = build("package main\nvar counter int\nvar name = \"go\"\n");
        let counter = program.export_value("counter").expect("counter");
        assert_eq!(program.const_value(counter), Some(&Constant::Int(0)));
        let name = program.export_value("name").expect("name");
        assert!(matches!(program.value(name).kind, ValueKind::Const(Constant::Str(_))));
    }

    #[test]
    fn test_variadic_signature() {
        let program = build("package main\nfunc sum(xs ...int) int { return 0 }\n");
        let sum = program.function_by_name("sum").expect("sum");
        assert!(sum.is_variadic());
        assert_eq!(sum.signature.params, vec![Type::slice(Type::Number)]);
    }

    #[test]
    fn test_imports_bind_libraries() {
        let program = build("package main\nimport (\n\t\"fmt\"\n\tstr \"strings\"\n)\n");
        assert!(program.libraries.contains_key("fmt"));
        assert!(program.libraries.contains_key("str"));
        let lib = program.libraries["str"];
        assert!(matches!(&program.value(lib).kind, ValueKind::ExternLib { path } if path == "strings"));
    }
}
