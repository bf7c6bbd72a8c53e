//! C declarations: types, declarators, functions, variables and macros

use tracing::debug;
use tree_sitter::Node;

use super::{CBuilder, PendingBody};
use crate::features::frontends::common::with_range;
use crate::features::frontends::literals::{
    char_value, is_float_literal, parse_float, parse_int, unquote_double,
};
use crate::features::parsing::Language;
use crate::features::ssa::domain::{
    messages, BlueprintId, BlueprintKind, Constant, FunctionId, FunctionType, Severity, Type,
    ValueId,
};
use crate::features::ssa::infrastructure::{SSAResult, Variable};
use crate::shared::utils::tree_sitter::{
    children_by_field, find_descendants_by_kind, named_children, node_to_span,
};

/// What the name at the bottom of a declarator becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclaratorRole {
    /// A local (or global) variable
    Variable,
    /// Just a name and a type: fields, typedefs, type names
    Normal,
    /// A parameter of the function being built
    Param,
    /// A function, shared between its prototype and definition
    Func,
}

#[derive(Debug, Clone)]
pub(super) enum Declared {
    Variable(Variable),
    /// Parameter, already appended to the current function
    Param,
    Func(FunctionId),
    Nothing,
}

/// Result of walking one declarator
#[derive(Debug, Clone)]
pub(super) struct Declarator<'t> {
    pub name: Option<&'t str>,
    pub ty: Type,
    /// Parameter list of the function declarator closest to the name
    pub params: Option<Node<'t>>,
    pub bound: Declared,
}

fn primitive_type(name: &str) -> Type {
    match name {
        "void" => Type::Null,
        "bool" | "_Bool" => Type::Boolean,
        _ => Type::Number,
    }
}

/// `f(...)` or `*f(...)`: the declarator names a function rather than a
/// function pointer
pub(super) fn is_prototype(node: Node<'_>) -> bool {
    let mut current = node;
    loop {
        match current.kind() {
            "function_declarator" => {
                return current
                    .child_by_field_name("declarator")
                    .is_some_and(|d| d.kind() == "identifier")
            }
            "pointer_declarator" => match current.child_by_field_name("declarator") {
                Some(inner) => current = inner,
                None => return false,
            },
            _ => return false,
        }
    }
}

/// Value of an object-like macro body, when it is a single literal
fn macro_constant(body: &str) -> Option<Constant> {
    let mut text = body.trim();
    while let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        text = inner.trim();
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Some(Constant::Str(unquote_double(text)));
    }
    if text.starts_with('\'') {
        return char_value(text).map(Constant::Int);
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, text),
    };
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if is_float_literal(digits) {
        let v = parse_float(digits)?;
        return Some(Constant::Float(if negative { -v } else { v }));
    }
    let v = parse_int(digits, Language::C)?;
    Some(Constant::Int(if negative { v.wrapping_neg() } else { v }))
}

impl<'t> CBuilder<'t> {
    fn bind_constant(&mut self, name: &str, value: ValueId) {
        if self.at_top_level() {
            self.b.set_constant(name, value);
        } else {
            self.b.declare_constant(name, value);
        }
    }

    /// `#define NAME literal` left in raw source
    pub(super) fn build_define(&mut self, node: Node<'t>) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name);
        let body = node
            .child_by_field_name("value")
            .map(|v| self.text(v))
            .unwrap_or("");
        match macro_constant(body) {
            Some(constant) => {
                let value = self.b.emit_const(constant);
                self.bind_constant(name, value);
            }
            None => debug!(name, body, "macro without literal value skipped"),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Types
    // ═══════════════════════════════════════════════════════════════════════

    /// Type denoted by a type specifier. Struct, union and enum bodies are
    /// declared the first time their specifier is seen.
    pub(super) fn c_type(&mut self, node: Node<'t>) -> Type {
        match node.kind() {
            "primitive_type" => primitive_type(self.text(node)),
            "sized_type_specifier" => Type::Number,
            "type_identifier" => {
                let name = self.text(node);
                self.b.export_type(name).cloned().unwrap_or_default()
            }
            "struct_specifier" => self.record_type(node, BlueprintKind::Struct),
            "union_specifier" => self.record_type(node, BlueprintKind::Union),
            "enum_specifier" => self.enum_type(node),
            "type_descriptor" => self.type_descriptor(node),
            _ => Type::Any,
        }
    }

    /// `(T *)` and `sizeof(T[4])` targets: an abstract declarator over a type
    pub(super) fn type_descriptor(&mut self, node: Node<'t>) -> Type {
        let base = node
            .child_by_field_name("type")
            .map(|t| self.c_type(t))
            .unwrap_or_default();
        match node.child_by_field_name("declarator") {
            Some(d) => self.declarator(d, base, DeclaratorRole::Normal).ty,
            None => base,
        }
    }

    fn record_type(&mut self, node: Node<'t>, kind: BlueprintKind) -> Type {
        if let Some(ty) = self.specifiers.get(&node.id()) {
            return ty.clone();
        }
        let name = match node.child_by_field_name("name") {
            Some(n) => self.text(n).to_string(),
            None => {
                self.anonymous += 1;
                format!("$anon{}", self.anonymous)
            }
        };
        let Some(body) = node.child_by_field_name("body") else {
            // `struct P` used before (or without) its definition
            let id = self.b.get_or_create_blueprint(&name, kind);
            return Type::Blueprint(id);
        };

        let id = self.b.create_blueprint(&name, kind);
        let ty = Type::Blueprint(id);
        self.specifiers.insert(node.id(), ty.clone());
        self.b.begin_blueprint(id);
        for field in named_children(body) {
            if field.kind() == "field_declaration" {
                with_range(self, &field, |ctx| ctx.build_field(id, field));
            }
        }
        self.b.complete_blueprint(id);
        ty
    }

    fn build_field(&mut self, id: BlueprintId, field: Node<'t>) {
        let base = field
            .child_by_field_name("type")
            .map(|t| self.c_type(t))
            .unwrap_or_default();
        let declarators = children_by_field(field, "declarator");
        if declarators.is_empty() {
            // anonymous struct/union member: its fields are reached through it
            if let Some(inner) = base.as_blueprint() {
                let inner_name = self.b.program().blueprint(inner).name.clone();
                self.b.add_anonymous_field(id, &inner_name, base);
            }
            return;
        }
        for d in declarators {
            let decl = self.declarator(d, base.clone(), DeclaratorRole::Normal);
            if let Some(name) = decl.name {
                self.b.add_field(id, name, decl.ty, None);
            }
        }
    }

    /// Enumerators count up from 0; an explicit value resets the counter
    fn enum_type(&mut self, node: Node<'t>) -> Type {
        if self.specifiers.contains_key(&node.id()) {
            return Type::Number;
        }
        self.specifiers.insert(node.id(), Type::Number);
        let Some(body) = node.child_by_field_name("body") else {
            return Type::Number;
        };

        let mut next: i64 = 0;
        for enumerator in named_children(body) {
            if enumerator.kind() != "enumerator" {
                continue;
            }
            let Some(name) = enumerator.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(name);
            if let Some(value) = enumerator.child_by_field_name("value") {
                let built = self.build_expr(value);
                match self.b.evaluate_constant(built).as_ref().and_then(Constant::as_int) {
                    Some(v) => next = v,
                    None => {
                        let tag = self.b.tag();
                        self.b.new_error(
                            Severity::Warn,
                            tag,
                            messages::unsupported(&format!("non-constant enumerator {}", name)),
                        );
                    }
                }
            }
            let value = self.b.emit_const(Constant::Int(next));
            self.bind_constant(name, value);
            next = next.wrapping_add(1);
        }
        Type::Number
    }

    pub(super) fn build_typedef(&mut self, node: Node<'t>) {
        let base = node
            .child_by_field_name("type")
            .map(|t| self.c_type(t))
            .unwrap_or_default();
        for d in children_by_field(node, "declarator") {
            let decl = self.declarator(d, base.clone(), DeclaratorRole::Normal);
            if let Some(name) = decl.name {
                self.b.set_export_type(
                    name,
                    Type::Alias {
                        name: name.to_string(),
                        inner: Box::new(decl.ty),
                    },
                );
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Declarators
    // ═══════════════════════════════════════════════════════════════════════

    /// Walk a declarator from the outside in. Each layer wraps the type it
    /// was given (`*` → pointer, `[]` → slice, `()` → function returning it)
    /// and hands the result to the layer it contains; the name at the
    /// bottom is bound according to `role`.
    pub(super) fn declarator(
        &mut self,
        node: Node<'t>,
        ty: Type,
        role: DeclaratorRole,
    ) -> Declarator<'t> {
        match node.kind() {
            "identifier" | "field_identifier" | "type_identifier" => {
                let name = self.text(node);
                let bound = self.bind_name(name, &ty, role);
                Declarator {
                    name: Some(name),
                    ty,
                    params: None,
                    bound,
                }
            }
            "pointer_declarator" | "abstract_pointer_declarator" => {
                let pointee = if ty == Type::Null { Type::Any } else { ty };
                self.inner_declarator(node, Type::pointer(pointee), role)
            }
            "array_declarator" | "abstract_array_declarator" => {
                self.inner_declarator(node, Type::slice(ty), role)
            }
            "function_declarator" | "abstract_function_declarator" => {
                let params = node.child_by_field_name("parameters");
                let (param_types, variadic) = match params {
                    Some(p) => self.parameter_types(p),
                    None => (Vec::new(), false),
                };
                let returns = if ty == Type::Null { Vec::new() } else { vec![ty] };
                let function = Type::function(FunctionType {
                    params: param_types,
                    returns,
                    variadic,
                });
                let mut decl = self.inner_declarator(node, function, role);
                if decl.params.is_none() {
                    decl.params = params;
                }
                decl
            }
            "init_declarator" | "parenthesized_declarator" | "attributed_declarator" => {
                let inner = node
                    .child_by_field_name("declarator")
                    .or_else(|| named_children(node).into_iter().next());
                match inner {
                    Some(inner) => self.declarator(inner, ty, role),
                    None => self.anonymous_declarator(ty, role),
                }
            }
            _ => self.anonymous_declarator(ty, role),
        }
    }

    fn inner_declarator(&mut self, node: Node<'t>, ty: Type, role: DeclaratorRole) -> Declarator<'t> {
        match node.child_by_field_name("declarator") {
            Some(inner) => self.declarator(inner, ty, role),
            None => self.anonymous_declarator(ty, role),
        }
    }

    /// Declarator without a name (`int *` in a cast or prototype)
    fn anonymous_declarator(&mut self, ty: Type, role: DeclaratorRole) -> Declarator<'t> {
        let bound = match role {
            DeclaratorRole::Param => {
                let index = self.b.program().function(self.b.current_function()).params.len();
                let value = self.b.new_param(&format!("$param{}", index));
                self.b.set_type(value, ty.clone());
                Declared::Param
            }
            DeclaratorRole::Variable | DeclaratorRole::Normal | DeclaratorRole::Func => {
                Declared::Nothing
            }
        };
        Declarator {
            name: None,
            ty,
            params: None,
            bound,
        }
    }

    fn bind_name(&mut self, name: &str, ty: &Type, role: DeclaratorRole) -> Declared {
        match role {
            DeclaratorRole::Variable => Declared::Variable(self.b.create_local_variable(name)),
            DeclaratorRole::Normal => Declared::Nothing,
            DeclaratorRole::Param => {
                let value = self.b.new_param(name);
                self.b.set_type(value, ty.clone());
                Declared::Param
            }
            DeclaratorRole::Func => Declared::Func(self.function_named(name)),
        }
    }

    /// Parameter types of a `parameter_list`; `(void)` has none
    fn parameter_types(&mut self, params: Node<'t>) -> (Vec<Type>, bool) {
        let mut types = Vec::new();
        let mut variadic = false;
        for param in named_children(params) {
            match param.kind() {
                "parameter_declaration" => {
                    let base = param
                        .child_by_field_name("type")
                        .map(|t| self.c_type(t))
                        .unwrap_or_default();
                    match param.child_by_field_name("declarator") {
                        Some(d) => {
                            let ty = self.declarator(d, base, DeclaratorRole::Normal).ty;
                            types.push(ty);
                        }
                        None if base == Type::Null => {}
                        None => types.push(base),
                    }
                }
                "variadic_parameter" => variadic = true,
                _ => {}
            }
        }
        (types, variadic)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Functions
    // ═══════════════════════════════════════════════════════════════════════

    /// The function called `name`, created and exported on first use
    fn function_named(&mut self, name: &str) -> FunctionId {
        if let Some(func) = self.functions.get(name) {
            return *func;
        }
        let func = self.b.new_function(name);
        let value = self.b.function_value(func);
        self.b.set_export_value(name, value);
        self.functions.insert(name.to_string(), func);
        func
    }

    fn apply_signature(&mut self, decl: &Declarator<'t>) -> Option<FunctionId> {
        let Declared::Func(func) = decl.bound else {
            return None;
        };
        if let Some(signature) = decl.ty.as_function() {
            self.b.set_signature(func, signature.clone());
        }
        Some(func)
    }

    /// Declare the functions a definition or prototype names; definitions
    /// also queue their body
    pub(super) fn declare_function(&mut self, node: Node<'t>, definition: bool) {
        let base = node
            .child_by_field_name("type")
            .map(|t| self.c_type(t))
            .unwrap_or(Type::Number);

        if !definition {
            for d in children_by_field(node, "declarator") {
                if is_prototype(d) {
                    let decl = self.declarator(d, base.clone(), DeclaratorRole::Func);
                    self.apply_signature(&decl);
                }
            }
            return;
        }

        let Some(d) = node.child_by_field_name("declarator") else {
            return;
        };
        let decl = self.declarator(d, base, DeclaratorRole::Func);
        let Some(func) = self.apply_signature(&decl) else {
            let tag = self.b.tag();
            self.b.new_error(Severity::Error, tag, messages::unreachable());
            return;
        };
        let name = decl.name.unwrap_or("$function");
        let mut key = name.to_string();
        let mut n = 1;
        while self.queue.get(&key).is_some() {
            key = format!("{}#{}", name, n);
            n += 1;
        }
        self.queue.declare(
            key,
            PendingBody {
                func,
                node,
                params: decl.params,
            },
        );
    }

    pub(super) fn build_function_body(&mut self, pending: &PendingBody<'t>) -> SSAResult<()> {
        let node = pending.node;
        self.b.push_function(pending.func)?;
        self.b.push_range(node_to_span(&node));

        if let Some(params) = pending.params {
            self.build_params(params);
        }
        if let Some(body) = node.child_by_field_name("body") {
            for label in find_descendants_by_kind(body, "labeled_statement", |_| false) {
                if let Some(name) = label.child_by_field_name("label") {
                    let name = self.text(name);
                    self.b.declare_label(name);
                }
            }
            self.build_block(body);
        }

        self.b.pop_range();
        self.b.pop_function()?;
        Ok(())
    }

    fn build_params(&mut self, params: Node<'t>) {
        for param in named_children(params) {
            match param.kind() {
                "parameter_declaration" => {
                    let base = param
                        .child_by_field_name("type")
                        .map(|t| self.c_type(t))
                        .unwrap_or_default();
                    match param.child_by_field_name("declarator") {
                        Some(d) => {
                            self.declarator(d, base, DeclaratorRole::Param);
                        }
                        None if base == Type::Null => {}
                        None => {
                            self.anonymous_declarator(base, DeclaratorRole::Param);
                        }
                    }
                }
                "variadic_parameter" => self.b.set_variadic(true),
                _ => {}
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Variables
    // ═══════════════════════════════════════════════════════════════════════

    /// `T a = 1, *b, c[3];` at any level. Globals are also exported.
    pub(super) fn build_declaration(&mut self, node: Node<'t>) {
        let base = node
            .child_by_field_name("type")
            .map(|t| self.c_type(t))
            .unwrap_or(Type::Number);
        let top_level = self.at_top_level();
        for d in children_by_field(node, "declarator") {
            if is_prototype(d) {
                continue;
            }
            with_range(self, &d, |ctx| ctx.build_init_declarator(d, base.clone(), top_level));
        }
    }

    fn build_init_declarator(&mut self, node: Node<'t>, base: Type, top_level: bool) {
        let (target, init) = if node.kind() == "init_declarator" {
            (
                node.child_by_field_name("declarator"),
                node.child_by_field_name("value"),
            )
        } else {
            (Some(node), None)
        };
        let Some(target) = target else {
            return;
        };

        // type first, so the initializer knows what it builds
        let ty = self.declarator(target, base.clone(), DeclaratorRole::Normal).ty;
        let value = match init {
            Some(init) => self.build_initializer(init, &ty),
            None => self.zero_value(&ty),
        };

        let decl = self.declarator(target, base, DeclaratorRole::Variable);
        if let Declared::Variable(variable) = &decl.bound {
            self.b.assign_variable(variable, value);
            if let (true, Some(name)) = (top_level, decl.name) {
                self.b.set_export_value(name, value);
            }
        }
    }

    /// Value of a declaration without initializer
    pub(super) fn zero_value(&mut self, ty: &Type) -> ValueId {
        match ty.unalias() {
            Type::Number => self.b.emit_const(Constant::Int(0)),
            Type::Boolean => self.b.emit_const(Constant::Bool(false)),
            Type::Blueprint(_) | Type::Struct(_) | Type::Slice(_) => {
                self.b.emit_make(ty.clone(), Vec::new())
            }
            _ => {
                let nil = self.b.emit_const(Constant::Nil);
                self.b.set_type(nil, ty.clone());
                nil
            }
        }
    }
}
