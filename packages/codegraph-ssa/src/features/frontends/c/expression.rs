//! C expressions (read and write context)
//!
//! Pointers are tracked through `origins`: `&x` remembers `x`, so `*p`
//! reads and writes `x` itself. A pointer of unknown origin dereferences
//! to its `*` member.

use tree_sitter::Node;

use super::builtins::{libc, ALLOCATORS};
use super::CBuilder;
use crate::features::frontends::common::{
    build_logical, build_ternary, unreachable_value, with_range,
};
use crate::features::frontends::literals::{
    char_value, is_float_literal, parse_float, parse_int, unquote_double,
};
use crate::features::parsing::Language;
use crate::features::ssa::domain::{
    messages, BinaryOp, Constant, Severity, Type, UnaryOp, ValueId, ValueKind,
};
use crate::features::ssa::infrastructure::Variable;
use crate::shared::utils::tree_sitter::{named_children, operator_text};

fn first_named(node: Node<'_>) -> Option<Node<'_>> {
    named_children(node).into_iter().next()
}

impl<'t> CBuilder<'t> {
    pub(super) fn build_expr(&mut self, node: Node<'t>) -> ValueId {
        with_range(self, &node, |ctx| ctx.build_expr_inner(node))
    }

    fn build_expr_inner(&mut self, node: Node<'t>) -> ValueId {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                self.b.read_or_undefined(name)
            }
            "number_literal" => self.build_number(node),
            "char_literal" => match char_value(self.text(node)) {
                Some(v) => self.b.emit_const(Constant::Int(v)),
                None => self.bad_literal(node),
            },
            "string_literal" => {
                let s = unquote_double(self.text(node));
                self.b.emit_const(Constant::Str(s))
            }
            "concatenated_string" => self.build_concatenated(node),
            "true" => self.b.emit_const(Constant::Bool(true)),
            "false" => self.b.emit_const(Constant::Bool(false)),
            "null" => self.b.emit_const(Constant::Nil),
            "parenthesized_expression" => match first_named(node) {
                Some(inner) => self.build_expr(inner),
                None => unreachable_value(&mut self.b),
            },
            "binary_expression" => self.build_binary(node),
            "unary_expression" => self.build_unary(node),
            "pointer_expression" => self.build_pointer(node),
            "update_expression" => self.build_update(node),
            "assignment_expression" => self.build_assignment(node),
            "call_expression" => self.build_call(node),
            "field_expression" => match self.field_object(node) {
                Some((object, field)) => self.b.read_member_by_name(object, field),
                None => unreachable_value(&mut self.b),
            },
            "subscript_expression" => {
                let (Some(argument), Some(index)) = (
                    node.child_by_field_name("argument"),
                    node.child_by_field_name("index"),
                ) else {
                    return unreachable_value(&mut self.b);
                };
                let object = self.build_expr(argument);
                let key = self.build_expr(index);
                self.b.read_member(object, key)
            }
            "cast_expression" => self.build_cast(node),
            "compound_literal_expression" => {
                let ty = node
                    .child_by_field_name("type")
                    .map(|t| self.type_descriptor(t))
                    .unwrap_or_default();
                match node.child_by_field_name("value") {
                    Some(value) => self.build_initializer(value, &ty),
                    None => self.b.emit_make(ty, Vec::new()),
                }
            }
            "initializer_list" => self.build_initializer(node, &Type::slice(Type::Any)),
            // the operand is never evaluated
            "sizeof_expression" | "alignof_expression" | "offsetof_expression" => {
                self.b.emit_undefined_typed("sizeof", Type::Number)
            }
            "conditional_expression" => {
                let (Some(condition), Some(alternative)) = (
                    node.child_by_field_name("condition"),
                    node.child_by_field_name("alternative"),
                ) else {
                    return unreachable_value(&mut self.b);
                };
                let consequence = node.child_by_field_name("consequence");
                build_ternary(
                    self,
                    move |ctx: &mut Self| ctx.build_expr(condition),
                    // `a ?: b` yields the condition itself
                    move |ctx: &mut Self| ctx.build_expr(consequence.unwrap_or(condition)),
                    move |ctx: &mut Self| ctx.build_expr(alternative),
                )
            }
            "comma_expression" => {
                let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) else {
                    return unreachable_value(&mut self.b);
                };
                self.build_expr(left);
                self.build_expr(right)
            }
            "gnu_asm_expression" => {
                let tag = self.b.tag();
                self.b
                    .new_error(Severity::Warn, tag, messages::unsupported("inline assembly"));
                self.b.emit_undefined_typed("asm", Type::Any)
            }
            _ => unreachable_value(&mut self.b),
        }
    }

    fn bad_literal(&mut self, node: Node<'t>) -> ValueId {
        let tag = self.b.tag();
        let text = self.text(node);
        self.b.new_error(
            Severity::Warn,
            tag,
            messages::unsupported(&format!("literal {}", text)),
        );
        self.b.emit_const(Constant::Int(0))
    }

    fn build_number(&mut self, node: Node<'t>) -> ValueId {
        let text = self.text(node);
        let constant = if is_float_literal(text) {
            parse_float(text).map(Constant::Float)
        } else {
            parse_int(text, Language::C).map(Constant::Int)
        };
        match constant {
            Some(c) => self.b.emit_const(c),
            None => self.bad_literal(node),
        }
    }

    /// `"a" "b"` folds to one string; pieces from macros are added
    fn build_concatenated(&mut self, node: Node<'t>) -> ValueId {
        let parts = named_children(node);
        if parts.iter().all(|p| p.kind() == "string_literal") {
            let joined: String = parts
                .iter()
                .map(|p| unquote_double(self.text(*p)))
                .collect();
            return self.b.emit_const(Constant::Str(joined));
        }
        let mut result: Option<ValueId> = None;
        for part in parts {
            let value = self.build_expr(part);
            result = Some(match result {
                Some(acc) => self.b.emit_binop(BinaryOp::Add, acc, value),
                None => value,
            });
        }
        match result {
            Some(v) => v,
            None => self.b.emit_const(Constant::Str(String::new())),
        }
    }

    fn build_binary(&mut self, node: Node<'t>) -> ValueId {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return unreachable_value(&mut self.b);
        };
        let op = operator_text(&node, self.src);
        let lhs = self.build_expr(left);
        match op {
            "&&" | "||" => build_logical(self, op == "&&", lhs, move |ctx: &mut Self| {
                ctx.build_expr(right)
            }),
            _ => {
                let rhs = self.build_expr(right);
                match BinaryOp::from_token(op) {
                    Some(op) => self.b.emit_binop(op, lhs, rhs),
                    None => unreachable_value(&mut self.b),
                }
            }
        }
    }

    fn build_unary(&mut self, node: Node<'t>) -> ValueId {
        let Some(argument) = node.child_by_field_name("argument") else {
            return unreachable_value(&mut self.b);
        };
        let op = operator_text(&node, self.src);
        let value = self.build_expr(argument);
        match UnaryOp::from_token(op) {
            Some(op) => self.b.emit_unop(op, value),
            None => unreachable_value(&mut self.b),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Pointers
    // ═══════════════════════════════════════════════════════════════════════

    fn build_pointer(&mut self, node: Node<'t>) -> ValueId {
        let Some(argument) = node.child_by_field_name("argument") else {
            return unreachable_value(&mut self.b);
        };
        if operator_text(&node, self.src) == "&" {
            return self.address_of(argument);
        }
        let pointer = self.build_expr(argument);
        self.pointee(pointer)
    }

    fn address_of(&mut self, target: Node<'t>) -> ValueId {
        // `&f` is just `f`
        if target.kind() == "identifier" {
            let name = self.text(target);
            if self.functions.contains_key(name) && !self.b.is_declared(name) {
                return self.build_expr(target);
            }
        }
        match self.build_lvalue(target) {
            Some(variable) => {
                let current = self.b.read_variable(&variable);
                let pointer = self.b.emit_unop(UnaryOp::AddrOf, current);
                self.origins.insert(pointer, variable);
                pointer
            }
            None => {
                let value = self.build_expr(target);
                self.b.emit_unop(UnaryOp::AddrOf, value)
            }
        }
    }

    /// `*p`
    fn pointee(&mut self, pointer: ValueId) -> ValueId {
        match self.origins.get(&pointer).cloned() {
            Some(variable) => self.b.read_variable(&variable),
            None => self.b.read_member_by_name(pointer, "*"),
        }
    }

    /// `*p` as an assignment target
    fn pointee_variable(&mut self, pointer: ValueId, text: &str) -> Variable {
        match self.origins.get(&pointer) {
            Some(variable) => variable.clone(),
            None => {
                let key = self.b.emit_const(Constant::Str("*".to_string()));
                self.b.member_variable(pointer, key, text)
            }
        }
    }

    /// Object and field name of `a.f` / `p->f`
    fn field_object(&mut self, node: Node<'t>) -> Option<(ValueId, &'t str)> {
        let argument = node.child_by_field_name("argument")?;
        let field = node.child_by_field_name("field")?;
        let object = self.build_expr(argument);
        let object = if operator_text(&node, self.src) == "->" {
            match self.origins.get(&object).cloned() {
                Some(variable) => self.b.read_variable(&variable),
                None => object,
            }
        } else {
            object
        };
        Some((object, self.text(field)))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Assignment
    // ═══════════════════════════════════════════════════════════════════════

    pub(super) fn build_lvalue(&mut self, node: Node<'t>) -> Option<Variable> {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                Some(self.b.create_variable(name))
            }
            "parenthesized_expression" => self.build_lvalue(first_named(node)?),
            "field_expression" => {
                let (object, field) = self.field_object(node)?;
                let key = self.b.emit_const(Constant::Str(field.to_string()));
                Some(self.b.member_variable(object, key, self.text(node)))
            }
            "subscript_expression" => {
                let argument = node.child_by_field_name("argument")?;
                let index = node.child_by_field_name("index")?;
                let object = self.build_expr(argument);
                let key = self.build_expr(index);
                Some(self.b.member_variable(object, key, self.text(node)))
            }
            "pointer_expression" if operator_text(&node, self.src) == "*" => {
                let argument = node.child_by_field_name("argument")?;
                let pointer = self.build_expr(argument);
                let text = self.text(node);
                Some(self.pointee_variable(pointer, text))
            }
            _ => None,
        }
    }

    fn build_assignment(&mut self, node: Node<'t>) -> ValueId {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return unreachable_value(&mut self.b);
        };
        let op = operator_text(&node, self.src);
        let Some(variable) = self.build_lvalue(left) else {
            self.build_expr(right);
            return unreachable_value(&mut self.b);
        };
        let value = if op == "=" {
            self.build_expr(right)
        } else {
            let Some(bin) = BinaryOp::from_token(op) else {
                return unreachable_value(&mut self.b);
            };
            let current = self.b.read_variable(&variable);
            let rhs = self.build_expr(right);
            self.b.emit_binop(bin, current, rhs)
        };
        self.b.assign_variable(&variable, value);
        value
    }

    /// `i++` yields the old value, `++i` the new one
    fn build_update(&mut self, node: Node<'t>) -> ValueId {
        let Some(argument) = node.child_by_field_name("argument") else {
            return unreachable_value(&mut self.b);
        };
        let op = if operator_text(&node, self.src) == "++" {
            BinaryOp::Add
        } else {
            BinaryOp::Sub
        };
        let prefix = node
            .child_by_field_name("operator")
            .is_some_and(|o| o.start_byte() < argument.start_byte());
        let Some(variable) = self.build_lvalue(argument) else {
            return unreachable_value(&mut self.b);
        };
        let old = self.b.read_variable(&variable);
        let one = self.b.emit_const(Constant::Int(1));
        let new = self.b.emit_binop(op, old, one);
        self.b.assign_variable(&variable, new);
        if prefix {
            new
        } else {
            old
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Calls, casts, initializers
    // ═══════════════════════════════════════════════════════════════════════

    /// Calls to libc builtins (not shadowed by a user definition) know
    /// their output arguments; allocators become a fresh pointer container
    fn build_call(&mut self, node: Node<'t>) -> ValueId {
        let Some(function) = node.child_by_field_name("function") else {
            return unreachable_value(&mut self.b);
        };
        let args: Vec<Node<'t>> = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();

        let callee = self.build_expr(function);
        let known = if function.kind() == "identifier" {
            let name = self.text(function);
            libc(name).filter(|_| self.b.program().builtins.get(name) == Some(&callee))
        } else {
            None
        };
        let values: Vec<ValueId> = args.iter().map(|a| self.build_expr(*a)).collect();

        let Some(known) = known else {
            let call = self.b.new_call(callee, values);
            return self.b.emit_call(call);
        };
        if ALLOCATORS.contains(&known.name) {
            return self.b.emit_make(Type::pointer(Type::Any), Vec::new());
        }

        let call = self.b.new_call(callee, values);
        let result = self.b.emit_call(call);
        for (index, arg) in args.iter().enumerate() {
            if !known.writes(index) {
                continue;
            }
            if let Some(variable) = self.side_effect_target(*arg) {
                let effect = self.b.emit_side_effect(result, index, variable.name());
                self.b.assign_variable(&variable, effect);
            }
        }
        result
    }

    /// Variable an output argument writes: `&x` → `x`, `buf` → `buf`
    fn side_effect_target(&mut self, arg: Node<'t>) -> Option<Variable> {
        match arg.kind() {
            "pointer_expression" if operator_text(&arg, self.src) == "&" => {
                self.build_lvalue(arg.child_by_field_name("argument")?)
            }
            "identifier" | "field_expression" | "subscript_expression" | "pointer_expression" => {
                self.build_lvalue(arg)
            }
            "parenthesized_expression" => self.side_effect_target(first_named(arg)?),
            "cast_expression" => self.side_effect_target(arg.child_by_field_name("value")?),
            _ => None,
        }
    }

    fn build_cast(&mut self, node: Node<'t>) -> ValueId {
        let ty = node
            .child_by_field_name("type")
            .map(|t| self.type_descriptor(t))
            .unwrap_or_default();
        let Some(value) = node.child_by_field_name("value") else {
            return unreachable_value(&mut self.b);
        };
        if value.kind() == "initializer_list" {
            return self.build_initializer(value, &ty);
        }
        let built = self.build_expr(value);
        if self.cover_type(built, &ty) {
            return built;
        }
        let cast = self.b.emit_type_cast(built, ty);
        if let Some(variable) = self.origins.get(&built).cloned() {
            self.origins.insert(cast, variable);
        }
        cast
    }

    /// A freshly made container takes the type it is declared or cast as
    fn cover_type(&mut self, value: ValueId, ty: &Type) -> bool {
        if ty.is_any() || !matches!(self.b.value(value).kind, ValueKind::Make { .. }) {
            return false;
        }
        self.b.set_type(value, ty.clone());
        true
    }

    /// Right-hand side of a declaration: an expression, or a brace list
    /// built as one `Make`. Struct members are keyed by field name, array
    /// members by index; designators move the position.
    pub(super) fn build_initializer(&mut self, node: Node<'t>, ty: &Type) -> ValueId {
        if node.kind() != "initializer_list" {
            let value = self.build_expr(node);
            self.cover_type(value, ty);
            return value;
        }

        let fields: Vec<(String, Type)> = match ty.unalias() {
            Type::Blueprint(id) => self
                .b
                .program()
                .blueprint(*id)
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.ty.clone()))
                .collect(),
            Type::Struct(fields) => fields.clone(),
            _ => Vec::new(),
        };
        let element = ty.element().cloned().unwrap_or_default();

        let mut members = Vec::new();
        let mut position: usize = 0;
        for item in named_children(node) {
            let (key, value_node, member_ty) = if item.kind() == "initializer_pair" {
                let Some(designator) = item.child_by_field_name("designator") else {
                    continue;
                };
                let value_node = item.child_by_field_name("value");
                match designator.kind() {
                    "field_designator" => {
                        let name = first_named(designator).map(|n| self.text(n)).unwrap_or("");
                        let found = fields.iter().position(|(f, _)| f == name);
                        let member_ty = found.map(|i| fields[i].1.clone()).unwrap_or_default();
                        if let Some(i) = found {
                            position = i + 1;
                        }
                        let key = self.b.emit_const(Constant::Str(name.to_string()));
                        (key, value_node, member_ty)
                    }
                    "subscript_designator" => {
                        let key = match first_named(designator) {
                            Some(index) => self.build_expr(index),
                            None => unreachable_value(&mut self.b),
                        };
                        let index = self.b.evaluate_constant(key).and_then(|c| c.as_int());
                        if let Some(i) = index.and_then(|i| usize::try_from(i).ok()) {
                            position = i + 1;
                        }
                        (key, value_node, element.clone())
                    }
                    _ => continue,
                }
            } else {
                let (key, member_ty) = match fields.get(position) {
                    Some((name, field_ty)) => (
                        self.b.emit_const(Constant::Str(name.clone())),
                        field_ty.clone(),
                    ),
                    None => (
                        self.b.emit_const(Constant::Int(position as i64)),
                        element.clone(),
                    ),
                };
                position += 1;
                (key, Some(item), member_ty)
            };
            let value = match value_node {
                Some(v) => self.build_initializer(v, &member_ty),
                None => unreachable_value(&mut self.b),
            };
            members.push((key, value));
        }
        let ty = if ty.is_any() {
            Type::slice(Type::Any)
        } else {
            ty.clone()
        };
        self.b.emit_make(ty, members)
    }
}
