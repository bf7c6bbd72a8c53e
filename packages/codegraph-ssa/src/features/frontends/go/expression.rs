//! Go expressions (read and write context)

use tree_sitter::Node;

use super::GoBuilder;
use crate::features::frontends::common::{build_logical, unreachable_value, with_range};
use crate::features::frontends::literals::{
    char_value, parse_float, parse_int, unquote_double, unquote_raw,
};
use crate::features::parsing::Language;
use crate::features::ssa::domain::{
    messages, BinaryOp, Constant, FunctionId, Severity, Type, UnaryOp, ValueId,
};
use crate::features::ssa::infrastructure::{PendingCall, Variable};
use crate::shared::utils::tree_sitter::{named_children, operator_text};

/// What a call expression turned into
pub(super) enum CallShape {
    /// Built in place: conversions, `make`, `new`
    Value(ValueId),
    Call {
        call: PendingCall,
        /// Result type overriding the callee signature (`append`)
        result: Option<Type>,
    },
}

fn is_type_node(kind: &str) -> bool {
    matches!(
        kind,
        "pointer_type"
            | "slice_type"
            | "array_type"
            | "implicit_length_array_type"
            | "map_type"
            | "channel_type"
            | "function_type"
            | "struct_type"
            | "interface_type"
            | "generic_type"
            | "parenthesized_type"
            | "qualified_type"
            | "type_identifier"
    )
}

impl<'t> GoBuilder<'t> {
    pub(super) fn build_expr(&mut self, node: Node<'t>) -> ValueId {
        with_range(self, &node, |ctx| ctx.build_expr_inner(node))
    }

    fn build_expr_inner(&mut self, node: Node<'t>) -> ValueId {
        match node.kind() {
            "identifier" | "iota" | "true" | "false" | "nil" => self.build_identifier(node),
            "int_literal" => match parse_int(self.text(node), Language::Go) {
                Some(v) => self.b.emit_const(Constant::Int(v)),
                None => self.bad_literal(node),
            },
            "float_literal" => match parse_float(self.text(node)) {
                Some(v) => self.b.emit_const(Constant::Float(v)),
                None => self.bad_literal(node),
            },
            "imaginary_literal" => {
                let text = self.text(node).trim_end_matches('i');
                let v = parse_float(text)
                    .or_else(|| parse_int(text, Language::Go).map(|i| i as f64))
                    .unwrap_or_default();
                self.b.emit_const(Constant::Float(v))
            }
            "rune_literal" => match char_value(self.text(node)) {
                Some(v) => self.b.emit_const(Constant::Int(v)),
                None => self.bad_literal(node),
            },
            "interpreted_string_literal" => {
                let s = unquote_double(self.text(node));
                self.b.emit_const(Constant::Str(s))
            }
            "raw_string_literal" => {
                let s = unquote_raw(self.text(node));
                self.b.emit_const(Constant::Str(s))
            }
            "parenthesized_expression" => match named_children(node).first() {
                Some(inner) => self.build_expr(*inner),
                None => unreachable_value(&mut self.b),
            },
            "unary_expression" => self.build_unary(node),
            "binary_expression" => self.build_binary(node),
            "call_expression" => self.build_call_expression(node),
            "selector_expression" => self.build_selector(node),
            "index_expression" => {
                let (Some(operand), Some(index)) = (
                    node.child_by_field_name("operand"),
                    node.child_by_field_name("index"),
                ) else {
                    return unreachable_value(&mut self.b);
                };
                let object = self.build_expr(operand);
                let key = self.build_expr(index);
                self.b.read_member(object, key)
            }
            "slice_expression" => {
                let Some(operand) = node.child_by_field_name("operand") else {
                    return unreachable_value(&mut self.b);
                };
                let value = self.build_expr(operand);
                let mut bound = |field: &str| {
                    node.child_by_field_name(field)
                        .map(|n| self.build_expr(n))
                };
                let low = bound("start");
                let high = bound("end");
                let max = bound("capacity");
                self.b.emit_slice(value, low, high, max)
            }
            "type_assertion_expression" | "type_conversion_expression" => {
                let (Some(operand), Some(ty)) = (
                    node.child_by_field_name("operand"),
                    node.child_by_field_name("type"),
                ) else {
                    return unreachable_value(&mut self.b);
                };
                let value = self.build_expr(operand);
                let ty = self.go_type(ty);
                self.b.emit_type_cast(value, ty)
            }
            "composite_literal" => {
                let ty = node
                    .child_by_field_name("type")
                    .map(|t| self.go_type(t))
                    .unwrap_or_default();
                match node.child_by_field_name("body") {
                    Some(body) => self.build_composite(ty, body),
                    None => self.b.emit_make(ty, Vec::new()),
                }
            }
            "func_literal" => self.build_closure(node),
            kind if is_type_node(kind) => {
                let ty = self.go_type(node);
                self.b.emit_type_value(ty)
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
        self.b.emit_undefined_typed(text, Type::Number)
    }

    fn build_identifier(&mut self, node: Node<'t>) -> ValueId {
        let name = self.text(node);
        match name {
            "_" => return self.b.emit_undefined("_"),
            "true" | "false" | "nil" | "iota" if !self.b.is_declared(name) => {
                let constant = match name {
                    "true" => Constant::Bool(true),
                    "false" => Constant::Bool(false),
                    "iota" => match self.iota {
                        Some(i) => Constant::Int(i),
                        None => return self.b.read_or_undefined(name),
                    },
                    _ => Constant::Nil,
                };
                return self.b.emit_const(constant);
            }
            _ => {}
        }
        if let Some(value) = self.b.read_value(name) {
            return value;
        }
        if let Some(ty) = self.named_type(name) {
            return self.b.emit_type_value(ty);
        }
        self.b.read_or_undefined(name)
    }

    fn build_unary(&mut self, node: Node<'t>) -> ValueId {
        let Some(operand) = node.child_by_field_name("operand") else {
            return unreachable_value(&mut self.b);
        };
        let op = operator_text(&node, self.src);
        let value = self.build_expr(operand);
        match UnaryOp::from_token(op) {
            // pointees are member slots, so `*p = v` and `*p` agree
            Some(UnaryOp::Deref) => self.b.read_member_by_name(value, "*"),
            Some(op) => self.b.emit_unop(op, value),
            None => unreachable_value(&mut self.b),
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

    // ═══════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════

    fn build_call_expression(&mut self, node: Node<'t>) -> ValueId {
        match self.call_shape(node) {
            CallShape::Value(value) => value,
            CallShape::Call { call, result } => {
                let value = self.b.emit_call(call);
                if let Some(ty) = result {
                    self.b.set_type(value, ty);
                }
                value
            }
        }
    }

    /// Resolve callee and arguments. Conversions and the allocation
    /// builtins are built on the spot.
    pub(super) fn call_shape(&mut self, node: Node<'t>) -> CallShape {
        let Some(function) = node.child_by_field_name("function") else {
            return CallShape::Value(unreachable_value(&mut self.b));
        };
        let args: Vec<Node<'t>> = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();

        if function.kind() == "identifier" {
            let name = self.text(function);
            if !self.b.is_declared(name) {
                match name {
                    "make" | "new" => {
                        let ty = args.first().map(|t| self.go_type(*t)).unwrap_or_default();
                        for arg in args.iter().skip(1) {
                            self.build_expr(*arg);
                        }
                        let ty = if name == "new" { Type::pointer(ty) } else { ty };
                        return CallShape::Value(self.b.emit_make(ty, Vec::new()));
                    }
                    _ => {
                        if let Some(ty) = self.named_type(name) {
                            return CallShape::Value(self.build_conversion(ty, &args));
                        }
                    }
                }
            }
        }
        if is_type_node(function.kind()) {
            let ty = self.go_type(function);
            return CallShape::Value(self.build_conversion(ty, &args));
        }

        let mut receiver = None;
        let callee = match function.kind() {
            "selector_expression" => {
                let (Some(operand), Some(field)) = (
                    function.child_by_field_name("operand"),
                    function.child_by_field_name("field"),
                ) else {
                    return CallShape::Value(unreachable_value(&mut self.b));
                };
                let object = self.build_expr(operand);
                let method = self.text(field);
                match self.method_of_value(object, method) {
                    Some(func) => {
                        receiver = Some(object);
                        self.b.function_value(func)
                    }
                    None => self.read_field(object, method),
                }
            }
            _ => self.build_expr(function),
        };

        let mut unpack = false;
        let mut values: Vec<ValueId> = receiver.into_iter().collect();
        for arg in &args {
            let value = match arg.kind() {
                "variadic_argument" => {
                    unpack = true;
                    match named_children(*arg).first() {
                        Some(inner) => self.build_expr(*inner),
                        None => unreachable_value(&mut self.b),
                    }
                }
                _ => self.build_expr(*arg),
            };
            values.push(value);
        }

        let result = match self.text(function) {
            "append" if !self.b.is_declared("append") => values
                .first()
                .map(|first| self.b.value_type(*first).clone()),
            _ => None,
        };
        let mut call = self.b.new_call(callee, values);
        call.unpack = unpack;
        CallShape::Call { call, result }
    }

    fn build_conversion(&mut self, ty: Type, args: &[Node<'t>]) -> ValueId {
        match args.first() {
            Some(arg) => {
                let value = self.build_expr(*arg);
                self.b.emit_type_cast(value, ty)
            }
            None => {
                let tag = self.b.tag();
                self.b.new_error(Severity::Error, tag, messages::unsupported("empty conversion"));
                self.b.emit_undefined_typed("", ty)
            }
        }
    }

    /// Method declared on the object's blueprint (or an embedded one)
    fn method_of_value(&self, object: ValueId, name: &str) -> Option<FunctionId> {
        let bp = self.b.value_type(object).as_blueprint()?;
        if self.b.program().blueprint(bp).field(name).is_some() {
            return None;
        }
        self.b.find_method(bp, name)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Selectors and members
    // ═══════════════════════════════════════════════════════════════════════

    fn build_selector(&mut self, node: Node<'t>) -> ValueId {
        let (Some(operand), Some(field)) = (
            node.child_by_field_name("operand"),
            node.child_by_field_name("field"),
        ) else {
            return unreachable_value(&mut self.b);
        };
        let object = self.build_expr(operand);
        let name = self.text(field);
        match self.method_of_value(object, name) {
            Some(func) => self.b.function_value(func),
            None => self.read_field(object, name),
        }
    }

    /// `object.name`, going through an embedded field when the name is
    /// promoted from it
    fn read_field(&mut self, object: ValueId, name: &str) -> ValueId {
        match self.embedded_holder(object, name) {
            Some(embedded) => {
                let inner = self.b.read_member_by_name(object, &embedded);
                self.b.read_member_by_name(inner, name)
            }
            None => self.b.read_member_by_name(object, name),
        }
    }

    fn embedded_holder(&self, object: ValueId, name: &str) -> Option<String> {
        let bp = self.b.value_type(object).as_blueprint()?;
        let program = self.b.program();
        let blueprint = program.blueprint(bp);
        if blueprint.field(name).is_some() {
            return None;
        }
        blueprint
            .fields
            .iter()
            .filter(|f| f.anonymous)
            .find(|f| {
                f.ty.as_blueprint()
                    .map(|inner| program.blueprint(inner).field(name).is_some())
                    .unwrap_or(false)
            })
            .map(|f| f.name.clone())
    }

    /// Write-context view of an expression; `None` for the blank identifier
    pub(super) fn build_lvalue(&mut self, node: Node<'t>) -> Option<Variable> {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                if name == "_" {
                    return None;
                }
                Some(self.b.create_variable(name))
            }
            "selector_expression" => {
                let operand = node.child_by_field_name("operand")?;
                let field = node.child_by_field_name("field")?;
                let object = self.build_expr(operand);
                let name = self.text(field);
                let object = match self.embedded_holder(object, name) {
                    Some(embedded) => self.b.read_member_by_name(object, &embedded),
                    None => object,
                };
                let key = self.b.emit_const(Constant::Str(name.to_string()));
                Some(self.b.member_variable(object, key, self.text(node)))
            }
            "index_expression" => {
                let operand = node.child_by_field_name("operand")?;
                let index = node.child_by_field_name("index")?;
                let object = self.build_expr(operand);
                let key = self.build_expr(index);
                Some(self.b.member_variable(object, key, self.text(node)))
            }
            "unary_expression" if operator_text(&node, self.src) == "*" => {
                let operand = node.child_by_field_name("operand")?;
                let pointer = self.build_expr(operand);
                let key = self.b.emit_const(Constant::Str("*".to_string()));
                Some(self.b.member_variable(pointer, key, self.text(node)))
            }
            "parenthesized_expression" => {
                let inner = *named_children(node).first()?;
                self.build_lvalue(inner)
            }
            _ => {
                let tag = self.b.tag();
                self.b.new_error(Severity::Error, tag, messages::unreachable());
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Composite literals
    // ═══════════════════════════════════════════════════════════════════════

    /// `T{...}`; nested literal values with elided types take the element
    /// type of the enclosing literal
    fn build_composite(&mut self, ty: Type, body: Node<'t>) -> ValueId {
        if let Type::Pointer(inner) = ty.unalias() {
            let inner = (**inner).clone();
            let value = self.build_composite(inner, body);
            return self.b.emit_unop(UnaryOp::AddrOf, value);
        }

        let elements = named_children(body);
        let struct_fields: Option<Vec<(String, Type)>> = match ty.unalias() {
            Type::Blueprint(bp) => Some(
                self.b
                    .program()
                    .blueprint(*bp)
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.clone()))
                    .collect(),
            ),
            Type::Struct(fields) => Some(fields.clone()),
            _ => None,
        };

        let members = match struct_fields {
            Some(fields) => self.struct_members(&fields, &elements),
            None => self.container_members(&ty, &elements),
        };
        self.b.emit_make(ty, members)
    }

    fn struct_members(
        &mut self,
        fields: &[(String, Type)],
        elements: &[Node<'t>],
    ) -> Vec<(ValueId, ValueId)> {
        let mut assigned: Vec<(String, ValueId)> = Vec::new();
        for (index, element) in elements.iter().enumerate() {
            let (name, value_node) = if element.kind() == "keyed_element" {
                let parts = named_children(*element);
                let (Some(key), Some(value)) = (parts.first(), parts.get(1)) else {
                    continue;
                };
                (self.text(unwrap_element(*key)).to_string(), unwrap_element(*value))
            } else {
                match fields.get(index) {
                    Some((name, _)) => (name.clone(), unwrap_element(*element)),
                    None => continue,
                }
            };
            let field_ty = fields
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, t)| t.clone())
                .unwrap_or_default();
            let value = self.build_element(field_ty, value_node);
            assigned.push((name, value));
        }

        let mut members = Vec::with_capacity(fields.len());
        for (name, ty) in fields {
            let value = match assigned.iter().find(|(n, _)| n == name) {
                Some((_, v)) => *v,
                None => self.zero_value(ty),
            };
            let key = self.b.emit_const(Constant::Str(name.clone()));
            members.push((key, value));
        }
        members
    }

    fn container_members(&mut self, ty: &Type, elements: &[Node<'t>]) -> Vec<(ValueId, ValueId)> {
        let key_ty = ty.key().cloned().unwrap_or_default();
        let element_ty = ty.element().cloned().unwrap_or_default();
        let mut members = Vec::with_capacity(elements.len());
        let mut next_index = 0i64;
        for element in elements {
            if element.kind() == "keyed_element" {
                let parts = named_children(*element);
                let (Some(key), Some(value)) = (parts.first(), parts.get(1)) else {
                    continue;
                };
                let key = self.build_element(key_ty.clone(), unwrap_element(*key));
                if let Some(Constant::Int(i)) = self.b.evaluate_constant(key) {
                    next_index = i + 1;
                }
                let value = self.build_element(element_ty.clone(), unwrap_element(*value));
                members.push((key, value));
            } else {
                let key = self.b.emit_const(Constant::Int(next_index));
                next_index += 1;
                let value = self.build_element(element_ty.clone(), unwrap_element(*element));
                members.push((key, value));
            }
        }
        members
    }

    fn build_element(&mut self, ty: Type, node: Node<'t>) -> ValueId {
        match node.kind() {
            "literal_value" => self.build_composite(ty, node),
            _ => self.build_expr(node),
        }
    }
}

/// `literal_element` / `element` wrap the actual expression or literal value
fn unwrap_element(node: Node<'_>) -> Node<'_> {
    match node.kind() {
        "literal_element" | "element" => named_children(node).into_iter().next().unwrap_or(node),
        _ => node,
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BuildConfig;
    use crate::features::frontends::build_go;
    use crate::features::ssa::domain::{
        BinaryOp, Constant, Program, Terminator, Type, UnaryOp, ValueId, ValueKind,
    };

    fn build(source: &str) -> Program {
        build_go(source, &BuildConfig::default()).expect("go build")
    }

    fn returned(program: &Program, name: &str) -> Vec<ValueId> {
        let f = program.function_by_name(name).expect("function");
        f.blocks
            .iter()
            .find_map(|b| match &program.block(*b).terminator {
                Some(Terminator::Return(values)) if !values.is_empty() => Some(values.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_literals() {
        let program = build(
            "package main\nfunc f() (int, int, string, string, int) {\n\treturn 0x1F, 0o17, \"a\\tb\", `a\\tb`, 'A'\n}\n",
        );
        let values = returned(&program, "f");
        let consts: Vec<_> = values.iter().map(|v| program.const_value(*v).cloned()).collect();
        assert_eq!(
            consts,
            vec![
                Some(Constant::Int(31)),
                Some(Constant::Int(15)),
                Some(Constant::Str("a\tb".into())),
                Some(Constant::Str("a\\tb".into())),
                Some(Constant::Int(65)),
            ]
        );
    }

    #[test]
    fn test_struct_literal_fills_missing_fields() {
        let program = build(
            "package main\ntype P struct { X int; Name string }\nfunc f() P { return P{X: 1} }\n",
        );
        let value = returned(&program, "f")[0];
        match &program.value(value).kind {
            ValueKind::Make { members } => {
                assert_eq!(members.len(), 2);
                assert_eq!(program.const_value(members[0].1), Some(&Constant::Int(1)));
                assert_eq!(program.const_value(members[1].1), Some(&Constant::Str(String::new())));
            }
            other => panic!("expected make, got {:?}", other),
        }
        assert!(program.value(value).ty.as_blueprint().is_some());
    }

    #[test]
    fn test_slice_and_map_literals() {
        let program = build(
            "package main\nfunc f() ([]int, map[string]int) {\n\treturn []int{4, 5}, map[string]int{\"a\": 1}\n}\n",
        );
        let values = returned(&program, "f");
        match &program.value(values[0]).kind {
            ValueKind::Make { members } => {
                assert_eq!(program.const_value(members[1].0), Some(&Constant::Int(1)));
                assert_eq!(program.const_value(members[1].1), Some(&Constant::Int(5)));
            }
            other => panic!("expected make, got {:?}", other),
        }
        assert_eq!(program.value(values[1]).ty, Type::map(Type::String, Type::Number));
    }

    #[test]
    fn test_method_call_passes_receiver() {
        let program = build(
            "package main\n\
             type C struct { n int }\n\
             func (c C) Get() int { return c.n }\n\
             func f(c C) int { return c.Get() }\n",
        );
        let f = program.function_by_name("f").expect("f");
        let param = f.params[0];
        let call = program
            .instructions(f.id)
            .into_iter()
            .find(|v| v.is_call())
            .expect("call");
        match &call.kind {
            ValueKind::Call { callee, args, .. } => {
                assert_eq!(args, &vec![param]);
                assert!(matches!(program.value(*callee).kind, ValueKind::Function(_)));
            }
            _ => unreachable!(),
        }
        assert_eq!(call.ty, Type::Number);
    }

    #[test]
    fn test_logical_operators_and_conversion() {
        let program = build(
            "package main\nfunc f(a, b bool, x int) (bool, float64) {\n\treturn a && b, float64(x)\n}\n",
        );
        let values = returned(&program, "f");
        assert!(program.value(values[0]).is_phi());
        assert!(matches!(program.value(values[1]).kind, ValueKind::TypeCast { .. }));
        assert_eq!(program.value(values[1]).ty, Type::Number);
    }

    #[test]
    fn test_make_new_and_address_of() {
        let program = build(
            "package main\ntype T struct{}\nfunc f() ([]int, *T, *T) {\n\treturn make([]int, 3), new(T), &T{}\n}\n",
        );
        let values = returned(&program, "f");
        assert_eq!(program.value(values[0]).ty, Type::slice(Type::Number));
        assert!(matches!(program.value(values[1]).ty, Type::Pointer(_)));
        assert!(matches!(
            program.value(values[2]).kind,
            ValueKind::UnOp { op: UnaryOp::AddrOf, .. }
        ));
    }

    #[test]
    fn test_unresolved_callee_is_undefined_with_warning() {
        let program = build("package main\nfunc f() { missing(1) }\n");
        assert!(program.has_diagnostic("value undefined: missing"));
        assert_eq!(program.errors().count(), 0);
    }

    #[test]
    fn test_append_keeps_slice_type_and_spread() {
        let program = build(
            "package main\nfunc f(xs, ys []string) []string { return append(xs, ys...) }\n",
        );
        let value = returned(&program, "f")[0];
        assert_eq!(program.value(value).ty, Type::slice(Type::String));
        assert!(matches!(program.value(value).kind, ValueKind::Call { unpack: true, .. }));
    }

    #[test]
    fn test_binary_operator_mapping() {
        let program = build("package main\nfunc f(a, b int) int { return a &^ b }\n");
        let value = returned(&program, "f")[0];
        assert!(matches!(
            program.value(value).kind,
            ValueKind::BinOp { op: BinaryOp::AndNot, .. }
        ));
    }
}
