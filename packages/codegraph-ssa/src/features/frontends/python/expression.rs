//! Python expressions and assignment targets

use tree_sitter::Node;

use super::PythonBuilder;
use crate::features::frontends::common::{
    build_logical, build_ternary, unpack_by_index, unpack_call, unreachable_value, with_range,
};
use crate::features::frontends::literals::{
    parse_float, parse_int, python_string_body, python_string_prefix,
};
use crate::features::parsing::Language;
use crate::features::ssa::domain::{
    messages, BinaryOp, Constant, FunctionType, Severity, Type, UnaryOp, ValueId, ValueKind,
};
use crate::features::ssa::infrastructure::{IfBuilder, LoopBuilder, Variable};
use crate::shared::utils::tree_sitter::{children_by_field, named_children, operator_text};

/// Python spelling of a binary or augmented-assignment operator
pub(super) fn binary_op(token: &str) -> Option<BinaryOp> {
    let token = token
        .strip_suffix('=')
        .filter(|t| !matches!(*t, "" | "=" | "!" | "<" | ">"))
        .unwrap_or(token);
    match token {
        "/" => Some(BinaryOp::TrueDiv),
        "//" => Some(BinaryOp::FloorDiv),
        "%" => Some(BinaryOp::FloorMod),
        "**" => Some(BinaryOp::Pow),
        "@" => Some(BinaryOp::MatMul),
        "<>" => Some(BinaryOp::NotEq),
        "in" => Some(BinaryOp::In),
        "not in" => Some(BinaryOp::NotIn),
        "is" => Some(BinaryOp::Is),
        "is not" => Some(BinaryOp::IsNot),
        "and" => Some(BinaryOp::LogicAnd),
        "or" => Some(BinaryOp::LogicOr),
        other => BinaryOp::from_token(other),
    }
}

/// Nodes that stand for several targets (`a, b = ...`)
fn is_target_list(kind: &str) -> bool {
    matches!(
        kind,
        "pattern_list" | "tuple_pattern" | "list_pattern" | "expression_list" | "tuple" | "list"
    )
}

/// What a comprehension collects into
#[derive(Clone, Copy, PartialEq)]
enum Collect {
    List,
    Set,
    Dict,
}

impl<'t> PythonBuilder<'t> {
    pub(super) fn build_expr(&mut self, node: Node<'t>) -> ValueId {
        with_range(self, &node, |ctx| ctx.build_expr_inner(node))
    }

    fn build_expr_inner(&mut self, node: Node<'t>) -> ValueId {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                self.b.read_or_undefined(name)
            }
            "true" => self.b.emit_const(Constant::Bool(true)),
            "false" => self.b.emit_const(Constant::Bool(false)),
            "none" => self.b.emit_const(Constant::Nil),
            "ellipsis" => self.b.emit_undefined_typed("...", Type::Any),
            "integer" => self.build_number(node, true),
            "float" => self.build_number(node, false),
            "string" => self.build_string(node),
            "concatenated_string" => {
                let mut parts = named_children(node).into_iter();
                let Some(first) = parts.next() else {
                    return self.b.emit_const(Constant::Str(String::new()));
                };
                let mut acc = self.build_expr(first);
                for part in parts {
                    let v = self.build_expr(part);
                    acc = self.b.emit_binop(BinaryOp::Add, acc, v);
                }
                acc
            }
            "parenthesized_expression" => match named_children(node).into_iter().next() {
                Some(inner) => self.build_expr(inner),
                None => self.b.emit_make(Type::Tuple(Vec::new()), Vec::new()),
            },
            "list" | "set" => {
                let items = named_children(node);
                self.build_sequence(&items, Type::slice(Type::Any))
            }
            "tuple" | "expression_list" | "pattern_list" | "tuple_pattern" => {
                let items = named_children(node);
                self.build_tuple(&items)
            }
            "dictionary" => self.build_dict(node),
            "list_comprehension" => self.build_comprehension(node, Collect::List),
            "set_comprehension" | "generator_expression" => {
                self.build_comprehension(node, Collect::Set)
            }
            "dictionary_comprehension" => self.build_comprehension(node, Collect::Dict),
            "binary_operator" => self.build_binary(node),
            "unary_operator" => {
                let op = match operator_text(&node, self.src) {
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Plus,
                    _ => UnaryOp::BitNot,
                };
                let operand = match node.child_by_field_name("argument") {
                    Some(arg) => self.build_expr(arg),
                    None => unreachable_value(&mut self.b),
                };
                self.b.emit_unop(op, operand)
            }
            "not_operator" => {
                let operand = match node.child_by_field_name("argument") {
                    Some(arg) => self.build_expr(arg),
                    None => unreachable_value(&mut self.b),
                };
                self.b.emit_unop(UnaryOp::Not, operand)
            }
            "boolean_operator" => {
                let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) else {
                    return unreachable_value(&mut self.b);
                };
                let is_and = operator_text(&node, self.src) == "and";
                let lhs = self.build_expr(left);
                build_logical(self, is_and, lhs, move |ctx: &mut Self| ctx.build_expr(right))
            }
            "comparison_operator" => self.build_comparison(node),
            "conditional_expression" => {
                let parts = named_children(node);
                let [then, cond, otherwise] = parts.as_slice() else {
                    return unreachable_value(&mut self.b);
                };
                let (then, cond, otherwise) = (*then, *cond, *otherwise);
                build_ternary(
                    self,
                    move |ctx: &mut Self| ctx.build_expr(cond),
                    move |ctx: &mut Self| ctx.build_expr(then),
                    move |ctx: &mut Self| ctx.build_expr(otherwise),
                )
            }
            "call" => self.build_call(node),
            "attribute" => {
                let (Some(object), Some(attr)) = (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("attribute"),
                ) else {
                    return unreachable_value(&mut self.b);
                };
                let object = self.build_expr(object);
                let attr = self.text(attr);
                self.b.read_member_by_name(object, attr)
            }
            "subscript" => self.build_subscript(node),
            "lambda" => self.build_lambda(node),
            "await" => match named_children(node).into_iter().next() {
                Some(inner) => self.build_expr(inner),
                None => unreachable_value(&mut self.b),
            },
            "yield" => {
                if let Some(inner) = named_children(node).into_iter().next() {
                    self.build_expr(inner);
                }
                // The value sent back into the generator is unknown
                self.b.emit_undefined_typed("yield", Type::Any)
            }
            "named_expression" => {
                let (Some(name), Some(value)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("value"),
                ) else {
                    return unreachable_value(&mut self.b);
                };
                let value = self.build_expr(value);
                let name = self.text(name);
                let variable = self.name_variable(name);
                self.b.assign_variable(&variable, value);
                value
            }
            "list_splat" | "dictionary_splat" | "type" | "keyword_argument" => {
                let inner = node
                    .child_by_field_name("value")
                    .or_else(|| named_children(node).into_iter().last());
                match inner {
                    Some(inner) => self.build_expr(inner),
                    None => unreachable_value(&mut self.b),
                }
            }
            _ => unreachable_value(&mut self.b),
        }
    }

    fn build_number(&mut self, node: Node<'t>, integer: bool) -> ValueId {
        let text = self.text(node);
        let imaginary = text.ends_with(['j', 'J']);
        let digits = text.trim_end_matches(['j', 'J']);
        let constant = if integer && !imaginary {
            parse_int(digits, Language::Python).map(Constant::Int)
        } else {
            parse_float(digits).map(Constant::Float)
        };
        match constant {
            Some(c) => self.b.emit_const(c),
            None => {
                let tag = self.b.tag();
                self.b.new_error(
                    Severity::Warn,
                    tag,
                    messages::unsupported(&format!("number literal {}", text)),
                );
                self.b.emit_undefined_typed(text, Type::Number)
            }
        }
    }

    /// String literal; an f-string becomes the concatenation of its
    /// literal pieces and `str()` casts of its interpolations
    fn build_string(&mut self, node: Node<'t>) -> ValueId {
        let text = self.text(node);
        let (prefix, quote) = python_string_prefix(text);
        let raw = prefix.contains('r');
        let start = node.start_byte() + prefix.len() + quote.len();
        let end = node.end_byte().saturating_sub(quote.len()).max(start);

        if !prefix.contains('f') {
            let body = python_string_body(self.src.get(start..end).unwrap_or(""), raw);
            let value = self.b.emit_const(Constant::Str(body));
            if prefix.contains('b') {
                self.b.set_type(value, Type::Bytes);
            }
            return value;
        }

        let mut acc: Option<ValueId> = None;
        let mut cursor = start;
        let interpolations: Vec<Node<'t>> = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "interpolation")
            .collect();
        for interpolation in interpolations {
            let literal = self.fstring_piece(cursor, interpolation.start_byte(), raw);
            acc = self.concat(acc, literal);
            let expr = interpolation
                .child_by_field_name("expression")
                .or_else(|| named_children(interpolation).into_iter().next());
            if let Some(expr) = expr {
                let value = self.build_expr(expr);
                let value = self.b.emit_type_cast(value, Type::String);
                acc = self.concat(acc, Some(value));
            }
            cursor = interpolation.end_byte();
        }
        let tail = self.fstring_piece(cursor, end, raw);
        match self.concat(acc, tail) {
            Some(v) => v,
            None => self.b.emit_const(Constant::Str(String::new())),
        }
    }

    fn fstring_piece(&mut self, start: usize, end: usize, raw: bool) -> Option<ValueId> {
        let piece = self.src.get(start..end).filter(|p| !p.is_empty())?;
        let piece = python_string_body(piece, raw)
            .replace("{{", "{")
            .replace("}}", "}");
        Some(self.b.emit_const(Constant::Str(piece)))
    }

    fn concat(&mut self, acc: Option<ValueId>, next: Option<ValueId>) -> Option<ValueId> {
        match (acc, next) {
            (Some(a), Some(n)) => Some(self.b.emit_binop(BinaryOp::Add, a, n)),
            (a, n) => a.or(n),
        }
    }

    fn build_binary(&mut self, node: Node<'t>) -> ValueId {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return unreachable_value(&mut self.b);
        };
        let lhs = self.build_expr(left);
        let rhs = self.build_expr(right);
        match binary_op(operator_text(&node, self.src)) {
            Some(op) => self.b.emit_binop(op, lhs, rhs),
            None => unreachable_value(&mut self.b),
        }
    }

    /// `a < b < c` is `a < b and b < c`, with `b` evaluated once
    fn build_comparison(&mut self, node: Node<'t>) -> ValueId {
        let operands = named_children(node);
        let operators: Vec<Option<BinaryOp>> = children_by_field(node, "operators")
            .into_iter()
            .map(|op| binary_op(self.text(op)))
            .collect();
        let Some(first) = operands.first().copied() else {
            return unreachable_value(&mut self.b);
        };
        let lhs = self.build_expr(first);
        self.compare_chain(lhs, operands[1..].to_vec(), operators)
    }

    fn compare_chain(
        &mut self,
        lhs: ValueId,
        operands: Vec<Node<'t>>,
        operators: Vec<Option<BinaryOp>>,
    ) -> ValueId {
        let (Some(next), Some(op)) = (operands.first().copied(), operators.first().copied())
        else {
            return lhs;
        };
        let rhs = self.build_expr(next);
        let result = match op {
            Some(op) => self.b.emit_binop(op, lhs, rhs),
            None => unreachable_value(&mut self.b),
        };
        if operands.len() == 1 {
            return result;
        }
        let (rest, ops) = (operands[1..].to_vec(), operators[1..].to_vec());
        build_logical(self, true, result, move |ctx: &mut Self| {
            ctx.compare_chain(rhs, rest, ops)
        })
    }

    fn build_subscript(&mut self, node: Node<'t>) -> ValueId {
        let Some(value) = node.child_by_field_name("value") else {
            return unreachable_value(&mut self.b);
        };
        let object = self.build_expr(value);
        let subscripts = children_by_field(node, "subscript");
        match subscripts.as_slice() {
            [slice] if slice.kind() == "slice" => self.build_slice(object, *slice),
            [key] => {
                let key = self.build_expr(*key);
                self.b.read_member(object, key)
            }
            keys => {
                let key = self.build_tuple(keys);
                self.b.read_member(object, key)
            }
        }
    }

    /// `a[lo:hi:step]`; bounds are the expressions around the colons
    fn build_slice(&mut self, object: ValueId, slice: Node<'t>) -> ValueId {
        let mut bounds: [Option<ValueId>; 3] = [None, None, None];
        let mut index = 0;
        for i in 0..slice.child_count() {
            let Some(child) = slice.child(i) else {
                continue;
            };
            if child.kind() == ":" {
                index += 1;
            } else if child.is_named() && index < 3 {
                bounds[index] = Some(self.build_expr(child));
            }
        }
        let [low, high, step] = bounds;
        self.b.emit_slice(object, low, high, step)
    }

    fn build_sequence(&mut self, items: &[Node<'t>], ty: Type) -> ValueId {
        let mut members = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let value = self.build_expr(*item);
            let key = self.b.emit_const(Constant::Int(i as i64));
            members.push((key, value));
        }
        self.b.emit_make(ty, members)
    }

    fn build_tuple(&mut self, items: &[Node<'t>]) -> ValueId {
        let mut members = Vec::with_capacity(items.len());
        let mut types = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let value = self.build_expr(*item);
            types.push(self.b.value_type(value).clone());
            let key = self.b.emit_const(Constant::Int(i as i64));
            members.push((key, value));
        }
        self.b.emit_make(Type::Tuple(types), members)
    }

    fn build_dict(&mut self, node: Node<'t>) -> ValueId {
        let mut members = Vec::new();
        for item in named_children(node) {
            match item.kind() {
                "pair" => {
                    let (Some(key), Some(value)) = (
                        item.child_by_field_name("key"),
                        item.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    let key = self.build_expr(key);
                    let value = self.build_expr(value);
                    members.push((key, value));
                }
                // `**other` merges a mapping we cannot enumerate
                _ => {
                    self.build_expr(item);
                }
            }
        }
        self.b.emit_make(Type::map(Type::Any, Type::Any), members)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════

    fn build_call(&mut self, node: Node<'t>) -> ValueId {
        let Some(function) = node.child_by_field_name("function") else {
            return unreachable_value(&mut self.b);
        };

        let mut args = Vec::new();
        let callee = match function.kind() {
            "attribute" => {
                let (Some(object), Some(attr)) = (
                    function.child_by_field_name("object"),
                    function.child_by_field_name("attribute"),
                ) else {
                    return unreachable_value(&mut self.b);
                };
                let object = self.build_expr(object);
                let attr = self.text(attr);
                match self.method_of_value(object, attr) {
                    Some((method, bound)) => {
                        if bound {
                            args.push(object);
                        }
                        method
                    }
                    None => self.b.read_member_by_name(object, attr),
                }
            }
            _ => self.build_expr(function),
        };

        let mut unpack = false;
        if let Some(arguments) = node.child_by_field_name("arguments") {
            if arguments.kind() == "generator_expression" {
                args.push(self.build_expr(arguments));
            } else {
                for arg in named_children(arguments) {
                    if arg.kind() == "list_splat" {
                        unpack = true;
                    }
                    args.push(self.build_expr(arg));
                }
            }
        }

        if let ValueKind::ClassObject(bp) = self.b.value(callee).kind {
            let members = self.default_members(bp);
            let object = self.b.emit_make(Type::Blueprint(bp), members);
            if let Some(init) = self.b.find_method(bp, "__init__") {
                let init = self.b.function_value(init);
                args.insert(0, object);
                let mut call = self.b.new_call(init, args);
                call.unpack = unpack;
                self.b.emit_call(call);
            }
            return object;
        }

        let mut call = self.b.new_call(callee, args);
        call.unpack = unpack;
        self.b.emit_call(call)
    }

    /// Method found on the blueprint of `object`. The flag tells whether
    /// `object` is bound as the receiver (an instance, not the class).
    fn method_of_value(&mut self, object: ValueId, name: &str) -> Option<(ValueId, bool)> {
        let bound = !matches!(self.b.value(object).kind, ValueKind::ClassObject(_));
        let bp = self.b.value_type(object).as_blueprint()?;
        let method = self.b.find_method(bp, name)?;
        Some((self.b.function_value(method), bound))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lambdas and comprehensions
    // ═══════════════════════════════════════════════════════════════════════

    fn build_lambda(&mut self, node: Node<'t>) -> ValueId {
        self.lambdas += 1;
        let name = format!("{}$lambda{}", self.b.function_name(), self.lambdas);
        let func = self.b.new_function(name);
        self.b
            .set_signature(func, FunctionType::new(Vec::new(), vec![Type::Any]));
        let value = self.b.function_value(func);

        if let Err(err) = self.b.push_function(func) {
            let tag = self.b.tag();
            self.b.new_error(Severity::Error, tag, err.to_string());
            return value;
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            self.build_params(params);
        }
        let params = self.b.program().function(func).params.len();
        let mut signature = self.b.program().function(func).signature.clone();
        signature.params = vec![Type::Any; params];
        self.b.set_signature(func, signature);

        let result = match node.child_by_field_name("body") {
            Some(body) => self.build_expr(body),
            None => self.b.emit_const(Constant::Nil),
        };
        self.b.emit_return(vec![result]);
        if let Err(err) = self.b.pop_function() {
            let tag = self.b.tag();
            self.b.new_error(Severity::Error, tag, err.to_string());
        }
        value
    }

    /// Comprehensions are built in place: one loop per `for` clause, the
    /// `if` clauses as conditions, and the element added to a fresh
    /// container. Loop variables do not leak out.
    fn build_comprehension(&mut self, node: Node<'t>, collect: Collect) -> ValueId {
        let ty = match collect {
            Collect::Dict => Type::map(Type::Any, Type::Any),
            Collect::List | Collect::Set => Type::slice(Type::Any),
        };
        let result = self.b.emit_make(ty, Vec::new());
        let Some(body) = node.child_by_field_name("body") else {
            return result;
        };
        let clauses: Vec<Node<'t>> = named_children(node)
            .into_iter()
            .filter(|c| c.id() != body.id())
            .collect();

        self.b.push_scope();
        self.build_comprehension_clause(result, body, clauses, collect);
        self.b.pop_scope();
        result
    }

    fn build_comprehension_clause(
        &mut self,
        result: ValueId,
        body: Node<'t>,
        clauses: Vec<Node<'t>>,
        collect: Collect,
    ) {
        let Some((clause, rest)) = clauses.split_first() else {
            self.add_element(result, body, collect);
            return;
        };
        let rest = rest.to_vec();
        match clause.kind() {
            "for_in_clause" => {
                let left = clause.child_by_field_name("left");
                let iter = match clause.child_by_field_name("right") {
                    Some(right) => self.build_expr(right),
                    None => unreachable_value(&mut self.b),
                };
                LoopBuilder::new()
                    .set_condition(move |ctx: &mut Self| {
                        let next = ctx.b.emit_next(iter);
                        let field = ctx.b.read_member_by_name(next, "field");
                        if let Some(left) = left {
                            ctx.assign_target(left, field);
                        }
                        ctx.b.read_member_by_name(next, "ok")
                    })
                    .set_body(move |ctx: &mut Self| {
                        ctx.build_comprehension_clause(result, body, rest, collect)
                    })
                    .finish(self);
            }
            "if_clause" => {
                let Some(cond) = named_children(*clause).into_iter().next() else {
                    return;
                };
                IfBuilder::new()
                    .append_item(
                        move |ctx: &mut Self| ctx.build_expr(cond),
                        move |ctx: &mut Self| {
                            ctx.build_comprehension_clause(result, body, rest, collect)
                        },
                    )
                    .build(self);
            }
            _ => self.build_comprehension_clause(result, body, rest, collect),
        }
    }

    fn add_element(&mut self, result: ValueId, body: Node<'t>, collect: Collect) {
        if collect == Collect::Dict {
            let (Some(key), Some(value)) = (
                body.child_by_field_name("key"),
                body.child_by_field_name("value"),
            ) else {
                self.build_expr(body);
                return;
            };
            let key = self.build_expr(key);
            let value = self.build_expr(value);
            let slot = self.b.member_variable(result, key, "");
            self.b.assign_variable(&slot, value);
            return;
        }
        let element = self.build_expr(body);
        let method = if collect == Collect::List { "append" } else { "add" };
        let callee = self.b.read_member_by_name(result, method);
        let call = self.b.new_call(callee, vec![element]);
        self.b.emit_call(call);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Assignment targets
    // ═══════════════════════════════════════════════════════════════════════

    /// Storage location of a single target (`x`, `o.f`, `a[i]`)
    pub(super) fn target_variable(&mut self, node: Node<'t>) -> Option<Variable> {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                Some(self.name_variable(name))
            }
            "attribute" => {
                let object = self.build_expr(node.child_by_field_name("object")?);
                let attr = self.text(node.child_by_field_name("attribute")?);
                let key = self.b.emit_const(Constant::Str(attr.to_string()));
                Some(self.b.member_variable(object, key, self.text(node)))
            }
            "subscript" => {
                let object = self.build_expr(node.child_by_field_name("value")?);
                let subscripts = children_by_field(node, "subscript");
                let key = match subscripts.as_slice() {
                    [key] => self.build_expr(*key),
                    keys => self.build_tuple(keys),
                };
                Some(self.b.member_variable(object, key, self.text(node)))
            }
            "parenthesized_expression" => {
                let inner = named_children(node).into_iter().next()?;
                self.target_variable(inner)
            }
            _ => None,
        }
    }

    /// Bind `value` to an assignment target, unpacking target lists
    pub(super) fn assign_target(&mut self, target: Node<'t>, value: ValueId) {
        if is_target_list(target.kind()) {
            let targets = named_children(target);
            let values = self.unpack_value(value, &targets);
            for (target, value) in targets.into_iter().zip(values) {
                self.assign_target(target, value);
            }
            return;
        }
        if target.kind() == "list_splat_pattern" || target.kind() == "list_splat" {
            if let Some(inner) = named_children(target).into_iter().next() {
                self.assign_target(inner, value);
            }
            return;
        }
        match self.target_variable(target) {
            Some(variable) => {
                if let (Variable::Member { object, .. }, "attribute") = (&variable, target.kind()) {
                    if let Some(attr) = target.child_by_field_name("attribute") {
                        let attr = self.text(attr);
                        self.record_attribute(*object, attr, value);
                    }
                }
                self.b.assign_variable(&variable, value);
            }
            None => {
                unreachable_value(&mut self.b);
            }
        }
    }

    /// Split one value over a target list. A starred target takes the
    /// slice between the targets before and after it.
    fn unpack_value(&mut self, value: ValueId, targets: &[Node<'t>]) -> Vec<ValueId> {
        let count = targets.len();
        let star = targets
            .iter()
            .position(|t| matches!(t.kind(), "list_splat_pattern" | "list_splat"));
        let Some(star) = star else {
            if self.b.value(value).is_call() {
                return unpack_call(&mut self.b, value, count);
            }
            return unpack_by_index(&mut self.b, value, count);
        };

        let after = count - star - 1;
        (0..count)
            .map(|i| {
                if i == star {
                    let low = self.b.emit_const(Constant::Int(star as i64));
                    let high = if after > 0 {
                        Some(self.b.emit_const(Constant::Int(-(after as i64))))
                    } else {
                        None
                    };
                    self.b.emit_slice(value, Some(low), high, None)
                } else {
                    let index = if i < star { i as i64 } else { i as i64 - count as i64 };
                    let key = self.b.emit_const(Constant::Int(index));
                    self.b.read_member(value, key)
                }
            })
            .collect()
    }
}
