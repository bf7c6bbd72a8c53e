//! Go statements and control flow

use tree_sitter::Node;

use super::expression::CallShape;
use super::GoBuilder;
use crate::features::frontends::common::{unpack_call, unreachable_value, with_range};
use crate::features::ssa::domain::{messages, BinaryOp, Constant, Severity, Type, ValueId};
use crate::features::ssa::infrastructure::{IfBuilder, LoopBuilder, SwitchBuilder};
use crate::shared::utils::tree_sitter::{
    children_by_field, find_child_by_kind, has_child_kind, named_children, operator_text,
};

/// Loops and switches a label can name
const LABELABLE: &[&str] = &[
    "for_statement",
    "expression_switch_statement",
    "type_switch_statement",
    "select_statement",
];

impl<'t> GoBuilder<'t> {
    /// Statements of a block or case, `statement_list` wrappers flattened
    pub(super) fn build_statement_list(&mut self, node: Node<'t>) {
        for child in named_children(node) {
            if child.kind() == "statement_list" {
                self.build_statement_list(child);
            } else {
                self.build_statement(child);
            }
        }
    }

    pub(super) fn build_block(&mut self, node: Node<'t>) {
        self.b.push_scope();
        self.build_statement_list(node);
        self.b.pop_scope();
    }

    pub(super) fn build_statement(&mut self, node: Node<'t>) {
        with_range(self, &node, |ctx| ctx.build_statement_inner(node));
    }

    fn build_statement_inner(&mut self, node: Node<'t>) {
        match node.kind() {
            "expression_statement" => {
                if let Some(expr) = named_children(node).first() {
                    self.build_expr(*expr);
                }
            }
            "short_var_declaration" => self.build_short_var(node),
            "assignment_statement" => self.build_assignment(node),
            "inc_statement" | "dec_statement" => {
                let Some(target) = named_children(node).into_iter().next() else {
                    return;
                };
                let op = if node.kind() == "inc_statement" {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                if let Some(variable) = self.build_lvalue(target) {
                    let current = self.b.read_variable(&variable);
                    let one = self.b.emit_const(Constant::Int(1));
                    let value = self.b.emit_binop(op, current, one);
                    self.b.assign_variable(&variable, value);
                }
            }
            "send_statement" => {
                self.build_send(node);
            }
            "var_declaration" => self.build_var_declaration(node),
            "const_declaration" => self.build_const_declaration(node),
            "type_declaration" => {
                let specs = named_children(node);
                self.declare_types(&specs);
            }
            "block" => self.build_block(node),
            "if_statement" => self.build_if(node),
            "for_statement" => self.build_for(node),
            "expression_switch_statement" => self.build_expression_switch(node),
            "type_switch_statement" => self.build_type_switch(node),
            "select_statement" => self.build_select(node),
            "labeled_statement" => self.build_labeled(node),
            "break_statement" => {
                let done = match find_child_by_kind(node, "label_name") {
                    Some(label) => {
                        let label = self.text(label);
                        self.b.break_label(label)
                    }
                    None => self.b.break_(),
                };
                if !done {
                    self.error(messages::unexpected_break());
                }
            }
            "continue_statement" => {
                let done = match find_child_by_kind(node, "label_name") {
                    Some(label) => {
                        let label = self.text(label);
                        self.b.continue_label(label)
                    }
                    None => self.b.continue_(),
                };
                if !done {
                    self.error(messages::unexpected_continue());
                }
            }
            "goto_statement" => {
                if let Some(label) = find_child_by_kind(node, "label_name") {
                    let label = self.text(label);
                    self.b.goto_label(label);
                }
            }
            "fallthrough_statement" => {
                if !self.b.fallthrough_() {
                    self.error(messages::unexpected_fallthrough());
                }
            }
            "return_statement" => self.build_return(node),
            "go_statement" => self.build_go_defer(node, true),
            "defer_statement" => self.build_go_defer(node, false),
            "empty_statement" => {}
            _ => {
                unreachable_value(&mut self.b);
            }
        }
    }

    fn error(&mut self, message: String) {
        let tag = self.b.tag();
        self.b.new_error(Severity::Error, tag, message);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Assignment
    // ═══════════════════════════════════════════════════════════════════════

    /// Values for `count` targets from an expression list: one per target,
    /// an unpacked call, or a comma-ok form
    pub(super) fn build_rhs(&mut self, list: Node<'t>, count: usize) -> Vec<ValueId> {
        let exprs = if list.kind() == "expression_list" {
            named_children(list)
        } else {
            vec![list]
        };
        if exprs.len() == count {
            return exprs.into_iter().map(|e| self.build_expr(e)).collect();
        }

        if let [single] = exprs.as_slice() {
            let single = strip_parens(*single);
            let comma_ok = count == 2
                && (matches!(
                    single.kind(),
                    "index_expression" | "type_assertion_expression"
                ) || (single.kind() == "unary_expression"
                    && operator_text(&single, self.src) == "<-"));
            if single.kind() == "call_expression" {
                let call = self.build_expr(single);
                return unpack_call(&mut self.b, call, count);
            }
            if comma_ok {
                let value = self.build_expr(single);
                let ok = self.b.read_member_by_name(value, "ok");
                self.b.set_type(ok, Type::Boolean);
                return vec![value, ok];
            }
        }

        self.error(messages::multiple_assign_failed(count, exprs.len()));
        let mut values: Vec<ValueId> = exprs.into_iter().map(|e| self.build_expr(e)).collect();
        values.truncate(count);
        while values.len() < count {
            values.push(self.b.emit_undefined_typed("", Type::Any));
        }
        values
    }

    fn build_short_var(&mut self, node: Node<'t>) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        let names = named_children(left);
        let values = self.build_rhs(right, names.len());
        for (name, value) in names.iter().zip(values) {
            let name = self.text(*name);
            self.define(name, value);
        }
    }

    /// `:=` binding: reuse a name already in this scope, else declare
    fn define(&mut self, name: &str, value: ValueId) {
        if name == "_" {
            return;
        }
        let variable = if self.b.is_declared_in_current_scope(name) {
            self.b.create_variable(name)
        } else {
            self.b.create_local_variable(name)
        };
        self.b.assign_variable(&variable, value);
    }

    fn build_assignment(&mut self, node: Node<'t>) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        let op = operator_text(&node, self.src);
        let lefts = named_children(left);

        if op == "=" {
            let targets: Vec<_> = lefts.iter().map(|l| self.build_lvalue(*l)).collect();
            let values = self.build_rhs(right, targets.len());
            for (target, value) in targets.into_iter().zip(values) {
                if let Some(variable) = target {
                    self.b.assign_variable(&variable, value);
                }
            }
            return;
        }

        let Some(bin) = BinaryOp::from_token(op) else {
            unreachable_value(&mut self.b);
            return;
        };
        for (target, expr) in lefts.into_iter().zip(named_children(right)) {
            let Some(variable) = self.build_lvalue(target) else {
                continue;
            };
            let current = self.b.read_variable(&variable);
            let rhs = self.build_expr(expr);
            let value = self.b.emit_binop(bin, current, rhs);
            self.b.assign_variable(&variable, value);
        }
    }

    fn build_send(&mut self, node: Node<'t>) -> ValueId {
        let (Some(channel), Some(value)) = (
            node.child_by_field_name("channel"),
            node.child_by_field_name("value"),
        ) else {
            return unreachable_value(&mut self.b);
        };
        let channel = self.build_expr(channel);
        let value = self.build_expr(value);
        self.b.emit_binop(BinaryOp::Send, channel, value)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // if / for
    // ═══════════════════════════════════════════════════════════════════════

    fn build_if(&mut self, node: Node<'t>) {
        self.b.push_scope();
        if let Some(init) = node.child_by_field_name("initializer") {
            self.build_statement(init);
        }
        let condition = node.child_by_field_name("condition");
        let consequence = node.child_by_field_name("consequence");
        let alternative = node.child_by_field_name("alternative");

        let mut builder = IfBuilder::new().append_item(
            move |ctx: &mut Self| match condition {
                Some(c) => ctx.build_expr(c),
                None => ctx.b.emit_const(Constant::Bool(true)),
            },
            move |ctx: &mut Self| {
                if let Some(body) = consequence {
                    ctx.build_block(body);
                }
            },
        );
        if let Some(alternative) = alternative {
            builder = builder.set_else(move |ctx: &mut Self| match alternative.kind() {
                "block" => ctx.build_block(alternative),
                _ => ctx.build_statement(alternative),
            });
        }
        builder.build(self);
        self.b.pop_scope();
    }

    fn build_for(&mut self, node: Node<'t>) {
        let label = self.pending_label.take();
        let body = node.child_by_field_name("body");
        let header = named_children(node)
            .into_iter()
            .find(|c| Some(c.id()) != body.map(|b| b.id()));

        let body_thunk = move |ctx: &mut Self| {
            if let Some(body) = body {
                ctx.build_block(body);
            }
        };

        self.b.push_scope();
        match header {
            Some(clause) if clause.kind() == "for_clause" => {
                let init = clause.child_by_field_name("initializer");
                let condition = clause.child_by_field_name("condition");
                let update = clause.child_by_field_name("update");
                let mut builder = LoopBuilder::new()
                    .label(label)
                    .set_first(move |ctx: &mut Self| {
                        if let Some(init) = init {
                            ctx.build_statement(init);
                        }
                    })
                    .set_body(body_thunk)
                    .set_third(move |ctx: &mut Self| {
                        if let Some(update) = update {
                            ctx.build_statement(update);
                        }
                    });
                if let Some(condition) = condition {
                    builder = builder.set_condition(move |ctx: &mut Self| ctx.build_expr(condition));
                }
                builder.finish(self);
            }
            Some(clause) if clause.kind() == "range_clause" => {
                self.build_range(clause, label, body_thunk)
            }
            Some(condition) => LoopBuilder::new()
                .label(label)
                .set_condition(move |ctx: &mut Self| ctx.build_expr(condition))
                .set_body(body_thunk)
                .finish(self),
            None => LoopBuilder::new().label(label).set_body(body_thunk).finish(self),
        }
        self.b.pop_scope();
    }

    /// `for k, v := range x`: each header visit takes one `Next` step and
    /// binds `key` / `field`; the loop runs while `ok`
    fn build_range(
        &mut self,
        clause: Node<'t>,
        label: Option<String>,
        body: impl FnOnce(&mut Self) + 't,
    ) {
        let left = clause.child_by_field_name("left");
        let define = has_child_kind(clause, ":=");
        let iter = match clause.child_by_field_name("right") {
            Some(right) => self.build_expr(right),
            None => unreachable_value(&mut self.b),
        };

        LoopBuilder::new()
            .label(label)
            .set_condition(move |ctx: &mut Self| {
                let next = ctx.b.emit_next(iter);
                let targets = left.map(named_children).unwrap_or_default();
                for (target, part) in targets.into_iter().zip(["key", "field"]) {
                    let value = ctx.b.read_member_by_name(next, part);
                    if define {
                        let name = ctx.text(target);
                        ctx.define(name, value);
                    } else if let Some(variable) = ctx.build_lvalue(target) {
                        ctx.b.assign_variable(&variable, value);
                    }
                }
                ctx.b.read_member_by_name(next, "ok")
            })
            .set_body(body)
            .finish(self);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // switch / select
    // ═══════════════════════════════════════════════════════════════════════

    /// Case body: every named child except the case's own header fields
    fn build_case_body(&mut self, case: Node<'t>) {
        let header: Vec<usize> = ["value", "type", "communication"]
            .iter()
            .flat_map(|field| children_by_field(case, field))
            .map(|n| n.id())
            .collect();
        self.b.push_scope();
        for child in named_children(case) {
            if header.contains(&child.id()) {
                continue;
            }
            if child.kind() == "statement_list" {
                self.build_statement_list(child);
            } else {
                self.build_statement(child);
            }
        }
        self.b.pop_scope();
    }

    fn switch_cases(node: Node<'t>, kind: &str) -> (Vec<Node<'t>>, Option<usize>) {
        let cases: Vec<Node<'t>> = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == kind || c.kind() == "default_case")
            .collect();
        let default = cases.iter().position(|c| c.kind() == "default_case");
        (cases, default)
    }

    fn build_expression_switch(&mut self, node: Node<'t>) {
        let label = self.pending_label.take();
        self.b.push_scope();
        if let Some(init) = node.child_by_field_name("initializer") {
            self.build_statement(init);
        }
        let (cases, default) = Self::switch_cases(node, "expression_case");
        let case_values = cases.clone();

        let mut builder = SwitchBuilder::new()
            .auto_break(true)
            .label(label)
            .build_case_size(cases.len())
            .set_case(move |ctx: &mut Self, i| {
                match case_values[i].child_by_field_name("value") {
                    Some(list) => named_children(list)
                        .into_iter()
                        .map(|e| ctx.build_expr(e))
                        .collect(),
                    None => Vec::new(),
                }
            })
            .build_body(move |ctx: &mut Self, i| ctx.build_case_body(cases[i]));
        if let Some(value) = node.child_by_field_name("value") {
            builder = builder.set_condition(move |ctx: &mut Self| ctx.build_expr(value));
        }
        if let Some(default) = default {
            builder = builder.set_default_case(default);
        }
        builder.finish(self);
        self.b.pop_scope();
    }

    /// `switch v := x.(type)`: each case binds `v` to `x` cast to the
    /// case's type (or left as is for multi-type cases)
    fn build_type_switch(&mut self, node: Node<'t>) {
        let label = self.pending_label.take();
        self.b.push_scope();
        if let Some(init) = node.child_by_field_name("initializer") {
            self.build_statement(init);
        }
        let alias = node
            .child_by_field_name("alias")
            .and_then(|list| named_children(list).into_iter().next())
            .map(|n| self.text(n));
        let subject = match node.child_by_field_name("value") {
            Some(value) => self.build_expr(value),
            None => unreachable_value(&mut self.b),
        };
        let (cases, default) = Self::switch_cases(node, "type_case");
        let case_types = cases.clone();

        let mut builder = SwitchBuilder::new()
            .auto_break(true)
            .label(label)
            .build_case_size(cases.len())
            .set_condition(move |_: &mut Self| subject)
            .set_case(move |ctx: &mut Self, i| {
                children_by_field(case_types[i], "type")
                    .into_iter()
                    .map(|t| {
                        let ty = ctx.go_type(t);
                        ctx.b.emit_type_value(ty)
                    })
                    .collect()
            })
            .build_body(move |ctx: &mut Self, i| {
                let case = cases[i];
                ctx.b.push_scope();
                if let Some(alias) = alias {
                    let types = children_by_field(case, "type");
                    let bound = match types.as_slice() {
                        [single] => {
                            let ty = ctx.go_type(*single);
                            ctx.b.emit_type_cast(subject, ty)
                        }
                        _ => subject,
                    };
                    ctx.define(alias, bound);
                }
                ctx.build_case_body(case);
                ctx.b.pop_scope();
            });
        if let Some(default) = default {
            builder = builder.set_default_case(default);
        }
        builder.finish(self);
        self.b.pop_scope();
    }

    /// `select`: each communication is a case value; a receive binds its
    /// left-hand side at the top of the case body
    fn build_select(&mut self, node: Node<'t>) {
        let label = self.pending_label.take();
        let (cases, default) = Self::switch_cases(node, "communication_case");

        // the dispatch block is the current block, so communications are
        // built here in case order
        let mut values = Vec::with_capacity(cases.len());
        let mut received = Vec::with_capacity(cases.len());
        for case in &cases {
            match case.child_by_field_name("communication") {
                Some(comm) if comm.kind() == "send_statement" => {
                    values.push(vec![self.build_send(comm)]);
                    received.push(None);
                }
                Some(comm) if comm.kind() == "receive_statement" => {
                    let value = match comm.child_by_field_name("right") {
                        Some(right) => self.build_expr(right),
                        None => unreachable_value(&mut self.b),
                    };
                    values.push(vec![value]);
                    received.push(Some((comm, value)));
                }
                Some(other) => {
                    let value = self.build_expr(other);
                    values.push(vec![value]);
                    received.push(None);
                }
                None => {
                    values.push(Vec::new());
                    received.push(None);
                }
            }
        }

        let mut builder = SwitchBuilder::new()
            .auto_break(true)
            .label(label)
            .build_case_size(cases.len())
            .set_case(move |_: &mut Self, i| values[i].clone())
            .build_body(move |ctx: &mut Self, i| {
                ctx.b.push_scope();
                if let Some((comm, value)) = received[i] {
                    ctx.bind_receive(comm, value);
                }
                ctx.build_case_body(cases[i]);
                ctx.b.pop_scope();
            });
        if let Some(default) = default {
            builder = builder.set_default_case(default);
        }
        builder.finish(self);
    }

    fn bind_receive(&mut self, comm: Node<'t>, value: ValueId) {
        let Some(left) = comm.child_by_field_name("left") else {
            return;
        };
        let targets = named_children(left);
        let define = has_child_kind(comm, ":=");
        for (index, target) in targets.into_iter().enumerate() {
            let bound = if index == 0 {
                value
            } else {
                let ok = self.b.read_member_by_name(value, "ok");
                self.b.set_type(ok, Type::Boolean);
                ok
            };
            if define {
                let name = self.text(target);
                self.define(name, bound);
            } else if let Some(variable) = self.build_lvalue(target) {
                self.b.assign_variable(&variable, bound);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // labels, return, go / defer
    // ═══════════════════════════════════════════════════════════════════════

    fn build_labeled(&mut self, node: Node<'t>) {
        let Some(label) = node.child_by_field_name("label") else {
            return;
        };
        let name = self.text(label);
        self.b.build_label(name);
        let inner = named_children(node)
            .into_iter()
            .find(|c| c.id() != label.id());
        if let Some(inner) = inner {
            if LABELABLE.contains(&inner.kind()) {
                self.pending_label = Some(name.to_string());
            }
            self.build_statement(inner);
            self.pending_label = None;
        }
    }

    fn build_return(&mut self, node: Node<'t>) {
        let values = match named_children(node).into_iter().next() {
            Some(list) => {
                let exprs = if list.kind() == "expression_list" {
                    named_children(list)
                } else {
                    vec![list]
                };
                exprs.into_iter().map(|e| self.build_expr(e)).collect()
            }
            None => {
                let named = self.results.last().cloned().unwrap_or_default();
                named.iter().map(|v| self.b.read_variable(v)).collect()
            }
        };
        self.b.emit_return(values);
    }

    fn build_go_defer(&mut self, node: Node<'t>, is_go: bool) {
        let statement = if is_go { "go" } else { "defer" };
        let call = named_children(node).into_iter().next().map(strip_parens);
        let Some(call) = call.filter(|c| c.kind() == "call_expression") else {
            self.error(messages::go_defer_needs_call(statement));
            return;
        };
        match self.call_shape(call) {
            CallShape::Call { mut call, .. } if is_go => {
                call.is_async = true;
                self.b.emit_call(call);
            }
            CallShape::Call { call, .. } => {
                self.b.add_defer(call);
            }
            CallShape::Value(_) => self.error(messages::go_defer_needs_call(statement)),
        }
    }
}

fn strip_parens(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        match named_children(node).into_iter().next() {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use crate::config::BuildConfig;
    use crate::features::frontends::build_go;
    use crate::features::ssa::domain::{Constant, Function, Program, Terminator, Type, ValueKind};

    fn build(source: &str) -> Program {
        build_go(source, &BuildConfig::default()).expect("go build")
    }

    fn function<'p>(program: &'p Program, name: &str) -> &'p Function {
        program.function_by_name(name).expect("function")
    }

    #[test]
    fn test_loop_header_phi_carries_update() {
        let program = build(
            "package main\nfunc f() int {\n\tsum := 0\n\tfor i := 0; i < 3; i++ {\n\t\tsum = sum + i\n\t}\n\treturn sum\n}\n",
        );
        let f = function(&program, "f");
        let header = f
            .blocks
            .iter()
            .map(|b| program.block(*b))
            .find(|b| b.name == "loop.header")
            .expect("header");
        let sum_phi = header
            .phis
            .iter()
            .map(|p| program.value(*p))
            .find(|p| matches!(&p.kind, ValueKind::Phi { variable, .. } if variable == "sum"))
            .expect("sum phi");
        let ops = sum_phi.kind.operands();
        assert_eq!(ops.len(), 2);
        assert!(ops
            .iter()
            .any(|o| matches!(program.value(*o).kind, ValueKind::BinOp { .. })));
        assert!(ops.iter().any(|o| program.const_value(*o) == Some(&Constant::Int(0))));
    }

    #[test]
    fn test_constant_if_visits_one_branch() {
        let program = build(
            "package main\nfunc f() int {\n\tx := 1\n\tif true { x = 2 } else { x = 3 }\n\treturn x\n}\n",
        );
        assert!(!program
            .values
            .iter()
            .any(|v| program.const_value(v.id) == Some(&Constant::Int(3))));
        let f = function(&program, "f");
        assert!(!program.instructions(f.id).iter().any(|v| v.is_phi()));
    }

    #[test]
    fn test_multi_assign_mismatch_is_error() {
        let program = build("package main\nfunc f() { a, b := 1, 2, 3\n\t_ = a\n\t_ = b }\n");
        assert!(program.has_diagnostic("left value length[2] != right value length[3]"));
    }

    #[test]
    fn test_tuple_call_unpacks() {
        let program = build(
            "package main\nfunc pair() (int, string) { return 1, \"a\" }\nfunc f() string {\n\t_, s := pair()\n\treturn s\n}\n",
        );
        assert_eq!(program.errors().count(), 0);
        let f = function(&program, "f");
        assert!(program
            .instructions(f.id)
            .iter()
            .any(|v| matches!(v.kind, ValueKind::Member { .. })));
    }

    #[test]
    fn test_go_and_defer() {
        let program = build(
            "package main\nfunc work() {}\nfunc f(x int) {\n\tgo work()\n\tdefer work()\n\tgo x\n}\n",
        );
        let f = function(&program, "f");
        let async_calls = program
            .instructions(f.id)
            .into_iter()
            .filter(|v| matches!(v.kind, ValueKind::Call { is_async: true, .. }))
            .count();
        assert_eq!(async_calls, 1);
        assert_eq!(f.defers.len(), 1);
        assert!(program.has_diagnostic("expression in go must be a function call"));
    }

    #[test]
    fn test_go_and_defer_reject_conversions_and_builtins() {
        let program = build(
            "package main\nfunc f(x float64) {\n\tdefer int(x)\n\tgo new(int)\n}\n",
        );
        let f = function(&program, "f");
        assert!(f.defers.is_empty());
        assert_eq!(program.errors().count(), 2);
        assert!(program.has_diagnostic("expression in defer must be a function call"));
        assert!(program.has_diagnostic("expression in go must be a function call"));
    }

    #[test]
    fn test_break_outside_loop_is_error() {
        let program = build("package main\nfunc f() {\n\tbreak\n}\n");
        assert!(program.has_diagnostic("unexpected break"));
    }

    #[test]
    fn test_goto_makes_following_code_unreachable() {
        let program = build(
            "package main\nfunc f() int {\n\tx := 1\n\tgoto done\n\tx = 2\ndone:\n\treturn x\n}\n",
        );
        let f = function(&program, "f");
        let dead: Vec<_> = f
            .blocks
            .iter()
            .filter(|b| program.block(**b).name == "goto.after")
            .collect();
        assert_eq!(dead.len(), 1);
        assert!(!program.has_path(f.id, f.entry, *dead[0]));
        let ret = f
            .blocks
            .iter()
            .find_map(|b| match &program.block(*b).terminator {
                Some(Terminator::Return(values)) if !values.is_empty() => Some(values[0]),
                _ => None,
            })
            .expect("return");
        assert_eq!(program.const_value(ret), Some(&Constant::Int(1)));
    }

    #[test]
    fn test_labeled_continue_targets_outer_loop() {
        let program = build(
            "package main\nfunc f() {\nouter:\n\tfor i := 0; i < 2; i++ {\n\t\tfor {\n\t\t\tcontinue outer\n\t\t}\n\t}\n}\n",
        );
        assert_eq!(program.errors().count(), 0);
    }

    #[test]
    fn test_switch_fallthrough_and_default() {
        let program = build(
            "package main\nfunc f(x int) int {\n\ty := 0\n\tswitch x {\n\tcase 1:\n\t\ty = 1\n\t\tfallthrough\n\tcase 2, 3:\n\t\ty = y + 2\n\tdefault:\n\t\ty = 9\n\t}\n\treturn y\n}\n",
        );
        assert_eq!(program.errors().count(), 0);
        let f = function(&program, "f");
        let switch = f
            .blocks
            .iter()
            .find_map(|b| match &program.block(*b).terminator {
                Some(Terminator::Switch { cases, .. }) => Some(cases.len()),
                _ => None,
            })
            .expect("switch");
        assert_eq!(switch, 3);
    }

    #[test]
    fn test_fallthrough_outside_switch_is_error() {
        let program = build("package main\nfunc f() {\n\tfor {\n\t\tfallthrough\n\t}\n}\n");
        assert!(program.has_diagnostic("unexpected fallthrough"));
    }

    #[test]
    fn test_range_binds_key_and_value() {
        let program = build(
            "package main\nfunc f(xs []string) string {\n\tlast := \"\"\n\tfor _, x := range xs {\n\t\tlast = x\n\t}\n\treturn last\n}\n",
        );
        let f = function(&program, "f");
        let insts = program.instructions(f.id);
        assert!(insts.iter().any(|v| matches!(v.kind, ValueKind::Next { .. })));
        let field = insts
            .iter()
            .find(|v| v.variables.iter().any(|n| n == "x"))
            .expect("x bound");
        assert_eq!(field.ty, Type::String);
    }

    #[test]
    fn test_closure_captures_and_records_side_effect() {
        let program = build(
            "package main\nfunc f() int {\n\tn := 1\n\tinc := func() { n = n + 1 }\n\tinc()\n\treturn n\n}\n",
        );
        let closure = function(&program, "f$func1");
        assert_eq!(closure.free_values.len(), 1);
        assert_eq!(closure.side_effects.len(), 1);
        assert_eq!(closure.side_effects[0].variable, "n");
        assert_eq!(closure.parent, Some(function(&program, "f").id));
    }

    #[test]
    fn test_type_switch_binds_alias() {
        let program = build(
            "package main\nfunc f(v any) int {\n\tswitch t := v.(type) {\n\tcase int:\n\t\treturn t\n\t}\n\treturn 0\n}\n",
        );
        assert_eq!(program.errors().count(), 0);
        let f = function(&program, "f");
        assert!(program
            .instructions(f.id)
            .iter()
            .any(|v| matches!(v.kind, ValueKind::TypeCast { .. }) && v.variables.iter().any(|n| n == "t")));
    }
}
