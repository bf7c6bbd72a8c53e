//! `for` / `while` loops, with static unrolling
//!
//! Unrolling is decided on SSA constants, never on source text: a range
//! whose bounds evaluate to integers, or a `while` whose condition keeps
//! folding to a truthy constant, is emitted as straight-line code. Past the
//! configured caps the remaining iterations become an ordinary loop.
//! A `while` condition is folded straight from the syntax tree, so a
//! condition that turns out not to be constant leaves no instructions behind.

use tracing::debug;
use tree_sitter::Node;

use super::expression::binary_op;
use super::PythonBuilder;
use crate::features::frontends::common::unreachable_value;
use crate::features::frontends::literals::{parse_float, parse_int};
use crate::features::parsing::Language;
use crate::features::ssa::domain::{Constant, UnaryOp, ValueId};
use crate::features::ssa::infrastructure::LoopBuilder;
use crate::shared::utils::tree_sitter::{
    children_by_field, find_descendants_by_kind, named_children, operator_text,
};

const JUMPS: &[&str] = &["break_statement", "continue_statement", "return_statement"];

/// Does `body` leave the loop early? Nested functions and classes don't count.
fn has_jump(body: Node<'_>) -> bool {
    JUMPS.iter().any(|kind| {
        !find_descendants_by_kind(body, kind, |n| {
            matches!(
                n.kind(),
                "function_definition" | "class_definition" | "lambda"
            )
        })
        .is_empty()
    })
}

fn truthy(constant: &Constant) -> Option<bool> {
    match constant {
        Constant::Bool(b) => Some(*b),
        Constant::Int(i) => Some(*i != 0),
        Constant::Float(f) => Some(*f != 0.0),
        Constant::Str(s) => Some(!s.is_empty()),
        Constant::Nil => Some(false),
    }
}

/// Values produced by `range(start, stop, step)`, at most `cap` of them.
/// The second element is where the rest of the range starts, if any is left.
fn range_values(start: i64, stop: i64, step: i64, cap: usize) -> (Vec<i64>, Option<i64>) {
    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        if values.len() == cap {
            return (values, Some(current));
        }
        values.push(current);
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    (values, None)
}

impl<'t> PythonBuilder<'t> {
    fn unrollable(&self, body: Option<Node<'t>>) -> bool {
        self.unroll.enabled && body.map_or(true, |b| !has_jump(b))
    }

    fn build_loop_else(&mut self, node: Node<'t>) {
        let body = node
            .child_by_field_name("alternative")
            .and_then(|alt| alt.child_by_field_name("body"));
        if let Some(body) = body {
            self.build_block(body);
        }
    }

    fn build_optional_block(&mut self, body: Option<Node<'t>>) {
        if let Some(body) = body {
            self.build_block(body);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // while
    // ═══════════════════════════════════════════════════════════════════════

    /// Constant value of a condition, read off the tree and the current
    /// definitions. Emits nothing.
    fn static_value(&self, node: Node<'t>) -> Option<Constant> {
        match node.kind() {
            "identifier" => {
                let value = self.b.peek_value(self.text(node))?;
                self.b.evaluate_constant(value)
            }
            "true" => Some(Constant::Bool(true)),
            "false" => Some(Constant::Bool(false)),
            "none" => Some(Constant::Nil),
            "integer" => parse_int(self.text(node), Language::Python).map(Constant::Int),
            "float" => parse_float(self.text(node)).map(Constant::Float),
            "parenthesized_expression" => {
                let inner = named_children(node).into_iter().next()?;
                self.static_value(inner)
            }
            "unary_operator" => {
                let op = match operator_text(&node, self.src) {
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Plus,
                    _ => UnaryOp::BitNot,
                };
                op.fold(&self.static_value(node.child_by_field_name("argument")?)?)
            }
            "not_operator" => {
                let operand = self.static_value(node.child_by_field_name("argument")?)?;
                Some(Constant::Bool(!truthy(&operand)?))
            }
            "binary_operator" => {
                let op = binary_op(operator_text(&node, self.src))?;
                let lhs = self.static_value(node.child_by_field_name("left")?)?;
                let rhs = self.static_value(node.child_by_field_name("right")?)?;
                op.fold(&lhs, &rhs)
            }
            "boolean_operator" => {
                let lhs = self.static_value(node.child_by_field_name("left")?)?;
                let is_and = operator_text(&node, self.src) == "and";
                if truthy(&lhs)? != is_and {
                    return Some(lhs);
                }
                self.static_value(node.child_by_field_name("right")?)
            }
            "comparison_operator" => {
                let operands = named_children(node);
                let operators = children_by_field(node, "operators");
                if operands.len() != operators.len() + 1 {
                    return None;
                }
                let mut lhs = self.static_value(*operands.first()?)?;
                for (operator, operand) in operators.iter().zip(&operands[1..]) {
                    let op = binary_op(self.text(*operator))?;
                    let rhs = self.static_value(*operand)?;
                    if !truthy(&op.fold(&lhs, &rhs)?)? {
                        return Some(Constant::Bool(false));
                    }
                    lhs = rhs;
                }
                Some(Constant::Bool(true))
            }
            _ => None,
        }
    }

    pub(super) fn build_while(&mut self, node: Node<'t>) {
        let condition = node.child_by_field_name("condition");
        let body = node.child_by_field_name("body");

        if self.unrollable(body) {
            if let Some(condition) = condition {
                let cap = self.unroll.max_while_iterations;
                let mut iterations = 0;
                while iterations < cap {
                    match self.static_value(condition).as_ref().and_then(truthy) {
                        Some(false) => {
                            debug!(iterations, "while loop unrolled");
                            self.build_loop_else(node);
                            return;
                        }
                        Some(true) => {
                            self.build_optional_block(body);
                            iterations += 1;
                        }
                        None => break,
                    }
                }
                if iterations > 0 {
                    debug!(iterations, cap, "while unrolling stopped, building loop");
                }
            }
        }

        LoopBuilder::new()
            .set_condition(move |ctx: &mut Self| match condition {
                Some(c) => ctx.build_expr(c),
                None => unreachable_value(&mut ctx.b),
            })
            .set_body(move |ctx: &mut Self| ctx.build_optional_block(body))
            .finish(self);
        self.build_loop_else(node);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // for
    // ═══════════════════════════════════════════════════════════════════════

    /// Arguments of `range(...)` when `right` calls the builtin `range` with
    /// one to three positional arguments
    fn range_arguments(&self, right: Node<'t>) -> Option<Vec<Node<'t>>> {
        if right.kind() != "call" {
            return None;
        }
        let function = right.child_by_field_name("function")?;
        if function.kind() != "identifier" || self.text(function) != "range" {
            return None;
        }
        let builtin = self.b.program().builtins.get("range").copied();
        if builtin.is_none() || self.b.peek_value("range") != builtin {
            return None;
        }
        let args = named_children(right.child_by_field_name("arguments")?);
        let positional = args.iter().all(|a| {
            !matches!(
                a.kind(),
                "keyword_argument" | "list_splat" | "dictionary_splat" | "generator_expression"
            )
        });
        (positional && (1..=3).contains(&args.len())).then_some(args)
    }

    fn range_call(&mut self, args: Vec<ValueId>) -> ValueId {
        let callee = self.b.read_or_undefined("range");
        let call = self.b.new_call(callee, args);
        self.b.emit_call(call)
    }

    pub(super) fn build_for(&mut self, node: Node<'t>) {
        let left = node.child_by_field_name("left");
        let body = node.child_by_field_name("body");
        let Some(right) = node.child_by_field_name("right") else {
            unreachable_value(&mut self.b);
            return;
        };

        let iter = match self.range_arguments(right) {
            Some(arg_nodes) => {
                let args: Vec<ValueId> = arg_nodes.iter().map(|a| self.build_expr(*a)).collect();
                match self.try_unroll_range(node, left, body, &args) {
                    RangeUnroll::Done => return,
                    RangeUnroll::Rest(iter) => iter,
                    RangeUnroll::No => self.range_call(args),
                }
            }
            None => self.build_expr(right),
        };

        self.build_iteration(left, iter, body);
        self.build_loop_else(node);
    }

    fn try_unroll_range(
        &mut self,
        node: Node<'t>,
        left: Option<Node<'t>>,
        body: Option<Node<'t>>,
        args: &[ValueId],
    ) -> RangeUnroll {
        if !self.unrollable(body) {
            return RangeUnroll::No;
        }
        let ints: Option<Vec<i64>> = args
            .iter()
            .map(|a| self.b.evaluate_constant(*a).as_ref().and_then(Constant::as_int))
            .collect();
        let (start, stop, step) = match ints.as_deref() {
            Some([stop]) => (0, *stop, 1),
            Some([start, stop]) => (*start, *stop, 1),
            Some([start, stop, step]) if *step != 0 => (*start, *stop, *step),
            _ => return RangeUnroll::No,
        };

        let cap = self.unroll.max_range_iterations;
        let (values, rest) = range_values(start, stop, step, cap);
        debug!(
            start,
            stop,
            step,
            iterations = values.len(),
            truncated = rest.is_some(),
            "range loop unrolled"
        );
        for value in values {
            let value = self.b.emit_const(Constant::Int(value));
            if let Some(left) = left {
                self.assign_target(left, value);
            }
            self.build_optional_block(body);
        }

        match rest {
            None => {
                self.build_loop_else(node);
                RangeUnroll::Done
            }
            Some(from) => {
                let bounds = [from, stop, step].map(|i| self.b.emit_const(Constant::Int(i)));
                RangeUnroll::Rest(self.range_call(bounds.to_vec()))
            }
        }
    }

    /// `for left in iter: body` over `Next`
    fn build_iteration(&mut self, left: Option<Node<'t>>, iter: ValueId, body: Option<Node<'t>>) {
        LoopBuilder::new()
            .set_condition(move |ctx: &mut Self| {
                let next = ctx.b.emit_next(iter);
                let item = ctx.b.read_member_by_name(next, "field");
                if let Some(left) = left {
                    ctx.assign_target(left, item);
                }
                ctx.b.read_member_by_name(next, "ok")
            })
            .set_body(move |ctx: &mut Self| ctx.build_optional_block(body))
            .finish(self);
    }
}

enum RangeUnroll {
    /// Fully unrolled, `else` included
    Done,
    /// Unrolled up to the cap; iterate the returned range for the rest
    Rest(ValueId),
    No,
}
