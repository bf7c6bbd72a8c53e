//! Building blocks shared by the language front-ends

use tree_sitter::Node;

use crate::features::ssa::domain::{messages, Constant, Severity, Type, UnaryOp, ValueId};
use crate::features::ssa::infrastructure::{BuilderContext, IfBuilder, ProgramBuilder};
use crate::shared::utils::tree_sitter::node_to_span;

/// Run `f` with the node's span as the current diagnostic range
pub(crate) fn with_range<C: BuilderContext, R>(
    ctx: &mut C,
    node: &Node<'_>,
    f: impl FnOnce(&mut C) -> R,
) -> R {
    ctx.builder().push_range(node_to_span(node));
    let result = f(ctx);
    ctx.builder().pop_range();
    result
}

/// Frontend messages (preprocessor fallback, forced syntax errors)
pub(crate) fn record_warnings(b: &mut ProgramBuilder, warnings: &[String]) {
    let tag = b.tag();
    for warning in warnings {
        b.new_error(Severity::Warn, tag, warning.clone());
    }
}

/// Placeholder for a syntax shape no builder branch handles
pub(crate) fn unreachable_value(b: &mut ProgramBuilder) -> ValueId {
    let tag = b.tag();
    b.new_error(Severity::Error, tag, messages::unreachable());
    b.emit_undefined_typed("", Type::Any)
}

/// `lhs && rhs` / `lhs || rhs` (and Python `and`/`or`).
///
/// The result lives in a temporary: it holds `lhs`, and an if-builder
/// overwrites it with `rhs` on the path where `rhs` is evaluated. Reading
/// it back after the merge yields the phi.
pub(crate) fn build_logical<'a, C: BuilderContext + 'a>(
    ctx: &mut C,
    is_and: bool,
    lhs: ValueId,
    rhs: impl FnOnce(&mut C) -> ValueId + 'a,
) -> ValueId {
    let b = ctx.builder();
    let temp = b.create_local_variable("$logic");
    b.assign_variable(&temp, lhs);
    let cond = if is_and {
        lhs
    } else {
        b.emit_unop(UnaryOp::Not, lhs)
    };

    let target = temp.clone();
    IfBuilder::new()
        .append_item(
            move |_: &mut C| cond,
            move |ctx: &mut C| {
                let value = rhs(ctx);
                ctx.builder().assign_variable(&target, value);
            },
        )
        .build(ctx);
    ctx.builder().read_variable(&temp)
}

/// `c ? a : b` / `a if c else b`
pub(crate) fn build_ternary<'a, C: BuilderContext + 'a>(
    ctx: &mut C,
    cond: impl FnOnce(&mut C) -> ValueId + 'a,
    then: impl FnOnce(&mut C) -> ValueId + 'a,
    otherwise: impl FnOnce(&mut C) -> ValueId + 'a,
) -> ValueId {
    let temp = ctx.builder().create_local_variable("$ternary");
    let (then_target, else_target) = (temp.clone(), temp.clone());
    IfBuilder::new()
        .append_item(cond, move |ctx: &mut C| {
            let value = then(ctx);
            ctx.builder().assign_variable(&then_target, value);
        })
        .set_else(move |ctx: &mut C| {
            let value = otherwise(ctx);
            ctx.builder().assign_variable(&else_target, value);
        })
        .build(ctx);
    ctx.builder().read_variable(&temp)
}

/// Split the result of a call across `count` assignment targets.
///
/// A tuple of the right length is split by index. Any other type gives
/// every target the same value, with a warning; a tuple of the wrong
/// length is an error.
pub(crate) fn unpack_call(b: &mut ProgramBuilder, call: ValueId, count: usize) -> Vec<ValueId> {
    let tag = b.tag();
    let ty = b.value_type(call).clone();
    match ty.tuple_len() {
        Some(n) if n == count => unpack_by_index(b, call, count),
        Some(n) => {
            b.new_error(
                Severity::Error,
                tag,
                messages::multiple_assign_failed(count, n),
            );
            vec![call; count]
        }
        None => {
            b.new_error(
                Severity::Warn,
                tag,
                messages::call_assignment_mismatch(count, &type_label(&ty)),
            );
            vec![call; count]
        }
    }
}

/// `value[0] .. value[count-1]`
pub(crate) fn unpack_by_index(b: &mut ProgramBuilder, value: ValueId, count: usize) -> Vec<ValueId> {
    (0..count)
        .map(|i| {
            let key = b.emit_const(Constant::Int(i as i64));
            b.read_member(value, key)
        })
        .collect()
}

fn type_label(ty: &Type) -> String {
    match ty.unalias() {
        Type::Any => "any".to_string(),
        Type::Null => "nothing".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}
