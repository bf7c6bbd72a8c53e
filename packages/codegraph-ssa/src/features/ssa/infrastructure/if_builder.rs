/*
 * If/elif/else construction
 *
 * Items are (condition, body) thunks, built in order. A condition that
 * folds to a boolean constant short-circuits: `true` builds its body
 * inline and drops the rest, `false` skips the item. Otherwise each item
 * gets a true/false block pair; bodies jump to a shared done block.
 */

use super::builder::BuilderContext;
use crate::features::ssa::domain::{BlockId, Constant, ValueId};

pub type CondThunk<'a, C> = Box<dyn FnOnce(&mut C) -> ValueId + 'a>;
pub type BodyThunk<'a, C> = Box<dyn FnOnce(&mut C) + 'a>;

pub struct IfBuilder<'a, C> {
    items: Vec<(CondThunk<'a, C>, BodyThunk<'a, C>)>,
    else_body: Option<BodyThunk<'a, C>>,
}

impl<'a, C: BuilderContext> Default for IfBuilder<'a, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, C: BuilderContext> IfBuilder<'a, C> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            else_body: None,
        }
    }

    pub fn append_item(
        mut self,
        cond: impl FnOnce(&mut C) -> ValueId + 'a,
        body: impl FnOnce(&mut C) + 'a,
    ) -> Self {
        self.items.push((Box::new(cond), Box::new(body)));
        self
    }

    pub fn set_else(mut self, body: impl FnOnce(&mut C) + 'a) -> Self {
        self.else_body = Some(Box::new(body));
        self
    }

    pub fn build(self, ctx: &mut C) {
        let mut done: Option<BlockId> = None;

        for (cond, body) in self.items {
            let c = cond(ctx);
            let folded = ctx
                .builder()
                .evaluate_constant(c)
                .as_ref()
                .and_then(Constant::as_bool);
            match folded {
                Some(true) => {
                    body(ctx);
                    close(ctx, done);
                    return;
                }
                Some(false) => continue,
                None => {}
            }

            let b = ctx.builder();
            let done_block = *done.get_or_insert_with(|| b.new_block("if.done"));
            let then_block = b.new_block("if.true");
            let else_block = b.new_block("if.false");
            b.branch(c, then_block, else_block);
            b.seal_block(then_block);
            b.seal_block(else_block);

            b.switch_to_block(then_block);
            body(ctx);
            ctx.builder().jump(done_block);
            ctx.builder().switch_to_block(else_block);
        }

        if let Some(else_body) = self.else_body {
            else_body(ctx);
        }
        close(ctx, done);
    }
}

fn close<C: BuilderContext>(ctx: &mut C, done: Option<BlockId>) {
    if let Some(done) = done {
        let b = ctx.builder();
        b.jump(done);
        b.seal_block(done);
        b.switch_to_block(done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ssa::infrastructure::builder::ProgramBuilder;

    fn builder() -> ProgramBuilder {
        ProgramBuilder::new("if", "go", "ssa-test")
    }

    #[test]
    fn test_if_else_merges_with_phi() {
        let mut b = builder();
        let p = b.new_param("p");
        let x = b.create_variable("x");
        let zero = b.emit_const(Constant::Int(0));
        b.assign_variable(&x, zero);

        IfBuilder::new()
            .append_item(
                move |_: &mut ProgramBuilder| p,
                |b: &mut ProgramBuilder| {
                    let x = b.create_variable("x");
                    let one = b.emit_const(Constant::Int(1));
                    b.assign_variable(&x, one);
                },
            )
            .set_else(|b: &mut ProgramBuilder| {
                let x = b.create_variable("x");
                let two = b.emit_const(Constant::Int(2));
                b.assign_variable(&x, two);
            })
            .build(&mut b);

        let merged = b.read_value("x").expect("bound");
        assert!(b.value(merged).is_phi());
        assert_eq!(b.value(merged).kind.operands().len(), 2);
    }

    #[test]
    fn test_constant_true_condition_builds_only_taken_branch() {
        let mut b = builder();
        let blocks_before = b.program().blocks.len();
        IfBuilder::new()
            .append_item(
                |b: &mut ProgramBuilder| b.emit_const(Constant::Bool(true)),
                |b: &mut ProgramBuilder| {
                    let x = b.create_variable("x");
                    let one = b.emit_const(Constant::Int(1));
                    b.assign_variable(&x, one);
                },
            )
            .set_else(|b: &mut ProgramBuilder| {
                let y = b.create_variable("y");
                let two = b.emit_const(Constant::Int(2));
                b.assign_variable(&y, two);
            })
            .build(&mut b);

        assert_eq!(b.program().blocks.len(), blocks_before);
        assert!(b.read_value("x").is_some());
        assert!(b.read_value("y").is_none());
    }

    #[test]
    fn test_constant_false_falls_to_else() {
        let mut b = builder();
        IfBuilder::new()
            .append_item(
                |b: &mut ProgramBuilder| b.emit_const(Constant::Bool(false)),
                |b: &mut ProgramBuilder| {
                    let x = b.create_variable("x");
                    let one = b.emit_const(Constant::Int(1));
                    b.assign_variable(&x, one);
                },
            )
            .set_else(|b: &mut ProgramBuilder| {
                let y = b.create_variable("y");
                let two = b.emit_const(Constant::Int(2));
                b.assign_variable(&y, two);
            })
            .build(&mut b);

        assert!(b.read_value("x").is_none());
        assert!(b.read_value("y").is_some());
    }

    #[test]
    fn test_returning_branch_does_not_feed_the_merge() {
        let mut b = builder();
        let f = b.new_function("f");
        b.push_function(f).expect("push");
        let p = b.new_param("p");
        let x = b.create_variable("x");
        let zero = b.emit_const(Constant::Int(0));
        b.assign_variable(&x, zero);

        IfBuilder::new()
            .append_item(
                move |_: &mut ProgramBuilder| p,
                |b: &mut ProgramBuilder| {
                    let x = b.create_variable("x");
                    let one = b.emit_const(Constant::Int(1));
                    b.assign_variable(&x, one);
                    b.emit_return(vec![]);
                },
            )
            .build(&mut b);

        assert_eq!(b.read_value("x"), Some(zero));
    }
}
