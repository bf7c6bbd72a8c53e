/*
 * Loop construction
 *
 * Phases: first (init) → header (condition) → body → latch (third) → back
 * edge to the header. `break` leaves through the exit block, `continue`
 * goes to the latch.
 *
 * ```text
 *  preheader ─► header ──cond──► body ─► latch ─┐
 *                 ▲ └──────────► exit           │
 *                 └─────────────────────────────┘
 * ```
 *
 * The header stays unsealed until the back edge exists, so variables
 * written in the body get their loop phis there. In do-while mode the
 * preheader jumps straight into the body and the condition is evaluated
 * after the latch.
 */

use super::builder::BuilderContext;
use super::if_builder::{BodyThunk, CondThunk};
use super::labels::TargetFrame;
use crate::features::ssa::domain::{Constant, ValueId};

pub struct LoopBuilder<'a, C> {
    first: Option<BodyThunk<'a, C>>,
    condition: Option<CondThunk<'a, C>>,
    body: Option<BodyThunk<'a, C>>,
    third: Option<BodyThunk<'a, C>>,
    do_while: bool,
    label: Option<String>,
}

impl<'a, C: BuilderContext> Default for LoopBuilder<'a, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, C: BuilderContext> LoopBuilder<'a, C> {
    pub fn new() -> Self {
        Self {
            first: None,
            condition: None,
            body: None,
            third: None,
            do_while: false,
            label: None,
        }
    }

    pub fn set_first(mut self, first: impl FnOnce(&mut C) + 'a) -> Self {
        self.first = Some(Box::new(first));
        self
    }

    /// Without a condition the loop runs on constant `true`
    pub fn set_condition(mut self, cond: impl FnOnce(&mut C) -> ValueId + 'a) -> Self {
        self.condition = Some(Box::new(cond));
        self
    }

    pub fn set_body(mut self, body: impl FnOnce(&mut C) + 'a) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    pub fn set_third(mut self, third: impl FnOnce(&mut C) + 'a) -> Self {
        self.third = Some(Box::new(third));
        self
    }

    pub fn do_while(mut self) -> Self {
        self.do_while = true;
        self
    }

    /// Register the loop under a source label (`break L` / `continue L`)
    pub fn label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub fn finish(self, ctx: &mut C) {
        if let Some(first) = self.first {
            first(ctx);
        }

        let b = ctx.builder();
        let header = b.new_block("loop.header");
        let body = b.new_block("loop.body");
        let latch = b.new_block("loop.latch");
        let exit = b.new_block("loop.exit");
        let frame = TargetFrame::for_loop(exit, latch, self.label);

        if self.do_while {
            b.jump(body);
            b.switch_to_block(body);
            b.push_target(frame);
            if let Some(body_thunk) = self.body {
                body_thunk(ctx);
            }
            let b = ctx.builder();
            b.pop_target();
            b.jump(latch);
            b.seal_block(latch);

            b.switch_to_block(latch);
            if let Some(third) = self.third {
                third(ctx);
            }
            let b = ctx.builder();
            b.jump(header);
            b.seal_block(header);

            b.switch_to_block(header);
            let cond = evaluate_condition(ctx, self.condition);
            let b = ctx.builder();
            b.branch(cond, body, exit);
            b.seal_block(body);
        } else {
            b.jump(header);
            b.switch_to_block(header);
            let cond = evaluate_condition(ctx, self.condition);
            let b = ctx.builder();
            b.branch(cond, body, exit);
            b.seal_block(body);

            b.switch_to_block(body);
            b.push_target(frame);
            if let Some(body_thunk) = self.body {
                body_thunk(ctx);
            }
            let b = ctx.builder();
            b.pop_target();
            b.jump(latch);
            b.seal_block(latch);

            b.switch_to_block(latch);
            if let Some(third) = self.third {
                third(ctx);
            }
            let b = ctx.builder();
            b.jump(header);
            b.seal_block(header);
        }

        let b = ctx.builder();
        b.seal_block(exit);
        b.switch_to_block(exit);
    }
}

fn evaluate_condition<'a, C: BuilderContext>(
    ctx: &mut C,
    condition: Option<CondThunk<'a, C>>,
) -> ValueId {
    match condition {
        Some(cond) => cond(ctx),
        None => ctx.builder().emit_const(Constant::Bool(true)),
    }
}
