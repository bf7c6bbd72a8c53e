/*
 * Switch/select construction
 *
 * All case values are evaluated in the dispatching block, which ends in a
 * `Switch` terminator. Case bodies are laid out in source order; without
 * `auto_break` (C) a body that does not leave falls into the next one, with
 * it (Go) the body jumps to the exit unless it says `fallthrough`.
 *
 * Body k can gain a predecessor from body k-1 (fallthrough), so each body
 * block is sealed only once its predecessor body has been built.
 */

use super::builder::BuilderContext;
use super::if_builder::{BodyThunk, CondThunk};
use super::labels::TargetFrame;
use crate::features::ssa::domain::{BlockId, Constant, ValueId};

type CaseThunk<'a, C> = Box<dyn FnMut(&mut C, usize) -> Vec<ValueId> + 'a>;
type CaseBodyThunk<'a, C> = Box<dyn FnMut(&mut C, usize) + 'a>;

pub struct SwitchBuilder<'a, C> {
    condition: Option<CondThunk<'a, C>>,
    case_size: usize,
    case_values: Option<CaseThunk<'a, C>>,
    case_body: Option<CaseBodyThunk<'a, C>>,
    default_body: Option<BodyThunk<'a, C>>,
    default_case: Option<usize>,
    auto_break: bool,
    label: Option<String>,
}

impl<'a, C: BuilderContext> Default for SwitchBuilder<'a, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, C: BuilderContext> SwitchBuilder<'a, C> {
    pub fn new() -> Self {
        Self {
            condition: None,
            case_size: 0,
            case_values: None,
            case_body: None,
            default_body: None,
            default_case: None,
            auto_break: false,
            label: None,
        }
    }

    /// Tagless switches (`switch { case x > 0: }`) dispatch on `true`
    pub fn set_condition(mut self, cond: impl FnOnce(&mut C) -> ValueId + 'a) -> Self {
        self.condition = Some(Box::new(cond));
        self
    }

    pub fn build_case_size(mut self, size: usize) -> Self {
        self.case_size = size;
        self
    }

    /// Values matched by case `i`
    pub fn set_case(mut self, values: impl FnMut(&mut C, usize) -> Vec<ValueId> + 'a) -> Self {
        self.case_values = Some(Box::new(values));
        self
    }

    pub fn build_body(mut self, body: impl FnMut(&mut C, usize) + 'a) -> Self {
        self.case_body = Some(Box::new(body));
        self
    }

    /// Default body placed after every case
    pub fn build_default(mut self, body: impl FnOnce(&mut C) + 'a) -> Self {
        self.default_body = Some(Box::new(body));
        self
    }

    /// Case `i` is the default (C `default:` in the middle of the cases);
    /// its body is built in place by `build_body`
    pub fn set_default_case(mut self, index: usize) -> Self {
        self.default_case = Some(index);
        self
    }

    pub fn auto_break(mut self, auto_break: bool) -> Self {
        self.auto_break = auto_break;
        self
    }

    pub fn label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub fn finish(mut self, ctx: &mut C) {
        let cond = match self.condition.take() {
            Some(cond) => cond(ctx),
            None => ctx.builder().emit_const(Constant::Bool(true)),
        };

        let mut values: Vec<Vec<ValueId>> = Vec::with_capacity(self.case_size);
        for i in 0..self.case_size {
            let case_values = match (&mut self.case_values, self.default_case) {
                (_, Some(d)) if d == i => Vec::new(),
                (Some(f), _) => f(ctx, i),
                (None, _) => Vec::new(),
            };
            values.push(case_values);
        }

        let b = ctx.builder();
        let mut order: Vec<BlockId> = (0..self.case_size)
            .map(|_| b.new_block("switch.case"))
            .collect();
        let default_block = match (self.default_case, &self.default_body) {
            (Some(i), _) if i < order.len() => Some(order[i]),
            (_, Some(_)) => {
                let block = b.new_block("switch.default");
                order.push(block);
                Some(block)
            }
            _ => None,
        };
        let exit = b.new_block("switch.done");

        let cases: Vec<(ValueId, BlockId)> = values
            .iter()
            .zip(order.iter())
            .flat_map(|(vs, block)| vs.iter().map(move |v| (*v, *block)))
            .collect();
        b.emit_switch(cond, cases, default_block.unwrap_or(exit));

        let mut default_body = self.default_body.take();
        for (k, block) in order.iter().copied().enumerate() {
            let next = order.get(k + 1).copied().unwrap_or(exit);
            let b = ctx.builder();
            b.seal_block(block);
            b.switch_to_block(block);
            b.push_scope();
            b.push_target(TargetFrame::for_switch(exit, next, self.label.clone()));

            if k < self.case_size {
                if let Some(body) = self.case_body.as_mut() {
                    body(ctx, k);
                }
            } else if let Some(body) = default_body.take() {
                body(ctx);
            }

            let b = ctx.builder();
            b.pop_target();
            b.pop_scope();
            if self.auto_break {
                b.jump(exit);
            } else {
                b.jump(next);
            }
        }

        let b = ctx.builder();
        b.seal_block(exit);
        b.switch_to_block(exit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ssa::domain::Terminator;
    use crate::features::ssa::infrastructure::builder::ProgramBuilder;

    fn assign(b: &mut ProgramBuilder, name: &str, v: i64) {
        let var = b.create_variable(name);
        let c = b.emit_const(Constant::Int(v));
        b.assign_variable(&var, c);
    }

    #[test]
    fn test_auto_break_switch_merges_every_case() {
        let mut b = ProgramBuilder::new("switch", "go", "ssa-test");
        let p = b.new_param("p");
        assign(&mut b, "x", 0);
        SwitchBuilder::new()
            .set_condition(move |_: &mut ProgramBuilder| p)
            .build_case_size(2)
            .set_case(|b: &mut ProgramBuilder, i| vec![b.emit_const(Constant::Int(i as i64))])
            .build_body(|b: &mut ProgramBuilder, i| assign(b, "x", 10 + i as i64))
            .build_default(|b: &mut ProgramBuilder| assign(b, "x", 99))
            .auto_break(true)
            .finish(&mut b);

        let x = b.read_value("x").expect("bound");
        let program = b.finish();
        let phi = program.value(x);
        assert!(phi.is_phi());
        // two cases + default
        assert_eq!(phi.kind.operands().len(), 3);
    }

    #[test]
    fn test_fallthrough_by_default_without_auto_break() {
        let mut b = ProgramBuilder::new("switch", "c", "ssa-test");
        let p = b.new_param("p");
        let entry = b.current_block();
        SwitchBuilder::new()
            .set_condition(move |_: &mut ProgramBuilder| p)
            .build_case_size(2)
            .set_case(|b: &mut ProgramBuilder, i| vec![b.emit_const(Constant::Int(i as i64))])
            .build_body(|_: &mut ProgramBuilder, _| {})
            .finish(&mut b);
        let program = b.finish();

        let Some(Terminator::Switch { cases, default, .. }) = &program.block(entry).terminator
        else {
            panic!("entry should end in a switch");
        };
        assert_eq!(cases.len(), 2);
        let (first, second) = (cases[0].1, cases[1].1);
        assert_eq!(program.block(first).succs, vec![second]);
        assert_eq!(program.block(*default).name, "switch.done");
    }

    #[test]
    fn test_default_in_the_middle() {
        let mut b = ProgramBuilder::new("switch", "c", "ssa-test");
        let p = b.new_param("p");
        let entry = b.current_block();
        SwitchBuilder::new()
            .set_condition(move |_: &mut ProgramBuilder| p)
            .build_case_size(3)
            .set_default_case(1)
            .set_case(|b: &mut ProgramBuilder, i| vec![b.emit_const(Constant::Int(i as i64))])
            .build_body(|_: &mut ProgramBuilder, _| {})
            .finish(&mut b);
        let program = b.finish();

        let Some(Terminator::Switch { cases, default, .. }) = &program.block(entry).terminator
        else {
            panic!("entry should end in a switch");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(program.block(*default).name, "switch.case");
        assert!(cases.iter().all(|(_, blk)| blk != default));
    }

    #[test]
    fn test_fallthrough_and_break_inside_case() {
        let mut b = ProgramBuilder::new("switch", "go", "ssa-test");
        let p = b.new_param("p");
        SwitchBuilder::new()
            .set_condition(move |_: &mut ProgramBuilder| p)
            .build_case_size(1)
            .set_case(|b: &mut ProgramBuilder, _| vec![b.emit_const(Constant::Int(1))])
            .build_body(|b: &mut ProgramBuilder, _| {
                assert!(b.fallthrough_());
                assert!(!b.continue_());
            })
            .auto_break(true)
            .finish(&mut b);
        assert!(!b.fallthrough_());
    }
}
