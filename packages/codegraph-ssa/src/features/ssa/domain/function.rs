//! Functions and basic blocks

use serde::{Deserialize, Serialize};

use super::ids::{BlockId, BlueprintId, FunctionId, ValueId};
use super::types::FunctionType;
use crate::shared::models::Span;

/// Block terminator (the only way control leaves a block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Jump(BlockId),
    Branch {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    Switch {
        cond: ValueId,
        cases: Vec<(ValueId, BlockId)>,
        default: BlockId,
    },
    Return(Vec<ValueId>),
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Jump(b) => vec![*b],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Switch { cases, default, .. } => {
                let mut succs: Vec<BlockId> = cases.iter().map(|(_, b)| *b).collect();
                succs.push(*default);
                succs
            }
            Terminator::Return(_) => Vec::new(),
        }
    }

    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Terminator::Jump(_) => Vec::new(),
            Terminator::Branch { cond, .. } => vec![*cond],
            Terminator::Switch { cond, cases, .. } => {
                let mut ops = vec![*cond];
                ops.extend(cases.iter().map(|(v, _)| *v));
                ops
            }
            Terminator::Return(values) => values.clone(),
        }
    }

    pub fn replace_operand(&mut self, old: ValueId, new: ValueId) {
        let swap = |v: &mut ValueId| {
            if *v == old {
                *v = new;
            }
        };
        match self {
            Terminator::Jump(_) => {}
            Terminator::Branch { cond, .. } => swap(cond),
            Terminator::Switch { cond, cases, .. } => {
                swap(cond);
                cases.iter_mut().for_each(|(v, _)| swap(v));
            }
            Terminator::Return(values) => values.iter_mut().for_each(swap),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub name: String,
    pub function: FunctionId,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
    pub phis: Vec<ValueId>,
    pub insts: Vec<ValueId>,
    pub terminator: Option<Terminator>,
    /// All predecessors known (Braun et al.)
    pub sealed: bool,
}

impl BasicBlock {
    pub fn new(id: BlockId, name: impl Into<String>, function: FunctionId) -> Self {
        Self {
            id,
            name: name.into(),
            function,
            preds: Vec::new(),
            succs: Vec::new(),
            phis: Vec::new(),
            insts: Vec::new(),
            terminator: None,
            sealed: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

/// Write to a variable captured from an enclosing function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffectRecord {
    pub variable: String,
    pub value: ValueId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    /// The function as a first-class value
    pub value: ValueId,
    pub parent: Option<FunctionId>,
    pub children: Vec<FunctionId>,
    pub params: Vec<ValueId>,
    pub param_length: usize,
    pub signature: FunctionType,
    pub entry: BlockId,
    pub blocks: Vec<BlockId>,
    pub defers: Vec<ValueId>,
    pub free_values: Vec<ValueId>,
    pub side_effects: Vec<SideEffectRecord>,
    pub method_of: Option<BlueprintId>,
    /// Body has been materialized
    pub built: bool,
    pub span: Span,
}

impl Function {
    pub fn is_variadic(&self) -> bool {
        self.signature.variadic
    }
}
