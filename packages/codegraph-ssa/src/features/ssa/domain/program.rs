//! Program: arenas plus the program-level export tables
//!
//! Query helpers here are read-only; all construction goes through
//! `ProgramBuilder`.

use ahash::AHashMap;
use petgraph::algo::dominators::simple_fast;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::blueprint::Blueprint;
use super::diagnostic::{Diagnostic, Severity};
use super::function::{BasicBlock, Function};
use super::ids::{BlockId, BlueprintId, FunctionId, ValueId};
use super::types::Type;
use super::value::{Constant, Value};
use crate::shared::models::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub language: String,
    /// Go package clause
    pub package: Option<String>,
    /// Function holding top-level code (`@init`)
    pub entry: FunctionId,
    pub functions: Vec<Function>,
    pub blocks: Vec<BasicBlock>,
    pub values: Vec<Value>,
    pub blueprints: Vec<Blueprint>,
    pub export_types: BTreeMap<String, Type>,
    pub export_values: BTreeMap<String, ValueId>,
    /// Named compile-time constants (enumerators, consts, libc macros)
    pub constants: BTreeMap<String, ValueId>,
    pub builtins: BTreeMap<String, ValueId>,
    pub libraries: BTreeMap<String, ValueId>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Control-flow graph of one function, as a petgraph view
pub struct CfgView {
    pub graph: DiGraph<BlockId, ()>,
    index: AHashMap<BlockId, NodeIndex>,
}

impl CfgView {
    pub fn node(&self, block: BlockId) -> Option<NodeIndex> {
        self.index.get(&block).copied()
    }
}

impl Program {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            package: None,
            entry: FunctionId(0),
            functions: Vec::new(),
            blocks: Vec::new(),
            values: Vec::new(),
            blueprints: Vec::new(),
            export_types: BTreeMap::new(),
            export_values: BTreeMap::new(),
            constants: BTreeMap::new(),
            builtins: BTreeMap::new(),
            libraries: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Arena access
    // ═══════════════════════════════════════════════════════════════════════

    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    #[inline]
    pub fn blueprint(&self, id: BlueprintId) -> &Blueprint {
        &self.blueprints[id.index()]
    }

    pub fn entry_function(&self) -> &Function {
        self.function(self.entry)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lookups
    // ═══════════════════════════════════════════════════════════════════════

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn blueprint_by_name(&self, name: &str) -> Option<&Blueprint> {
        self.blueprints.iter().find(|b| b.name == name)
    }

    /// Constant bound to a program-level name (enumerator, const, macro)
    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants
            .get(name)
            .and_then(|id| self.value(*id).as_const())
    }

    pub fn const_value(&self, id: ValueId) -> Option<&Constant> {
        self.value(id).as_const()
    }

    pub fn export_value(&self, name: &str) -> Option<ValueId> {
        self.export_values.get(name).copied()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warn)
    }

    pub fn has_diagnostic(&self, needle: &str) -> bool {
        self.diagnostics.iter().any(|d| d.message.contains(needle))
    }

    /// Phis and instructions of a function, in block order
    pub fn instructions(&self, func: FunctionId) -> Vec<&Value> {
        self.function(func)
            .blocks
            .iter()
            .flat_map(|b| {
                let block = self.block(*b);
                block.phis.iter().chain(block.insts.iter())
            })
            .map(|id| self.value(*id))
            .collect()
    }

    /// Values ever bound to `variable` inside `func`, in creation order
    pub fn assignments(&self, func: FunctionId, variable: &str) -> Vec<&Value> {
        self.values
            .iter()
            .filter(|v| v.function == func && v.variables.iter().any(|n| n == variable))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CFG queries (petgraph)
    // ═══════════════════════════════════════════════════════════════════════

    pub fn cfg(&self, func: FunctionId) -> CfgView {
        let mut graph = DiGraph::new();
        let mut index = AHashMap::new();
        for b in &self.function(func).blocks {
            index.insert(*b, graph.add_node(*b));
        }
        for b in &self.function(func).blocks {
            for s in &self.block(*b).succs {
                if let (Some(from), Some(to)) = (index.get(b), index.get(s)) {
                    graph.add_edge(*from, *to, ());
                }
            }
        }
        CfgView { graph, index }
    }

    pub fn has_path(&self, func: FunctionId, from: BlockId, to: BlockId) -> bool {
        let cfg = self.cfg(func);
        match (cfg.node(from), cfg.node(to)) {
            (Some(a), Some(b)) => has_path_connecting(&cfg.graph, a, b, None),
            _ => false,
        }
    }

    pub fn reachable_blocks(&self, func: FunctionId) -> Vec<BlockId> {
        let entry = self.function(func).entry;
        self.function(func)
            .blocks
            .iter()
            .copied()
            .filter(|b| self.has_path(func, entry, *b))
            .collect()
    }

    /// Does block `a` dominate block `b`?
    pub fn dominates(&self, func: FunctionId, a: BlockId, b: BlockId) -> bool {
        let cfg = self.cfg(func);
        let (Some(root), Some(na), Some(nb)) = (
            cfg.node(self.function(func).entry),
            cfg.node(a),
            cfg.node(b),
        ) else {
            return false;
        };
        let doms = simple_fast(&cfg.graph, root);
        doms.dominators(nb)
            .map(|mut it| it.any(|n| n == na))
            .unwrap_or(false)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
