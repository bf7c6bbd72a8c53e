/*
 * Program Builder (Braun et al. 2013, on-the-fly SSA)
 *
 * Front-ends drive this builder while walking a syntax tree; SSA form is
 * produced directly, without a separate renaming pass:
 *
 * ```text
 * read(key, block):
 *     if current_def[block][key] exists -> return it
 *     if block not sealed              -> incomplete phi, filled on seal
 *     if block has one predecessor     -> read(key, pred)
 *     if block has no predecessor      -> Undefined
 *     otherwise                        -> phi over all predecessors,
 *                                         then try to remove it as trivial
 * ```
 *
 * One `FunctionState` per function under construction is kept on a stack.
 * Reading a name that is only bound in an enclosing function captures it
 * as a `FreeValue`; writing a captured name records a side effect.
 *
 * References:
 * - "Simple and Efficient Construction of Static Single Assignment Form"
 *   (Braun, Buchwald, Hack, Leißa, Mallon, Zwinkau; CC 2013)
 */

use ahash::{AHashMap, AHashSet};
use tracing::debug;

use super::errors::{SSAError, SSAResult};
use super::labels::{LabelTable, TargetFrame};
use crate::features::ssa::domain::{
    messages, BasicBlock, BinaryOp, BlockId, Blueprint, BlueprintField, BlueprintId,
    BlueprintKind, BlueprintState, Constant, Diagnostic, Function, FunctionId, FunctionType,
    Program, Severity, SideEffectRecord, Terminator, Type, UnaryOp, Value, ValueId, ValueKind,
};
use crate::shared::models::Span;
use crate::shared::ScopeStack;

/// Name of the function holding top-level code
pub const ENTRY_FUNCTION: &str = "@init";

/// Depth limit for constant evaluation through phis
const MAX_EVAL_DEPTH: usize = 512;

/// Assignable storage location
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// Named local; `key` is unique per declaration within the function
    Local { name: String, key: String },
    /// Member slot (`obj.f`, `a[i]`, `*p`)
    Member {
        object: ValueId,
        key: ValueId,
        name: String,
    },
}

impl Variable {
    pub fn name(&self) -> &str {
        match self {
            Variable::Local { name, .. } | Variable::Member { name, .. } => name,
        }
    }
}

/// A call that has been resolved but not emitted yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    pub callee: ValueId,
    pub args: Vec<ValueId>,
    pub is_async: bool,
    /// Last argument is spread (`f(xs...)`, `f(*xs)`)
    pub unpack: bool,
}

/// Anything that can hand out the program builder.
///
/// Control-flow helpers are generic over this so front-end thunks can get
/// their whole front-end context back, not just the builder.
pub trait BuilderContext {
    fn builder(&mut self) -> &mut ProgramBuilder;
}

impl BuilderContext for ProgramBuilder {
    fn builder(&mut self) -> &mut ProgramBuilder {
        self
    }
}

struct FunctionState {
    func: FunctionId,
    current_block: BlockId,
    current_def: AHashMap<(BlockId, String), ValueId>,
    incomplete_phis: AHashMap<BlockId, Vec<(String, ValueId)>>,
    scopes: ScopeStack,
    key_names: AHashMap<String, String>,
    key_counter: AHashMap<String, usize>,
    captured: AHashSet<String>,
    const_keys: AHashSet<String>,
    targets: Vec<TargetFrame>,
    labels: LabelTable,
}

pub struct ProgramBuilder {
    program: Program,
    states: Vec<FunctionState>,
    ranges: Vec<Span>,
    /// Tag for diagnostics raised by the builder itself
    tag: &'static str,
}

impl ProgramBuilder {
    pub fn new(name: impl Into<String>, language: impl Into<String>, tag: &'static str) -> Self {
        let mut builder = Self {
            program: Program::new(name, language),
            states: Vec::new(),
            ranges: Vec::new(),
            tag,
        };
        let entry = builder.new_function(ENTRY_FUNCTION);
        builder.program.entry = entry;
        builder.enter_function(entry);
        builder
    }

    /// Close every open function and hand out the program
    pub fn finish(mut self) -> Program {
        while self.states.len() > 1 {
            self.finish_current();
            self.states.pop();
        }
        if !self.states.is_empty() {
            self.finish_current();
            self.states.clear();
        }
        debug!(
            program = %self.program.name,
            functions = self.program.functions.len(),
            values = self.program.values.len(),
            diagnostics = self.program.diagnostics.len(),
            "SSA program finished"
        );
        self.program
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut Program {
        &mut self.program
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    #[inline]
    fn si(&self) -> usize {
        self.states.len() - 1
    }

    #[inline]
    fn state(&self) -> &FunctionState {
        &self.states[self.si()]
    }

    #[inline]
    fn state_mut(&mut self) -> &mut FunctionState {
        let si = self.si();
        &mut self.states[si]
    }

    pub fn current_function(&self) -> FunctionId {
        self.state().func
    }

    pub fn current_block(&self) -> BlockId {
        self.state().current_block
    }

    pub fn function_name(&self) -> &str {
        &self.program.function(self.current_function()).name
    }

    pub fn function_depth(&self) -> usize {
        self.states.len()
    }

    pub fn value(&self, id: ValueId) -> &Value {
        self.program.value(id)
    }

    pub fn value_type(&self, id: ValueId) -> &Type {
        &self.program.value(id).ty
    }

    pub fn set_type(&mut self, id: ValueId, ty: Type) {
        self.program.values[id.index()].ty = ty;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Source ranges and diagnostics
    // ═══════════════════════════════════════════════════════════════════════

    pub fn push_range(&mut self, span: Span) {
        self.ranges.push(span);
    }

    pub fn pop_range(&mut self) {
        self.ranges.pop();
    }

    pub fn current_span(&self) -> Span {
        self.ranges.last().copied().unwrap_or_default()
    }

    pub fn new_error(&mut self, severity: Severity, tag: &str, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            severity,
            tag: tag.to_string(),
            message: message.into(),
            span: self.current_span(),
            function: self.function_name().to_string(),
        };
        debug!(diagnostic = %diagnostic, "SSA diagnostic");
        self.program.diagnostics.push(diagnostic);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Functions
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a function (and its entry block) nested in the current one.
    /// The body is built later, after `push_function`.
    pub fn new_function(&mut self, name: impl Into<String>) -> FunctionId {
        let id = FunctionId(self.program.functions.len() as u32);
        let entry = BlockId(self.program.blocks.len() as u32);
        let parent = self.states.last().map(|s| s.func);
        let span = self.current_span();

        let value = self.alloc_value(
            parent.unwrap_or(id),
            ValueKind::Function(id),
            Type::function(FunctionType::default()),
            None,
        );
        let name = name.into();
        self.program
            .blocks
            .push(BasicBlock::new(entry, "entry", id));
        self.program.functions.push(Function {
            id,
            name,
            value,
            parent,
            children: Vec::new(),
            params: Vec::new(),
            param_length: 0,
            signature: FunctionType::default(),
            entry,
            blocks: vec![entry],
            defers: Vec::new(),
            free_values: Vec::new(),
            side_effects: Vec::new(),
            method_of: None,
            built: false,
            span,
        });
        if let Some(p) = parent {
            self.program.functions[p.index()].children.push(id);
        }
        id
    }

    pub fn push_function(&mut self, id: FunctionId) -> SSAResult<()> {
        if id.index() >= self.program.functions.len() {
            return Err(SSAError::FunctionNotFound {
                function_id: id.to_string(),
            });
        }
        self.enter_function(id);
        Ok(())
    }

    /// Finish the current function (implicit returns, label sealing) and
    /// return to its caller context
    pub fn pop_function(&mut self) -> SSAResult<FunctionId> {
        if self.states.len() <= 1 {
            return Err(SSAError::FunctionStack {
                operation: "pop of the entry function".to_string(),
            });
        }
        let id = self.current_function();
        self.finish_current();
        self.states.pop();
        Ok(id)
    }

    fn enter_function(&mut self, id: FunctionId) {
        let function = self.program.function(id);
        let entry = function.entry;
        let mut scopes = ScopeStack::new();
        scopes.push(function.name.clone());
        debug!(function = %function.name, "enter function");

        self.program.blocks[entry.index()].sealed = true;
        self.states.push(FunctionState {
            func: id,
            current_block: entry,
            current_def: AHashMap::new(),
            incomplete_phis: AHashMap::new(),
            scopes,
            key_names: AHashMap::new(),
            key_counter: AHashMap::new(),
            captured: AHashSet::new(),
            const_keys: AHashSet::new(),
            targets: Vec::new(),
            labels: LabelTable::default(),
        });
    }

    fn finish_current(&mut self) {
        let func = self.current_function();

        let undefined = self.state().labels.undefined();
        for (name, span) in undefined {
            self.push_range(span);
            self.new_error(Severity::Error, self.tag, messages::undefined_label(&name));
            self.pop_range();
        }

        for block in self.state().labels.blocks() {
            self.seal_block(block);
        }
        let blocks = self.program.function(func).blocks.clone();
        for block in &blocks {
            self.seal_block(*block);
        }
        for block in blocks {
            let b = &mut self.program.blocks[block.index()];
            if b.terminator.is_none() {
                b.terminator = Some(Terminator::Return(Vec::new()));
            }
        }

        let function = &mut self.program.functions[func.index()];
        function.built = true;
        debug!(function = %function.name, blocks = function.blocks.len(), "function built");
    }

    pub fn function_value(&self, func: FunctionId) -> ValueId {
        self.program.function(func).value
    }

    pub fn set_signature(&mut self, func: FunctionId, signature: FunctionType) {
        let value = self.program.function(func).value;
        self.program.values[value.index()].ty = Type::function(signature.clone());
        self.program.functions[func.index()].signature = signature;
    }

    pub fn set_variadic(&mut self, variadic: bool) {
        let func = self.current_function();
        let mut signature = self.program.function(func).signature.clone();
        signature.variadic = variadic;
        self.set_signature(func, signature);
    }

    /// Declare a parameter of the current function and bind it by name
    pub fn new_param(&mut self, name: &str) -> ValueId {
        let func = self.current_function();
        let index = self.program.function(func).params.len();
        let value = self.alloc_value(func, ValueKind::Param { index }, Type::Any, None);
        let function = &mut self.program.functions[func.index()];
        function.params.push(value);
        function.param_length = function.params.len();

        let variable = self.create_local_variable(name);
        self.assign_variable(&variable, value);
        value
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Blocks and terminators
    // ═══════════════════════════════════════════════════════════════════════

    pub fn new_block(&mut self, name: &str) -> BlockId {
        let func = self.current_function();
        let id = BlockId(self.program.blocks.len() as u32);
        self.program.blocks.push(BasicBlock::new(id, name, func));
        self.program.functions[func.index()].blocks.push(id);
        id
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.state_mut().current_block = block;
    }

    pub fn is_terminated(&self) -> bool {
        self.program.block(self.current_block()).is_terminated()
    }

    /// Sealed, not an entry block, and nothing jumps here
    pub fn is_dead_block(&self, block: BlockId) -> bool {
        let b = self.program.block(block);
        b.sealed && b.preds.is_empty() && self.program.function(b.function).entry != block
    }

    /// Continue emission in a fresh block nothing jumps to
    pub fn enter_dead_block(&mut self, name: &str) {
        let block = self.new_block(name);
        self.program.blocks[block.index()].sealed = true;
        self.switch_to_block(block);
    }

    fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.program.blocks[from.index()].succs.push(to);
        self.program.blocks[to.index()].preds.push(from);
    }

    /// Terminate the current block. No-op if it is already terminated.
    pub fn set_terminator(&mut self, terminator: Terminator) -> bool {
        let current = self.current_block();
        if self.program.block(current).is_terminated() {
            return false;
        }
        for succ in terminator.successors() {
            self.add_edge(current, succ);
        }
        self.program.blocks[current.index()].terminator = Some(terminator);
        true
    }

    /// Jump to `target` unless the current block already left or is dead
    pub fn jump(&mut self, target: BlockId) {
        let current = self.current_block();
        if self.is_dead_block(current) {
            return;
        }
        self.set_terminator(Terminator::Jump(target));
    }

    pub fn branch(&mut self, cond: ValueId, then_block: BlockId, else_block: BlockId) {
        self.set_terminator(Terminator::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn emit_switch(&mut self, cond: ValueId, cases: Vec<(ValueId, BlockId)>, default: BlockId) {
        self.set_terminator(Terminator::Switch {
            cond,
            cases,
            default,
        });
    }

    /// Mark all predecessors of `block` as known and complete its phis
    pub fn seal_block(&mut self, block: BlockId) {
        if self.program.block(block).sealed {
            return;
        }
        let si = self.si();
        let pending = self.states[si]
            .incomplete_phis
            .remove(&block)
            .unwrap_or_default();
        for (key, phi) in pending {
            self.add_phi_operands(si, &key, phi);
        }
        self.program.blocks[block.index()].sealed = true;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Braun core
    // ═══════════════════════════════════════════════════════════════════════

    fn write_def(&mut self, si: usize, block: BlockId, key: &str, value: ValueId) {
        self.states[si]
            .current_def
            .insert((block, key.to_string()), value);
    }

    fn read_def(&mut self, si: usize, block: BlockId, key: &str) -> ValueId {
        if let Some(v) = self.states[si].current_def.get(&(block, key.to_string())) {
            return *v;
        }
        self.read_def_recursive(si, block, key)
    }

    fn read_def_recursive(&mut self, si: usize, block: BlockId, key: &str) -> ValueId {
        let value = if !self.program.block(block).sealed {
            let phi = self.new_phi(si, block, key);
            self.states[si]
                .incomplete_phis
                .entry(block)
                .or_default()
                .push((key.to_string(), phi));
            phi
        } else {
            let preds = self.program.block(block).preds.clone();
            match preds.as_slice() {
                [] => {
                    let name = self.key_name(si, key);
                    self.undefined_in(si, name)
                }
                [pred] => self.read_def(si, *pred, key),
                _ => {
                    let phi = self.new_phi(si, block, key);
                    self.write_def(si, block, key, phi);
                    self.add_phi_operands(si, key, phi)
                }
            }
        };
        self.write_def(si, block, key, value);
        value
    }

    fn key_name(&self, si: usize, key: &str) -> String {
        self.states[si]
            .key_names
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    fn new_phi(&mut self, si: usize, block: BlockId, key: &str) -> ValueId {
        let variable = self.key_name(si, key);
        let func = self.states[si].func;
        #[cfg(feature = "trace")]
        tracing::trace!(variable = %variable, block = %block, "new phi");
        let phi = self.alloc_value(
            func,
            ValueKind::Phi {
                variable,
                edges: Vec::new(),
            },
            Type::Any,
            Some(block),
        );
        self.program.blocks[block.index()].phis.push(phi);
        phi
    }

    fn add_phi_operands(&mut self, si: usize, key: &str, phi: ValueId) -> ValueId {
        let Some(block) = self.program.value(phi).block else {
            return phi;
        };
        let preds = self.program.block(block).preds.clone();
        let mut ty: Option<Type> = None;
        for pred in preds {
            let operand = self.read_def(si, pred, key);
            let operand_ty = self.program.value(operand).ty.clone();
            ty = Some(match ty {
                Some(t) => t.join(&operand_ty),
                None => operand_ty,
            });
            if let ValueKind::Phi { edges, .. } = &mut self.program.values[phi.index()].kind {
                edges.push((pred, operand));
            }
        }
        if let Some(ty) = ty {
            self.program.values[phi.index()].ty = ty;
        }
        self.try_remove_trivial_phi(si, phi)
    }

    fn try_remove_trivial_phi(&mut self, si: usize, phi: ValueId) -> ValueId {
        let (variable, edges) = match &self.program.value(phi).kind {
            ValueKind::Phi { variable, edges } => (variable.clone(), edges.clone()),
            _ => return phi,
        };
        let mut same: Option<ValueId> = None;
        for (_, op) in edges {
            if Some(op) == same || op == phi {
                continue;
            }
            if same.is_some() {
                return phi;
            }
            same = Some(op);
        }
        let same = match same {
            Some(v) => v,
            None => self.undefined_in(si, variable),
        };

        let users: Vec<ValueId> = self
            .program
            .values
            .iter()
            .filter(|v| v.id != phi && v.is_phi() && v.kind.operands().contains(&phi))
            .map(|v| v.id)
            .collect();

        self.replace_all_uses(phi, same);
        if let Some(block) = self.program.value(phi).block {
            self.program.blocks[block.index()].phis.retain(|p| *p != phi);
        }
        #[cfg(feature = "trace")]
        tracing::trace!(phi = %phi, replacement = %same, "trivial phi removed");

        for user in users {
            let alive = self
                .program
                .value(user)
                .block
                .map(|b| self.program.block(b).phis.contains(&user))
                .unwrap_or(false);
            if alive {
                self.try_remove_trivial_phi(si, user);
            }
        }
        same
    }

    fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        for value in self.program.values.iter_mut() {
            if value.id != old {
                value.kind.replace_operand(old, new);
            }
        }
        for block in self.program.blocks.iter_mut() {
            if let Some(term) = block.terminator.as_mut() {
                term.replace_operand(old, new);
            }
        }
        for state in self.states.iter_mut() {
            for v in state.current_def.values_mut() {
                if *v == old {
                    *v = new;
                }
            }
        }
        for function in self.program.functions.iter_mut() {
            for effect in function.side_effects.iter_mut() {
                if effect.value == old {
                    effect.value = new;
                }
            }
        }
        let program = &mut self.program;
        for table in [
            &mut program.constants,
            &mut program.export_values,
            &mut program.builtins,
            &mut program.libraries,
        ] {
            for v in table.values_mut() {
                if *v == old {
                    *v = new;
                }
            }
        }
    }

    /// Look a definition up without creating phis
    fn peek_def(&self, si: usize, block: BlockId, key: &str) -> Option<ValueId> {
        let mut visited = AHashSet::new();
        self.peek_def_inner(si, block, key, &mut visited)
    }

    fn peek_def_inner(
        &self,
        si: usize,
        block: BlockId,
        key: &str,
        visited: &mut AHashSet<BlockId>,
    ) -> Option<ValueId> {
        if let Some(v) = self.states[si].current_def.get(&(block, key.to_string())) {
            return Some(*v);
        }
        if !visited.insert(block) {
            return None;
        }
        let preds = &self.program.block(block).preds;
        let mut found: Option<ValueId> = None;
        for pred in preds {
            let v = self.peek_def_inner(si, *pred, key, visited)?;
            match found {
                Some(f) if f != v => return None,
                _ => found = Some(v),
            }
        }
        found
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Variables
    // ═══════════════════════════════════════════════════════════════════════

    pub fn push_scope(&mut self) {
        self.state_mut().scopes.push("");
    }

    pub fn pop_scope(&mut self) {
        let state = self.state_mut();
        if state.scopes.depth() > 1 {
            state.scopes.pop();
        }
    }

    /// Is `name` bound in the current function (including captures)?
    pub fn is_declared(&self, name: &str) -> bool {
        self.state().scopes.lookup(name).is_some()
    }

    /// Is `name` declared in the innermost scope (Go `:=` redeclaration)?
    pub fn is_declared_in_current_scope(&self, name: &str) -> bool {
        self.state().scopes.is_declared_in_current(name)
    }

    fn allocate_key(&mut self, name: &str) -> String {
        let state = self.state_mut();
        let n = state.key_counter.entry(name.to_string()).or_insert(0);
        let key = if *n == 0 {
            name.to_string()
        } else {
            format!("{}#{}", name, n)
        };
        *n += 1;
        state.key_names.insert(key.clone(), name.to_string());
        key
    }

    /// Always declare a fresh binding in the innermost scope
    pub fn create_local_variable(&mut self, name: &str) -> Variable {
        let key = self.allocate_key(name);
        self.state_mut().scopes.declare(name, key.clone());
        Variable::Local {
            name: name.to_string(),
            key,
        }
    }

    /// Resolve a visible binding (capturing from enclosing functions),
    /// or declare one in the innermost scope
    pub fn create_variable(&mut self, name: &str) -> Variable {
        if let Some(key) = self.state().scopes.lookup(name) {
            return Variable::Local {
                name: name.to_string(),
                key: key.to_string(),
            };
        }
        if let Some(key) = self.capture(name, false) {
            return Variable::Local {
                name: name.to_string(),
                key,
            };
        }
        self.create_local_variable(name)
    }

    /// Bind an enclosing function's variable as a free value of the current
    /// function. With `force`, the name is bound even if no enclosing
    /// function defines it (Python `global` before the global exists).
    pub fn capture(&mut self, name: &str, force: bool) -> Option<String> {
        let si = self.si();
        if let Some(key) = self.states[si].scopes.lookup(name) {
            if self.states[si].captured.contains(key) {
                return Some(key.to_string());
            }
        }
        let outer = (0..si).rev().find_map(|oi| {
            self.states[oi]
                .scopes
                .lookup(name)
                .map(|key| (oi, key.to_string()))
        });
        let captured = match outer {
            Some((oi, key)) => {
                let block = self.states[oi].current_block;
                Some(self.read_def(oi, block, &key))
            }
            None if force => None,
            None => return None,
        };

        let func = self.current_function();
        let ty = captured
            .map(|v| self.program.value(v).ty.clone())
            .unwrap_or_default();
        let free = self.alloc_value(
            func,
            ValueKind::FreeValue {
                name: name.to_string(),
                captured,
            },
            ty,
            None,
        );
        self.program.values[free.index()]
            .variables
            .push(name.to_string());

        let key = self.allocate_key(name);
        let entry = self.program.function(func).entry;
        let state = self.state_mut();
        state.scopes.declare_root(name, key.clone());
        state.captured.insert(key.clone());
        self.write_def(si, entry, &key, free);
        self.program.functions[func.index()].free_values.push(free);
        debug!(name, function = %self.function_name(), "captured free value");
        Some(key)
    }

    /// Declare a read-only local (Go `const` inside a function)
    pub fn declare_constant(&mut self, name: &str, value: ValueId) {
        let variable = self.create_local_variable(name);
        self.assign_variable(&variable, value);
        if let Variable::Local { key, .. } = variable {
            self.state_mut().const_keys.insert(key);
        }
    }

    pub fn assign_variable(&mut self, variable: &Variable, value: ValueId) {
        let si = self.si();
        let block = self.current_block();
        match variable {
            Variable::Local { name, key } => {
                if self.states[si].const_keys.contains(key) {
                    self.new_error(Severity::Error, self.tag, messages::assign_to_const(name));
                    return;
                }
                self.write_def(si, block, key, value);
                self.bind_name(value, name);
                if self.states[si].captured.contains(key) {
                    let func = self.current_function();
                    self.program.functions[func.index()]
                        .side_effects
                        .push(SideEffectRecord {
                            variable: name.clone(),
                            value,
                        });
                }
            }
            Variable::Member { object, key, name } => {
                self.emit(
                    ValueKind::SetMember {
                        object: *object,
                        key: *key,
                        value,
                    },
                    Type::Null,
                );
                let member_key = self.member_def_key(*object, *key);
                self.write_def(si, block, &member_key, value);
                self.bind_name(value, name);
            }
        }
    }

    fn bind_name(&mut self, value: ValueId, name: &str) {
        let vars = &mut self.program.values[value.index()].variables;
        if !vars.iter().any(|v| v == name) {
            vars.push(name.to_string());
        }
    }

    /// Resolve `name`: locals, captures, then program constants, exported
    /// values, builtins and libraries
    pub fn read_value(&mut self, name: &str) -> Option<ValueId> {
        let si = self.si();
        let block = self.current_block();
        if let Some(key) = self.states[si].scopes.lookup(name).map(str::to_string) {
            return Some(self.read_def(si, block, &key));
        }
        if let Some(key) = self.capture(name, false) {
            return Some(self.read_def(si, block, &key));
        }
        self.program_binding(name)
    }

    fn program_binding(&self, name: &str) -> Option<ValueId> {
        let p = &self.program;
        p.constants
            .get(name)
            .or_else(|| p.export_values.get(name))
            .or_else(|| p.builtins.get(name))
            .or_else(|| p.libraries.get(name))
            .copied()
    }

    /// `read_value`, or an Undefined placeholder plus a warning
    pub fn read_or_undefined(&mut self, name: &str) -> ValueId {
        match self.read_value(name) {
            Some(v) => v,
            None => {
                self.new_error(Severity::Warn, self.tag, messages::value_undefined(name));
                self.emit_undefined_typed(name, Type::Any)
            }
        }
    }

    /// Current value of an assignable location
    pub fn read_variable(&mut self, variable: &Variable) -> ValueId {
        match variable {
            Variable::Local { key, .. } => {
                let si = self.si();
                let block = self.current_block();
                self.read_def(si, block, key)
            }
            Variable::Member { object, key, .. } => self.read_member(*object, *key),
        }
    }

    /// Read without creating phis or captures
    pub fn peek_value(&self, name: &str) -> Option<ValueId> {
        let si = self.si();
        if let Some(key) = self.states[si].scopes.lookup(name) {
            return self.peek_def(si, self.current_block(), key);
        }
        self.program_binding(name)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Members
    // ═══════════════════════════════════════════════════════════════════════

    fn member_def_key(&self, object: ValueId, key: ValueId) -> String {
        match self.program.value(key).as_const() {
            Some(Constant::Str(s)) => format!("#{}.{}", object, s),
            Some(c) => format!("#{}.{}", object, c),
            None => format!("#{}.{}", object, key),
        }
    }

    pub fn member_variable(&self, object: ValueId, key: ValueId, name: impl Into<String>) -> Variable {
        Variable::Member {
            object,
            key,
            name: name.into(),
        }
    }

    /// Read `object[key]`: the last value stored on this path, or a fresh
    /// `Member` instruction
    pub fn read_member(&mut self, object: ValueId, key: ValueId) -> ValueId {
        let si = self.si();
        let block = self.current_block();
        let member_key = self.member_def_key(object, key);
        if let Some(v) = self.peek_def(si, block, &member_key) {
            return v;
        }
        let ty = self.member_type(object, key);
        let member = self.emit(ValueKind::Member { object, key }, ty);
        self.write_def(si, block, &member_key, member);
        member
    }

    pub fn read_member_by_name(&mut self, object: ValueId, name: &str) -> ValueId {
        let key = self.emit_const(Constant::Str(name.to_string()));
        self.read_member(object, key)
    }

    fn member_type(&self, object: ValueId, key: ValueId) -> Type {
        let object_value = self.program.value(object);
        let key_const = self.program.value(key).as_const();

        if let ValueKind::Next { iter } = &object_value.kind {
            let iter_ty = &self.program.value(*iter).ty;
            return match key_const.and_then(Constant::as_str) {
                Some("ok") => Type::Boolean,
                Some("key") => iter_ty.key().cloned().unwrap_or_default(),
                Some("field") => iter_ty.element().cloned().unwrap_or_default(),
                _ => Type::Any,
            };
        }

        let ty = object_value.ty.unalias();
        if let Some(bp) = ty.as_blueprint() {
            if let Some(field) = key_const
                .and_then(Constant::as_str)
                .and_then(|name| self.program.blueprint(bp).field(name))
            {
                return field.ty.clone();
            }
            return Type::Any;
        }
        match (ty, key_const) {
            (Type::Struct(fields), Some(Constant::Str(name))) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, t)| t.clone())
                .unwrap_or_default(),
            (Type::Tuple(items), Some(Constant::Int(i))) => {
                items.get(*i as usize).cloned().unwrap_or_default()
            }
            _ => ty.element().cloned().unwrap_or_default(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Emission
    // ═══════════════════════════════════════════════════════════════════════

    fn alloc_value(
        &mut self,
        function: FunctionId,
        kind: ValueKind,
        ty: Type,
        block: Option<BlockId>,
    ) -> ValueId {
        let id = ValueId(self.program.values.len() as u32);
        self.program.values.push(Value {
            id,
            kind,
            ty,
            function,
            block,
            span: self.current_span(),
            variables: Vec::new(),
        });
        id
    }

    /// Append an instruction to the current block
    fn emit(&mut self, kind: ValueKind, ty: Type) -> ValueId {
        let func = self.current_function();
        let block = self.current_block();
        let id = self.alloc_value(func, kind, ty, Some(block));
        self.program.blocks[block.index()].insts.push(id);
        id
    }

    /// Create a value that lives outside any block (constants, params, ...)
    fn leaf(&mut self, kind: ValueKind, ty: Type) -> ValueId {
        let func = self.current_function();
        self.alloc_value(func, kind, ty, None)
    }

    fn undefined_in(&mut self, si: usize, name: String) -> ValueId {
        let func = self.states[si].func;
        self.alloc_value(func, ValueKind::Undefined { name }, Type::Undefined, None)
    }

    pub fn emit_const(&mut self, constant: Constant) -> ValueId {
        let ty = constant.type_of();
        self.leaf(ValueKind::Const(constant), ty)
    }

    pub fn emit_undefined(&mut self, name: &str) -> ValueId {
        self.emit_undefined_typed(name, Type::Undefined)
    }

    pub fn emit_undefined_typed(&mut self, name: &str, ty: Type) -> ValueId {
        self.leaf(
            ValueKind::Undefined {
                name: name.to_string(),
            },
            ty,
        )
    }

    pub fn emit_binop(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = op.result_type(self.value_type(lhs), self.value_type(rhs));
        self.emit(ValueKind::BinOp { op, lhs, rhs }, ty)
    }

    pub fn emit_unop(&mut self, op: UnaryOp, operand: ValueId) -> ValueId {
        let operand_ty = self.value_type(operand);
        let ty = match op {
            UnaryOp::Not => Type::Boolean,
            UnaryOp::AddrOf => Type::pointer(operand_ty.clone()),
            UnaryOp::Deref | UnaryOp::Recv => operand_ty.element().cloned().unwrap_or_default(),
            UnaryOp::Plus | UnaryOp::Neg | UnaryOp::BitNot => operand_ty.clone(),
        };
        self.emit(ValueKind::UnOp { op, operand }, ty)
    }

    pub fn new_call(&self, callee: ValueId, args: Vec<ValueId>) -> PendingCall {
        PendingCall {
            callee,
            args,
            is_async: false,
            unpack: false,
        }
    }

    fn call_kind_and_type(&self, call: PendingCall) -> (ValueKind, Type) {
        let ty = self
            .value_type(call.callee)
            .as_function()
            .map(FunctionType::result_type)
            .unwrap_or_default();
        (
            ValueKind::Call {
                callee: call.callee,
                args: call.args,
                is_async: call.is_async,
                unpack: call.unpack,
            },
            ty,
        )
    }

    pub fn emit_call(&mut self, call: PendingCall) -> ValueId {
        let callee = call.callee;
        let (kind, ty) = self.call_kind_and_type(call);
        let id = self.emit(kind, ty);
        self.apply_side_effects(callee, id);
        id
    }

    /// Rebind every caller variable the callee closure writes to a
    /// `SideEffect` of `call`. Only closures nested in the current function
    /// are considered; their captured names resolve in the caller's scope.
    fn apply_side_effects(&mut self, callee: ValueId, call: ValueId) {
        let ValueKind::Function(func) = self.program.value(callee).kind else {
            return;
        };
        let current = self.current_function();
        let mut ancestor = self.program.function(func).parent;
        while let Some(parent) = ancestor {
            if parent == current {
                break;
            }
            ancestor = self.program.function(parent).parent;
        }
        if ancestor.is_none() {
            return;
        }

        let mut written: Vec<String> = Vec::new();
        for effect in &self.program.function(func).side_effects {
            if !written.contains(&effect.variable) {
                written.push(effect.variable.clone());
            }
        }
        let si = self.si();
        for (index, name) in written.into_iter().enumerate() {
            let Some(key) = self.states[si].scopes.lookup(&name).map(str::to_string) else {
                continue;
            };
            let value = self.emit_side_effect(call, index, &name);
            debug!(variable = %name, function = %self.function_name(), "applied closure side effect");
            self.assign_variable(&Variable::Local { name, key }, value);
        }
    }

    /// Record a deferred call; it is not part of any block
    pub fn add_defer(&mut self, call: PendingCall) -> ValueId {
        let (kind, ty) = self.call_kind_and_type(call);
        let id = self.leaf(kind, ty);
        let func = self.current_function();
        self.program.functions[func.index()].defers.push(id);
        id
    }

    /// Return from the current function; later code lands in a dead block
    pub fn emit_return(&mut self, values: Vec<ValueId>) {
        self.set_terminator(Terminator::Return(values));
        self.enter_dead_block("return.after");
    }

    pub fn emit_make(&mut self, ty: Type, members: Vec<(ValueId, ValueId)>) -> ValueId {
        self.emit(ValueKind::Make { members }, ty)
    }

    pub fn emit_next(&mut self, iter: ValueId) -> ValueId {
        self.emit(ValueKind::Next { iter }, Type::Any)
    }

    pub fn emit_type_cast(&mut self, value: ValueId, ty: Type) -> ValueId {
        self.emit(ValueKind::TypeCast { value }, ty)
    }

    pub fn emit_type_value(&mut self, ty: Type) -> ValueId {
        self.leaf(ValueKind::TypeValue, ty)
    }

    pub fn emit_side_effect(&mut self, call: ValueId, index: usize, variable: &str) -> ValueId {
        self.emit(
            ValueKind::SideEffect {
                call,
                index,
                variable: variable.to_string(),
            },
            Type::Any,
        )
    }

    pub fn emit_slice(
        &mut self,
        value: ValueId,
        low: Option<ValueId>,
        high: Option<ValueId>,
        max: Option<ValueId>,
    ) -> ValueId {
        let ty = self.value_type(value).clone();
        self.emit(
            ValueKind::Slice {
                value,
                low,
                high,
                max,
            },
            ty,
        )
    }

    pub fn emit_extern_function(&mut self, name: &str, signature: Option<FunctionType>) -> ValueId {
        let ty = signature.map(Type::function).unwrap_or_default();
        self.leaf(
            ValueKind::ExternFunction {
                name: name.to_string(),
            },
            ty,
        )
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Program tables
    // ═══════════════════════════════════════════════════════════════════════

    pub fn set_package(&mut self, name: &str) {
        self.program.package = Some(name.to_string());
    }

    pub fn set_export_type(&mut self, name: &str, ty: Type) {
        self.program.export_types.insert(name.to_string(), ty);
    }

    pub fn export_type(&self, name: &str) -> Option<&Type> {
        self.program.export_types.get(name)
    }

    pub fn set_export_value(&mut self, name: &str, value: ValueId) {
        self.program.export_values.insert(name.to_string(), value);
    }

    pub fn set_constant(&mut self, name: &str, value: ValueId) {
        self.program.constants.insert(name.to_string(), value);
    }

    pub fn register_builtin(&mut self, name: &str, value: ValueId) {
        self.program.builtins.insert(name.to_string(), value);
    }

    /// Unbound library reference (Python `import` binds it as a local)
    pub fn extern_lib(&mut self, path: &str) -> ValueId {
        self.leaf(
            ValueKind::ExternLib {
                path: path.to_string(),
            },
            Type::Any,
        )
    }

    /// Bind an imported library under `name`
    pub fn import_lib(&mut self, name: &str, path: &str) -> ValueId {
        let lib = self.extern_lib(path);
        self.program.libraries.insert(name.to_string(), lib);
        lib
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Blueprints
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a blueprint, or complete the placeholder a forward reference
    /// left under the same name
    pub fn create_blueprint(&mut self, name: &str, kind: BlueprintKind) -> BlueprintId {
        if let Some(id) = self.get_blueprint(name) {
            let bp = &mut self.program.blueprints[id.index()];
            if bp.state == BlueprintState::Declared {
                bp.kind = kind;
                return id;
            }
        }
        let id = BlueprintId(self.program.blueprints.len() as u32);
        self.program.blueprints.push(Blueprint::new(id, name, kind));
        self.set_export_type(name, Type::Blueprint(id));
        id
    }

    pub fn get_blueprint(&self, name: &str) -> Option<BlueprintId> {
        match self.program.export_types.get(name)? {
            Type::Blueprint(id) => Some(*id),
            Type::Alias { inner, .. } => inner.as_blueprint(),
            _ => None,
        }
    }

    /// Look a blueprint up by name, leaving a `Declared` placeholder if it
    /// has not been seen yet
    pub fn get_or_create_blueprint(&mut self, name: &str, kind: BlueprintKind) -> BlueprintId {
        match self.get_blueprint(name) {
            Some(id) => id,
            None => {
                let id = BlueprintId(self.program.blueprints.len() as u32);
                self.program.blueprints.push(Blueprint::new(id, name, kind));
                self.set_export_type(name, Type::Blueprint(id));
                id
            }
        }
    }

    pub fn begin_blueprint(&mut self, id: BlueprintId) {
        self.program.blueprints[id.index()].state = BlueprintState::UnderConstruction;
    }

    pub fn complete_blueprint(&mut self, id: BlueprintId) {
        self.program.blueprints[id.index()].state = BlueprintState::Complete;
    }

    /// Does `descendant` inherit (transitively) from `ancestor`?
    pub fn derives_from(&self, descendant: BlueprintId, ancestor: BlueprintId) -> bool {
        let mut stack = vec![descendant];
        let mut visited = AHashSet::new();
        while let Some(bp) = stack.pop() {
            if bp == ancestor {
                return true;
            }
            if visited.insert(bp) {
                stack.extend(self.program.blueprint(bp).parents.iter().copied());
            }
        }
        false
    }

    pub fn add_parent(&mut self, child: BlueprintId, parent: BlueprintId) -> SSAResult<()> {
        if self.derives_from(parent, child) {
            return Err(SSAError::InheritanceCycle {
                child: self.program.blueprint(child).name.clone(),
                parent: self.program.blueprint(parent).name.clone(),
            });
        }
        let parents = &mut self.program.blueprints[child.index()].parents;
        if !parents.contains(&parent) {
            parents.push(parent);
        }
        Ok(())
    }

    pub fn add_field(&mut self, id: BlueprintId, name: &str, ty: Type, default: Option<ValueId>) {
        let bp = &mut self.program.blueprints[id.index()];
        if let Some(field) = bp.fields.iter_mut().find(|f| f.name == name) {
            field.ty = ty;
            if default.is_some() {
                field.default = default;
            }
            return;
        }
        bp.fields.push(BlueprintField {
            name: name.to_string(),
            ty,
            default,
            anonymous: false,
        });
    }

    pub fn add_anonymous_field(&mut self, id: BlueprintId, name: &str, ty: Type) {
        self.add_field(id, name, ty, None);
        if let Some(field) = self.program.blueprints[id.index()]
            .fields
            .iter_mut()
            .find(|f| f.name == name)
        {
            field.anonymous = true;
        }
    }

    pub fn add_method(&mut self, id: BlueprintId, name: &str, func: FunctionId) {
        self.program.blueprints[id.index()]
            .methods
            .insert(name.to_string(), func);
        self.program.functions[func.index()].method_of = Some(id);
    }

    pub fn add_magic_method(&mut self, id: BlueprintId, name: &str, func: FunctionId) {
        self.program.blueprints[id.index()]
            .magic_methods
            .insert(name.to_string(), func);
        self.program.functions[func.index()].method_of = Some(id);
    }

    /// Find a method on the blueprint or its ancestors
    pub fn find_method(&self, id: BlueprintId, name: &str) -> Option<FunctionId> {
        let mut stack = vec![id];
        let mut visited = AHashSet::new();
        while let Some(bp) = stack.pop() {
            if !visited.insert(bp) {
                continue;
            }
            let blueprint = self.program.blueprint(bp);
            if let Some(f) = blueprint
                .methods
                .get(name)
                .or_else(|| blueprint.magic_methods.get(name))
            {
                return Some(*f);
            }
            stack.extend(blueprint.parents.iter().rev().copied());
        }
        None
    }

    /// The value a class name evaluates to
    pub fn blueprint_object(&mut self, id: BlueprintId) -> ValueId {
        if let Some(object) = self.program.blueprint(id).object {
            return object;
        }
        let entry = self.program.entry;
        let object = self.alloc_value(entry, ValueKind::ClassObject(id), Type::Blueprint(id), None);
        self.program.blueprints[id.index()].object = Some(object);
        object
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Jump targets and labels
    // ═══════════════════════════════════════════════════════════════════════

    pub fn push_target(&mut self, frame: TargetFrame) {
        self.state_mut().targets.push(frame);
    }

    pub fn pop_target(&mut self) {
        self.state_mut().targets.pop();
    }

    fn jump_away(&mut self, target: BlockId, after: &str) {
        self.jump(target);
        self.enter_dead_block(after);
    }

    /// Jump to the innermost break target. False when there is none.
    pub fn break_(&mut self) -> bool {
        let target = self.state().targets.iter().rev().find_map(|t| t.break_to);
        match target {
            Some(block) => {
                self.jump_away(block, "break.after");
                true
            }
            None => false,
        }
    }

    pub fn continue_(&mut self) -> bool {
        let target = self.state().targets.iter().rev().find_map(|t| t.continue_to);
        match target {
            Some(block) => {
                self.jump_away(block, "continue.after");
                true
            }
            None => false,
        }
    }

    /// Jump into the next case body; only valid directly inside a case
    pub fn fallthrough_(&mut self) -> bool {
        let target = self.state().targets.last().and_then(|t| t.fallthrough_to);
        match target {
            Some(block) => {
                self.jump_away(block, "fallthrough.after");
                true
            }
            None => false,
        }
    }

    fn labeled_target(&self, label: &str) -> Option<&TargetFrame> {
        self.state()
            .targets
            .iter()
            .rev()
            .find(|t| t.label.as_deref() == Some(label))
    }

    pub fn break_label(&mut self, label: &str) -> bool {
        let target = self.labeled_target(label).and_then(|t| t.break_to);
        match target {
            Some(block) => {
                self.jump_away(block, "break.after");
                true
            }
            None => false,
        }
    }

    pub fn continue_label(&mut self, label: &str) -> bool {
        let target = self.labeled_target(label).and_then(|t| t.continue_to);
        match target {
            Some(block) => {
                self.jump_away(block, "continue.after");
                true
            }
            None => false,
        }
    }

    /// Pass 1: create the label's block ahead of any goto
    pub fn declare_label(&mut self, name: &str) -> BlockId {
        if let Some(info) = self.state().labels.get(name) {
            return info.block;
        }
        let block = self.new_block(&format!("label.{}", name));
        self.state_mut().labels.insert(name, block);
        block
    }

    /// `name:` falls through into the label block and continues there
    pub fn build_label(&mut self, name: &str) -> BlockId {
        let block = self.declare_label(name);
        let already = self
            .state()
            .labels
            .get(name)
            .map(|l| l.defined)
            .unwrap_or(false);
        if already {
            self.new_error(Severity::Error, self.tag, messages::label_redefined(name));
        }
        self.jump(block);
        self.switch_to_block(block);
        if let Some(info) = self.state_mut().labels.get_mut(name) {
            info.defined = true;
        }
        block
    }

    pub fn goto_label(&mut self, name: &str) {
        let block = self.declare_label(name);
        let span = self.current_span();
        if let Some(info) = self.state_mut().labels.get_mut(name) {
            info.gotos.push(span);
        }
        self.jump_away(block, "goto.after");
    }

    pub fn label_block(&self, name: &str) -> Option<BlockId> {
        self.state().labels.get(name).map(|l| l.block)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Constant evaluation
    // ═══════════════════════════════════════════════════════════════════════

    /// Fold the expression tree rooted at `value` if every leaf is a
    /// constant. The IR is left untouched.
    pub fn evaluate_constant(&self, value: ValueId) -> Option<Constant> {
        self.evaluate_at(value, 0)
    }

    fn evaluate_at(&self, value: ValueId, depth: usize) -> Option<Constant> {
        if depth > MAX_EVAL_DEPTH {
            return None;
        }
        match &self.program.value(value).kind {
            ValueKind::Const(c) => Some(c.clone()),
            ValueKind::BinOp { op, lhs, rhs } => {
                let l = self.evaluate_at(*lhs, depth + 1)?;
                let r = self.evaluate_at(*rhs, depth + 1)?;
                op.fold(&l, &r)
            }
            ValueKind::UnOp { op, operand } => {
                let v = self.evaluate_at(*operand, depth + 1)?;
                op.fold(&v)
            }
            ValueKind::TypeCast { value } => self.evaluate_at(*value, depth + 1),
            ValueKind::Phi { edges, .. } => {
                let mut result: Option<Constant> = None;
                for (_, op) in edges {
                    if *op == value {
                        continue;
                    }
                    let c = self.evaluate_at(*op, depth + 1)?;
                    match &result {
                        Some(r) if *r != c => return None,
                        _ => result = Some(c),
                    }
                }
                result
            }
            _ => None,
        }
    }
}
