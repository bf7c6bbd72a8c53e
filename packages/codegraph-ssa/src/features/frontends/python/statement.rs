//! Python statements and control flow

use tree_sitter::Node;

use super::declaration::definition_of;
use super::expression::binary_op;
use super::PythonBuilder;
use crate::features::frontends::common::{unreachable_value, with_range};
use crate::features::ssa::domain::{messages, Constant, Severity, Type, ValueId};
use crate::features::ssa::infrastructure::IfBuilder;
use crate::shared::utils::tree_sitter::{children_by_field, named_children, operator_text};

impl<'t> PythonBuilder<'t> {
    /// Statements of a module or block, in order
    pub(super) fn build_block(&mut self, node: Node<'t>) {
        for child in named_children(node) {
            self.build_statement(child);
        }
    }

    pub(super) fn build_statement(&mut self, node: Node<'t>) {
        with_range(self, &node, |ctx| ctx.build_statement_inner(node));
    }

    fn build_statement_inner(&mut self, node: Node<'t>) {
        match node.kind() {
            "expression_statement" => {
                for child in named_children(node) {
                    match child.kind() {
                        "assignment" => {
                            self.build_assignment(child);
                        }
                        "augmented_assignment" => self.build_augmented(child),
                        _ => {
                            self.build_expr(child);
                        }
                    }
                }
            }
            "if_statement" => self.build_if(node),
            "while_statement" => self.build_while(node),
            "for_statement" => self.build_for(node),
            "try_statement" => self.build_try(node),
            "with_statement" => self.build_with(node),
            "function_definition" => self.build_def_statement(node),
            "class_definition" => self.build_class(node),
            "decorated_definition" => {
                let def = definition_of(node);
                match def.kind() {
                    "class_definition" => self.build_class(def),
                    _ => self.build_def_statement(def),
                }
            }
            "return_statement" => {
                let values = match named_children(node).into_iter().next() {
                    Some(expr) => vec![self.build_expr(expr)],
                    None => Vec::new(),
                };
                self.b.emit_return(values);
            }
            "pass_statement" => {}
            "break_statement" => {
                if !self.b.break_() {
                    self.error(messages::unexpected_break());
                }
            }
            "continue_statement" => {
                if !self.b.continue_() {
                    self.error(messages::unexpected_continue());
                }
            }
            "import_statement" => self.build_import(node),
            "import_from_statement" => self.build_import_from(node),
            "future_import_statement" => {}
            "global_statement" => {
                if !self.at_top_level() {
                    for name in self.scope_names(node) {
                        self.b.capture(name, true);
                    }
                }
            }
            "nonlocal_statement" => {
                for name in self.scope_names(node) {
                    if self.b.capture(name, false).is_none() {
                        self.error(messages::value_undefined(name));
                    }
                }
            }
            "assert_statement" | "raise_statement" => {
                for expr in named_children(node) {
                    self.build_expr(expr);
                }
            }
            "delete_statement" => {
                for target in named_children(node) {
                    self.build_delete(target);
                }
            }
            "print_statement" | "exec_statement" => {
                let name = if node.kind() == "print_statement" {
                    "print"
                } else {
                    "exec"
                };
                let args: Vec<ValueId> = named_children(node)
                    .into_iter()
                    .filter(|c| c.kind() != "chevron")
                    .map(|c| self.build_expr(c))
                    .collect();
                let callee = self.b.read_or_undefined(name);
                let call = self.b.new_call(callee, args);
                self.b.emit_call(call);
            }
            "match_statement" => {
                let tag = self.b.tag();
                self.b
                    .new_error(Severity::Warn, tag, messages::unsupported("match statement"));
                if let Some(subject) = node.child_by_field_name("subject") {
                    self.build_expr(subject);
                }
            }
            "type_alias_statement" => {}
            _ => {
                unreachable_value(&mut self.b);
            }
        }
    }

    pub(super) fn error(&mut self, message: String) {
        let tag = self.b.tag();
        self.b.new_error(Severity::Error, tag, message);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Assignments
    // ═══════════════════════════════════════════════════════════════════════

    /// `a = b = value`, `a, b = x, y`, `x: T = value`. Returns the value
    /// assigned, so chains can reuse it.
    fn build_assignment(&mut self, node: Node<'t>) -> Option<ValueId> {
        let left = node.child_by_field_name("left")?;
        let right = node.child_by_field_name("right")?;

        if right.kind() == "assignment" {
            let value = self.build_assignment(right)?;
            self.assign_target(left, value);
            return Some(value);
        }

        let left_items = matches!(left.kind(), "pattern_list" | "tuple_pattern" | "list_pattern")
            .then(|| named_children(left));
        let right_items = matches!(right.kind(), "expression_list" | "tuple")
            .then(|| named_children(right));
        if let (Some(targets), Some(exprs)) = (left_items, right_items) {
            let starred = targets
                .iter()
                .any(|t| t.kind() == "list_splat_pattern");
            if !starred {
                self.assign_parallel(&targets, &exprs);
                return None;
            }
        }

        let mut value = self.build_expr(right);
        if let Some(ty) = node.child_by_field_name("type") {
            let ty = self.annotation_type(ty);
            if !ty.is_any() && self.b.value_type(value).is_any() {
                value = self.b.emit_type_cast(value, ty);
            }
        }
        self.assign_target(left, value);
        Some(value)
    }

    /// Element-wise `a, b = x, y`: every right side is built before any
    /// target is written
    fn assign_parallel(&mut self, targets: &[Node<'t>], exprs: &[Node<'t>]) {
        let mut values: Vec<ValueId> = exprs.iter().map(|e| self.build_expr(*e)).collect();
        if values.len() != targets.len() {
            self.error(messages::multiple_assign_failed(targets.len(), values.len()));
            while values.len() < targets.len() {
                let pad = self.b.emit_undefined("");
                values.push(pad);
            }
        }
        for (target, value) in targets.iter().zip(values) {
            self.assign_target(*target, value);
        }
    }

    fn build_augmented(&mut self, node: Node<'t>) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        let Some(op) = binary_op(operator_text(&node, self.src)) else {
            unreachable_value(&mut self.b);
            return;
        };
        let Some(variable) = self.target_variable(left) else {
            unreachable_value(&mut self.b);
            return;
        };
        let current = self.b.read_variable(&variable);
        let rhs = self.build_expr(right);
        let value = self.b.emit_binop(op, current, rhs);
        self.b.assign_variable(&variable, value);
    }

    fn build_delete(&mut self, target: Node<'t>) {
        if matches!(target.kind(), "expression_list" | "tuple") {
            for item in named_children(target) {
                self.build_delete(item);
            }
            return;
        }
        let name = self.text(target).to_string();
        if let Some(variable) = self.target_variable(target) {
            let gone = self.b.emit_undefined(&name);
            self.b.assign_variable(&variable, gone);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // if / try / with
    // ═══════════════════════════════════════════════════════════════════════

    fn build_if(&mut self, node: Node<'t>) {
        let condition = node.child_by_field_name("condition");
        let consequence = node.child_by_field_name("consequence");
        let mut builder = IfBuilder::new().append_item(
            move |ctx: &mut Self| ctx.build_condition(condition),
            move |ctx: &mut Self| {
                if let Some(body) = consequence {
                    ctx.build_block(body);
                }
            },
        );
        for alternative in children_by_field(node, "alternative") {
            match alternative.kind() {
                "elif_clause" => {
                    let condition = alternative.child_by_field_name("condition");
                    let consequence = alternative.child_by_field_name("consequence");
                    builder = builder.append_item(
                        move |ctx: &mut Self| ctx.build_condition(condition),
                        move |ctx: &mut Self| {
                            if let Some(body) = consequence {
                                ctx.build_block(body);
                            }
                        },
                    );
                }
                _ => {
                    let body = alternative.child_by_field_name("body");
                    builder = builder.set_else(move |ctx: &mut Self| {
                        if let Some(body) = body {
                            ctx.build_block(body);
                        }
                    });
                }
            }
        }
        builder.build(self);
    }

    fn build_condition(&mut self, condition: Option<Node<'t>>) -> ValueId {
        match condition {
            Some(c) => self.build_expr(c),
            None => unreachable_value(&mut self.b),
        }
    }

    /// A branch taken when an exception may have been raised
    fn unknown_condition(&mut self) -> ValueId {
        self.b.emit_undefined_typed("$exception", Type::Boolean)
    }

    /// `try` body as written; each `except` handler and the `else` clause
    /// sit under an unknown condition; `finally` runs after the merge
    fn build_try(&mut self, node: Node<'t>) {
        if let Some(body) = node.child_by_field_name("body") {
            self.build_block(body);
        }

        let mut handlers = IfBuilder::new();
        let mut has_handler = false;
        let mut finally = None;
        for clause in named_children(node) {
            match clause.kind() {
                "except_clause" | "except_group_clause" => {
                    has_handler = true;
                    handlers = handlers.append_item(
                        |ctx: &mut Self| ctx.unknown_condition(),
                        move |ctx: &mut Self| ctx.build_except(clause),
                    );
                }
                "else_clause" => {
                    let body = clause.child_by_field_name("body");
                    handlers = handlers.set_else(move |ctx: &mut Self| {
                        if let Some(body) = body {
                            ctx.build_block(body);
                        }
                    });
                    has_handler = true;
                }
                "finally_clause" => finally = Some(clause),
                _ => {}
            }
        }
        if has_handler {
            handlers.build(self);
        }
        if let Some(finally) = finally {
            if let Some(body) = named_children(finally).into_iter().find(|c| c.kind() == "block") {
                self.build_block(body);
            }
        }
    }

    /// `except T as e:` binds `e` to an exception object of unknown value
    fn build_except(&mut self, clause: Node<'t>) {
        let mut header = Vec::new();
        let mut body = None;
        for child in named_children(clause) {
            if child.kind() == "block" {
                body = Some(child);
            } else {
                header.push(child);
            }
        }

        let (kind, alias) = match header.as_slice() {
            [pattern] if pattern.kind() == "as_pattern" => (
                named_children(*pattern).into_iter().next(),
                pattern.child_by_field_name("alias"),
            ),
            [kind, alias, ..] => (Some(*kind), Some(*alias)),
            [kind] => (Some(*kind), None),
            [] => (None, None),
        };
        if let Some(kind) = kind {
            self.build_expr(kind);
        }
        if let Some(alias) = alias {
            let target = named_children(alias)
                .into_iter()
                .next()
                .filter(|_| alias.kind() == "as_pattern_target")
                .unwrap_or(alias);
            let name = self.text(target);
            let exception = self.b.emit_undefined_typed(name, Type::Any);
            self.assign_target(target, exception);
        }
        if let Some(body) = body {
            self.build_block(body);
        }
    }

    /// `with a as x: body` calls `a.__enter__()`, binds its result, builds
    /// the body and calls `a.__exit__()`
    fn build_with(&mut self, node: Node<'t>) {
        let items: Vec<Node<'t>> = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "with_clause")
            .flat_map(named_children)
            .filter(|c| c.kind() == "with_item")
            .collect();

        let mut managers = Vec::with_capacity(items.len());
        for item in items {
            let Some(value) = item.child_by_field_name("value") else {
                continue;
            };
            let (expr, alias) = if value.kind() == "as_pattern" {
                (
                    named_children(value).into_iter().next(),
                    value.child_by_field_name("alias"),
                )
            } else {
                (Some(value), item.child_by_field_name("alias"))
            };
            let Some(expr) = expr else {
                continue;
            };
            let manager = self.build_expr(expr);
            let enter = self.b.read_member_by_name(manager, "__enter__");
            let call = self.b.new_call(enter, Vec::new());
            let entered = self.b.emit_call(call);
            if let Some(alias) = alias {
                let target = if alias.kind() == "as_pattern_target" {
                    named_children(alias).into_iter().next().unwrap_or(alias)
                } else {
                    alias
                };
                self.assign_target(target, entered);
            }
            managers.push(manager);
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.build_block(body);
        }

        for manager in managers.into_iter().rev() {
            let exit = self.b.read_member_by_name(manager, "__exit__");
            let none = self.b.emit_const(Constant::Nil);
            let call = self.b.new_call(exit, vec![none, none, none]);
            self.b.emit_call(call);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Imports
    // ═══════════════════════════════════════════════════════════════════════

    /// Bind a library under `name`: a program library at module level, a
    /// local inside functions
    fn bind_library(&mut self, name: &str, path: &str) {
        if self.at_top_level() {
            self.b.import_lib(name, path);
        } else {
            let lib = self.b.extern_lib(path);
            let variable = self.name_variable(name);
            self.b.assign_variable(&variable, lib);
        }
    }

    /// `import a.b` binds `a`; `import a.b as c` binds `c` to `a.b`
    fn build_import(&mut self, node: Node<'t>) {
        for item in children_by_field(node, "name") {
            match item.kind() {
                "aliased_import" => {
                    let (Some(path), Some(alias)) = (
                        item.child_by_field_name("name"),
                        item.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    let (path, alias) = (self.text(path), self.text(alias));
                    self.bind_library(alias, path);
                }
                _ => {
                    let path = self.text(item);
                    let root = path.split('.').next().unwrap_or(path);
                    self.bind_library(root, root);
                }
            }
        }
    }

    /// `from m import a, b as c`: each name is a member of library `m`
    fn build_import_from(&mut self, node: Node<'t>) {
        let Some(module) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = self.text(module);
        let lib = self.b.extern_lib(module);
        for item in children_by_field(node, "name") {
            let (name, alias) = match item.kind() {
                "aliased_import" => (
                    item.child_by_field_name("name").map(|n| self.text(n)),
                    item.child_by_field_name("alias").map(|n| self.text(n)),
                ),
                _ => (Some(self.text(item)), None),
            };
            let Some(name) = name else {
                continue;
            };
            let member = self.b.read_member_by_name(lib, name);
            let local = alias.unwrap_or(name);
            let variable = self.name_variable(local);
            self.b.assign_variable(&variable, member);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BuildConfig;
    use crate::features::frontends::build_python;
    use crate::features::ssa::domain::{Constant, Program, Severity, Terminator, ValueKind};

    fn build(source: &str) -> Program {
        build_python(source, &BuildConfig::default()).expect("python build")
    }

    #[test]
    fn test_if_elif_else_merges() {
        let program = build(
            "def f(p):\n    if p > 1:\n        x = 1\n    elif p > 0:\n        x = 2\n    else:\n        x = 3\n    return x\n",
        );
        let f = program.function_by_name("f").expect("f");
        let phi = program
            .instructions(f.id)
            .into_iter()
            .find(|v| v.is_phi())
            .expect("phi");
        assert_eq!(phi.kind.operands().len(), 3);
        assert_eq!(program.errors().count(), 0);
    }

    #[test]
    fn test_constant_condition_visits_one_branch() {
        let program = build("if __name__ == '__main__':\n    x = 1\nelse:\n    x = 2\n");
        let init = program.entry_function();
        let x = program.assignments(init.id, "x");
        assert_eq!(x.len(), 1);
        assert_eq!(x[0].as_const(), Some(&Constant::Int(1)));
    }

    #[test]
    fn test_global_write_records_side_effect() {
        let program = build("count = 0\ndef bump():\n    global count\n    count = count + 1\n");
        let bump = program.function_by_name("bump").expect("bump");
        assert_eq!(bump.free_values.len(), 1);
        assert_eq!(bump.side_effects.len(), 1);
        assert_eq!(bump.side_effects[0].variable, "count");
    }

    #[test]
    fn test_local_shadows_module_variable() {
        let program = build("count = 0\ndef f():\n    count = 5\n    return count\n");
        let f = program.function_by_name("f").expect("f");
        assert!(f.free_values.is_empty());
        assert!(f.side_effects.is_empty());
    }

    #[test]
    fn test_nonlocal_in_closure() {
        let program = build(
            "def outer():\n    n = 0\n    def inc():\n        nonlocal n\n        n += 1\n    inc()\n    return n\n",
        );
        let inc = program.function_by_name("outer.inc").expect("inc");
        assert_eq!(inc.side_effects.len(), 1);
        assert!(!program.has_diagnostic("value undefined"));

        let outer = program.function_by_name("outer").expect("outer");
        let returned = outer
            .blocks
            .iter()
            .find_map(|b| match &program.block(*b).terminator {
                Some(Terminator::Return(values)) if !values.is_empty() => Some(values[0]),
                _ => None,
            })
            .expect("return n");
        assert!(matches!(
            &program.value(returned).kind,
            ValueKind::SideEffect { variable, .. } if variable == "n"
        ));
    }

    #[test]
    fn test_try_except_finally_structure() {
        let program = build(
            "def f():\n    try:\n        x = g()\n    except ValueError as e:\n        x = 0\n    else:\n        x = 1\n    finally:\n        y = 2\n    return x\n\ndef g():\n    return 1\n",
        );
        let f = program.function_by_name("f").expect("f");
        let blocks: Vec<&str> = f
            .blocks
            .iter()
            .map(|b| program.block(*b).name.as_str())
            .collect();
        assert!(blocks.contains(&"if.true"));
        assert!(blocks.contains(&"if.done"));
        assert!(program.instructions(f.id).iter().any(|v| v.is_phi()));
        assert_eq!(program.assignments(f.id, "e").len(), 1);
    }

    #[test]
    fn test_with_calls_enter_and_exit() {
        let program = build("with open('f') as fh:\n    data = fh.read()\n");
        let members: Vec<String> = program
            .values
            .iter()
            .filter_map(|v| match &v.kind {
                ValueKind::Member { key, .. } => program
                    .value(*key)
                    .as_const()
                    .and_then(Constant::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect();
        assert!(members.contains(&"__enter__".to_string()));
        assert!(members.contains(&"__exit__".to_string()));
        let init = program.entry_function();
        assert_eq!(program.assignments(init.id, "fh").len(), 1);
    }

    #[test]
    fn test_imports_bind_libraries() {
        let program = build(
            "import os.path\nimport numpy as np\nfrom json import loads as parse\nos.getcwd()\nnp.zeros(3)\nparse('1')\n",
        );
        assert!(program.libraries.contains_key("os"));
        assert!(program.libraries.contains_key("np"));
        assert!(!program.has_diagnostic("value undefined"));
        let init = program.entry_function();
        assert!(matches!(
            program.assignments(init.id, "parse")[0].kind,
            ValueKind::Member { .. }
        ));
    }

    #[test]
    fn test_multi_assign_mismatch() {
        let program = build("a, b = 1, 2, 3\n");
        assert!(program.has_diagnostic("multi-assign failed"));
        let program = build("a, b = 1, 2\n");
        assert_eq!(program.errors().count(), 0);
        let init = program.entry_function();
        assert_eq!(
            program.assignments(init.id, "b")[0].as_const(),
            Some(&Constant::Int(2))
        );
    }

    #[test]
    fn test_break_outside_loop_and_misc_statements() {
        let program = build("break\npass\nassert True\ndel x\nraise ValueError('x')\n");
        assert!(program
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error && d.message.contains("unexpected break")));
    }

    #[test]
    fn test_augmented_assignment() {
        let program = build("x = 10\nx //= 3\nx **= 2\n");
        let init = program.entry_function();
        let xs = program.assignments(init.id, "x");
        assert_eq!(xs.len(), 3);
        assert!(matches!(xs[2].kind, ValueKind::BinOp { .. }));
    }
}
