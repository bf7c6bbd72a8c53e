//! C statements

use tree_sitter::Node;

use super::{flatten_items, CBuilder, PREPROC_GROUPS};
use crate::features::frontends::common::{unreachable_value, with_range};
use crate::features::ssa::domain::{messages, Constant, Severity};
use crate::features::ssa::infrastructure::{IfBuilder, LoopBuilder, SwitchBuilder};
use crate::shared::utils::tree_sitter::named_children;

impl<'t> CBuilder<'t> {
    pub(super) fn build_block(&mut self, node: Node<'t>) {
        self.b.push_scope();
        for child in named_children(node) {
            self.build_statement(child);
        }
        self.b.pop_scope();
    }

    pub(super) fn build_statement(&mut self, node: Node<'t>) {
        with_range(self, &node, |ctx| ctx.build_statement_inner(node));
    }

    fn build_statement_inner(&mut self, node: Node<'t>) {
        match node.kind() {
            "compound_statement" => self.build_block(node),
            "declaration" => self.build_declaration(node),
            "type_definition" => self.build_typedef(node),
            "expression_statement" => {
                if let Some(expr) = named_children(node).first() {
                    self.build_expr(*expr);
                }
            }
            "if_statement" => self.build_if(node),
            "while_statement" => {
                let condition = node.child_by_field_name("condition");
                let body = node.child_by_field_name("body");
                let mut builder = LoopBuilder::new().set_body(move |ctx: &mut Self| {
                    if let Some(body) = body {
                        ctx.build_statement(body);
                    }
                });
                if let Some(condition) = condition {
                    builder = builder.set_condition(move |ctx: &mut Self| ctx.build_expr(condition));
                }
                builder.finish(self);
            }
            "do_statement" => {
                let condition = node.child_by_field_name("condition");
                let body = node.child_by_field_name("body");
                let mut builder = LoopBuilder::new().do_while().set_body(move |ctx: &mut Self| {
                    if let Some(body) = body {
                        ctx.build_statement(body);
                    }
                });
                if let Some(condition) = condition {
                    builder = builder.set_condition(move |ctx: &mut Self| ctx.build_expr(condition));
                }
                builder.finish(self);
            }
            "for_statement" => self.build_for(node),
            "switch_statement" => self.build_switch(node),
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
            "goto_statement" => {
                if let Some(label) = node.child_by_field_name("label") {
                    let label = self.text(label);
                    self.b.goto_label(label);
                }
            }
            "labeled_statement" => {
                let Some(label) = node.child_by_field_name("label") else {
                    return;
                };
                let name = self.text(label);
                self.b.build_label(name);
                for inner in named_children(node) {
                    if inner.id() != label.id() {
                        self.build_statement(inner);
                    }
                }
            }
            "return_statement" => {
                let values = match named_children(node).first() {
                    Some(expr) => vec![self.build_expr(*expr)],
                    None => Vec::new(),
                };
                self.b.emit_return(values);
            }
            "attributed_statement" => {
                for inner in named_children(node) {
                    if inner.kind() != "attribute_declaration" {
                        self.build_statement(inner);
                    }
                }
            }
            "preproc_def" => self.build_define(node),
            "preproc_include" | "preproc_call" | "preproc_function_def" | "comment" => {}
            kind if PREPROC_GROUPS.contains(&kind) => {
                let mut items = Vec::new();
                flatten_items(node, &mut items);
                for item in items {
                    self.build_statement(item);
                }
            }
            "case_statement" => self.error(messages::unsupported("case label outside switch")),
            _ => {
                unreachable_value(&mut self.b);
            }
        }
    }

    fn error(&mut self, message: String) {
        let tag = self.b.tag();
        self.b.new_error(Severity::Error, tag, message);
    }

    /// `if`/`else if` chains nest through the else branch
    fn build_if(&mut self, node: Node<'t>) {
        let condition = node.child_by_field_name("condition");
        let consequence = node.child_by_field_name("consequence");
        let alternative = node.child_by_field_name("alternative").map(|alt| {
            if alt.kind() == "else_clause" {
                named_children(alt).into_iter().next().unwrap_or(alt)
            } else {
                alt
            }
        });

        let mut builder = IfBuilder::new().append_item(
            move |ctx: &mut Self| match condition {
                Some(c) => ctx.build_expr(c),
                None => ctx.b.emit_const(Constant::Bool(true)),
            },
            move |ctx: &mut Self| {
                if let Some(body) = consequence {
                    ctx.build_statement(body);
                }
            },
        );
        if let Some(alternative) = alternative {
            builder = builder.set_else(move |ctx: &mut Self| ctx.build_statement(alternative));
        }
        builder.build(self);
    }

    /// The initializer's declarations are scoped to the loop
    fn build_for(&mut self, node: Node<'t>) {
        let initializer = node.child_by_field_name("initializer");
        let condition = node.child_by_field_name("condition");
        let update = node.child_by_field_name("update");
        let body = node.child_by_field_name("body");

        self.b.push_scope();
        let mut builder = LoopBuilder::new()
            .set_first(move |ctx: &mut Self| match initializer {
                Some(init) if init.kind() == "declaration" => ctx.build_declaration(init),
                Some(init) => {
                    ctx.build_expr(init);
                }
                None => {}
            })
            .set_body(move |ctx: &mut Self| {
                if let Some(body) = body {
                    ctx.build_statement(body);
                }
            })
            .set_third(move |ctx: &mut Self| {
                if let Some(update) = update {
                    ctx.build_expr(update);
                }
            });
        if let Some(condition) = condition {
            builder = builder.set_condition(move |ctx: &mut Self| ctx.build_expr(condition));
        }
        builder.finish(self);
        self.b.pop_scope();
    }

    /// Case bodies fall through unless they `break`
    fn build_switch(&mut self, node: Node<'t>) {
        let cases: Vec<Node<'t>> = node
            .child_by_field_name("body")
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .filter(|c| c.kind() == "case_statement")
            .collect();
        let default = cases
            .iter()
            .position(|c| c.child_by_field_name("value").is_none());
        let case_values = cases.clone();
        let condition = node.child_by_field_name("condition");

        self.b.push_scope();
        let mut builder = SwitchBuilder::new()
            .auto_break(false)
            .build_case_size(cases.len())
            .set_case(move |ctx: &mut Self, i| {
                case_values[i]
                    .child_by_field_name("value")
                    .map(|v| vec![ctx.build_expr(v)])
                    .unwrap_or_default()
            })
            .build_body(move |ctx: &mut Self, i| {
                let case = cases[i];
                let value = case.child_by_field_name("value").map(|v| v.id());
                for statement in named_children(case) {
                    if Some(statement.id()) != value {
                        ctx.build_statement(statement);
                    }
                }
            });
        if let Some(condition) = condition {
            builder = builder.set_condition(move |ctx: &mut Self| ctx.build_expr(condition));
        }
        if let Some(default) = default {
            builder = builder.set_default_case(default);
        }
        builder.finish(self);
        self.b.pop_scope();
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BuildConfig;
    use crate::features::frontends::build_c;
    use crate::features::ssa::domain::{
        BasicBlock, Constant, Function, Program, Severity, Terminator, ValueKind,
    };

    fn build(source: &str) -> Program {
        build_c(source, &BuildConfig::default().without_preprocessor()).expect("c build")
    }

    fn function<'p>(program: &'p Program, name: &str) -> &'p Function {
        program.function_by_name(name).expect("function")
    }

    fn block<'p>(program: &'p Program, f: &Function, name: &str) -> &'p BasicBlock {
        f.blocks
            .iter()
            .map(|b| program.block(*b))
            .find(|b| b.name == name)
            .expect("block")
    }

    #[test]
    fn test_goto_forward_label() {
        let program = build(
            "int f(int x) {\n  if (x) goto done;\n  x = 1;\ndone:\n  return x;\n}\n",
        );
        let f = function(&program, "f");
        let label = block(&program, f, "label.done");
        assert_eq!(label.preds.len(), 2);
        assert!(program.has_path(f.id, f.entry, label.id));
        assert!(matches!(label.terminator, Some(Terminator::Return(_))));
        assert_eq!(program.errors().count(), 0);
    }

    #[test]
    fn test_goto_undefined_label_is_error() {
        let program = build("void f(void) { goto nowhere; }\n");
        assert!(program.has_diagnostic("label nowhere not defined"));
    }

    #[test]
    fn test_switch_falls_through_without_break() {
        let program = build(
            "int f(int c) {\n  int r = 0;\n  switch (c) {\n  case 1: r = 1;\n  case 2: r = r + 2; break;\n  default: r = 9;\n  }\n  return r;\n}\n",
        );
        let f = function(&program, "f");
        let switch = f
            .blocks
            .iter()
            .find_map(|b| match &program.block(*b).terminator {
                Some(Terminator::Switch { cases, default, .. }) => Some((cases.clone(), *default)),
                _ => None,
            })
            .expect("switch");
        assert_eq!(switch.0.len(), 2);
        // case 2 is entered from the dispatch and from case 1
        let second = program.block(switch.0[1].1);
        assert_eq!(second.preds.len(), 2);
        assert_eq!(program.block(switch.1).name, "switch.case");
    }

    #[test]
    fn test_do_while_body_runs_before_condition() {
        let program = build(
            "int f(void) { int i = 0; do { i++; } while (i < 3); return i; }\n",
        );
        let f = function(&program, "f");
        let entry = program.block(f.entry);
        let body = block(&program, f, "loop.body");
        assert!(matches!(entry.terminator, Some(Terminator::Jump(target)) if target == body.id));
        let header = block(&program, f, "loop.header");
        assert!(matches!(header.terminator, Some(Terminator::Branch { .. })));
    }

    #[test]
    fn test_for_loop_accumulates_through_phi() {
        let program = build(
            "int sum(int n) { int s = 0; for (int i = 0; i < n; i++) s += i; return s; }\n",
        );
        let f = function(&program, "sum");
        let header = block(&program, f, "loop.header");
        let variables: Vec<&str> = header
            .phis
            .iter()
            .filter_map(|p| match &program.value(*p).kind {
                ValueKind::Phi { variable, .. } => Some(variable.as_str()),
                _ => None,
            })
            .collect();
        assert!(variables.contains(&"s"));
        assert!(variables.contains(&"i"));
    }

    #[test]
    fn test_break_outside_loop_is_error() {
        let program = build("void f(void) { break; }\n");
        assert!(program
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error && d.message.contains("unexpected break")));
    }

    #[test]
    fn test_local_define_and_ifdef_in_body() {
        let program = build(
            "int f(void) {\n#define LOCAL 3\n  int x = LOCAL;\n#ifdef X\n  x = 4;\n#endif\n  return x;\n}\n",
        );
        let f = function(&program, "f");
        assert!(program
            .assignments(f.id, "x")
            .iter()
            .any(|v| program.const_value(v.id) == Some(&Constant::Int(3))));
        assert!(program
            .assignments(f.id, "x")
            .iter()
            .any(|v| program.const_value(v.id) == Some(&Constant::Int(4))));
    }
}
