//! Tree-sitter Utility Functions
//!
//! Common node helpers shared by the C, Go and Python front-ends.

use crate::shared::models::Span;
use tree_sitter::Node;

// ═══════════════════════════════════════════════════════════════════════════
// Node Traversal Utilities
// ═══════════════════════════════════════════════════════════════════════════

/// All named children, comments excluded
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| !c.is_extra())
        .collect()
}

/// All children (named and anonymous)
pub fn all_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Every child attached to `field` (fields may repeat, e.g. C declarators)
pub fn children_by_field<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Find a direct child node by kind
#[inline]
pub fn find_child_by_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .find(|c| c.kind() == kind)
}

/// Does the node have a direct (possibly anonymous) child of this kind?
#[inline]
pub fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    find_child_by_kind(node, kind).is_some()
}

/// Find all descendants by kind, stopping the descent at nodes for which
/// `stop` returns true (e.g. nested function bodies)
pub fn find_descendants_by_kind<'t>(
    node: Node<'t>,
    kind: &str,
    stop: impl Fn(&Node<'t>) -> bool,
) -> Vec<Node<'t>> {
    let mut result = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == kind {
            result.push(current);
        }
        if current.id() != node.id() && stop(&current) {
            continue;
        }
        for i in (0..current.child_count()).rev() {
            if let Some(child) = current.child(i) {
                stack.push(child);
            }
        }
    }
    result
}

// ═══════════════════════════════════════════════════════════════════════════
// Text / Location Utilities
// ═══════════════════════════════════════════════════════════════════════════

/// Source text of a node
#[inline]
pub fn node_text<'s>(node: &Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

/// Source text of a field child, if present
pub fn field_text<'s>(node: &Node<'_>, field: &str, source: &'s str) -> Option<&'s str> {
    node.child_by_field_name(field)
        .map(|c| node_text(&c, source))
}

/// Convert tree-sitter node to Span
#[inline]
pub fn node_to_span(node: &Node<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span::new(
        start.row as u32 + 1,
        start.column as u32,
        end.row as u32 + 1,
        end.column as u32,
    )
}

/// Operator token text for nodes with an `operator` field
pub fn operator_text<'s>(node: &Node<'_>, source: &'s str) -> &'s str {
    field_text(node, "operator", source).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_go(source: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_go::language())
            .expect("go grammar");
        parser.parse(source, None).expect("parse")
    }

    #[test]
    fn test_node_text_and_span() {
        let source = "package main\nfunc f() { x := 1 }\n";
        let tree = parse_go(source);
        let root = tree.root_node();
        let func = find_child_by_kind(root, "function_declaration").expect("function");
        assert_eq!(field_text(&func, "name", source), Some("f"));
        let span = node_to_span(&func);
        assert_eq!(span.start_line, 2);
        assert_eq!(span.start_col, 0);
    }

    #[test]
    fn test_find_descendants_stops_at_boundary() {
        let source = "package main\nfunc f() { a := 1; g := func() { b := 2 } }\n";
        let tree = parse_go(source);
        let root = tree.root_node();
        let all = find_descendants_by_kind(root, "short_var_declaration", |_| false);
        assert_eq!(all.len(), 2);
        let outer = find_descendants_by_kind(root, "short_var_declaration", |n| {
            n.kind() == "func_literal"
        });
        assert_eq!(outer.len(), 1);
    }
}
