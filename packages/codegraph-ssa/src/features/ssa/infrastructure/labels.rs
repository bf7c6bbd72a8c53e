/*
 * Jump targets: labels and break/continue frames
 *
 * Label resolution runs in two passes:
 * 1. The front-end scans a function body and declares every label, which
 *    creates its (unsealed) block up front.
 * 2. `goto L` and `L:` then only wire edges into that block.
 *
 * Label blocks stay unsealed until the function is finished, so a goto
 * that appears after the label still contributes a phi operand.
 */

use ahash::AHashMap;

use crate::features::ssa::domain::BlockId;
use crate::shared::models::Span;

#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub block: BlockId,
    /// `L:` has been built
    pub defined: bool,
    /// Span of every goto that targets this label
    pub gotos: Vec<Span>,
}

/// Per-function label table
#[derive(Debug, Default)]
pub struct LabelTable {
    labels: AHashMap<String, LabelInfo>,
    order: Vec<String>,
}

impl LabelTable {
    pub fn get(&self, name: &str) -> Option<&LabelInfo> {
        self.labels.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut LabelInfo> {
        self.labels.get_mut(name)
    }

    pub fn insert(&mut self, name: &str, block: BlockId) {
        if !self.labels.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.labels.insert(
            name.to_string(),
            LabelInfo {
                block,
                defined: false,
                gotos: Vec::new(),
            },
        );
    }

    /// Labels in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelInfo)> {
        self.order
            .iter()
            .filter_map(|n| self.labels.get(n).map(|info| (n.as_str(), info)))
    }

    /// Labels jumped to but never defined
    pub fn undefined(&self) -> Vec<(String, Span)> {
        self.iter()
            .filter(|(_, info)| !info.defined && !info.gotos.is_empty())
            .map(|(name, info)| (name.to_string(), info.gotos[0]))
            .collect()
    }

    pub fn blocks(&self) -> Vec<BlockId> {
        self.iter().map(|(_, info)| info.block).collect()
    }
}

/// Break/continue/fallthrough destinations of one enclosing construct
#[derive(Debug, Clone, Default)]
pub struct TargetFrame {
    pub break_to: Option<BlockId>,
    /// Loops only
    pub continue_to: Option<BlockId>,
    /// Switch cases only: the next case body
    pub fallthrough_to: Option<BlockId>,
    pub label: Option<String>,
}

impl TargetFrame {
    pub fn for_loop(exit: BlockId, latch: BlockId, label: Option<String>) -> Self {
        Self {
            break_to: Some(exit),
            continue_to: Some(latch),
            fallthrough_to: None,
            label,
        }
    }

    pub fn for_switch(exit: BlockId, next: BlockId, label: Option<String>) -> Self {
        Self {
            break_to: Some(exit),
            continue_to: None,
            fallthrough_to: Some(next),
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_labels_need_a_goto() {
        let mut table = LabelTable::default();
        table.insert("used", BlockId(1));
        table.insert("unused", BlockId(2));
        table.insert("ok", BlockId(3));

        if let Some(info) = table.get_mut("used") {
            info.gotos.push(Span::new(3, 1, 3, 9));
        }
        if let Some(info) = table.get_mut("ok") {
            info.defined = true;
            info.gotos.push(Span::zero());
        }

        let undefined = table.undefined();
        assert_eq!(undefined.len(), 1);
        assert_eq!(undefined[0].0, "used");
        assert_eq!(table.blocks(), vec![BlockId(1), BlockId(2), BlockId(3)]);
    }
}
