//! Collecting nodes reachable from a stack position. While streaming only the
//! ancestor chain exists, so a "child" is the next stack entry and a
//! "descendant" is any deeper one.

use crate::context::Context;
use crate::matcher::{matches, node_test_matches};
use crate::error::ExprError;
use crate::node::Node;
use crate::tree::Tree;
use std::collections::HashSet;
use std::rc::Rc;

/// A node selected by a path: either an ancestor-stack entry or an attribute
/// of one.
#[derive(Debug, Clone)]
pub enum Selected {
    Stack(usize),
    Attribute { owner: usize, node: Rc<Node> },
}

impl Selected {
    /// Document order: a stack entry precedes its own attributes, which
    /// precede deeper stack entries.
    pub fn order_key(&self) -> (usize, usize) {
        match self {
            Selected::Stack(pos) => (*pos, 0),
            Selected::Attribute { owner, node } => {
                (*owner, node.attribute_index().map_or(0, |i| i + 1))
            }
        }
    }

    pub fn node(&self, ctx: &Context) -> Option<Rc<Node>> {
        match self {
            Selected::Stack(pos) => ctx.node(*pos).cloned(),
            Selected::Attribute { node, .. } => Some(node.clone()),
        }
    }
}

pub fn add_selected(
    selected: Selected,
    seen: &mut HashSet<(usize, usize)>,
    results: &mut Vec<Selected>,
) {
    if seen.insert(selected.order_key()) {
        results.push(selected);
    }
}

/// Sorts into document order and drops duplicates.
pub fn into_document_order(mut selection: Vec<Selected>) -> Vec<Selected> {
    selection.sort_by_key(Selected::order_key);
    selection.dedup_by_key(|s| s.order_key());
    selection
}

pub fn collect_self(top: usize, seen: &mut HashSet<(usize, usize)>, results: &mut Vec<Selected>) {
    if top >= 1 {
        add_selected(Selected::Stack(top), seen, results);
    }
}

pub fn collect_parent(top: usize, seen: &mut HashSet<(usize, usize)>, results: &mut Vec<Selected>) {
    if top >= 2 {
        add_selected(Selected::Stack(top - 1), seen, results);
    }
}

/// The stack entry right above `top`, if it passes `test`.
pub fn collect_child(
    ctx: &mut Context,
    test: &Tree,
    top: usize,
    seen: &mut HashSet<(usize, usize)>,
    results: &mut Vec<Selected>,
) -> Result<(), ExprError> {
    let child = top + 1;
    if child <= ctx.depth() && matches(test, ctx, child, false)? {
        add_selected(Selected::Stack(child), seen, results);
    }
    Ok(())
}

/// Attributes of the stack entry at `top` that pass the attribute `test`.
pub fn collect_attributes(
    ctx: &Context,
    test: &Tree,
    top: usize,
    seen: &mut HashSet<(usize, usize)>,
    results: &mut Vec<Selected>,
) {
    let Some(owner) = ctx.node(top) else {
        return;
    };
    for attr in owner.attribute_nodes() {
        if node_test_matches(test, &attr) {
            add_selected(Selected::Attribute { owner: top, node: attr }, seen, results);
        }
    }
}

/// Stack positions whose subtree still lies on the current chain: `top`
/// itself and everything deeper.
pub fn descendant_or_self_positions(ctx: &Context, top: usize) -> std::ops::RangeInclusive<usize> {
    top.max(1)..=ctx.depth()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context_with_chain, element_with_attributes};

    #[test]
    fn test_child_is_next_stack_entry() {
        let mut ctx = context_with_chain(&["doc", "item"]);
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        collect_child(&mut ctx, &Tree::Wildcard, 2, &mut seen, &mut results).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].order_key(), (3, 0));

        results.clear();
        collect_child(&mut ctx, &Tree::Wildcard, 3, &mut seen, &mut results).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_attributes_and_order() {
        let mut ctx = context_with_chain(&["doc"]);
        ctx.push(element_with_attributes("item", &[("id", "1"), ("class", "c")]));
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        collect_attributes(&ctx, &Tree::AttrWildcard, 3, &mut seen, &mut results);
        collect_self(3, &mut seen, &mut results);
        collect_parent(3, &mut seen, &mut results);
        collect_self(2, &mut seen, &mut results);
        assert_eq!(results.len(), 4);

        let ordered: Vec<(usize, usize)> = into_document_order(results)
            .iter()
            .map(Selected::order_key)
            .collect();
        assert_eq!(ordered, vec![(2, 0), (3, 0), (3, 1), (3, 2)]);
    }
}
