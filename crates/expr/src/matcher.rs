//! Pattern matching against the ancestor stack.
//!
//! `matches` decides whether the stack window `[1..=top]` satisfies a
//! pattern. With `set_position`, a successful match leaves the matched node's
//! rank among its siblings of the same test in `Context::position`; in every
//! other case the position is left as found.

use crate::context::Context;
use crate::engine::evaluate;
use crate::error::ExprError;
use crate::node::{Node, NodeKind};
use crate::tree::Tree;
use crate::value::{Item, Value};

pub fn matches(
    pattern: &Tree,
    ctx: &mut Context,
    top: usize,
    set_position: bool,
) -> Result<bool, ExprError> {
    let saved = ctx.position;
    let result = match_inner(pattern, ctx, top, set_position);
    if !set_position || !matches!(result, Ok(true)) {
        ctx.position = saved;
    }
    log::trace!("match '{}' at {} -> {:?}", pattern, top, result);
    result
}

fn match_inner(
    pattern: &Tree,
    ctx: &mut Context,
    top: usize,
    set_position: bool,
) -> Result<bool, ExprError> {
    match pattern {
        Tree::Root => {
            if top == 1 && set_position {
                ctx.position = 1;
            }
            Ok(top == 1)
        }
        Tree::Child(left, right) => {
            if top < 2 {
                return Ok(false);
            }
            Ok(matches(right, ctx, top, set_position)? && matches(left, ctx, top - 1, false)?)
        }
        Tree::Desc(left, right) => {
            if top < 3 || !matches(right, ctx, top, set_position)? {
                return Ok(false);
            }
            for pos in (1..top).rev() {
                if matches(left, ctx, pos, false)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Tree::Union(left, right) => {
            Ok(matches(left, ctx, top, set_position)? || matches(right, ctx, top, set_position)?)
        }
        Tree::Predicate(left, predicate) => {
            if !matches(left, ctx, top, true)? {
                return Ok(false);
            }
            let value = evaluate(predicate, ctx, top)?;
            Ok(predicate_holds(&value, ctx.position))
        }
        test if test.is_node_test() => Ok(match_test(test, ctx, top, set_position)),
        _ => Ok(false),
    }
}

/// A single numeric result selects by position, anything else is taken as a
/// boolean.
pub fn predicate_holds(value: &Value, position: usize) -> bool {
    match value.first() {
        Some(Item::Number(n)) if value.is_single() => (n + 0.5).floor() == position as f64,
        _ => value.to_boolean(),
    }
}

fn match_test(test: &Tree, ctx: &mut Context, top: usize, set_position: bool) -> bool {
    let Some(node) = ctx.node(top).cloned() else {
        return false;
    };
    if test.is_attribute_test() {
        if top < 3 || !node_test_matches(test, &node) {
            return false;
        }
        if set_position {
            ctx.position = match (ctx.node(top - 1), node.attribute_index()) {
                (Some(owner), Some(index)) => attribute_position(test, owner, index),
                _ => 1,
            };
        }
        true
    } else {
        if top < 2 || !node_test_matches(test, &node) {
            return false;
        }
        if set_position && let Some(key) = test.position_key() {
            ctx.position = ctx.position_of(top, &key);
        }
        true
    }
}

/// Kind and name check of a single step test against one node.
pub fn node_test_matches(test: &Tree, node: &Node) -> bool {
    let kind = node.kind();
    match test {
        Tree::NameTest(name) => {
            kind == NodeKind::Element
                && node.local_name() == name.local_name
                && node.uri() == name.uri
        }
        Tree::Wildcard => kind == NodeKind::Element,
        Tree::UriWildcard(uri) => kind == NodeKind::Element && node.uri() == uri,
        Tree::LocalWildcard(local) => kind == NodeKind::Element && node.local_name() == local,
        Tree::NodeTest => !matches!(kind, NodeKind::Root | NodeKind::Attribute),
        Tree::TextTest => matches!(kind, NodeKind::Text | NodeKind::Cdata),
        Tree::CdataTest => kind == NodeKind::Cdata,
        Tree::CommentTest => kind == NodeKind::Comment,
        Tree::PiTest(target) => {
            kind == NodeKind::ProcessingInstruction
                && target.as_deref().is_none_or(|t| node.local_name() == t)
        }
        Tree::AttrNameTest(name) => {
            kind == NodeKind::Attribute
                && node.local_name() == name.local_name
                && node.uri() == name.uri
        }
        Tree::AttrWildcard => kind == NodeKind::Attribute,
        Tree::AttrUriWildcard(uri) => kind == NodeKind::Attribute && node.uri() == uri,
        Tree::AttrLocalWildcard(local) => {
            kind == NodeKind::Attribute && node.local_name() == local
        }
        _ => false,
    }
}

/// Rank of the attribute at `index` among the owner's attributes passing `test`.
pub fn attribute_position(test: &Tree, owner: &Node, index: usize) -> usize {
    owner
        .attribute_nodes()
        .take(index + 1)
        .filter(|a| node_test_matches(test, a))
        .count()
        .max(1)
}
