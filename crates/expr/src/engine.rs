//! The evaluation engine for resolved expression trees against the ancestor
//! stack of a `Context`.
//!
//! Paths never see more of the document than the current chain of ancestors:
//! a child step selects the stack entry right above its context, an attribute
//! step the attributes of its context. Everything else is plain value
//! computation over sequences.

use crate::axes::{
    Selected, add_selected, collect_attributes, collect_child, collect_parent, collect_self,
    descendant_or_self_positions, into_document_order,
};
use crate::ast::BinaryOperator;
use crate::context::Context;
use crate::error::ExprError;
use crate::matcher::{attribute_position, predicate_holds};
use crate::node::Node;
use crate::operators;
use crate::scope::resolve_variable;
use crate::tree::{FunctionCall, Tree, VarRef};
use crate::value::{Item, Value};
use std::collections::HashSet;
use std::rc::Rc;

/// Evaluates `expr` with the stack entry at `top` as its context node.
pub fn evaluate(expr: &Tree, ctx: &mut Context, top: usize) -> Result<Value, ExprError> {
    let result = evaluate_inner(expr, ctx, top);
    if let Ok(value) = &result {
        log::trace!("evaluate '{}' at {} -> {}", expr, top, value);
    }
    result
}

fn evaluate_inner(expr: &Tree, ctx: &mut Context, top: usize) -> Result<Value, ExprError> {
    match expr {
        Tree::Number(n) => Ok(Value::from_number(*n)),
        Tree::String(s) => Ok(Value::from_string(s.as_str())),
        Tree::Empty => Ok(Value::empty()),
        Tree::Unary(op, operand) => {
            let value = evaluate(operand, ctx, top)?;
            Ok(operators::unary(*op, &value))
        }
        Tree::Binary(left, BinaryOperator::And, right) => {
            let result = evaluate(left, ctx, top)?.to_boolean() && evaluate(right, ctx, top)?.to_boolean();
            Ok(Value::from_bool(result))
        }
        Tree::Binary(left, BinaryOperator::Or, right) => {
            let result = evaluate(left, ctx, top)?.to_boolean() || evaluate(right, ctx, top)?.to_boolean();
            Ok(Value::from_bool(result))
        }
        Tree::Binary(left, op, right) => {
            let l = evaluate(left, ctx, top)?;
            let r = evaluate(right, ctx, top)?;
            if operators::is_comparison(*op) {
                Ok(Value::from_bool(operators::compare(*op, &l, &r)))
            } else {
                Ok(operators::arithmetic(*op, &l, &r))
            }
        }
        Tree::Seq(parts) => {
            let mut result = Value::empty();
            for part in parts {
                result = result.concat(evaluate(part, ctx, top)?);
            }
            Ok(result)
        }
        Tree::Avt(parts) => {
            let mut text = String::new();
            for part in parts {
                text.push_str(&evaluate(part, ctx, top)?.to_string_value());
            }
            Ok(Value::from_string(text))
        }
        Tree::Var(var) => evaluate_variable(var, ctx),
        Tree::Function(call) => evaluate_function(call, ctx, top),
        Tree::List(..) => ctx.recover(
            ExprError::Internal(format!("argument list '{}' evaluated outside a function call", expr)),
            Value::empty(),
        ),
        Tree::Predicate(primary, predicate) if !primary.is_path() => {
            filter(primary, predicate, ctx, top)
        }
        path => {
            let selection = select(path, ctx, top)?;
            let nodes: Vec<Rc<Node>> = selection.iter().filter_map(|s| s.node(ctx)).collect();
            Ok(Value::from_nodes(nodes))
        }
    }
}

fn evaluate_variable(var: &VarRef, ctx: &mut Context) -> Result<Value, ExprError> {
    match resolve_variable(ctx, &var.name, var.group) {
        Some(value) => Ok(value),
        None => ctx.recover(ExprError::UndeclaredVariable(var.name.to_string()), Value::empty()),
    }
}

fn evaluate_function(call: &FunctionCall, ctx: &mut Context, top: usize) -> Result<Value, ExprError> {
    let arguments = call.arguments();
    let mut args = Vec::with_capacity(arguments.len());
    for arg in arguments {
        args.push(evaluate(arg, ctx, top)?);
    }
    match call.function.call(ctx, top, args) {
        Ok(value) => Ok(value),
        Err(e) => ctx.recover(e, call.function.fallback()),
    }
}

/// `primary[predicate]` over an arbitrary sequence: the position is the
/// 1-based index of each item, the context node stays the same.
fn filter(primary: &Tree, predicate: &Tree, ctx: &mut Context, top: usize) -> Result<Value, ExprError> {
    let items = evaluate(primary, ctx, top)?.into_items();
    if predicate.uses_context_item() && items.iter().any(|item| item.as_node().is_none()) {
        ctx.warning(&format!(
            "'.' in the predicate of '{}' is the current node, not the filtered item",
            primary
        ));
    }
    let saved = ctx.position;
    let mut kept = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        ctx.position = i + 1;
        let value = evaluate(predicate, ctx, top);
        ctx.position = saved;
        if predicate_holds(&value?, i + 1) {
            kept.push(item);
        }
    }
    Ok(Value::from_items(kept))
}

/// The nodes a path selects from the stack position `top`, duplicate free
/// and in document order.
pub fn select(path: &Tree, ctx: &mut Context, top: usize) -> Result<Vec<Selected>, ExprError> {
    let mut seen = HashSet::new();
    let mut results = Vec::new();
    match path {
        Tree::Root => {
            if ctx.depth() >= 1 {
                add_selected(Selected::Stack(1), &mut seen, &mut results);
            }
        }
        Tree::Dot => collect_self(top, &mut seen, &mut results),
        Tree::DotDot => collect_parent(top, &mut seen, &mut results),
        test if test.is_attribute_test() => {
            collect_attributes(ctx, test, top, &mut seen, &mut results)
        }
        test if test.is_element_test() => {
            collect_child(ctx, test, top, &mut seen, &mut results)?
        }
        Tree::Union(left, right) => {
            let mut selection = select(left, ctx, top)?;
            selection.extend(select(right, ctx, top)?);
            for s in selection {
                add_selected(s, &mut seen, &mut results);
            }
        }
        Tree::Child(left, right) => {
            for s in select(left, ctx, top)? {
                // attributes have no children
                if let Selected::Stack(pos) = s {
                    for child in select(right, ctx, pos)? {
                        add_selected(child, &mut seen, &mut results);
                    }
                }
            }
        }
        Tree::Desc(left, right) => {
            for s in select(left, ctx, top)? {
                if let Selected::Stack(pos) = s {
                    for q in descendant_or_self_positions(ctx, pos) {
                        for found in select(right, ctx, q)? {
                            add_selected(found, &mut seen, &mut results);
                        }
                    }
                }
            }
        }
        Tree::Predicate(left, predicate) => {
            let step = last_step(left);
            for s in select(left, ctx, top)? {
                if predicate_selects(step, predicate, &s, ctx)? {
                    add_selected(s, &mut seen, &mut results);
                }
            }
        }
        other => {
            for s in stack_entries_of(other, ctx, top)? {
                add_selected(s, &mut seen, &mut results);
            }
        }
    }
    Ok(into_document_order(results))
}

/// The step whose test ranks the nodes a path selects.
fn last_step(path: &Tree) -> &Tree {
    match path {
        Tree::Child(_, right) | Tree::Desc(_, right) => last_step(right),
        Tree::Predicate(left, _) => last_step(left),
        other => other,
    }
}

fn predicate_selects(
    step: &Tree,
    predicate: &Tree,
    candidate: &Selected,
    ctx: &mut Context,
) -> Result<bool, ExprError> {
    let position = match candidate {
        Selected::Stack(pos) => step
            .position_key()
            .map_or(1, |key| ctx.position_of(*pos, &key)),
        Selected::Attribute { owner, node } => {
            match (ctx.node(*owner), node.attribute_index()) {
                (Some(owner_node), Some(index)) => attribute_position(step, owner_node, index),
                _ => 1,
            }
        }
    };

    let saved = ctx.position;
    ctx.position = position;
    let value = match candidate {
        Selected::Stack(pos) => evaluate(predicate, ctx, *pos),
        Selected::Attribute { owner, node } => {
            ctx.with_attribute_on_top(*owner, node.clone(), |ctx, t| evaluate(predicate, ctx, t))
        }
    };
    ctx.position = saved;
    Ok(predicate_holds(&value?, position))
}

/// Maps the nodes of a non-path value back onto the stack so further steps
/// can walk from them. Nodes no longer on the current chain are dropped.
fn stack_entries_of(expr: &Tree, ctx: &mut Context, top: usize) -> Result<Vec<Selected>, ExprError> {
    let value = evaluate(expr, ctx, top)?;
    let mut entries = Vec::new();
    for item in value.iter() {
        let Item::Node(node) = item else {
            ctx.recover(
                ExprError::type_error(format!("'{}' does not evaluate to a node sequence", expr)),
                Value::empty(),
            )?;
            return Ok(Vec::new());
        };
        match node.attribute_index() {
            None => match ctx.stack_index_of(node) {
                Some(pos) => entries.push(Selected::Stack(pos)),
                None => ctx.warning(&format!(
                    "'{}' is no longer on the ancestor chain and is skipped",
                    node.qualified_name()
                )),
            },
            Some(index) => {
                let owner = (1..=ctx.depth()).rev().find(|&p| {
                    ctx.node(p)
                        .and_then(|o| o.attribute_node(index))
                        .is_some_and(|a| a.id() == node.id())
                });
                match owner {
                    Some(owner) => entries.push(Selected::Attribute {
                        owner,
                        node: node.clone(),
                    }),
                    None => ctx.warning(&format!(
                        "attribute '{}' is no longer on the ancestor chain and is skipped",
                        node.qualified_name()
                    )),
                }
            }
        }
    }
    if entries.len() < value.len() {
        log::trace!("'{}': {} node(s) are not on the ancestor chain", expr, value.len() - entries.len());
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CollectingErrorSink, Severity, StrictErrorSink};
    use crate::name::ExpandedName;
    use crate::testing::{context_with_chain, element_with_attributes, enter_siblings, parse_test_expression};

    fn eval(text: &str, ctx: &mut Context, top: usize) -> Value {
        let expr = parse_test_expression(text).unwrap();
        evaluate(&expr, ctx, top).unwrap()
    }

    fn eval_empty(text: &str) -> Value {
        eval(text, &mut Context::new(), 0)
    }

    fn numbers(value: &Value) -> Vec<f64> {
        value.iter().map(Item::to_number).collect()
    }

    #[test]
    fn test_existential_comparisons() {
        assert_eq!(eval_empty("(1,2) = (2,3)"), Value::from_bool(true));
        assert_eq!(eval_empty("(1,2) = (3,4)"), Value::from_bool(false));
        assert_eq!(eval_empty("(1,2) != (1,2)"), Value::from_bool(true));
        assert_eq!(eval_empty("() = 1"), Value::from_bool(false));
        assert_eq!(eval_empty("() != 1"), Value::from_bool(false));
        assert_eq!(eval_empty("'10' < 9"), Value::from_bool(false));
    }

    #[test]
    fn test_arithmetic_with_empty_operand() {
        assert!(eval_empty("1 + ()").is_empty());
        assert!(eval_empty("-()").is_empty());
        assert_eq!(eval_empty("7 mod 3 * 2"), Value::from_number(2.0));
        assert_eq!(eval_empty("1 div 0"), Value::from_number(f64::INFINITY));
    }

    #[test]
    fn test_sequences_and_templates() {
        let seq = eval_empty("(1, (), (2, 3))");
        assert_eq!(numbers(&seq), vec![1.0, 2.0, 3.0]);
        assert_eq!(eval_empty("concat('a', 'b', 'c')"), Value::from_string("abc"));
        assert_eq!(
            numbers(&eval_empty("subsequence((10, 20, 30, 40), 2, 2)")),
            vec![20.0, 30.0]
        );
    }

    #[test]
    fn test_short_circuit() {
        let sink = CollectingErrorSink::new(true);
        let mut ctx = Context::with_error_sink(Box::new(sink.clone()));
        assert_eq!(eval("false() and $missing", &mut ctx, 0), Value::from_bool(false));
        assert_eq!(eval("true() or $missing", &mut ctx, 0), Value::from_bool(true));
        assert_eq!(sink.count(Severity::Error), 0);
    }

    #[test]
    fn test_filter_predicates_use_item_index() {
        assert_eq!(
            numbers(&eval_empty("(1, 2, 3)[position() > 1]")),
            vec![2.0, 3.0]
        );
        assert_eq!(numbers(&eval_empty("(10, 20, 30)[2]")), vec![20.0]);
        assert!(eval_empty("(10, 20, 30)[4]").is_empty());
    }

    #[test]
    fn test_dot_in_atomic_filter_is_the_current_node() {
        let sink = CollectingErrorSink::new(true);
        let mut ctx = context_with_chain(&["doc"]);
        ctx.set_error_sink(Box::new(sink.clone()));

        assert!(eval("(1, 2)[. = 2]", &mut ctx, 2).is_empty());
        assert_eq!(sink.count(Severity::Warning), 1);
        assert!(sink.diagnostics()[0].message.contains("not the filtered item"));

        assert_eq!(numbers(&eval("(1, 2)[position() = 2]", &mut ctx, 2)), vec![2.0]);
        assert_eq!(sink.count(Severity::Warning), 1);
    }

    #[test]
    fn test_child_and_attribute_steps() {
        let mut ctx = context_with_chain(&["doc"]);
        ctx.push(element_with_attributes("item", &[("id", "7"), ("class", "x")]));

        assert_eq!(eval("item/@id", &mut ctx, 2).to_string_value(), "7");
        assert_eq!(eval("@*[2]", &mut ctx, 3).to_string_value(), "x");
        assert_eq!(eval("count(item[@id = 7])", &mut ctx, 2), Value::from_number(1.0));
        assert_eq!(eval("count(item[@id = 8])", &mut ctx, 2), Value::from_number(0.0));
        assert_eq!(eval("name(..)", &mut ctx, 3), Value::from_string("doc"));
        assert_eq!(eval("count(/doc/item)", &mut ctx, 3), Value::from_number(1.0));
        // the current node has no known children while streaming
        assert!(eval("item", &mut ctx, 3).is_empty());
    }

    #[test]
    fn test_positional_step_predicate() {
        let mut ctx = context_with_chain(&["doc"]);
        enter_siblings(&mut ctx, &["item", "note", "item"]);
        ctx.push(element_with_attributes("item", &[]));
        assert_eq!(eval("count(item[3])", &mut ctx, 2), Value::from_number(1.0));
        assert_eq!(eval("count(item[2])", &mut ctx, 2), Value::from_number(0.0));
        assert_eq!(eval("count(*[4])", &mut ctx, 2), Value::from_number(1.0));
    }

    #[test]
    fn test_descendants_are_duplicate_free() {
        let mut ctx = context_with_chain(&["a", "a", "a"]);
        assert_eq!(eval("count(//a)", &mut ctx, 1), Value::from_number(3.0));
        assert_eq!(eval("count(//a//a)", &mut ctx, 1), Value::from_number(2.0));
        assert_eq!(eval("count(//a | /a)", &mut ctx, 1), Value::from_number(3.0));
        let names = eval("//a | ..", &mut ctx, 3);
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_variables() {
        let mut ctx = context_with_chain(&["doc"]);
        let group = ctx.groups.add_group(None, None);
        ctx.groups.bind(group, ExpandedName::local("x"), Value::from_number(1.0));
        ctx.current_group = Some(group);
        assert_eq!(eval("$x + 1", &mut ctx, 2), Value::from_number(2.0));
        ctx.local_vars.insert(ExpandedName::local("x"), Value::from_number(10.0));
        assert_eq!(eval("$x + 1", &mut ctx, 2), Value::from_number(11.0));

        let here = eval(".", &mut ctx, 2);
        ctx.local_vars.insert(ExpandedName::local("here"), here);
        assert_eq!(eval("name($here)", &mut ctx, 2), Value::from_string("doc"));
        assert_eq!(eval("count($here/..)", &mut ctx, 2), Value::from_number(1.0));
    }

    #[test]
    fn test_recoverable_errors_yield_fallbacks() {
        let sink = CollectingErrorSink::new(true);
        let mut ctx = Context::with_error_sink(Box::new(sink.clone()));
        assert!(eval("$undeclared", &mut ctx, 0).is_empty());
        assert!(eval("item-at((1, 2), 5)", &mut ctx, 0).is_empty());
        assert_eq!(eval("string-pad('ab', 'x')", &mut ctx, 0), Value::from_string(""));
        assert!(eval("1/item", &mut ctx, 0).is_empty());
        assert_eq!(
            eval("string-pad('ab', 100000000000000000000)", &mut ctx, 0),
            Value::from_string("")
        );
        assert_eq!(sink.count(Severity::Error), 5);
    }

    #[test]
    fn test_nodes_off_the_chain_are_skipped_with_a_warning() {
        let sink = CollectingErrorSink::new(true);
        let mut ctx = context_with_chain(&["doc", "a"]);
        ctx.set_error_sink(Box::new(sink.clone()));
        let old = eval(".", &mut ctx, 3);
        ctx.local_vars.insert(ExpandedName::local("old"), old);
        assert_eq!(eval("count($old/..)", &mut ctx, 3), Value::from_number(1.0));

        ctx.pop();
        ctx.push(Node::element("", "b"));
        assert_eq!(eval("count($old/..)", &mut ctx, 3), Value::from_number(0.0));
        assert_eq!(sink.count(Severity::Warning), 1);
        assert_eq!(sink.count(Severity::Error), 0);
    }

    #[test]
    fn test_strict_sink_aborts() {
        let mut ctx = Context::with_error_sink(Box::new(StrictErrorSink));
        let expr = parse_test_expression("$undeclared").unwrap();
        let err = evaluate(&expr, &mut ctx, 0).unwrap_err();
        assert!(matches!(err, ExprError::Aborted(_)));
    }

    #[test]
    fn test_argument_list_is_internal_error() {
        let sink = CollectingErrorSink::new(true);
        let mut ctx = Context::with_error_sink(Box::new(sink.clone()));
        let list = Tree::List(Box::new(Tree::Number(1.0)), Box::new(Tree::Number(2.0)));
        let err = evaluate(&list, &mut ctx, 0).unwrap_err();
        assert!(matches!(err, ExprError::Internal(_)));
        assert_eq!(sink.count(Severity::Fatal), 1);
    }

    #[test]
    fn test_avt_concatenates_strings() {
        let mut ctx = context_with_chain(&["doc"]);
        let avt = crate::testing::parse_test_avt("n-{name(.)}-{1 + 1}").unwrap();
        assert_eq!(evaluate(&avt, &mut ctx, 2).unwrap(), Value::from_string("n-doc-2"));
    }
}
