//! Helpers for building ancestor stacks and compiling expressions in tests,
//! public so dependent crates can use them in their own test suites.

use crate::compile::{StaticContext, parse_avt, parse_expression, parse_pattern};
use crate::context::Context;
use crate::error::ExprError;
use crate::functions::FunctionRegistry;
use crate::node::{Attribute, Node};
use crate::tree::Tree;

/// A context whose stack is the document root followed by one element per
/// name, each the first child of the one before.
pub fn context_with_chain(names: &[&str]) -> Context {
    let mut ctx = Context::new();
    ctx.push(Node::root());
    for name in names {
        ctx.push(Node::element("", *name));
    }
    ctx
}

/// Enters and leaves one element per name below the current node, so the
/// next pushed node sees them as preceding siblings.
pub fn enter_siblings(ctx: &mut Context, names: &[&str]) {
    for name in names {
        ctx.push(Node::element("", *name));
        ctx.pop();
    }
}

/// An element in no namespace with unqualified attributes.
pub fn element_with_attributes(name: &str, attributes: &[(&str, &str)]) -> Node {
    Node::element("", name).with_attributes(
        attributes
            .iter()
            .map(|(attr, value)| Attribute::new("", *attr, *value)),
    )
}

/// Compiles a pattern against the builtin functions and no namespaces.
pub fn parse_test_pattern(text: &str) -> Result<Tree, ExprError> {
    let registry = FunctionRegistry::with_builtins();
    parse_pattern(text, &StaticContext::new(&registry))
}

pub fn parse_test_expression(text: &str) -> Result<Tree, ExprError> {
    let registry = FunctionRegistry::with_builtins();
    parse_expression(text, &StaticContext::new(&registry))
}

pub fn parse_test_avt(text: &str) -> Result<Tree, ExprError> {
    let registry = FunctionRegistry::with_builtins();
    parse_avt(text, &StaticContext::new(&registry))
}
