use crate::context::Context;
use crate::error::ExprError;
use crate::node::Node;
use crate::value::{Item, Value};
use std::rc::Rc;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// The node argument, the context node when omitted, or `None` for an empty
/// sequence.
fn node_argument(
    function: &str,
    ctx: &Context,
    top: usize,
    args: &[Value],
) -> Result<Option<Rc<Node>>, ExprError> {
    match args.first() {
        None => Ok(ctx.node(top).cloned()),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => match v.first() {
            Some(Item::Node(n)) => Ok(Some(n.clone())),
            _ => Err(ExprError::type_error(format!(
                "{}() requires a node argument",
                function
            ))),
        },
    }
}

fn node_string(
    function: &str,
    ctx: &Context,
    top: usize,
    args: &[Value],
    f: fn(&Node) -> &str,
) -> Result<Value, ExprError> {
    let node = node_argument(function, ctx, top, args)?;
    Ok(Value::from_string(node.as_deref().map(f).unwrap_or_default()))
}

pub fn fn_name(ctx: &mut Context, top: usize, args: Vec<Value>) -> Result<Value, ExprError> {
    node_string("name", ctx, top, &args, Node::qualified_name)
}

pub fn fn_local_name(ctx: &mut Context, top: usize, args: Vec<Value>) -> Result<Value, ExprError> {
    node_string("local-name", ctx, top, &args, Node::local_name)
}

pub fn fn_namespace_uri(ctx: &mut Context, top: usize, args: Vec<Value>) -> Result<Value, ExprError> {
    node_string("namespace-uri", ctx, top, &args, Node::uri)
}

pub fn fn_node_kind(ctx: &mut Context, top: usize, args: Vec<Value>) -> Result<Value, ExprError> {
    node_string("node-kind", ctx, top, &args, |n| n.kind().as_str())
}

pub fn fn_get_namespace_uri_for_prefix(
    ctx: &mut Context,
    top: usize,
    mut args: Vec<Value>,
) -> Result<Value, ExprError> {
    let node_arg = args.split_off(1);
    let prefix = args.remove(0).to_string_value();
    let Some(node) = node_argument("get-namespace-uri-for-prefix", ctx, top, &node_arg)? else {
        return Ok(Value::empty());
    };
    if prefix == "xml" {
        return Ok(Value::from_string(XML_NS));
    }
    Ok(node
        .namespaces()
        .get(&prefix)
        .filter(|uri| !uri.is_empty())
        .map(Value::from_string)
        .unwrap_or_default())
}

/// Every prefix bound on the node, the default namespace as `""`, plus `xml`.
pub fn fn_get_in_scope_prefixes(
    ctx: &mut Context,
    top: usize,
    args: Vec<Value>,
) -> Result<Value, ExprError> {
    let Some(node) = node_argument("get-in-scope-prefixes", ctx, top, &args)? else {
        return Ok(Value::empty());
    };
    let mut prefixes: Vec<Item> = node
        .namespaces()
        .iter()
        .filter(|(_, uri)| !uri.is_empty())
        .map(|(prefix, _)| Item::String(prefix.clone()))
        .collect();
    if !node.namespaces().contains_key("xml") {
        prefixes.push(Item::String("xml".to_string()));
    }
    Ok(Value::from_items(prefixes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attribute;

    fn context() -> (Context, Rc<Node>) {
        let mut ctx = Context::new();
        ctx.push(Node::root());
        let item = Rc::new(
            Node::element("urn:books", "b:item")
                .with_namespace("b", "urn:books")
                .with_namespace("", "urn:default")
                .with_attribute(Attribute::new("", "id", "7")),
        );
        ctx.push(item.clone());
        (ctx, item)
    }

    #[test]
    fn test_names_of_context_node() {
        let (mut ctx, _) = context();
        assert_eq!(fn_name(&mut ctx, 2, vec![]).unwrap(), Value::from_string("b:item"));
        assert_eq!(fn_local_name(&mut ctx, 2, vec![]).unwrap(), Value::from_string("item"));
        assert_eq!(
            fn_namespace_uri(&mut ctx, 2, vec![]).unwrap(),
            Value::from_string("urn:books")
        );
        assert_eq!(fn_node_kind(&mut ctx, 1, vec![]).unwrap(), Value::from_string("document"));
    }

    #[test]
    fn test_name_of_argument() {
        let (mut ctx, item) = context();
        let attr = item.attribute_node(0).unwrap();
        assert_eq!(
            fn_name(&mut ctx, 2, vec![Value::from_node(attr.clone())]).unwrap(),
            Value::from_string("id")
        );
        assert_eq!(
            fn_node_kind(&mut ctx, 2, vec![Value::from_node(attr)]).unwrap(),
            Value::from_string("attribute")
        );
        assert_eq!(fn_name(&mut ctx, 2, vec![Value::empty()]).unwrap(), Value::from_string(""));
        let err = fn_name(&mut ctx, 2, vec![Value::from_number(1.0)]).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_namespace_lookup() {
        let (mut ctx, item) = context();
        let node = Value::from_node(item);
        assert_eq!(
            fn_get_namespace_uri_for_prefix(&mut ctx, 2, vec![Value::from_string("b"), node.clone()])
                .unwrap(),
            Value::from_string("urn:books")
        );
        assert!(
            fn_get_namespace_uri_for_prefix(&mut ctx, 2, vec![Value::from_string("z"), node.clone()])
                .unwrap()
                .is_empty()
        );
        let prefixes = fn_get_in_scope_prefixes(&mut ctx, 2, vec![node]).unwrap();
        let names: Vec<String> = prefixes.iter().map(Item::to_string_value).collect();
        assert_eq!(names, vec!["", "b", "xml"]);
    }
}
