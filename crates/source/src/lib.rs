//! Streaming event source for the expression engine.
//!
//! `StreamDriver` reads XML text with `quick-xml` and keeps a `Context`'s
//! ancestor stack in step with the document: every node is pushed when it
//! starts, the handler is told about it, and it is popped again when it ends.
//! Leaf nodes (text, CDATA, comments, processing instructions) are pushed and
//! popped immediately. Nothing else about the document is retained.
//!
//! ## Example
//!
//! ```ignore
//! use stx_expr::{Context, FunctionRegistry, StaticContext, parse_pattern};
//! use stx_source::{PatternCollector, StreamDriver};
//!
//! let registry = FunctionRegistry::with_builtins();
//! let pattern = parse_pattern("item[2]", &StaticContext::new(&registry))?;
//! let mut collector = PatternCollector::new().with_pattern("second", pattern);
//! StreamDriver::default().run("<doc><item/><item/></doc>", &mut Context::new(), &mut collector)?;
//! assert_eq!(collector.matches().len(), 1);
//! ```

use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeMap;
use stx_expr::name::split_qname;
use stx_expr::{Attribute, Context, ExprError, Node, NodeKind, Tree, matches};
use thiserror::Error;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Quick-XML error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    #[error("Invalid character or entity reference: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error("Unknown entity reference '&{0};'")]
    UnknownEntity(String),

    #[error("Undeclared namespace prefix '{prefix}' at byte {position}")]
    UndeclaredPrefix { prefix: String, position: u64 },

    #[error("Expression error: {0}")]
    Expression(#[from] ExprError),
}

impl From<quick_xml::events::attributes::AttrError> for SourceError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        SourceError::QuickXml(quick_xml::Error::InvalidAttr(e))
    }
}

/// How XML text is turned into nodes.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Drop text nodes that consist only of whitespace.
    pub trim_whitespace_text: bool,
    pub report_comments: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            trim_whitespace_text: true,
            report_comments: true,
        }
    }
}

/// Receives the driver's notifications. The node that started or is about to
/// end is always `ctx.current_node()`, at stack index `ctx.depth()`.
pub trait StreamHandler {
    fn node(&mut self, ctx: &mut Context) -> Result<(), SourceError>;

    fn end_node(&mut self, _ctx: &mut Context) -> Result<(), SourceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamDriver {
    options: SourceOptions,
}

impl StreamDriver {
    pub fn new(options: SourceOptions) -> Self {
        Self { options }
    }

    /// Streams `xml` through `ctx`, starting with the document root. On
    /// success the stack is back at the depth it had on entry.
    pub fn run<H: StreamHandler>(
        &self,
        xml: &str,
        ctx: &mut Context,
        handler: &mut H,
    ) -> Result<(), SourceError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut scan = Scan {
            ctx,
            handler,
            options: &self.options,
            namespaces: vec![BTreeMap::new()],
            text: String::new(),
            nodes: 0,
        };

        scan.enter(Node::root())?;
        loop {
            let position = reader.buffer_position();
            match reader.read_event()? {
                Event::Start(e) => {
                    scan.flush_text()?;
                    let node = scan.element(&e, position)?;
                    scan.enter(node)?;
                }
                Event::Empty(e) => {
                    scan.flush_text()?;
                    let node = scan.element(&e, position)?;
                    scan.enter(node)?;
                    scan.leave()?;
                }
                Event::End(_) => {
                    scan.flush_text()?;
                    scan.leave()?;
                }
                Event::Text(e) => {
                    scan.text.push_str(&unescape(&String::from_utf8_lossy(&e))?);
                }
                Event::GeneralRef(e) => {
                    let reference = String::from_utf8_lossy(&e).into_owned();
                    scan.text.push_str(&resolve_reference(&reference)?);
                }
                Event::CData(e) => {
                    scan.flush_text()?;
                    scan.leaf(Node::cdata(String::from_utf8_lossy(&e)))?;
                }
                Event::Comment(e) => {
                    scan.flush_text()?;
                    if scan.options.report_comments {
                        scan.leaf(Node::comment(String::from_utf8_lossy(&e)))?;
                    }
                }
                Event::PI(e) => {
                    scan.flush_text()?;
                    let content = String::from_utf8_lossy(&e).into_owned();
                    let (target, data) = content
                        .split_once(char::is_whitespace)
                        .map(|(t, d)| (t.to_string(), d.trim_start().to_string()))
                        .unwrap_or((content, String::new()));
                    scan.leaf(Node::processing_instruction(target, data))?;
                }
                Event::Eof => {
                    scan.flush_text()?;
                    break;
                }
                _ => {}
            }
        }
        scan.leave()?;
        log::debug!("Streamed {} node(s)", scan.nodes);
        Ok(())
    }
}

struct Scan<'r, H> {
    ctx: &'r mut Context,
    handler: &'r mut H,
    options: &'r SourceOptions,
    /// In-scope namespace bindings, one entry per open element plus the root.
    namespaces: Vec<BTreeMap<String, String>>,
    text: String,
    nodes: usize,
}

impl<H: StreamHandler> Scan<'_, H> {
    fn enter(&mut self, node: Node) -> Result<(), SourceError> {
        self.nodes += 1;
        self.ctx.push(node);
        self.handler.node(self.ctx)
    }

    fn leave(&mut self) -> Result<(), SourceError> {
        self.handler.end_node(self.ctx)?;
        if self.ctx.pop().is_some_and(|n| n.kind() == NodeKind::Element) {
            self.namespaces.pop();
        }
        Ok(())
    }

    fn leaf(&mut self, node: Node) -> Result<(), SourceError> {
        self.enter(node)?;
        self.leave()
    }

    /// Text between two markup events, with references already resolved,
    /// becomes a single text node.
    fn flush_text(&mut self) -> Result<(), SourceError> {
        if self.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.text);
        if self.options.trim_whitespace_text && text.trim().is_empty() {
            return Ok(());
        }
        self.leaf(Node::text(text))
    }

    fn element(&mut self, e: &BytesStart<'_>, position: u64) -> Result<Node, SourceError> {
        let mut scope = self.namespaces.last().cloned().unwrap_or_default();
        let mut raw_attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = unescape(&String::from_utf8_lossy(&attr.value))?.into_owned();
            if key == "xmlns" {
                scope.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                scope.insert(prefix.to_string(), value);
            } else {
                raw_attributes.push((key, value));
            }
        }

        let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let uri = namespace_of(&scope, &qname, true, position)?;
        let attributes = raw_attributes
            .into_iter()
            .map(|(key, value)| {
                let uri = namespace_of(&scope, &key, false, position)?;
                Ok(Attribute::new(uri, key, value))
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        let node = Node::element(uri, qname)
            .with_attributes(attributes)
            .with_namespaces(scope.clone());
        self.namespaces.push(scope);
        Ok(node)
    }
}

/// Unprefixed element names take the default namespace, unprefixed
/// attribute names are in no namespace.
fn namespace_of(
    scope: &BTreeMap<String, String>,
    qname: &str,
    is_element: bool,
    position: u64,
) -> Result<String, SourceError> {
    match split_qname(qname) {
        (Some("xml"), _) => Ok(XML_NS.to_string()),
        (Some(prefix), _) => scope
            .get(prefix)
            .filter(|uri| !uri.is_empty())
            .cloned()
            .ok_or_else(|| SourceError::UndeclaredPrefix {
                prefix: prefix.to_string(),
                position,
            }),
        (None, _) if is_element => Ok(scope.get("").cloned().unwrap_or_default()),
        (None, _) => Ok(String::new()),
    }
}

fn resolve_reference(name: &str) -> Result<String, SourceError> {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse().ok(),
        };
        return value
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| SourceError::UnknownEntity(name.to_string()));
    }
    resolve_predefined_entity(name)
        .map(str::to_string)
        .ok_or_else(|| SourceError::UnknownEntity(name.to_string()))
}

/// One node that satisfied a collected pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub label: String,
    pub kind: NodeKind,
    pub name: String,
    pub depth: usize,
    pub position: usize,
}

/// Records, for a list of labelled patterns, every streamed node (and every
/// attribute of a streamed element) that matches, with its position.
#[derive(Debug, Default)]
pub struct PatternCollector {
    patterns: Vec<(String, Tree)>,
    matches: Vec<PatternMatch>,
}

impl PatternCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, label: impl Into<String>, pattern: Tree) -> Self {
        self.patterns.push((label.into(), pattern));
        self
    }

    pub fn matches(&self) -> &[PatternMatch] {
        &self.matches
    }

    pub fn matches_for<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a PatternMatch> + 'a {
        self.matches.iter().filter(move |m| m.label == label)
    }

    fn check(&mut self, ctx: &mut Context) -> Result<(), SourceError> {
        let top = ctx.depth();
        let Some(node) = ctx.current_node().cloned() else {
            return Ok(());
        };
        for (label, pattern) in &self.patterns {
            if matches(pattern, ctx, top, true)? {
                log::trace!("'{}' matched {} at depth {}", label, node.qualified_name(), top);
                self.matches.push(PatternMatch {
                    label: label.clone(),
                    kind: node.kind(),
                    name: node.qualified_name().to_string(),
                    depth: top,
                    position: ctx.position,
                });
            }
        }
        Ok(())
    }
}

impl StreamHandler for PatternCollector {
    fn node(&mut self, ctx: &mut Context) -> Result<(), SourceError> {
        self.check(ctx)?;
        let attributes: Vec<_> = ctx
            .current_node()
            .map(|n| n.attribute_nodes().collect())
            .unwrap_or_default();
        for attribute in attributes {
            ctx.push(attribute);
            let result = self.check(ctx);
            ctx.pop();
            result?;
        }
        Ok(())
    }
}
