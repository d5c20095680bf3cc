//! Node snapshots: immutable records of the streaming events that make up the
//! ancestor stack.
//!
//! A snapshot only knows what was available when its start event was seen:
//! its name, attributes and in-scope namespaces. Element content is never
//! known, so the string value of an element is always empty.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_SERIAL: AtomicU64 = AtomicU64::new(1);

/// The type of a streamed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Element,
    Attribute,
    Text,
    Cdata,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    /// The name reported by the `node-kind()` function.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "document",
            NodeKind::Element => "element",
            NodeKind::Attribute => "attribute",
            NodeKind::Text => "text",
            NodeKind::Cdata => "cdata",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction => "processing-instruction",
        }
    }
}

/// Stable node identity. Attribute snapshots share the serial of their owner
/// element and carry their 1-based index, so enumerating the same attribute
/// twice yields equal ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    serial: u64,
    attribute: u32,
}

impl NodeId {
    fn fresh() -> Self {
        NodeId {
            serial: NEXT_NODE_SERIAL.fetch_add(1, Ordering::Relaxed),
            attribute: 0,
        }
    }
}

/// A namespace-qualified attribute as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub uri: String,
    pub local_name: String,
    pub qualified_name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(uri: impl Into<String>, qualified_name: impl Into<String>, value: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        Self {
            uri: uri.into(),
            local_name: local_part(&qualified_name).to_string(),
            qualified_name,
            value: value.into(),
        }
    }
}

/// Structural test keys under which positions among siblings are counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PositionKey {
    /// `node()`
    AnyNode,
    /// `*`
    AnyElement,
    /// `prefix:*`
    ElementInNamespace(String),
    /// `*:local`
    ElementLocalName(String),
    /// `prefix:local` or `local`
    ElementName { uri: String, local_name: String },
    /// `text()`, which also counts CDATA sections
    Text,
    /// `cdata()`
    Cdata,
    /// `comment()`
    Comment,
    /// `processing-instruction()`
    ProcessingInstruction,
    /// `processing-instruction('target')`
    ProcessingInstructionTarget(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    uri: String,
    local_name: String,
    qualified_name: String,
    value: String,
    attributes: Vec<Attribute>,
    namespaces: BTreeMap<String, String>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::fresh(),
            kind,
            uri: String::new(),
            local_name: String::new(),
            qualified_name: String::new(),
            value: String::new(),
            attributes: Vec::new(),
            namespaces: BTreeMap::new(),
        }
    }

    pub fn root() -> Self {
        Self::new(NodeKind::Root)
    }

    pub fn element(uri: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        Self {
            uri: uri.into(),
            local_name: local_part(&qualified_name).to_string(),
            qualified_name,
            ..Self::new(NodeKind::Element)
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            value: content.into(),
            ..Self::new(NodeKind::Text)
        }
    }

    pub fn cdata(content: impl Into<String>) -> Self {
        Self {
            value: content.into(),
            ..Self::new(NodeKind::Cdata)
        }
    }

    pub fn comment(content: impl Into<String>) -> Self {
        Self {
            value: content.into(),
            ..Self::new(NodeKind::Comment)
        }
    }

    pub fn processing_instruction(target: impl Into<String>, data: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            local_name: target.clone(),
            qualified_name: target,
            value: data.into(),
            ..Self::new(NodeKind::ProcessingInstruction)
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn with_namespaces(mut self, namespaces: BTreeMap<String, String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// In-scope namespace bindings, prefix to URI. The default namespace is
    /// stored under the empty prefix.
    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    pub fn is_attribute(&self) -> bool {
        self.kind == NodeKind::Attribute
    }

    /// The string value as far as it is known while streaming.
    pub fn string_value(&self) -> &str {
        match self.kind {
            NodeKind::Root | NodeKind::Element => "",
            _ => &self.value,
        }
    }

    /// Builds the snapshot of the attribute at `index` (0-based).
    pub fn attribute_node(&self, index: usize) -> Option<Rc<Node>> {
        let attr = self.attributes.get(index)?;
        Some(Rc::new(Node {
            id: NodeId {
                serial: self.id.serial,
                attribute: index as u32 + 1,
            },
            kind: NodeKind::Attribute,
            uri: attr.uri.clone(),
            local_name: attr.local_name.clone(),
            qualified_name: attr.qualified_name.clone(),
            value: attr.value.clone(),
            attributes: Vec::new(),
            namespaces: self.namespaces.clone(),
        }))
    }

    /// Snapshots of all attributes, in document order.
    pub fn attribute_nodes(&self) -> impl Iterator<Item = Rc<Node>> + '_ {
        (0..self.attributes.len()).filter_map(|i| self.attribute_node(i))
    }

    /// For an attribute snapshot, its 0-based index in the owner element.
    pub fn attribute_index(&self) -> Option<usize> {
        match self.id.attribute {
            0 => None,
            n => Some(n as usize - 1),
        }
    }

    /// The keys this node increments in its parent's position table when it
    /// is entered.
    pub fn position_keys(&self) -> Vec<PositionKey> {
        let mut keys = vec![PositionKey::AnyNode];
        match self.kind {
            NodeKind::Element => {
                keys.push(PositionKey::AnyElement);
                keys.push(PositionKey::ElementInNamespace(self.uri.clone()));
                keys.push(PositionKey::ElementLocalName(self.local_name.clone()));
                keys.push(PositionKey::ElementName {
                    uri: self.uri.clone(),
                    local_name: self.local_name.clone(),
                });
            }
            NodeKind::Text => keys.push(PositionKey::Text),
            NodeKind::Cdata => {
                keys.push(PositionKey::Text);
                keys.push(PositionKey::Cdata);
            }
            NodeKind::Comment => keys.push(PositionKey::Comment),
            NodeKind::ProcessingInstruction => {
                keys.push(PositionKey::ProcessingInstruction);
                keys.push(PositionKey::ProcessingInstructionTarget(
                    self.local_name.clone(),
                ));
            }
            NodeKind::Root | NodeKind::Attribute => return Vec::new(),
        }
        keys
    }
}

fn local_part(qualified_name: &str) -> &str {
    qualified_name
        .split_once(':')
        .map(|(_, local)| local)
        .unwrap_or(qualified_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_snapshot() {
        let node = Node::element("urn:a", "a:item")
            .with_attribute(Attribute::new("", "id", "i1"))
            .with_namespace("a", "urn:a");
        assert!(node.is_element());
        assert_eq!(node.local_name(), "item");
        assert_eq!(node.qualified_name(), "a:item");
        assert_eq!(node.uri(), "urn:a");
        assert_eq!(node.string_value(), "");
        assert_eq!(node.namespaces().get("a").map(String::as_str), Some("urn:a"));
    }

    #[test]
    fn test_attribute_identity_is_stable() {
        let node = Node::element("", "item")
            .with_attribute(Attribute::new("", "id", "i1"))
            .with_attribute(Attribute::new("", "class", "c"));
        let first = node.attribute_node(1).unwrap();
        let again = node.attribute_node(1).unwrap();
        assert_eq!(first.id(), again.id());
        assert_ne!(first.id(), node.id());
        assert_eq!(first.attribute_index(), Some(1));
        assert_eq!(first.string_value(), "c");
        assert_eq!(node.attribute_nodes().count(), 2);
    }

    #[test]
    fn test_position_keys_for_cdata_include_text() {
        let keys = Node::cdata("x").position_keys();
        assert!(keys.contains(&PositionKey::Text));
        assert!(keys.contains(&PositionKey::Cdata));
        assert!(Node::root().position_keys().is_empty());
    }

    #[test]
    fn test_processing_instruction_target() {
        let pi = Node::processing_instruction("render", "fast");
        assert_eq!(pi.local_name(), "render");
        assert_eq!(pi.string_value(), "fast");
        assert!(
            pi.position_keys()
                .contains(&PositionKey::ProcessingInstructionTarget("render".into()))
        );
    }
}
