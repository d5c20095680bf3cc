//! The runtime value model: single items linked into sequences.
//!
//! A sequence is a chain of single-item `Value`s joined by their `next` link.
//! The empty sequence is the distinguished value holding `Item::Empty` with no
//! successor; `Item::Empty` never appears inside a longer chain.
//!
//! Chains are owned. Reading a shared binding means cloning it, and `Clone`
//! copies the whole chain, so rewiring `next` during evaluation can never
//! reach a value someone else holds.

use crate::node::Node;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// An opaque value produced by an extension function.
pub trait HostObject: fmt::Debug {
    fn string_value(&self) -> String;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub enum Item {
    Empty,
    Boolean(bool),
    Number(f64),
    String(String),
    Node(Rc<Node>),
    Object(Rc<dyn HostObject>),
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Empty => write!(f, "()"),
            Item::Boolean(b) => write!(f, "{}", b),
            Item::Number(n) => write!(f, "{}", format_number(*n)),
            Item::String(s) => write!(f, "{:?}", s),
            Item::Node(n) => write!(f, "Node({:?} {})", n.kind(), n.qualified_name()),
            Item::Object(o) => write!(f, "Object({:?})", o),
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Item::Empty, Item::Empty) => true,
            (Item::Boolean(a), Item::Boolean(b)) => a == b,
            (Item::Number(a), Item::Number(b)) => a == b,
            (Item::String(a), Item::String(b)) => a == b,
            (Item::Node(a), Item::Node(b)) => a.id() == b.id(),
            (Item::Object(a), Item::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Item {
    pub fn is_number(&self) -> bool {
        matches!(self, Item::Number(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Item::Boolean(_))
    }

    pub fn as_node(&self) -> Option<&Rc<Node>> {
        match self {
            Item::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Item::Empty => false,
            Item::Boolean(b) => *b,
            Item::Number(n) => *n != 0.0 && !n.is_nan(),
            Item::String(s) => !s.is_empty(),
            Item::Node(_) | Item::Object(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Item::Empty | Item::Object(_) => f64::NAN,
            Item::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Item::Number(n) => *n,
            Item::String(s) => parse_number(s),
            Item::Node(n) => parse_number(n.string_value()),
        }
    }

    pub fn to_string_value(&self) -> String {
        match self {
            Item::Empty => String::new(),
            Item::Boolean(b) => b.to_string(),
            Item::Number(n) => format_number(*n),
            Item::String(s) => s.clone(),
            Item::Node(n) => n.string_value().to_string(),
            Item::Object(o) => o.string_value(),
        }
    }
}

/// One link of a sequence chain.
pub struct Value {
    item: Item,
    next: Option<Box<Value>>,
}

impl Value {
    pub fn empty() -> Self {
        Value {
            item: Item::Empty,
            next: None,
        }
    }

    pub fn from_item(item: Item) -> Self {
        Value { item, next: None }
    }

    pub fn from_bool(b: bool) -> Self {
        Self::from_item(Item::Boolean(b))
    }

    pub fn from_number(n: f64) -> Self {
        Self::from_item(Item::Number(n))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self::from_item(Item::String(s.into()))
    }

    pub fn from_node(node: Rc<Node>) -> Self {
        Self::from_item(Item::Node(node))
    }

    pub fn from_object(object: Rc<dyn HostObject>) -> Self {
        Self::from_item(Item::Object(object))
    }

    /// Builds a chain from items in order. `Item::Empty` entries are skipped.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let items: Vec<Item> = items
            .into_iter()
            .filter(|i| !matches!(i, Item::Empty))
            .collect();
        let mut chain: Option<Box<Value>> = None;
        for item in items.into_iter().rev() {
            chain = Some(Box::new(Value { item, next: chain }));
        }
        match chain {
            Some(head) => *head,
            None => Value::empty(),
        }
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = Rc<Node>>) -> Self {
        Self::from_items(nodes.into_iter().map(Item::Node))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.item, Item::Empty) && self.next.is_none()
    }

    /// The item held by this link.
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// The following link, if this value is part of a longer sequence.
    pub fn next(&self) -> Option<&Value> {
        self.next.as_deref()
    }

    /// Detaches and returns the rest of the chain, leaving a single item.
    pub fn take_next(&mut self) -> Option<Value> {
        self.next.take().map(|b| *b)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_single(&self) -> bool {
        !self.is_empty() && self.next.is_none()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            current: if self.is_empty() { None } else { Some(self) },
        }
    }

    pub fn first(&self) -> Option<&Item> {
        self.iter().next()
    }

    pub fn into_items(mut self) -> Vec<Item> {
        let mut items = Vec::new();
        if self.is_empty() {
            return items;
        }
        let mut rest = self.next.take();
        items.push(std::mem::replace(&mut self.item, Item::Empty));
        while let Some(mut link) = rest {
            rest = link.next.take();
            items.push(std::mem::replace(&mut link.item, Item::Empty));
        }
        items
    }

    /// `self ⧺ other`. Returns the non-empty side unchanged when the other is
    /// empty; otherwise walks to the tail of `self` and links `other` there.
    pub fn concat(mut self, other: Value) -> Value {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let mut cursor = &mut self.next;
        while let Some(link) = cursor {
            cursor = &mut link.next;
        }
        *cursor = Some(Box::new(other));
        self
    }

    /// An explicit deep copy of the whole chain.
    pub fn deep_copy(&self) -> Value {
        self.clone()
    }

    /// Sequences behave like their first item for string conversion.
    pub fn to_string_value(&self) -> String {
        self.first().map(Item::to_string_value).unwrap_or_default()
    }

    pub fn to_number(&self) -> f64 {
        self.first().map(Item::to_number).unwrap_or(f64::NAN)
    }

    /// Empty is false, a single item follows the item rules, and any longer
    /// sequence is true.
    pub fn to_boolean(&self) -> bool {
        match self.first() {
            None => false,
            Some(item) if self.next.is_none() => item.to_boolean(),
            Some(_) => true,
        }
    }

    /// Nodes of the sequence, ignoring other items.
    pub fn nodes(&self) -> impl Iterator<Item = &Rc<Node>> {
        self.iter().filter_map(Item::as_node)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty()
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        Value::from_items(self.iter().cloned())
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        let mut rest = self.next.take();
        while let Some(mut link) = rest {
            rest = link.next.take();
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}

impl From<Item> for Value {
    fn from(item: Item) -> Self {
        Value::from_item(item)
    }
}

pub struct Iter<'v> {
    current: Option<&'v Value>,
}

impl<'v> Iterator for Iter<'v> {
    type Item = &'v Item;

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.current?;
        self.current = link.next.as_deref();
        Some(&link.item)
    }
}

/// Formats a number the way string conversion requires: integral values
/// without a fraction, `NaN`, `Infinity` and `-Infinity` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// Parses the lexical form `-? (digits ('.' digits?)? | '.' digits)` with
/// surrounding whitespace. Anything else is NaN.
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    let body = t.strip_prefix('-').unwrap_or(t);
    if body.is_empty() {
        return f64::NAN;
    }
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };
    let digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    let valid = digits(int_part)
        && frac_part.is_none_or(digits)
        && !(int_part.is_empty() && frac_part.is_none_or(str::is_empty));
    if !valid {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}
