//! The mutable evaluation context: the ancestor stack maintained by the
//! streaming driver, the current position, variable bindings and the error
//! sink.

use crate::error::{ErrorSink, ExprError, LoggingErrorSink, SourceLocation};
use crate::name::ExpandedName;
use crate::node::{Node, PositionKey};
use crate::scope::{GroupId, GroupScopes};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// One entry of the ancestor stack with the counters for its children.
#[derive(Debug)]
struct Frame {
    node: Rc<Node>,
    child_counts: HashMap<PositionKey, usize>,
}

impl Frame {
    fn new(node: Rc<Node>) -> Self {
        Self {
            node,
            child_counts: HashMap::new(),
        }
    }
}

pub struct Context {
    stack: Vec<Frame>,
    /// 1-based position of the current node among its matching siblings.
    pub position: usize,
    pub local_vars: HashMap<ExpandedName, Value>,
    pub groups: GroupScopes,
    pub current_group: Option<GroupId>,
    /// Location of the instruction currently being executed.
    pub location: SourceLocation,
    error_sink: Box<dyn ErrorSink>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.stack.len())
            .field("position", &self.position)
            .field("local_vars", &self.local_vars.len())
            .field("current_group", &self.current_group)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_error_sink(Box::new(LoggingErrorSink))
    }

    pub fn with_error_sink(error_sink: Box<dyn ErrorSink>) -> Self {
        Self {
            stack: Vec::new(),
            position: 1,
            local_vars: HashMap::new(),
            groups: GroupScopes::new(),
            current_group: None,
            location: SourceLocation::default(),
            error_sink,
        }
    }

    pub fn set_error_sink(&mut self, error_sink: Box<dyn ErrorSink>) {
        self.error_sink = error_sink;
    }

    // --- Ancestor stack ---

    /// Enters a node. Non-attribute nodes increment their parent's sibling
    /// counters, so the new node's positions are immediately available.
    pub fn push(&mut self, node: impl Into<Rc<Node>>) {
        let node = node.into();
        if let Some(parent) = self.stack.last_mut() {
            for key in node.position_keys() {
                *parent.child_counts.entry(key).or_insert(0) += 1;
            }
        }
        log::trace!(
            "push {:?} '{}' at depth {}",
            node.kind(),
            node.qualified_name(),
            self.stack.len() + 1
        );
        self.stack.push(Frame::new(node));
    }

    /// Leaves the current node. Its children's counters go with it.
    pub fn pop(&mut self) -> Option<Rc<Node>> {
        self.stack.pop().map(|frame| frame.node)
    }

    /// Number of nodes on the stack; the index of the current node.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The node at 1-based stack index `pos`.
    pub fn node(&self, pos: usize) -> Option<&Rc<Node>> {
        pos.checked_sub(1).and_then(|i| self.stack.get(i)).map(|f| &f.node)
    }

    pub fn current_node(&self) -> Option<&Rc<Node>> {
        self.stack.last().map(|f| &f.node)
    }

    /// Stack index of the node with the same identity, if it is an ancestor
    /// of the current position.
    pub fn stack_index_of(&self, node: &Node) -> Option<usize> {
        self.stack
            .iter()
            .rposition(|f| f.node.id() == node.id())
            .map(|i| i + 1)
    }

    /// The rank of the node at `pos` among its siblings counted under `key`.
    /// The document root is always first.
    pub fn position_of(&self, pos: usize, key: &PositionKey) -> usize {
        if pos < 2 {
            return 1;
        }
        self.stack
            .get(pos - 2)
            .and_then(|parent| parent.child_counts.get(key))
            .copied()
            .unwrap_or(1)
    }

    /// Runs `f` with `attribute` temporarily placed directly above the stack
    /// node at `owner`. `f` receives the attribute's stack index.
    pub(crate) fn with_attribute_on_top<T>(
        &mut self,
        owner: usize,
        attribute: Rc<Node>,
        f: impl FnOnce(&mut Self, usize) -> T,
    ) -> T {
        let detached = self.stack.split_off(owner.min(self.stack.len()));
        self.stack.push(Frame::new(attribute));
        let top = self.stack.len();
        let result = f(self, top);
        self.stack.pop();
        self.stack.extend(detached);
        result
    }

    // --- Diagnostics ---

    pub fn warning(&mut self, message: &str) {
        self.error_sink.warning(message, &self.location);
    }

    /// The single recovery point for evaluation errors. Recoverable errors
    /// go to the sink; if it lets evaluation continue, `fallback` is the
    /// result. Anything else propagates, internal errors reported as fatal.
    pub fn recover(&mut self, error: ExprError, fallback: Value) -> Result<Value, ExprError> {
        if error.is_recoverable() {
            let message = error.to_string();
            if self.error_sink.error(&message, &self.location) {
                log::debug!("Continuing after recoverable error: {}", message);
                Ok(fallback)
            } else {
                Err(ExprError::Aborted(message))
            }
        } else {
            if let ExprError::Internal(message) = &error {
                self.error_sink.fatal(message, &self.location);
            }
            Err(error)
        }
    }
}
