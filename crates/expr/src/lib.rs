pub mod ast;
pub mod axes;
pub mod compile;
pub mod context;
pub mod engine;
pub mod error;
pub mod functions;
pub mod matcher;
pub mod name;
pub mod node;
pub mod operators;
pub mod parser;
pub mod scope;
pub mod tree;
pub mod value;

pub use compile::{StaticContext, parse_avt, parse_expression, parse_pattern};
pub use context::Context;
pub use engine::{evaluate, select};
pub use error::{
    CollectingErrorSink, Diagnostic, ErrorSink, ExprError, LoggingErrorSink, Severity,
    SourceLocation, StrictErrorSink,
};
pub use functions::{
    ExtensionClass, Function, FunctionRegistry, ReflectiveExtension, ScriptEngine,
    CLASS_NS_PREFIX, STX_FUNCTIONS_NS,
};
pub use matcher::matches;
pub use name::ExpandedName;
pub use node::{Attribute, Node, NodeId, NodeKind, PositionKey};
pub use scope::{GroupId, GroupScopes, resolve_variable};
pub use tree::Tree;
pub use value::{HostObject, Item, Value};

// Re-export test utilities for integration testing in downstream crates
pub mod testing;
