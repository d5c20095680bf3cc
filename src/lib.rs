//! Streaming STX expression and pattern evaluation.
//!
//! The engine is split across two crates, re-exported here:
//!
//! - `stx-expr`: node snapshots, values, the expression and pattern compiler,
//!   the matcher, the evaluator and the function registry.
//! - `stx-source`: drives a `Context` from XML text.

pub use stx_expr as expr;
pub use stx_source as source;

pub use stx_expr::{
    CollectingErrorSink, Context, ErrorSink, ExpandedName, ExprError, ExtensionClass, Function,
    FunctionRegistry, GroupId, Item, LoggingErrorSink, Node, NodeKind, ReflectiveExtension,
    ScriptEngine, Severity, SourceLocation, StaticContext, StrictErrorSink, Tree, Value, evaluate,
    matches, parse_avt, parse_expression, parse_pattern,
};
pub use stx_source::{
    PatternCollector, PatternMatch, SourceError, SourceOptions, StreamDriver, StreamHandler,
};
