//! Error types and the error sink consulted when evaluation hits a semantic problem.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Where an expression came from: the stylesheet document and the position
/// of the instruction carrying it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(system_id: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            public_id: None,
            system_id: Some(system_id.into()),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.system_id {
            Some(id) => write!(f, "{}:{}:{}", id, self.line, self.column),
            None => write!(f, "line {}, column {}", self.line, self.column),
        }
    }
}

impl From<(usize, usize)> for SourceLocation {
    fn from((line, column): (usize, usize)) -> Self {
        SourceLocation {
            line,
            column,
            ..Default::default()
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Parse error in '{expression}' at {location}: {message}")]
    Parse {
        expression: String,
        message: String,
        location: SourceLocation,
    },

    #[error("Undeclared namespace prefix '{prefix}' at {location}")]
    UndeclaredPrefix {
        prefix: String,
        location: SourceLocation,
    },

    #[error("Unknown function '{name}' at {location}")]
    UnknownFunction {
        name: String,
        location: SourceLocation,
    },

    #[error("Function '{name}' expects {expected} argument(s), got {actual} at {location}")]
    WrongArity {
        name: String,
        expected: String,
        actual: usize,
        location: SourceLocation,
    },

    #[error("External function '{name}' is not allowed: external functions are disabled")]
    ExternalFunctionsDisabled { name: String },

    #[error("Undeclared variable '${0}'")]
    UndeclaredVariable(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Function '{function}' error: {message}")]
    FunctionError { function: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Evaluation aborted: {0}")]
    Aborted(String),
}

impl ExprError {
    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FunctionError {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn parse(
        expression: impl Into<String>,
        message: impl Into<String>,
        location: &SourceLocation,
    ) -> Self {
        Self::Parse {
            expression: expression.into(),
            message: message.into(),
            location: location.clone(),
        }
    }

    /// Semantic errors raised while evaluating. The error sink decides whether
    /// the transformation continues with a fallback value.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExprError::UndeclaredVariable(_)
                | ExprError::TypeError(_)
                | ExprError::FunctionError { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// Receives diagnostics from the matcher and evaluator. The host decides
/// whether a recoverable error stops the transformation.
pub trait ErrorSink {
    fn warning(&mut self, message: &str, location: &SourceLocation);

    /// Reports a recoverable error. Returning `true` lets evaluation continue
    /// with the documented fallback value.
    fn error(&mut self, message: &str, location: &SourceLocation) -> bool;

    fn fatal(&mut self, message: &str, location: &SourceLocation);
}

/// Logs every diagnostic and keeps going after recoverable errors.
#[derive(Debug, Default)]
pub struct LoggingErrorSink;

impl ErrorSink for LoggingErrorSink {
    fn warning(&mut self, message: &str, location: &SourceLocation) {
        log::warn!("{} ({})", message, location);
    }

    fn error(&mut self, message: &str, location: &SourceLocation) -> bool {
        log::warn!("Recoverable error: {} ({})", message, location);
        true
    }

    fn fatal(&mut self, message: &str, location: &SourceLocation) {
        log::error!("Fatal error: {} ({})", message, location);
    }
}

/// Treats every recoverable error as fatal.
#[derive(Debug, Default)]
pub struct StrictErrorSink;

impl ErrorSink for StrictErrorSink {
    fn warning(&mut self, message: &str, location: &SourceLocation) {
        log::warn!("{} ({})", message, location);
    }

    fn error(&mut self, message: &str, location: &SourceLocation) -> bool {
        log::error!("{} ({})", message, location);
        false
    }

    fn fatal(&mut self, message: &str, location: &SourceLocation) {
        log::error!("Fatal error: {} ({})", message, location);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
}

/// Records diagnostics in a shared buffer. Clones share the same buffer, so a
/// host can hand one clone to the `Context` and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct CollectingErrorSink {
    diagnostics: Rc<RefCell<Vec<Diagnostic>>>,
    continue_on_error: bool,
}

impl CollectingErrorSink {
    pub fn new(continue_on_error: bool) -> Self {
        Self {
            diagnostics: Rc::default(),
            continue_on_error,
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn record(&self, severity: Severity, message: &str, location: &SourceLocation) {
        self.diagnostics.borrow_mut().push(Diagnostic {
            severity,
            message: message.to_string(),
            location: location.clone(),
        });
    }
}

impl ErrorSink for CollectingErrorSink {
    fn warning(&mut self, message: &str, location: &SourceLocation) {
        self.record(Severity::Warning, message, location);
    }

    fn error(&mut self, message: &str, location: &SourceLocation) -> bool {
        self.record(Severity::Error, message, location);
        self.continue_on_error
    }

    fn fatal(&mut self, message: &str, location: &SourceLocation) {
        self.record(Severity::Fatal, message, location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let loc = SourceLocation::new("sheet.stx", 12, 4);
        assert_eq!(loc.to_string(), "sheet.stx:12:4");
        let bare: SourceLocation = (3, 9).into();
        assert_eq!(bare.to_string(), "line 3, column 9");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ExprError::UndeclaredVariable("x".into()).is_recoverable());
        assert!(ExprError::function("item-at", "index out of range").is_recoverable());
        assert!(!ExprError::Internal("list".into()).is_recoverable());
        assert!(!ExprError::Aborted("stop".into()).is_recoverable());
    }

    #[test]
    fn test_collecting_sink_shares_buffer() {
        let sink = CollectingErrorSink::new(true);
        let mut handle = sink.clone();
        assert!(handle.error("bad index", &SourceLocation::default()));
        handle.warning("odd", &SourceLocation::default());
        assert_eq!(sink.count(Severity::Error), 1);
        assert_eq!(sink.count(Severity::Warning), 1);
        assert_eq!(sink.diagnostics()[0].message, "bad index");
    }
}
