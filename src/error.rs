// ABOUTME: Error types for the reader and the evaluator

use crate::value::{Span, Value};
use std::fmt;
use thiserror::Error;

/// Failure kinds an evaluation can produce. Every built-in validates its
/// argument count and kinds before acting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("{function}: expected {expected}, got {actual}")]
    KindMismatch {
        function: String,
        expected: String,
        actual: String,
    },

    #[error("{function}: expected {expected} arguments, got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),

    #[error("division by zero")]
    DivideByZero,

    #[error("integer overflow in {0}")]
    Overflow(String),

    #[error("{function}: index {index} out of range")]
    BadIndex { function: String, index: i64 },

    #[error("case: duplicate key {0}")]
    DuplicateCaseKey(String),

    #[error("write to unbound variable: {0}")]
    WriteToUnbound(String),

    #[error("{0}")]
    Assertion(String),

    #[error("{0} is not a valid function call")]
    NotCallable(String),

    #[error("{function}: {message}")]
    Runtime { function: String, message: String },

    #[error("io error: {0}")]
    Io(String),
}

/// An evaluation error: the kind, the source span of the offending form
/// and the stack of enclosing closure names collected while unwinding.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
    pub backtrace: Vec<String>,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{} at {}", self.kind, span),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl EvalError {
    pub fn new(kind: ErrorKind) -> Self {
        EvalError {
            kind,
            span: None,
            backtrace: Vec::new(),
        }
    }

    /// Attaches a span unless one is already present; errors keep the
    /// innermost location they were raised at.
    pub fn with_span(mut self, span: Option<Span>) -> Self {
        if self.span.is_none() {
            self.span = span;
        }
        self
    }

    pub fn push_frame(&mut self, frame: impl Into<String>) {
        self.backtrace.push(frame.into());
    }

    pub fn kind_error(function: &str, expected: &str, actual: &Value) -> Self {
        EvalError::new(ErrorKind::KindMismatch {
            function: function.to_string(),
            expected: expected.to_string(),
            actual: actual.type_name().to_string(),
        })
    }

    pub fn arity(function: &str, expected: &str, actual: usize) -> Self {
        EvalError::new(ErrorKind::Arity {
            function: function.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }

    pub fn runtime(function: &str, message: impl Into<String>) -> Self {
        EvalError::new(ErrorKind::Runtime {
            function: function.to_string(),
            message: message.into(),
        })
    }

    /// Human-readable backtrace, innermost frame last.
    pub fn render_backtrace(&self) -> String {
        if self.backtrace.is_empty() {
            return String::new();
        }
        let mut out = String::from("Backtrace:\n");
        for frame in self.backtrace.iter() {
            out.push_str("  in ");
            out.push_str(frame);
            out.push('\n');
        }
        out
    }
}

/// A syntax failure from the reader: the offending source excerpt plus a
/// human-readable position message.
#[derive(Debug, Clone, Error)]
#[error("{context}\n{message}")]
pub struct ParseError {
    pub context: String,
    pub message: String,
}

impl ParseError {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        ParseError {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Either kind of failure the embedding API can surface.
#[derive(Debug, Error)]
pub enum WalError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_span() {
        let span = Span {
            file: "t.wal".into(),
            line: 3,
            column: 7,
            end_line: 3,
            end_column: 9,
        };
        let err = EvalError::new(ErrorKind::DivideByZero).with_span(Some(span));
        assert_eq!(format!("{}", err), "division by zero at t.wal:3:7");
    }

    #[test]
    fn test_with_span_keeps_innermost() {
        let inner = Span {
            file: "a.wal".into(),
            line: 1,
            column: 1,
            end_line: 1,
            end_column: 2,
        };
        let outer = Span {
            file: "a.wal".into(),
            line: 9,
            column: 9,
            end_line: 9,
            end_column: 10,
        };
        let err = EvalError::new(ErrorKind::DivideByZero)
            .with_span(Some(inner.clone()))
            .with_span(Some(outer));
        assert_eq!(err.span, Some(inner));
    }

    #[test]
    fn test_backtrace_rendering() {
        let mut err = EvalError::new(ErrorKind::UndefinedSymbol("x".into()));
        err.push_frame("inner");
        err.push_frame("outer");
        let rendered = err.render_backtrace();
        assert!(rendered.contains("in inner"));
        assert!(rendered.contains("in outer"));
    }
}
