//! Error types for parsing and serializing
//!
//! Data problems are reported as [`Error`] values carrying the
//! [`Operation`] that failed, a closed [`ErrorCode`] and the [`Path`] to the
//! failing value. They are always returned through `Result`.
//!
//! Mistakes made while *building* a schema (a union with one member, a
//! transform without any function, parsing an async schema synchronously)
//! are a different category: they are described by [`UsageError`] and raised
//! as panics, because no input could ever make them succeed.
//!
//! # Message format
//!
//! ```text
//! Failed parsing at ["user"]["age"]. Reason: Expected Int, received String
//! ```
//!
//! # Example
//! ```rust
//! use shape_rs::{Error, ErrorCode, Operation};
//!
//! let error = Error::new(Operation::Parsing, ErrorCode::ExcessField("bar".into()))
//!     .prepend("foo");
//! assert_eq!(error.path.segments(), ["foo"]);
//! assert!(error.message().starts_with("Failed parsing at [\"foo\"]."));
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::path::Path;
use crate::value::{Value, quote};

/// The direction an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Untrusted input to output.
    Parsing,
    /// Output back to input.
    Serializing,
}

impl Operation {
    /// Returns the lowercase label used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Serializing => "serializing",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of failure kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "details", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A user transform or refinement rejected the value.
    OperationFailed(String),
    /// The schema cannot parse (it only has a serializer).
    MissingParser,
    /// The schema cannot serialize (it only has a parser).
    MissingSerializer,
    /// The value has the wrong shape.
    UnexpectedType {
        /// Name of the expected schema.
        expected: String,
        /// Classification of the received value.
        received: String,
    },
    /// The value does not equal the expected literal.
    UnexpectedValue {
        /// Literal text of the expected value.
        expected: String,
        /// Literal text of the received value.
        received: String,
    },
    /// The input array length differs from the tuple arity.
    TupleSize {
        /// Declared arity.
        expected: usize,
        /// Input length.
        received: usize,
    },
    /// A strict object found a key it does not declare.
    ExcessField(String),
    /// Every union member failed; one error per member, in order.
    InvalidUnion(Vec<Error>),
    /// The value has no JSON representation.
    InvalidJson(String),
}

impl ErrorCode {
    /// Build an [`ErrorCode::UnexpectedType`] for a schema name and a received value.
    pub fn unexpected_type(expected: impl Into<String>, received: &Value) -> Self {
        Self::UnexpectedType {
            expected: expected.into(),
            received: received.classify().to_string(),
        }
    }

    /// Build an [`ErrorCode::UnexpectedValue`] comparing two values.
    pub fn unexpected_value(expected: &Value, received: &Value) -> Self {
        Self::UnexpectedValue {
            expected: expected.to_literal_text(),
            received: received.to_literal_text(),
        }
    }

    /// Returns the stable identifier of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OperationFailed(_) => "OPERATION_FAILED",
            Self::MissingParser => "MISSING_PARSER",
            Self::MissingSerializer => "MISSING_SERIALIZER",
            Self::UnexpectedType { .. } => "UNEXPECTED_TYPE",
            Self::UnexpectedValue { .. } => "UNEXPECTED_VALUE",
            Self::TupleSize { .. } => "TUPLE_SIZE",
            Self::ExcessField(_) => "EXCESS_FIELD",
            Self::InvalidUnion(_) => "INVALID_UNION",
            Self::InvalidJson(_) => "INVALID_JSON",
        }
    }

    /// Render the reason text. `level` is the union nesting depth.
    pub fn reason(&self, level: usize) -> String {
        match self {
            Self::OperationFailed(message) => message.clone(),
            Self::MissingParser => "Schema parser is missing".to_string(),
            Self::MissingSerializer => "Schema serializer is missing".to_string(),
            Self::UnexpectedType { expected, received }
            | Self::UnexpectedValue { expected, received } => {
                format!("Expected {expected}, received {received}")
            }
            Self::TupleSize { expected, received } => {
                format!("Expected Tuple with {expected} items, received {received}")
            }
            Self::ExcessField(key) => format!(
                "Encountered disallowed excess key {} on an object. Use Deprecated to ignore a specific field, or strip to ignore excess keys completely",
                quote(key)
            ),
            Self::InvalidUnion(errors) => {
                let line_break = format!("\n{}", "  ".repeat(level + 1));
                let mut seen = HashSet::new();
                let mut lines = Vec::with_capacity(errors.len());
                for error in errors {
                    let reason = error.code.reason(level + 1);
                    let line = if error.path.is_root() {
                        format!("- {reason}")
                    } else {
                        format!("- Failed at {}. {reason}", error.path)
                    };
                    if seen.insert(line.clone()) {
                        lines.push(line);
                    }
                }
                format!(
                    "Invalid union with following errors{line_break}{}",
                    lines.join(&line_break)
                )
            }
            Self::InvalidJson(name) => format!("The schema {name} is not compatible with JSON"),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed parse or serialize.
///
/// Created at the failure site with an empty path; every enclosing container
/// prepends its segment on the way out.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct Error {
    /// Direction of the failed call.
    pub operation: Operation,
    /// What went wrong.
    pub code: ErrorCode,
    /// Where it went wrong, root to leaf.
    pub path: Path,
}

impl Error {
    /// Create an error at the root path.
    pub fn new(operation: Operation, code: ErrorCode) -> Self {
        Self {
            operation,
            code,
            path: Path::root(),
        }
    }

    /// Create an [`ErrorCode::OperationFailed`] error.
    pub fn failed(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, ErrorCode::OperationFailed(message.into()))
    }

    /// Return the same error one container further out.
    pub fn prepend(self, segment: impl Into<String>) -> Self {
        Self {
            path: self.path.prepend(segment),
            ..self
        }
    }

    /// Return the same error under `outer`.
    pub fn prepend_path(self, outer: &Path) -> Self {
        Self {
            path: self.path.prepend_path(outer),
            ..self
        }
    }

    /// The rendered path, or `root`.
    pub fn location(&self) -> String {
        if self.path.is_root() {
            "root".to_string()
        } else {
            self.path.to_string()
        }
    }

    /// The message without the location prefix.
    pub fn reason(&self) -> String {
        self.code.reason(0)
    }

    /// The full rendered message.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed {} at {}. Reason: {}",
            self.operation,
            self.location(),
            self.reason()
        )
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_struct("Error", 5)?;
        out.serialize_field("operation", &self.operation)?;
        out.serialize_field("code", &self.code)?;
        out.serialize_field("path", &self.path)?;
        out.serialize_field("reason", &self.reason())?;
        out.serialize_field("message", &self.message())?;
        out.end()
    }
}

/// Result alias for schema operations.
pub type ShapeResult<T> = Result<T, Error>;

/// Programmer mistakes in schema construction or API use.
///
/// These are raised as panics carrying the rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// `union` was given fewer than two members.
    #[error("A union requires at least two members, received {0}")]
    UnionTooSmall(usize),

    /// `transform` or `custom` was given no function at all.
    #[error("The transform for {0} must provide a parser, a serializer, or both")]
    NoTransformDirection(String),

    /// `refine` was given no check at all.
    #[error("The refinement for {0} must provide a parse check, a serialize check, or both")]
    NoRefineDirection(String),

    /// A schema with asynchronous steps was run synchronously.
    #[error(
        "Encountered unexpected asynchronous transform or refine in {0}. Use parse_async instead of parse"
    )]
    UnexpectedAsync(String),

    /// An object-only operation received another kind of schema.
    #[error("{0} is not an object schema")]
    NotAnObject(String),

    /// A tuple builder left an index without an item.
    #[error("Tuple item at index {0} is not declared")]
    TupleHole(usize),

    /// A builder returned a shape referencing a field from another builder.
    #[error("The output shape references field #{0} which this builder never declared")]
    ForeignField(usize),

    /// The same external key was declared twice at one level.
    #[error("Field {0} is declared more than once")]
    DuplicateField(String),

    /// A recursive placeholder outlived its root schema.
    #[error("Recursive schema used after its root schema was dropped")]
    DetachedRecursive,

    /// A compiled function received data in the wrong representation.
    #[error("Compiled function expects {expected} input, received {received}")]
    ReprMismatch {
        /// The representation the function was compiled for.
        expected: &'static str,
        /// The representation that was passed.
        received: &'static str,
    },
}

impl UsageError {
    /// Raise the usage error.
    #[track_caller]
    pub(crate) fn raise(self) -> ! {
        tracing::error!(error = %self, "schema usage error");
        panic!("{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_at_root() {
        let error = Error::new(
            Operation::Parsing,
            ErrorCode::unexpected_type("String", &Value::Bool(true)),
        );
        assert_eq!(
            error.message(),
            "Failed parsing at root. Reason: Expected String, received Bool"
        );
        assert_eq!(error.reason(), "Expected String, received Bool");
    }

    #[test]
    fn test_message_with_path() {
        let error = Error::new(
            Operation::Serializing,
            ErrorCode::TupleSize {
                expected: 2,
                received: 3,
            },
        )
        .prepend("1")
        .prepend("items");
        assert_eq!(
            error.to_string(),
            r#"Failed serializing at ["items"]["1"]. Reason: Expected Tuple with 2 items, received 3"#
        );
    }

    #[test]
    fn test_excess_field_reason_names_key() {
        let reason = ErrorCode::ExcessField("bar".to_string()).reason(0);
        assert!(reason.starts_with(r#"Encountered disallowed excess key "bar" on an object"#));
    }

    #[test]
    fn test_union_reason_deduplicates() {
        let member = |code| Error::new(Operation::Parsing, code);
        let code = ErrorCode::InvalidUnion(vec![
            member(ErrorCode::unexpected_type("Int", &Value::from("x"))),
            member(ErrorCode::unexpected_type("Int", &Value::from("x"))),
            member(ErrorCode::unexpected_type("Bool", &Value::from("x"))).prepend("a"),
        ]);
        assert_eq!(
            code.reason(0),
            "Invalid union with following errors\n  - Expected Int, received String\n  - Failed at [\"a\"]. Expected Bool, received String"
        );
    }

    #[test]
    fn test_nested_union_indents_one_level_deeper() {
        let inner = Error::new(
            Operation::Parsing,
            ErrorCode::InvalidUnion(vec![Error::new(
                Operation::Parsing,
                ErrorCode::MissingParser,
            )]),
        );
        let outer = ErrorCode::InvalidUnion(vec![inner]);
        assert_eq!(
            outer.reason(0),
            "Invalid union with following errors\n  - Invalid union with following errors\n    - Schema parser is missing"
        );
    }

    #[test]
    fn test_error_serializes_with_reason() {
        let error = Error::new(Operation::Parsing, ErrorCode::MissingParser).prepend("a");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["operation"], "parsing");
        assert_eq!(json["code"]["kind"], "MISSING_PARSER");
        assert_eq!(json["path"], serde_json::json!(["a"]));
        assert_eq!(json["reason"], "Schema parser is missing");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
