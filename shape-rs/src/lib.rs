#![warn(missing_docs)]
//! # shape-rs
//!
//! Runtime data validation with bidirectional parse/serialize pipelines.
//!
//! ## Overview
//!
//! A [`Schema`] describes the shape of a value and carries two pipelines:
//! - **parse** turns untrusted input into a validated output value
//! - **serialize** turns an output value back into its input form
//!
//! Schemas are immutable and cheap to clone. Every combinator returns a new
//! schema, so a schema can be shared freely across threads.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Construction: string, int, object, union, recursive ... │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  Schema node: Kind + parse Pipeline + serialize Pipeline │
//! │                 (checked and trusted views)              │
//! └──────┬─────────────────────┬─────────────────────┬───────┘
//!        ▼                     ▼                     ▼
//! ┌─────────────┐      ┌───────────────┐     ┌──────────────┐
//! │ sync runner │      │ async runner  │     │ specializer  │
//! │ parse       │      │ parse_async   │     │ compile      │
//! └─────────────┘      └───────────────┘     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use shape_rs::{Shape, Value, int, object, option, string};
//!
//! let user = object(|s| {
//!     Shape::object([
//!         ("name", s.field("full_name", string().min_length(1, None))),
//!         ("age", s.field("age", option(int()))),
//!     ])
//! });
//!
//! let input = Value::from_json(serde_json::json!({"full_name": "Ada"}));
//! let output = user.parse(&input).unwrap();
//! assert_eq!(output, Value::from_json(serde_json::json!({"name": "Ada"})));
//!
//! // Serializing maps the output shape back to the external keys.
//! let back = user.convert(&output).unwrap();
//! assert_eq!(back, input);
//!
//! let error = user.parse(&Value::from_json(serde_json::json!({"full_name": 1}))).unwrap_err();
//! assert_eq!(
//!     error.to_string(),
//!     r#"Failed parsing at ["full_name"]. Reason: Expected String, received Float"#
//! );
//! ```
//!
//! ## Errors
//!
//! Data problems are returned as [`Error`] values carrying the
//! [`Operation`], an [`ErrorCode`] and the [`Path`] of the failing value.
//! Mistakes in building or calling a schema (a union with one member, a
//! synchronous parse of a schema with asynchronous steps) are
//! [`UsageError`]s and panic.

mod api;
mod compile;
mod config;
mod effect;
mod error;
mod lower;
mod path;
mod record;
mod refinements;
mod runtime;
pub mod schema;
mod union;
mod value;

#[cfg(test)]
mod tests;

// Public API
pub use compile::{Compiled, Data, Exec, Repr};
pub use config::{
    GlobalConfig, UnknownKeys, config_version, global_config, reset_global_config,
    set_global_config,
};
pub use effect::{AsyncFn, CheckFn, Direction, EffectCtx, Mode, Step, TransformFn};
pub use error::{Error, ErrorCode, Operation, ShapeResult, UsageError};
pub use path::Path;
pub use schema::{
    Class, FieldId, Kind, Link, Metadata, MetadataId, ObjectBuilder, RecordDef,
    Refinement, Schema, Shape, Transformer, TupleBuilder, array, bigint, bool, custom, date,
    default, deprecate, dict, float, int, literal, literal_variant, merge, never, nullable,
    object, object_of, option, recursive, strict, string, strip, tuple, tuple_of, union, unknown,
};
pub use value::{Map, NotJson, Value};

/// Prelude for convenient imports
///
/// ```rust
/// use shape_rs::prelude::*;
///
/// let schema = array(int());
/// assert!(schema.parse(&Value::Array(vec![Value::from(1)])).is_ok());
/// ```
pub mod prelude {
    pub use crate::{
        Compiled, Data, Error, ErrorCode, Exec, Path, Refinement, Repr, Schema, Shape,
        Transformer, Value, array, bigint, bool, custom, date, default, deprecate, dict, float,
        int, literal, literal_variant, merge, never, nullable, object, object_of, option,
        recursive, strict, string, strip, tuple, tuple_of, union, unknown,
    };
}
