//! Execution API
//!
//! The entry points callers use to run a schema. Parsing always runs the
//! checked pipelines. Converting runs the serialize direction trusted: the
//! value is expected to be an output of the schema already.

use std::borrow::Cow;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::effect::{Direction, Mode};
use crate::error::{Error, ErrorCode, Operation, UsageError};
use crate::runtime::run_async;
use crate::schema::Schema;
use crate::value::Value;

/// Parse JSON text, failing the way a parse step fails.
pub(crate) fn decode_text(text: &str) -> Result<Value, Error> {
    Value::from_json_str(text).map_err(|error| Error::failed(Operation::Parsing, error.to_string()))
}

/// Convert a serialized value into a JSON document.
pub(crate) fn encode_json(schema: &Schema, value: &Value) -> Result<serde_json::Value, Error> {
    value.to_json().map_err(|not_json| {
        Error::new(
            Operation::Serializing,
            ErrorCode::InvalidJson(schema.name().to_string()),
        )
        .prepend_path(&not_json.path)
    })
}

fn reported<T>(result: Result<T, Error>) -> Result<T, Error> {
    if let Err(error) = &result {
        tracing::debug!(
            operation = %error.operation,
            path = %error.location(),
            code = error.code.as_str(),
            "schema run failed"
        );
    }
    result
}

impl Schema {
    fn ensure_sync(&self, direction: Direction) {
        if self.is_async_in(direction) {
            UsageError::UnexpectedAsync(self.name().to_string()).raise();
        }
    }

    fn run_sync<'v>(
        &self,
        direction: Direction,
        input: &'v Value,
        mode: Mode,
    ) -> Result<Cow<'v, Value>, Error> {
        self.ensure_sync(direction);
        reported(self.run(direction, input, mode, direction.operation()))
    }

    /// Validate `input` and produce the output value.
    ///
    /// # Panics
    ///
    /// When the schema has asynchronous parse steps.
    pub fn parse(&self, input: &Value) -> Result<Value, Error> {
        self.run_sync(Direction::Parse, input, Mode::Checked)
            .map(Cow::into_owned)
    }

    /// Like [`Schema::parse`], panicking with the rendered message on failure.
    pub fn parse_or_throw(&self, input: &Value) -> Value {
        self.parse(input).unwrap_or_else(|error| panic!("{error}"))
    }

    /// Parse, awaiting asynchronous steps one at a time.
    pub fn parse_async(&self, input: Value) -> BoxFuture<'_, Result<Value, Error>> {
        let run = run_async(
            self,
            Direction::Parse,
            Mode::Checked,
            Operation::Parsing,
            input,
        );
        Box::pin(async move { reported(run.await) })
    }

    /// Serialize an output value back to the input side.
    ///
    /// Type checks and refinements are skipped.
    ///
    /// # Panics
    ///
    /// When the schema has asynchronous serialize steps.
    pub fn convert(&self, value: &Value) -> Result<Value, Error> {
        self.run_sync(Direction::Serialize, value, Mode::Trusted)
            .map(Cow::into_owned)
    }

    /// Like [`Schema::convert`], panicking with the rendered message on failure.
    pub fn convert_or_throw(&self, value: &Value) -> Value {
        self.convert(value).unwrap_or_else(|error| panic!("{error}"))
    }

    /// Check that `input` parses, discarding the output.
    pub fn assert(&self, input: &Value) -> Result<(), Error> {
        self.run_sync(Direction::Parse, input, Mode::Checked)
            .map(|_| ())
    }

    /// Parse a JSON document.
    pub fn parse_json(&self, json: serde_json::Value) -> Result<Value, Error> {
        self.parse(&Value::from_json(json))
    }

    /// Parse JSON text. Malformed text fails with `OperationFailed`.
    pub fn parse_json_string(&self, text: &str) -> Result<Value, Error> {
        let input = reported(decode_text(text))?;
        self.parse(&input)
    }

    /// Serialize to a JSON document. Fails with `InvalidJson` when the
    /// serialized value has no JSON representation.
    pub fn convert_to_json(&self, value: &Value) -> Result<serde_json::Value, Error> {
        let converted = self.convert(value)?;
        reported(encode_json(self, &converted))
    }

    /// Serialize to JSON text.
    pub fn convert_to_json_string(&self, value: &Value) -> Result<String, Error> {
        self.convert_to_json(value).map(|json| json.to_string())
    }

    /// Parse, then deserialize the output into `T`.
    ///
    /// # Example
    /// ```rust
    /// use serde::Deserialize;
    /// use shape_rs::{Shape, Value, int, object, string};
    ///
    /// #[derive(Deserialize)]
    /// struct User {
    ///     name: String,
    ///     age: i32,
    /// }
    ///
    /// let schema = object(|s| {
    ///     Shape::object([
    ///         ("name", s.field("name", string())),
    ///         ("age", s.field("age", int())),
    ///     ])
    /// });
    /// let input = Value::from_json(serde_json::json!({"name": "Ada", "age": 36}));
    /// let user: User = schema.parse_into(&input).unwrap();
    /// assert_eq!(user.age, 36);
    /// ```
    pub fn parse_into<T: DeserializeOwned>(&self, input: &Value) -> Result<T, Error> {
        let output = self.parse(input)?;
        serde_json::to_value(&output)
            .and_then(serde_json::from_value)
            .map_err(|error| Error::failed(Operation::Parsing, error.to_string()))
    }
}
