//! Combinators that derive a new schema from an existing one

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::effect::{AsyncFn, CheckFn, Direction, Effect, EffectCtx, Guard, TransformFn};
use crate::error::{Error, UsageError};
use crate::schema::{Kind, MetadataId, Parts, Schema, unknown};
use crate::value::Value;

/// Parse and serialize functions for [`Schema::transform`].
///
/// # Example
/// ```rust
/// use shape_rs::{Transformer, Value, string};
///
/// let upper = string().transform(
///     Transformer::new()
///         .parser(|value, _| Ok(Value::from(value.as_str().unwrap_or_default().to_uppercase())))
///         .serializer(|value, _| Ok(Value::from(value.as_str().unwrap_or_default().to_lowercase()))),
/// );
/// assert_eq!(upper.parse(&Value::from("abc")).unwrap(), Value::from("ABC"));
/// ```
#[derive(Clone, Default)]
pub struct Transformer {
    parser: Option<TransformFn>,
    serializer: Option<TransformFn>,
}

impl Transformer {
    /// No functions yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parse-direction function, applied after the inner parser.
    pub fn parser<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &EffectCtx<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.parser = Some(Arc::new(f));
        self
    }

    /// Set the serialize-direction function, applied before the inner
    /// serializer.
    pub fn serializer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &EffectCtx<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.serializer = Some(Arc::new(f));
        self
    }
}

/// Checks for [`Schema::refine`].
#[derive(Clone, Default)]
pub struct Refinement {
    parser: Option<CheckFn>,
    serializer: Option<CheckFn>,
}

impl Refinement {
    /// No checks yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check parsed values.
    pub fn parser<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &EffectCtx<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.parser = Some(Arc::new(f));
        self
    }

    /// Check values before they are serialized.
    pub fn serializer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &EffectCtx<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.serializer = Some(Arc::new(f));
        self
    }

    /// The same check in both directions.
    pub fn both<F>(f: F) -> Self
    where
        F: Fn(&Value, &EffectCtx<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        let check: CheckFn = Arc::new(f);
        Self {
            parser: Some(Arc::clone(&check)),
            serializer: Some(check),
        }
    }
}

impl Schema {
    fn derived(&self) -> Parts {
        let mut parts = self.parts();
        parts.kind = Kind::Transformed(self.clone());
        parts.name = None;
        parts
    }

    /// Add value transforms. A missing direction fails with
    /// `MissingParser` or `MissingSerializer` when that direction runs.
    ///
    /// # Panics
    ///
    /// When the transformer has neither function.
    pub fn transform(&self, transformer: Transformer) -> Schema {
        let Transformer { parser, serializer } = transformer;
        if parser.is_none() && serializer.is_none() {
            UsageError::NoTransformDirection(self.name().to_string()).raise();
        }
        let mut parts = self.derived();
        parts.parser = parts
            .parser
            .then(parser.map_or(Effect::Missing(Direction::Parse), Effect::Transform));
        parts.serializer = parts
            .serializer
            .after(serializer.map_or(Effect::Missing(Direction::Serialize), Effect::Transform));
        parts.build()
    }

    /// Add checks. They run in checked mode only.
    ///
    /// # Panics
    ///
    /// When the refinement has neither check.
    pub fn refine(&self, refinement: Refinement) -> Schema {
        let Refinement { parser, serializer } = refinement;
        if parser.is_none() && serializer.is_none() {
            UsageError::NoRefineDirection(self.name().to_string()).raise();
        }
        let mut parts = self.derived();
        if let Some(check) = parser {
            parts.parser = parts.parser.then(Effect::Refine(check));
        }
        if let Some(check) = serializer {
            parts.serializer = parts.serializer.after(Effect::Refine(check));
        }
        parts.build()
    }

    /// Add an asynchronous parse transform. Serializing fails with
    /// `MissingSerializer`.
    pub fn transform_async<F, Fut>(&self, f: F) -> Schema
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let run: AsyncFn = Arc::new(move |value| f(value).boxed());
        let mut parts = self.derived();
        parts.parser = parts.parser.then(Effect::Async { run, check: false });
        parts.serializer = parts.serializer.after(Effect::Missing(Direction::Serialize));
        parts.build()
    }

    /// Add an asynchronous parse check.
    pub fn refine_async<F, Fut>(&self, f: F) -> Schema
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let run: AsyncFn = Arc::new(move |value: Value| {
            let check = f(value.clone());
            async move { check.await.map(|()| value) }.boxed()
        });
        let mut parts = self.derived();
        parts.parser = parts.parser.then(Effect::Async { run, check: true });
        parts.build()
    }

    /// Attach an annotation.
    pub fn with_metadata(&self, id: MetadataId, value: impl Into<Value>) -> Schema {
        let mut parts = self.parts();
        parts.metadata = parts.metadata.with(id, value.into());
        parts.build()
    }

    /// Attach a description.
    pub fn describe(&self, text: &str) -> Schema {
        self.with_metadata(MetadataId::DESCRIPTION, text)
    }

    /// Override the name used in messages.
    pub fn set_name(&self, name: &str) -> Schema {
        let mut parts = self.parts();
        parts.name = Some(name.to_string());
        parts.build()
    }

    /// Swap the directions: the result parses what this schema serializes.
    pub fn reverse(&self) -> Schema {
        let mut parts = self.parts();
        std::mem::swap(&mut parts.parser, &mut parts.serializer);
        parts.reversed = !parts.reversed;
        parts.build()
    }

    /// A JSON text holding a value of this schema.
    ///
    /// # Example
    /// ```rust
    /// use shape_rs::{Value, int};
    ///
    /// let schema = int().json_string();
    /// assert_eq!(schema.parse(&Value::from("42")).unwrap(), Value::from(42));
    /// assert_eq!(schema.convert(&Value::from(42)).unwrap(), Value::from("42"));
    /// ```
    pub fn json_string(&self) -> Schema {
        let mut parts = Parts::new(
            Kind::Transformed(self.clone()),
            vec![
                Effect::Guard(Guard::String),
                Effect::DecodeJson,
                Effect::Delegate {
                    inner: self.clone(),
                    direction: Direction::Parse,
                },
            ],
            vec![
                Effect::Delegate {
                    inner: self.clone(),
                    direction: Direction::Serialize,
                },
                Effect::EncodeJson,
            ],
        );
        parts.name = Some(format!("JsonString({})", self.name()));
        parts.build()
    }
}

/// A named schema defined only by its functions.
///
/// # Panics
///
/// When the transformer has neither function.
pub fn custom(name: &str, transformer: Transformer) -> Schema {
    let Transformer { parser, serializer } = &transformer;
    if parser.is_none() && serializer.is_none() {
        UsageError::NoTransformDirection(name.to_string()).raise();
    }
    unknown().transform(transformer).set_name(name)
}
