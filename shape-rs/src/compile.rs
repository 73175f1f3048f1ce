//! Specializer
//!
//! [`Schema::compile`] resolves, once per schema node and [`CompileKey`],
//! the chain of stages that turns data in one [`Repr`] into another. Each
//! pipeline run is lowered into closures (see `lower`), runs that lower to
//! nothing are dropped, and the remaining synchronous stages are fused into
//! one closure. Results match the execution API exactly: same outputs, same
//! errors, same paths.
//!
//! JSON decode and encode stages are always kept, even back to back: the
//! round trip through [`Value`] normalizes numbers.
//!
//! Plans are cached on the schema node and never invalidated.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::api::{decode_text, encode_json};
use crate::effect::{Direction, EffectCtx, Mode, Step};
use crate::error::{Error, UsageError};
use crate::runtime::run_async;
use crate::schema::Schema;
use crate::value::Value;

/// A representation of the data a compiled function accepts or returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repr {
    /// Untrusted input-side value.
    Input,
    /// A JSON document of the input side.
    Json,
    /// JSON text of the input side.
    JsonString,
    /// A value already known to be a valid output.
    Output,
    /// No value: the function only validates.
    Assert,
}

impl Repr {
    fn is_output(self) -> bool {
        self == Self::Output
    }
}

/// Whether a compiled function may await.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Exec {
    /// Fully synchronous. Compiling an asynchronous schema this way panics.
    #[default]
    Sync,
    /// Awaited one stage at a time.
    Async,
}

/// Data passed to and returned by compiled functions.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// A dynamic value (`Input` and `Output`).
    Value(Value),
    /// A JSON document (`Json`).
    Json(serde_json::Value),
    /// JSON text (`JsonString`).
    Text(String),
    /// Nothing (`Assert`).
    Unit,
}

impl Data {
    fn label(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Json(_) => "json",
            Self::Text(_) => "text",
            Self::Unit => "unit",
        }
    }

    /// The value, when this holds one.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

fn label(repr: Repr) -> &'static str {
    match repr {
        Repr::Input | Repr::Output => "value",
        Repr::Json => "json",
        Repr::JsonString => "text",
        Repr::Assert => "unit",
    }
}

/// Cache key of a compiled plan, scoped to one schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CompileKey {
    from: Repr,
    to: Repr,
    exec: Exec,
    validate_input: bool,
}

/// Conversion between representations around the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    DecodeText,
    FromJson,
    ToJson,
    EncodeText,
    Discard,
}

impl Codec {
    fn apply(self, schema: &Schema, data: Data) -> Result<Data, Error> {
        match (self, data) {
            (Self::DecodeText, Data::Text(text)) => decode_text(&text).map(Data::Value),
            (Self::FromJson, Data::Json(json)) => Ok(Data::Value(Value::from_json(json))),
            (Self::ToJson, Data::Value(value)) => encode_json(schema, &value).map(Data::Json),
            (Self::EncodeText, Data::Json(json)) => Ok(Data::Text(json.to_string())),
            (Self::Discard, _) => Ok(Data::Unit),
            (codec, data) => UsageError::ReprMismatch {
                expected: codec.accepts(),
                received: data.label(),
            }
            .raise(),
        }
    }

    fn accepts(self) -> &'static str {
        match self {
            Self::DecodeText => "text",
            Self::FromJson | Self::EncodeText => "json",
            Self::ToJson => "value",
            Self::Discard => "any",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Codec(Codec),
    Run { direction: Direction, mode: Mode },
}

type Fused = Arc<dyn Fn(&Schema, Data) -> Result<Data, Error> + Send + Sync>;

/// The resolved stages for one [`CompileKey`].
pub(crate) struct Plan {
    from: Repr,
    stages: Vec<Stage>,
    /// Live lowered steps across all runs.
    steps: usize,
    fused: Option<Fused>,
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("from", &self.from)
            .field("stages", &self.stages)
            .field("steps", &self.steps)
            .field("fused", &self.fused.is_some())
            .finish()
    }
}

fn stages_for(key: CompileKey) -> Vec<Stage> {
    let CompileKey {
        from,
        to,
        validate_input,
        ..
    } = key;
    let mut stages = Vec::new();
    match from {
        Repr::JsonString => stages.push(Stage::Codec(Codec::DecodeText)),
        Repr::Json => stages.push(Stage::Codec(Codec::FromJson)),
        Repr::Input | Repr::Output | Repr::Assert => {}
    }
    if from.is_output() {
        if !to.is_output() {
            let mode = if validate_input {
                Mode::Checked
            } else {
                Mode::Trusted
            };
            stages.push(Stage::Run {
                direction: Direction::Serialize,
                mode,
            });
        }
    } else {
        stages.push(Stage::Run {
            direction: Direction::Parse,
            mode: Mode::Checked,
        });
        if !matches!(to, Repr::Output | Repr::Assert) {
            stages.push(Stage::Run {
                direction: Direction::Serialize,
                mode: Mode::Trusted,
            });
        }
    }
    match to {
        Repr::Json => stages.push(Stage::Codec(Codec::ToJson)),
        Repr::JsonString => stages.extend([
            Stage::Codec(Codec::ToJson),
            Stage::Codec(Codec::EncodeText),
        ]),
        Repr::Assert => stages.push(Stage::Codec(Codec::Discard)),
        Repr::Input | Repr::Output => {}
    }
    stages
}

/// Drop runs whose pipeline lowers to nothing.
fn elide(schema: &Schema, stages: Vec<Stage>) -> Vec<Stage> {
    stages
        .into_iter()
        .filter(|stage| match *stage {
            Stage::Run { direction, mode } => {
                let live = schema.lowered(direction, mode).run.is_some();
                if !live {
                    tracing::trace!(?direction, ?mode, "eliding dead run");
                }
                live
            }
            Stage::Codec(_) => true,
        })
        .collect()
}

fn fuse(schema: &Schema, stages: &[Stage]) -> Fused {
    let identity: Fused = Arc::new(|_: &Schema, data: Data| Ok(data));
    stages.iter().rev().fold(identity, |next, &stage| {
        let fused: Fused = match stage {
            Stage::Codec(codec) => Arc::new(move |schema: &Schema, data: Data| {
                next(schema, codec.apply(schema, data)?)
            }),
            Stage::Run { direction, mode } => {
                let lowering = schema.lowered(direction, mode);
                Arc::new(move |schema: &Schema, data: Data| {
                    let value = match data {
                        Data::Value(value) => value,
                        other => UsageError::ReprMismatch {
                            expected: "value",
                            received: other.label(),
                        }
                        .raise(),
                    };
                    let ctx = EffectCtx {
                        schema,
                        operation: direction.operation(),
                        mode,
                    };
                    let output = match lowering.run.as_ref().map(|run| run(&value, &ctx)) {
                        None | Some(Step::Unchanged) => value,
                        Some(Step::Transformed(output)) => output,
                        Some(Step::Failed(error)) => return Err(error),
                    };
                    next(schema, Data::Value(output))
                })
            }
        };
        fused
    })
}

impl Plan {
    fn build(schema: &Schema, key: CompileKey) -> Self {
        let stages = elide(schema, stages_for(key));
        if key.exec == Exec::Sync {
            let asynchronous = stages.iter().any(|stage| match stage {
                Stage::Run { direction, .. } => schema.is_async_in(*direction),
                _ => false,
            });
            if asynchronous {
                UsageError::UnexpectedAsync(schema.name().to_string()).raise();
            }
        }
        let steps = stages
            .iter()
            .map(|stage| match *stage {
                Stage::Run { direction, mode } => schema.lowered(direction, mode).steps,
                Stage::Codec(_) => 0,
            })
            .sum();
        let fused = (key.exec == Exec::Sync).then(|| fuse(schema, &stages));
        Self {
            from: key.from,
            stages,
            steps,
            fused,
        }
    }

    fn check_input(&self, data: &Data) {
        let expected = label(self.from);
        if expected != data.label() {
            UsageError::ReprMismatch {
                expected,
                received: data.label(),
            }
            .raise();
        }
    }
}

/// A function produced by [`Schema::compile`].
///
/// Holds its schema, so it stays valid after the caller drops theirs.
#[derive(Clone)]
pub struct Compiled {
    schema: Schema,
    plan: Arc<Plan>,
}

impl Compiled {
    /// Run synchronously.
    ///
    /// # Panics
    ///
    /// When `data` is not in the compiled input representation, or the
    /// function was compiled for [`Exec::Async`].
    pub fn call(&self, data: Data) -> Result<Data, Error> {
        self.plan.check_input(&data);
        match &self.plan.fused {
            Some(fused) => fused(&self.schema, data),
            None => UsageError::UnexpectedAsync(self.schema.name().to_string()).raise(),
        }
    }

    /// Run, awaiting asynchronous steps one at a time.
    pub fn call_async(&self, data: Data) -> BoxFuture<'_, Result<Data, Error>> {
        self.plan.check_input(&data);
        async move {
            let mut current = data;
            for stage in &self.plan.stages {
                current = match (*stage, current) {
                    (Stage::Run { direction, mode }, Data::Value(value)) => Data::Value(
                        run_async(&self.schema, direction, mode, direction.operation(), value)
                            .await?,
                    ),
                    (Stage::Codec(codec), data) => codec.apply(&self.schema, data)?,
                    (Stage::Run { .. }, data) => UsageError::ReprMismatch {
                        expected: "value",
                        received: data.label(),
                    }
                    .raise(),
                };
            }
            Ok(current)
        }
        .boxed()
    }

    /// Check whether every stage was elided.
    pub fn is_identity(&self) -> bool {
        self.plan.stages.is_empty()
    }

    /// Number of stages left after elision.
    pub fn stage_count(&self) -> usize {
        self.plan.stages.len()
    }

    /// The schema this function was compiled from.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl fmt::Debug for Compiled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiled")
            .field("schema", &self.schema.name())
            .field("plan", &self.plan)
            .finish()
    }
}

impl Schema {
    /// Resolve a function from `from` data to `to` data.
    ///
    /// Input-side sources are parsed in checked mode. An `Output` source is
    /// serialized trusted unless `validate_input` is set. `Assert` as a
    /// source behaves like `Input`. Plans are cached per schema node.
    ///
    /// # Panics
    ///
    /// With [`Exec::Sync`], when a pipeline the function runs has
    /// asynchronous steps.
    ///
    /// # Example
    /// ```rust
    /// use shape_rs::{Data, Exec, Repr, Value, int};
    ///
    /// let parse = int().compile(Repr::JsonString, Repr::Output, Exec::Sync, false);
    /// let output = parse.call(Data::Text("42".to_string())).unwrap();
    /// assert_eq!(output, Data::Value(Value::from(42)));
    /// ```
    #[tracing::instrument(skip(self), fields(schema = %self.name()))]
    pub fn compile(&self, from: Repr, to: Repr, exec: Exec, validate_input: bool) -> Compiled {
        let key = CompileKey {
            from,
            to,
            exec,
            validate_input,
        };
        let cache = self.0.compiled.get_or_init(DashMap::new);
        if let Some(plan) = cache.get(&key) {
            tracing::trace!("compile cache hit");
            return Compiled {
                schema: self.clone(),
                plan: Arc::clone(plan.value()),
            };
        }
        tracing::trace!("compile cache miss");
        let built = Arc::new(Plan::build(self, key));
        let plan = Arc::clone(cache.entry(key).or_insert(built).value());
        Compiled {
            schema: self.clone(),
            plan,
        }
    }
}
