//! Effect pipeline engine
//!
//! Every schema node carries two [`Pipeline`]s, one per [`Direction`]. A
//! pipeline is an ordered list of [`Effect`]s kept in two views: `checked`
//! (every effect) and `trusted` (the same list with the type checks and
//! refinements removed). Running a pipeline feeds the value through each
//! effect in order; an effect leaves the value alone, replaces it, or stops
//! the run with an [`Error`].
//!
//! Serialize pipelines are stored in execution order, so combinators
//! prepend to them and append to parse pipelines. That keeps the serialize
//! direction the inverse of the parse direction.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{Error, ErrorCode, Operation, UsageError};
use crate::record;
use crate::schema::{Link, RecordDef, Schema};
use crate::union;
use crate::value::{Map, Value};

/// Which way a pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Input to output.
    Parse,
    /// Output to input.
    Serialize,
}

impl Direction {
    /// The operation reported by errors raised in this direction.
    pub fn operation(self) -> Operation {
        match self {
            Self::Parse => Operation::Parsing,
            Self::Serialize => Operation::Serializing,
        }
    }

    /// The opposite direction.
    pub fn flip(self) -> Self {
        match self {
            Self::Parse => Self::Serialize,
            Self::Serialize => Self::Parse,
        }
    }
}

/// Whether type checks and refinements run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Validate everything; the input is untrusted.
    #[default]
    Checked,
    /// Skip checks that a well-typed value always passes.
    Trusted,
}

/// What a step sees while it runs.
#[derive(Clone, Copy)]
pub struct EffectCtx<'a> {
    /// The schema whose pipeline is running.
    pub schema: &'a Schema,
    /// The operation of the top-level call.
    pub operation: Operation,
    /// The mode of the current run.
    pub mode: Mode,
}

impl EffectCtx<'_> {
    /// Build an [`ErrorCode::OperationFailed`] error for this run.
    pub fn fail(&self, message: impl Into<String>) -> Error {
        Error::failed(self.operation, message)
    }

    /// Build an error with an arbitrary code for this run.
    pub fn error(&self, code: ErrorCode) -> Error {
        Error::new(self.operation, code)
    }

    pub(crate) fn unexpected_type(&self, received: &Value) -> Error {
        self.error(ErrorCode::unexpected_type(self.schema.name(), received))
    }

    /// The same run, now inside `schema`.
    pub(crate) fn within<'s>(&self, schema: &'s Schema) -> EffectCtx<'s> {
        EffectCtx {
            schema,
            operation: self.operation,
            mode: self.mode,
        }
    }
}

impl fmt::Debug for EffectCtx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectCtx")
            .field("schema", &self.schema.name())
            .field("operation", &self.operation)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Outcome of a single step.
#[derive(Debug)]
pub enum Step {
    /// The value passes through as-is.
    Unchanged,
    /// The value is replaced.
    Transformed(Value),
    /// The run stops.
    Failed(Error),
}

impl Step {
    pub(crate) fn from_run(result: Result<Cow<'_, Value>, Error>) -> Self {
        match result {
            Ok(Cow::Borrowed(_)) => Self::Unchanged,
            Ok(Cow::Owned(value)) => Self::Transformed(value),
            Err(error) => Self::Failed(error),
        }
    }

    pub(crate) fn from_result(result: Result<Value, Error>) -> Self {
        match result {
            Ok(value) => Self::Transformed(value),
            Err(error) => Self::Failed(error),
        }
    }

    /// Back to a run result over `input`, borrowing it when unchanged.
    pub(crate) fn into_run(self, input: &Value) -> Result<Cow<'_, Value>, Error> {
        match self {
            Self::Unchanged => Ok(Cow::Borrowed(input)),
            Self::Transformed(value) => Ok(Cow::Owned(value)),
            Self::Failed(error) => Err(error),
        }
    }
}

/// User transform, run in both modes.
pub type TransformFn = Arc<dyn Fn(&Value, &EffectCtx<'_>) -> Result<Value, Error> + Send + Sync>;

/// User refinement, run in checked mode only.
pub type CheckFn = Arc<dyn Fn(&Value, &EffectCtx<'_>) -> Result<(), Error> + Send + Sync>;

/// Asynchronous step. A rejection becomes [`ErrorCode::OperationFailed`].
pub type AsyncFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Built-in type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Guard {
    String,
    Int,
    Float { allow_nan: bool },
    Bool,
    BigInt,
    Date,
}

impl Guard {
    pub(crate) fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::BigInt, Value::BigInt(_))
            | (Self::Date, Value::Date(_)) => true,
            (Self::Int, Value::Number(n)) => {
                n.fract() == 0.0 && *n >= f64::from(i32::MIN) && *n <= f64::from(i32::MAX)
            }
            (Self::Float { allow_nan }, Value::Number(n)) => allow_nan || !n.is_nan(),
            _ => false,
        }
    }
}

/// One step of a pipeline.
#[derive(Clone)]
pub(crate) enum Effect {
    Guard(Guard),
    Never,
    Expect(Value),
    Constant(Value),
    Optional { inner: Schema, direction: Direction },
    Nullable { inner: Schema, direction: Direction },
    Default { inner: Schema, value: Value, direction: Direction },
    Delegate { inner: Schema, direction: Direction },
    Items { item: Schema, direction: Direction },
    Entries { item: Schema, direction: Direction },
    Record { def: Arc<RecordDef>, direction: Direction },
    Union { members: Arc<[Schema]>, direction: Direction },
    Recursive { link: Link, direction: Direction },
    Transform(TransformFn),
    Refine(CheckFn),
    Async { run: AsyncFn, check: bool },
    Missing(Direction),
    DecodeJson,
    EncodeJson,
}

impl Effect {
    /// Check-class effects are dropped from the trusted view.
    pub(crate) fn is_check(&self) -> bool {
        matches!(
            self,
            Self::Guard(_) | Self::Expect(_) | Self::Refine(_) | Self::Async { check: true, .. }
        )
    }

    /// The child schema this effect runs, with the direction it runs it in.
    pub(crate) fn children(&self) -> Vec<(Schema, Direction)> {
        match self {
            Self::Optional { inner, direction }
            | Self::Nullable { inner, direction }
            | Self::Default {
                inner, direction, ..
            }
            | Self::Delegate { inner, direction } => vec![(inner.clone(), *direction)],
            Self::Items { item, direction } | Self::Entries { item, direction } => {
                vec![(item.clone(), *direction)]
            }
            Self::Record { def, direction } => def
                .fields
                .iter()
                .map(|field| (field.schema.clone(), *direction))
                .collect(),
            Self::Union { members, direction } => members
                .iter()
                .map(|member| (member.clone(), *direction))
                .collect(),
            Self::Recursive { link, direction } => vec![(link.resolve(), *direction)],
            _ => Vec::new(),
        }
    }

    /// Apply the effect synchronously.
    pub(crate) fn apply(&self, value: &Value, ctx: &EffectCtx<'_>) -> Step {
        match self {
            Self::Guard(guard) => {
                if guard.accepts(value) {
                    Step::Unchanged
                } else {
                    Step::Failed(ctx.unexpected_type(value))
                }
            }
            Self::Never => Step::Failed(ctx.unexpected_type(value)),
            Self::Expect(expected) => {
                if expected.same_value(value) {
                    Step::Unchanged
                } else {
                    Step::Failed(ctx.error(ErrorCode::unexpected_value(expected, value)))
                }
            }
            Self::Constant(constant) => {
                if constant.same_value(value) {
                    Step::Unchanged
                } else {
                    Step::Transformed(constant.clone())
                }
            }
            Self::Optional { inner, direction } => {
                if value.is_undefined() {
                    Step::Unchanged
                } else {
                    Step::from_run(inner.run(*direction, value, ctx.mode, ctx.operation))
                }
            }
            Self::Nullable { inner, direction } => match (direction, value) {
                (Direction::Parse, Value::Null) => Step::Transformed(Value::Undefined),
                (Direction::Serialize, Value::Undefined) => Step::Transformed(Value::Null),
                _ => Step::from_run(inner.run(*direction, value, ctx.mode, ctx.operation)),
            },
            Self::Default {
                inner,
                value: fallback,
                direction,
            } => {
                if value.is_undefined() {
                    Step::Transformed(fallback.clone())
                } else {
                    Step::from_run(inner.run(*direction, value, ctx.mode, ctx.operation))
                }
            }
            Self::Delegate { inner, direction } => {
                Step::from_run(inner.run(*direction, value, ctx.mode, ctx.operation))
            }
            Self::Items { item, direction } => items(value, ctx, |current| {
                item.run(*direction, current, ctx.mode, ctx.operation)
            }),
            Self::Entries { item, direction } => entries(value, ctx, |current| {
                item.run(*direction, current, ctx.mode, ctx.operation)
            }),
            Self::Record { def, direction } => {
                let (mode, operation) = (ctx.mode, ctx.operation);
                Step::from_result(match direction {
                    Direction::Parse => record::parse(def, value, ctx, |index, input| {
                        def.fields[index].schema.run(*direction, input, mode, operation)
                    }),
                    Direction::Serialize => record::serialize(def, value, ctx, |index, input| {
                        def.fields[index].schema.run(*direction, input, mode, operation)
                    }),
                })
            }
            Self::Union { members, direction } => union::resolve(members, *direction, value, ctx),
            Self::Recursive { link, direction } => {
                Step::from_run(link.resolve().run(*direction, value, ctx.mode, ctx.operation))
            }
            Self::Transform(transform) => Step::from_result(transform(value, ctx)),
            Self::Refine(check) => match check(value, ctx) {
                Ok(()) => Step::Unchanged,
                Err(error) => Step::Failed(error),
            },
            Self::Async { .. } => {
                UsageError::UnexpectedAsync(ctx.schema.name().to_string()).raise()
            }
            Self::Missing(Direction::Parse) => Step::Failed(ctx.error(ErrorCode::MissingParser)),
            Self::Missing(Direction::Serialize) => {
                Step::Failed(ctx.error(ErrorCode::MissingSerializer))
            }
            Self::DecodeJson => decode_json(value, ctx),
            Self::EncodeJson => encode_json(value, ctx),
        }
    }
}

pub(crate) fn decode_json(value: &Value, ctx: &EffectCtx<'_>) -> Step {
    match value {
        Value::String(text) => match Value::from_json_str(text) {
            Ok(decoded) => Step::Transformed(decoded),
            Err(error) => Step::Failed(ctx.fail(error.to_string())),
        },
        other => Step::Failed(ctx.unexpected_type(other)),
    }
}

pub(crate) fn encode_json(value: &Value, ctx: &EffectCtx<'_>) -> Step {
    match value.to_json() {
        Ok(json) => Step::Transformed(Value::String(json.to_string())),
        Err(not_json) => Step::Failed(
            ctx.error(ErrorCode::InvalidJson(ctx.schema.name().to_string()))
                .prepend_path(&not_json.path),
        ),
    }
}

/// Run `run` over every item of an array, prefixing failures with the index.
pub(crate) fn items<'v>(
    value: &'v Value,
    ctx: &EffectCtx<'_>,
    run: impl Fn(&'v Value) -> Result<Cow<'v, Value>, Error>,
) -> Step {
    let Value::Array(values) = value else {
        return Step::Failed(ctx.unexpected_type(value));
    };
    let mut output: Option<Vec<Value>> = None;
    for (index, current) in values.iter().enumerate() {
        match run(current) {
            Ok(Cow::Borrowed(_)) => {
                if let Some(output) = output.as_mut() {
                    output.push(current.clone());
                }
            }
            Ok(Cow::Owned(replaced)) => output
                .get_or_insert_with(|| values[..index].to_vec())
                .push(replaced),
            Err(error) => return Step::Failed(error.prepend(index.to_string())),
        }
    }
    output.map_or(Step::Unchanged, |output| Step::Transformed(Value::Array(output)))
}

/// Run `run` over every value of an object, prefixing failures with the key.
pub(crate) fn entries<'v>(
    value: &'v Value,
    ctx: &EffectCtx<'_>,
    run: impl Fn(&'v Value) -> Result<Cow<'v, Value>, Error>,
) -> Step {
    let Value::Object(map) = value else {
        return Step::Failed(ctx.unexpected_type(value));
    };
    let mut output: Option<Map> = None;
    for (index, (key, current)) in map.iter().enumerate() {
        match run(current) {
            Ok(Cow::Borrowed(_)) => {
                if let Some(output) = output.as_mut() {
                    output.insert(key, current.clone());
                }
            }
            Ok(Cow::Owned(replaced)) => {
                output
                    .get_or_insert_with(|| {
                        map.iter()
                            .take(index)
                            .map(|(key, value)| (key, value.clone()))
                            .collect()
                    })
                    .insert(key, replaced);
            }
            Err(error) => return Step::Failed(error.prepend(key)),
        }
    }
    output.map_or(Step::Unchanged, |output| Step::Transformed(Value::Object(output)))
}

/// Ordered effects of one direction, in checked and trusted views.
#[derive(Clone, Default)]
pub(crate) struct Pipeline {
    checked: Vec<Effect>,
    trusted: Vec<Effect>,
}

impl Pipeline {
    pub(crate) fn new(effects: Vec<Effect>) -> Self {
        let trusted = effects.iter().filter(|e| !e.is_check()).cloned().collect();
        Self {
            checked: effects,
            trusted,
        }
    }

    /// The effect list for `mode`.
    pub(crate) fn effects(&self, mode: Mode) -> &[Effect] {
        match mode {
            Mode::Checked => &self.checked,
            Mode::Trusted => &self.trusted,
        }
    }

    /// A new pipeline with `effect` appended.
    pub(crate) fn then(&self, effect: Effect) -> Self {
        let mut effects = self.checked.clone();
        effects.push(effect);
        Self::new(effects)
    }

    /// A new pipeline with `effect` prepended.
    pub(crate) fn after(&self, effect: Effect) -> Self {
        let mut effects = Vec::with_capacity(self.checked.len() + 1);
        effects.push(effect);
        effects.extend(self.checked.iter().cloned());
        Self::new(effects)
    }

    /// Check whether a record effect runs `def` directly.
    pub(crate) fn has_record(&self, def: &Arc<RecordDef>) -> bool {
        self.checked.iter().any(
            |effect| matches!(effect, Effect::Record { def: own, .. } if Arc::ptr_eq(own, def)),
        )
    }

    /// Replace every record effect whose definition is `from` with `to`.
    pub(crate) fn swap_record(&self, from: &Arc<RecordDef>, to: &Arc<RecordDef>) -> Self {
        let effects = self
            .checked
            .iter()
            .map(|effect| match effect {
                Effect::Record { def, direction } if Arc::ptr_eq(def, from) => Effect::Record {
                    def: Arc::clone(to),
                    direction: *direction,
                },
                other => other.clone(),
            })
            .collect();
        Self::new(effects)
    }
}

/// Run `effects` over `input`, stopping at the first failure.
///
/// Borrows the input until some effect replaces it.
pub(crate) fn run_effects<'v>(
    effects: &[Effect],
    input: &'v Value,
    ctx: &EffectCtx<'_>,
) -> Result<Cow<'v, Value>, Error> {
    let mut current = Cow::Borrowed(input);
    for effect in effects {
        match effect.apply(&current, ctx) {
            Step::Unchanged => {}
            Step::Transformed(value) => current = Cow::Owned(value),
            Step::Failed(error) => return Err(error),
        }
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_guard_bounds() {
        assert!(Guard::Int.accepts(&Value::from(42)));
        assert!(Guard::Int.accepts(&Value::from(-2147483648.0)));
        assert!(!Guard::Int.accepts(&Value::from(2147483648.0)));
        assert!(!Guard::Int.accepts(&Value::from(1.5)));
        assert!(!Guard::Int.accepts(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_float_guard_nan() {
        assert!(!Guard::Float { allow_nan: false }.accepts(&Value::Number(f64::NAN)));
        assert!(Guard::Float { allow_nan: true }.accepts(&Value::Number(f64::NAN)));
        assert!(Guard::Float { allow_nan: false }.accepts(&Value::Number(f64::INFINITY)));
    }

    #[test]
    fn test_trusted_view_drops_checks() {
        let pipeline = Pipeline::new(vec![
            Effect::Guard(Guard::String),
            Effect::Constant(Value::from(1)),
            Effect::Expect(Value::from(1)),
        ]);
        assert_eq!(pipeline.effects(Mode::Checked).len(), 3);
        assert_eq!(pipeline.effects(Mode::Trusted).len(), 1);
    }

    #[test]
    fn test_then_and_after_leave_original() {
        let pipeline = Pipeline::new(vec![Effect::Never]);
        let appended = pipeline.then(Effect::DecodeJson);
        let prepended = pipeline.after(Effect::EncodeJson);
        assert_eq!(pipeline.effects(Mode::Checked).len(), 1);
        assert!(matches!(appended.effects(Mode::Checked)[1], Effect::DecodeJson));
        assert!(matches!(prepended.effects(Mode::Checked)[0], Effect::EncodeJson));
    }

    #[test]
    fn test_direction_operation() {
        assert_eq!(Direction::Parse.operation(), Operation::Parsing);
        assert_eq!(Direction::Parse.flip(), Direction::Serialize);
    }
}
