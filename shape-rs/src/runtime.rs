//! Asynchronous pipeline runner
//!
//! Steps run strictly one after another: each is awaited before the next
//! starts, and the first failure stops the run. Nodes without asynchronous
//! steps anywhere below them fall back to the synchronous runner.

use std::borrow::Cow;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::effect::{Direction, Effect, EffectCtx, Mode, Step};
use crate::error::{Error, Operation};
use crate::record::{self, Action};
use crate::schema::{RecordDef, Schema};
use crate::union;
use crate::value::{Map, Value};

/// Run one direction of `schema` over `value`, awaiting asynchronous steps.
pub(crate) fn run_async<'a>(
    schema: &'a Schema,
    direction: Direction,
    mode: Mode,
    operation: Operation,
    value: Value,
) -> BoxFuture<'a, Result<Value, Error>> {
    async move {
        if !schema.is_async_in(direction) {
            return schema
                .run(direction, &value, mode, operation)
                .map(Cow::into_owned);
        }
        let ctx = EffectCtx {
            schema,
            operation,
            mode,
        };
        let mut current = value;
        for effect in schema.pipeline(direction).effects(mode) {
            current = apply_async(effect, current, &ctx).await?;
        }
        Ok(current)
    }
    .boxed()
}

async fn apply_async(effect: &Effect, value: Value, ctx: &EffectCtx<'_>) -> Result<Value, Error> {
    let (mode, operation) = (ctx.mode, ctx.operation);
    match effect {
        Effect::Async { run, .. } => run(value).await.map_err(|message| ctx.fail(message)),
        Effect::Optional { inner, direction } if !value.is_undefined() => {
            run_async(inner, *direction, mode, operation, value).await
        }
        Effect::Nullable { inner, direction } => match direction {
            Direction::Parse if value.is_null() => Ok(Value::Undefined),
            Direction::Serialize if value.is_undefined() => Ok(Value::Null),
            _ => run_async(inner, *direction, mode, operation, value).await,
        },
        Effect::Default {
            inner,
            value: fallback,
            direction,
        } => {
            if value.is_undefined() {
                Ok(fallback.clone())
            } else {
                run_async(inner, *direction, mode, operation, value).await
            }
        }
        Effect::Delegate { inner, direction } => {
            run_async(inner, *direction, mode, operation, value).await
        }
        Effect::Recursive { link, direction } => {
            let target = link.resolve();
            run_async(&target, *direction, mode, operation, value).await
        }
        Effect::Items { item, direction } => {
            let values = match value {
                Value::Array(values) => values,
                other => return Err(ctx.unexpected_type(&other)),
            };
            let mut output = Vec::with_capacity(values.len());
            for (index, current) in values.into_iter().enumerate() {
                let parsed = run_async(item, *direction, mode, operation, current)
                    .await
                    .map_err(|error| error.prepend(index.to_string()))?;
                output.push(parsed);
            }
            Ok(Value::Array(output))
        }
        Effect::Entries { item, direction } => {
            let map = match value {
                Value::Object(map) => map,
                other => return Err(ctx.unexpected_type(&other)),
            };
            let mut output = Map::with_capacity(map.len());
            for (key, current) in map {
                let parsed = run_async(item, *direction, mode, operation, current)
                    .await
                    .map_err(|error| error.prepend(key.as_str()))?;
                output.insert(key, parsed);
            }
            Ok(Value::Object(output))
        }
        Effect::Record { def, direction } => record_async(def, *direction, value, ctx).await,
        Effect::Union { members, direction } => {
            let mut errors = Vec::with_capacity(members.len());
            for member in members.iter() {
                let attempt =
                    run_async(member, *direction, Mode::Checked, operation, value.clone()).await;
                match attempt {
                    Ok(output) => return Ok(output),
                    Err(error) => errors.push(error),
                }
            }
            Err(union::exhausted(*direction, errors, ctx))
        }
        other => match other.apply(&value, ctx) {
            Step::Unchanged => Ok(value),
            Step::Transformed(output) => Ok(output),
            Step::Failed(error) => Err(error),
        },
    }
}

async fn record_async(
    def: &RecordDef,
    direction: Direction,
    value: Value,
    ctx: &EffectCtx<'_>,
) -> Result<Value, Error> {
    let (mode, operation) = (ctx.mode, ctx.operation);
    match direction {
        Direction::Parse => {
            let actions = record::plan(def, &value, ctx)?;
            let mut slots = vec![None; def.fields.len()];
            for action in actions {
                match action {
                    Action::Field { index, input } => {
                        let field = &def.fields[index];
                        let output =
                            run_async(&field.schema, direction, mode, operation, input.clone())
                                .await
                                .map_err(|error| error.prepend_path(&record::field_path(field)))?;
                        slots[index] = Some(output);
                    }
                    Action::Fail(error) => return Err(error),
                }
            }
            Ok(def.shape.assemble(&slots))
        }
        Direction::Serialize => {
            let inputs = record::locate(def, &value, ctx)?;
            let mut results = Vec::with_capacity(inputs.len());
            for (field, (input, at)) in def.fields.iter().zip(inputs) {
                let output = run_async(&field.schema, direction, mode, operation, input.clone())
                    .await
                    .map_err(|error| record::located(error, &at))?;
                results.push(output);
            }
            Ok(record::write(def, results))
        }
    }
}
