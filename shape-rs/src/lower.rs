//! Pipeline lowering
//!
//! Turns the effect list of one direction and mode into a chain of
//! closures, resolved once per schema node and cached there. Child schemas
//! are lowered the same way and linked in, so a lowered pipeline never
//! looks at an [`Effect`] again while it runs.
//!
//! Dead steps are dropped while lowering: a wrapper whose inner pipeline
//! lowers to nothing (`option` and `deprecate` around a trusted primitive,
//! a delegate to an empty pipeline) disappears, and a container over such a
//! child only keeps its structural check.
//!
//! Closures never hold the node they belong to; the node is passed in
//! through [`EffectCtx`] at call time. Recursive placeholders look their
//! target up when they run. That keeps the cache free of ownership cycles.

use std::sync::Arc;

use dashmap::DashMap;

use crate::effect::{
    Direction, Effect, EffectCtx, Mode, Step, decode_json, encode_json, entries, items,
};
use crate::error::{ErrorCode, UsageError};
use crate::record;
use crate::schema::{Link, RecordDef, Schema};
use crate::union;
use crate::value::Value;

/// One lowered step, or a whole lowered pipeline.
pub(crate) type Lowered = Arc<dyn Fn(&Value, &EffectCtx<'_>) -> Step + Send + Sync>;

fn step<F>(run: F) -> Lowered
where
    F: Fn(&Value, &EffectCtx<'_>) -> Step + Send + Sync + 'static,
{
    Arc::new(run)
}

/// A lowered pipeline. `run` is `None` when nothing is left to do.
#[derive(Clone, Default)]
pub(crate) struct Lowering {
    pub(crate) run: Option<Lowered>,
    /// Live steps, counting the ones inside child schemas.
    pub(crate) steps: usize,
}

impl Lowering {
    fn call(&self, value: &Value, ctx: &EffectCtx<'_>) -> Step {
        match &self.run {
            Some(run) => run(value, ctx),
            None => Step::Unchanged,
        }
    }
}

pub(crate) type LoweringCache = DashMap<(Direction, Mode), Lowering>;

impl Schema {
    /// The lowered pipeline for `direction` in `mode`, built on first use.
    pub(crate) fn lowered(&self, direction: Direction, mode: Mode) -> Lowering {
        let cache = self.0.lowered.get_or_init(DashMap::new);
        if let Some(found) = cache.get(&(direction, mode)) {
            return found.value().clone();
        }
        let built = lower_pipeline(self, direction, mode);
        tracing::trace!(
            schema = %self.name(),
            ?direction,
            ?mode,
            steps = built.steps,
            "lowered pipeline"
        );
        cache
            .entry((direction, mode))
            .or_insert(built)
            .value()
            .clone()
    }
}

fn lower_pipeline(schema: &Schema, direction: Direction, mode: Mode) -> Lowering {
    let mut steps = 0;
    let mut chain = Vec::new();
    for effect in schema.pipeline(direction).effects(mode) {
        if let Some(lowering) = lower_effect(effect, mode) {
            steps += lowering.steps;
            chain.extend(lowering.run);
        }
    }
    let run = match chain.len() {
        0 => None,
        1 => chain.pop(),
        _ => Some(step(move |input, ctx| {
            let mut current: Option<Value> = None;
            for run in &chain {
                match run(current.as_ref().unwrap_or(input), ctx) {
                    Step::Unchanged => {}
                    Step::Transformed(value) => current = Some(value),
                    Step::Failed(error) => return Step::Failed(error),
                }
            }
            current.map_or(Step::Unchanged, Step::Transformed)
        })),
    };
    Lowering { run, steps }
}

fn single(run: Lowered, inner: usize) -> Option<Lowering> {
    Some(Lowering {
        run: Some(run),
        steps: inner + 1,
    })
}

/// `None` when the effect is dead in this mode.
fn lower_effect(effect: &Effect, mode: Mode) -> Option<Lowering> {
    match effect {
        Effect::Guard(guard) => {
            let guard = *guard;
            single(
                step(move |value, ctx| {
                    if guard.accepts(value) {
                        Step::Unchanged
                    } else {
                        Step::Failed(ctx.unexpected_type(value))
                    }
                }),
                0,
            )
        }
        Effect::Never => single(
            step(|value, ctx| Step::Failed(ctx.unexpected_type(value))),
            0,
        ),
        Effect::Expect(expected) => {
            let expected = expected.clone();
            single(
                step(move |value, ctx| {
                    if expected.same_value(value) {
                        Step::Unchanged
                    } else {
                        Step::Failed(ctx.error(ErrorCode::unexpected_value(&expected, value)))
                    }
                }),
                0,
            )
        }
        Effect::Constant(constant) => {
            let constant = constant.clone();
            single(
                step(move |value, _| {
                    if constant.same_value(value) {
                        Step::Unchanged
                    } else {
                        Step::Transformed(constant.clone())
                    }
                }),
                0,
            )
        }
        Effect::Optional { inner, direction } => {
            let lowering = inner.lowered(*direction, mode);
            let run = lowering.run.clone()?;
            let inner = inner.clone();
            single(
                step(move |value, ctx| {
                    if value.is_undefined() {
                        Step::Unchanged
                    } else {
                        run(value, &ctx.within(&inner))
                    }
                }),
                lowering.steps,
            )
        }
        Effect::Nullable { inner, direction } => {
            let lowering = inner.lowered(*direction, mode);
            let steps = lowering.steps;
            let (inner, direction) = (inner.clone(), *direction);
            single(
                step(move |value, ctx| match (direction, value) {
                    (Direction::Parse, Value::Null) => Step::Transformed(Value::Undefined),
                    (Direction::Serialize, Value::Undefined) => Step::Transformed(Value::Null),
                    _ => lowering.call(value, &ctx.within(&inner)),
                }),
                steps,
            )
        }
        Effect::Default {
            inner,
            value: fallback,
            direction,
        } => {
            let lowering = inner.lowered(*direction, mode);
            let steps = lowering.steps;
            let (inner, fallback) = (inner.clone(), fallback.clone());
            single(
                step(move |value, ctx| {
                    if value.is_undefined() {
                        Step::Transformed(fallback.clone())
                    } else {
                        lowering.call(value, &ctx.within(&inner))
                    }
                }),
                steps,
            )
        }
        Effect::Delegate { inner, direction } => {
            let lowering = inner.lowered(*direction, mode);
            let run = lowering.run.clone()?;
            let inner = inner.clone();
            single(
                step(move |value, ctx| run(value, &ctx.within(&inner))),
                lowering.steps,
            )
        }
        Effect::Items { item, direction } => {
            let lowering = item.lowered(*direction, mode);
            let Some(run) = lowering.run else {
                return single(container_check(Container::Array), 0);
            };
            let item = item.clone();
            single(
                step(move |value, ctx| {
                    items(value, ctx, |current| {
                        run(current, &ctx.within(&item)).into_run(current)
                    })
                }),
                lowering.steps,
            )
        }
        Effect::Entries { item, direction } => {
            let lowering = item.lowered(*direction, mode);
            let Some(run) = lowering.run else {
                return single(container_check(Container::Dict), 0);
            };
            let item = item.clone();
            single(
                step(move |value, ctx| {
                    entries(value, ctx, |current| {
                        run(current, &ctx.within(&item)).into_run(current)
                    })
                }),
                lowering.steps,
            )
        }
        Effect::Record { def, direction } => lower_record(def, *direction, mode),
        Effect::Union { members, direction } => {
            let lowered: Vec<(Schema, Lowering)> = members
                .iter()
                .map(|member| (member.clone(), member.lowered(*direction, Mode::Checked)))
                .collect();
            let steps = lowered.iter().map(|(_, lowering)| lowering.steps).sum();
            let direction = *direction;
            single(
                step(move |value, ctx| {
                    let mut errors = Vec::with_capacity(lowered.len());
                    for (member, lowering) in &lowered {
                        let member_ctx = EffectCtx {
                            schema: member,
                            operation: ctx.operation,
                            mode: Mode::Checked,
                        };
                        match lowering.call(value, &member_ctx) {
                            Step::Failed(error) => errors.push(error),
                            matched => return matched,
                        }
                    }
                    Step::Failed(union::exhausted(direction, errors, ctx))
                }),
                steps,
            )
        }
        Effect::Recursive { link, direction } => lower_recursive(link, *direction, mode),
        Effect::Transform(transform) => {
            let transform = Arc::clone(transform);
            single(
                step(move |value, ctx| Step::from_result(transform(value, ctx))),
                0,
            )
        }
        Effect::Refine(check) => {
            let check = Arc::clone(check);
            single(
                step(move |value, ctx| match check(value, ctx) {
                    Ok(()) => Step::Unchanged,
                    Err(error) => Step::Failed(error),
                }),
                0,
            )
        }
        Effect::Async { .. } => single(
            step(|_, ctx| UsageError::UnexpectedAsync(ctx.schema.name().to_string()).raise()),
            0,
        ),
        Effect::Missing(missing) => {
            let code = match missing {
                Direction::Parse => ErrorCode::MissingParser,
                Direction::Serialize => ErrorCode::MissingSerializer,
            };
            single(step(move |_, ctx| Step::Failed(ctx.error(code.clone()))), 0)
        }
        Effect::DecodeJson => single(step(decode_json), 0),
        Effect::EncodeJson => single(step(encode_json), 0),
    }
}

#[derive(Clone, Copy)]
enum Container {
    Array,
    Dict,
}

/// Only the type check of an array or dict over a dead item.
fn container_check(container: Container) -> Lowered {
    step(move |value, ctx| match (container, value) {
        (Container::Array, Value::Array(_)) | (Container::Dict, Value::Object(_)) => {
            Step::Unchanged
        }
        _ => Step::Failed(ctx.unexpected_type(value)),
    })
}

fn lower_record(def: &Arc<RecordDef>, direction: Direction, mode: Mode) -> Option<Lowering> {
    let fields: Vec<(Schema, Lowering)> = def
        .fields
        .iter()
        .map(|field| (field.schema.clone(), field.schema.lowered(direction, mode)))
        .collect();
    let steps = fields.iter().map(|(_, lowering)| lowering.steps).sum();
    let def = Arc::clone(def);
    single(
        step(move |value, ctx| {
            let run_field = |index: usize, input: &Value| {
                let (schema, lowering) = &fields[index];
                lowering.call(input, &ctx.within(schema))
            };
            Step::from_result(match direction {
                Direction::Parse => record::parse(&def, value, ctx, |index, input| {
                    run_field(index, input).into_run(input)
                }),
                Direction::Serialize => record::serialize(&def, value, ctx, |index, input| {
                    run_field(index, input).into_run(input)
                }),
            })
        }),
        steps,
    )
}

fn lower_recursive(link: &Link, direction: Direction, mode: Mode) -> Option<Lowering> {
    if link.is_placeholder() {
        // The target is still being built; look it up when the step runs.
        let link = link.clone();
        return single(
            step(move |value, ctx| {
                let target = link.resolve();
                target
                    .lowered(direction, mode)
                    .call(value, &ctx.within(&target))
            }),
            0,
        );
    }
    let target = link.resolve();
    let lowering = target.lowered(direction, mode);
    let run = lowering.run.clone()?;
    single(
        step(move |value, ctx| run(value, &ctx.within(&target))),
        lowering.steps,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;
    use crate::schema::{array, deprecate, dict, int, option, string};

    fn run(schema: &Schema, direction: Direction, mode: Mode, value: &Value) -> Step {
        let ctx = EffectCtx {
            schema,
            operation: direction.operation(),
            mode,
        };
        schema.lowered(direction, mode).call(value, &ctx)
    }

    #[test]
    fn test_trusted_wrappers_around_primitives_lower_to_nothing() {
        let schema = option(deprecate(string(), None));
        let lowering = schema.lowered(Direction::Serialize, Mode::Trusted);
        assert!(lowering.run.is_none());
        assert_eq!(lowering.steps, 0);
    }

    #[test]
    fn test_container_over_dead_item_keeps_type_check() {
        let schema = array(option(string()));
        let lowering = schema.lowered(Direction::Serialize, Mode::Trusted);
        assert_eq!(lowering.steps, 1);
        let value = Value::Array(vec![Value::from("a"), Value::Undefined]);
        assert!(matches!(
            run(&schema, Direction::Serialize, Mode::Trusted, &value),
            Step::Unchanged
        ));
        let Step::Failed(error) = run(&schema, Direction::Serialize, Mode::Trusted, &Value::Null)
        else {
            panic!("expected failure");
        };
        assert_eq!(error, schema.convert(&Value::Null).unwrap_err());
    }

    #[test]
    fn test_checked_lowering_keeps_guards() {
        let schema = dict(option(int()));
        let lowering = schema.lowered(Direction::Parse, Mode::Checked);
        assert_eq!(lowering.steps, 3);
        let value = Value::from_json(serde_json::json!({"a": 1, "b": "x"}));
        let Step::Failed(error) = run(&schema, Direction::Parse, Mode::Checked, &value) else {
            panic!("expected failure");
        };
        assert_eq!(error.operation, Operation::Parsing);
        assert_eq!(error.path.segments(), ["b"]);
    }

    #[test]
    fn test_lowering_is_cached_per_node() {
        let schema = array(int());
        let first = schema.lowered(Direction::Parse, Mode::Checked);
        let second = schema.lowered(Direction::Parse, Mode::Checked);
        match (first.run, second.run) {
            (Some(a), Some(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected a lowered pipeline"),
        }
    }
}
