//! Object and tuple execution
//!
//! Parsing first turns the input into an ordered list of [`Action`]s: one
//! per declared field, plus a failure wherever the structure itself is wrong
//! (a tag mismatch, a nested group that is not an object, an excess key of a
//! strict object). Running the actions in order gives the synchronous and
//! the asynchronous runners the same short-circuit behavior.

use std::borrow::Cow;

use crate::config::UnknownKeys;
use crate::effect::{EffectCtx, Mode};
use crate::error::{Error, ErrorCode};
use crate::path::Path;
use crate::schema::{
    Entry, FieldDef, Group, Layout, OutputMismatch, RecordDef, collect_output,
};
use crate::value::{Map, UNDEFINED, Value};

/// One step of a record parse.
pub(crate) enum Action<'v> {
    /// Parse `input` with field `index`.
    Field { index: usize, input: &'v Value },
    /// Stop with this error.
    Fail(Error),
}

pub(crate) fn field_path(field: &FieldDef) -> Path {
    Path::from_segments(&field.location)
}

pub(crate) fn located(error: Error, at: &[String]) -> Error {
    error.prepend_path(&Path::from_segments(at))
}

/// Plan a parse of `input`. Fails right away only when the input is not an
/// object or array at all, or has the wrong tuple length.
pub(crate) fn plan<'v>(
    def: &RecordDef,
    input: &'v Value,
    ctx: &EffectCtx<'_>,
) -> Result<Vec<Action<'v>>, Error> {
    let mut actions = Vec::with_capacity(def.fields.len());
    match &def.layout {
        Layout::Object { root, unknown_keys } => {
            let Value::Object(map) = input else {
                return Err(ctx.unexpected_type(input));
            };
            plan_group(def, root, map, &mut Vec::new(), *unknown_keys, ctx, &mut actions);
        }
        Layout::Tuple { items } => {
            let Value::Array(values) = input else {
                return Err(ctx.unexpected_type(input));
            };
            if values.len() != items.len() {
                return Err(ctx.error(ErrorCode::TupleSize {
                    expected: items.len(),
                    received: values.len(),
                }));
            }
            for (index, (entry, value)) in items.iter().zip(values).enumerate() {
                match entry {
                    Entry::Field(field) => actions.push(Action::Field {
                        index: *field,
                        input: value,
                    }),
                    Entry::Tag(expected) if !expected.same_value(value) => {
                        actions.push(Action::Fail(
                            ctx.error(ErrorCode::unexpected_value(expected, value))
                                .prepend(index.to_string()),
                        ));
                    }
                    Entry::Tag(_) | Entry::Group(_) => {}
                }
            }
        }
    }
    Ok(actions)
}

fn plan_group<'v>(
    def: &RecordDef,
    group: &Group,
    map: &'v Map,
    at: &mut Vec<String>,
    policy: UnknownKeys,
    ctx: &EffectCtx<'_>,
    actions: &mut Vec<Action<'v>>,
) {
    for (key, entry) in &group.entries {
        let value = map.get(key).unwrap_or(&UNDEFINED);
        at.push(key.clone());
        match entry {
            Entry::Field(index) => actions.push(Action::Field {
                index: *index,
                input: value,
            }),
            Entry::Tag(expected) => {
                if !expected.same_value(value) {
                    let error = ctx.error(ErrorCode::unexpected_value(expected, value));
                    actions.push(Action::Fail(located(error, at)));
                }
            }
            Entry::Group(nested) => match value {
                Value::Object(inner) => plan_group(def, nested, inner, at, policy, ctx, actions),
                other => {
                    let error =
                        ctx.error(ErrorCode::unexpected_type(def.render_group(nested), other));
                    actions.push(Action::Fail(located(error, at)));
                }
            },
        }
        at.pop();
    }
    if policy == UnknownKeys::Strict {
        if let Some(excess) = map.keys().find(|key| !group.declares(key)) {
            tracing::trace!(key = %excess, "excess key on strict object");
            let error = ctx.error(ErrorCode::ExcessField(excess.to_string()));
            actions.push(Action::Fail(located(error, at)));
        }
    }
}

/// Parse `input` with the fields of `def` and build the output shape.
///
/// `run_field` parses one field's input given the field index.
pub(crate) fn parse<'v, F>(
    def: &RecordDef,
    input: &'v Value,
    ctx: &EffectCtx<'_>,
    mut run_field: F,
) -> Result<Value, Error>
where
    F: FnMut(usize, &'v Value) -> Result<Cow<'v, Value>, Error>,
{
    let actions = plan(def, input, ctx)?;
    let mut slots = vec![None; def.fields.len()];
    for action in actions {
        match action {
            Action::Field { index, input } => {
                let output = run_field(index, input)
                    .map_err(|error| error.prepend_path(&field_path(&def.fields[index])))?;
                slots[index] = Some(output.into_owned());
            }
            Action::Fail(error) => return Err(error),
        }
    }
    Ok(def.shape.assemble(&slots))
}

/// Find each field's value in an output value, with its output location.
pub(crate) fn locate<'v>(
    def: &RecordDef,
    value: &'v Value,
    ctx: &EffectCtx<'_>,
) -> Result<Vec<(&'v Value, Vec<String>)>, Error> {
    let mut found = vec![None; def.fields.len()];
    collect_output(
        &def.shape,
        value,
        &mut Vec::new(),
        &mut found,
        ctx.mode == Mode::Checked,
    )
    .map_err(|mismatch| match mismatch {
        OutputMismatch::Type { at, .. } if at.is_empty() => ctx.unexpected_type(value),
        OutputMismatch::Type {
            at,
            expected,
            received,
        } => located(
            ctx.error(ErrorCode::UnexpectedType {
                expected: expected.to_string(),
                received: received.to_string(),
            }),
            &at,
        ),
        OutputMismatch::Value {
            at,
            expected,
            received,
        } => located(
            ctx.error(ErrorCode::unexpected_value(&expected, &received)),
            &at,
        ),
    })?;
    def.fields
        .iter()
        .zip(found)
        .map(|(field, slot)| {
            slot.ok_or_else(|| {
                ctx.error(ErrorCode::MissingSerializer)
                    .prepend_path(&field_path(field))
            })
        })
        .collect()
}

/// Serialize an output value back into the external layout of `def`.
pub(crate) fn serialize<'v, F>(
    def: &RecordDef,
    value: &'v Value,
    ctx: &EffectCtx<'_>,
    mut run_field: F,
) -> Result<Value, Error>
where
    F: FnMut(usize, &'v Value) -> Result<Cow<'v, Value>, Error>,
{
    let inputs = locate(def, value, ctx)?;
    let mut results = Vec::with_capacity(inputs.len());
    for (index, (input, at)) in inputs.into_iter().enumerate() {
        let output = run_field(index, input).map_err(|error| located(error, &at))?;
        results.push(output.into_owned());
    }
    Ok(write(def, results))
}

/// Lay serialized field values out in the external shape.
pub(crate) fn write(def: &RecordDef, mut results: Vec<Value>) -> Value {
    match &def.layout {
        Layout::Object { root, .. } => Value::Object(write_group(root, &mut results)),
        Layout::Tuple { items } => Value::Array(
            items
                .iter()
                .map(|entry| match entry {
                    Entry::Field(index) => std::mem::take(&mut results[*index]),
                    Entry::Tag(tag) => tag.clone(),
                    Entry::Group(group) => Value::Object(write_group(group, &mut results)),
                })
                .collect(),
        ),
    }
}

fn write_group(group: &Group, results: &mut [Value]) -> Map {
    let mut map = Map::with_capacity(group.entries.len());
    for (key, entry) in &group.entries {
        let value = match entry {
            Entry::Field(index) => std::mem::take(&mut results[*index]),
            Entry::Tag(tag) => tag.clone(),
            Entry::Group(nested) => Value::Object(write_group(nested, results)),
        };
        if !value.is_undefined() {
            map.insert(key.as_str(), value);
        }
    }
    map
}
