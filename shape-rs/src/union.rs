//! Union resolution
//!
//! Members are tried in declaration order, always in checked mode, and the
//! first success wins. Parsing collects every member failure into
//! `InvalidUnion`; serializing reports only the last one, since an output
//! value normally belongs to exactly one member.

use std::borrow::Cow;

use tracing::debug;

use crate::effect::{Direction, EffectCtx, Mode, Step};
use crate::error::{Error, ErrorCode};
use crate::schema::Schema;
use crate::value::Value;

pub(crate) fn resolve(
    members: &[Schema],
    direction: Direction,
    value: &Value,
    ctx: &EffectCtx<'_>,
) -> Step {
    let mut errors = Vec::with_capacity(members.len());
    for member in members {
        match member.run(direction, value, Mode::Checked, ctx.operation) {
            Ok(Cow::Borrowed(_)) => return Step::Unchanged,
            Ok(Cow::Owned(output)) => return Step::Transformed(output),
            Err(error) => errors.push(error),
        }
    }
    Step::Failed(exhausted(direction, errors, ctx))
}

/// The error for a union where every member failed.
pub(crate) fn exhausted(
    direction: Direction,
    mut errors: Vec<Error>,
    ctx: &EffectCtx<'_>,
) -> Error {
    debug!(
        union = %ctx.schema.name(),
        members = errors.len(),
        operation = %ctx.operation,
        "No union member matched"
    );
    match direction {
        Direction::Parse => ctx.error(ErrorCode::InvalidUnion(errors)),
        Direction::Serialize => errors
            .pop()
            .unwrap_or_else(|| ctx.error(ErrorCode::InvalidUnion(Vec::new()))),
    }
}
