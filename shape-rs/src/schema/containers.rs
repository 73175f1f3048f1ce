//! Wrapping constructors
//!
//! Each container adds a single effect that runs the inner schema and
//! prefixes child failures with the index or key.

use std::sync::Arc;

use crate::effect::{Direction, Effect};
use crate::error::UsageError;
use crate::schema::{Kind, Parts, Schema};
use crate::value::Value;

fn wrap(kind: Kind, effect: impl Fn(Direction) -> Effect) -> Schema {
    Parts::new(
        kind,
        vec![effect(Direction::Parse)],
        vec![effect(Direction::Serialize)],
    )
    .build()
}

/// A list whose items all match `item`.
pub fn array(item: Schema) -> Schema {
    wrap(Kind::Array(item.clone()), |direction| Effect::Items {
        item: item.clone(),
        direction,
    })
}

/// A string-keyed map whose values all match `item`.
pub fn dict(item: Schema) -> Schema {
    wrap(Kind::Dict(item.clone()), |direction| Effect::Entries {
        item: item.clone(),
        direction,
    })
}

/// `inner`, or `undefined`.
pub fn option(inner: Schema) -> Schema {
    wrap(Kind::Option(inner.clone()), |direction| Effect::Optional {
        inner: inner.clone(),
        direction,
    })
}

/// `inner`, or `null`. Parses `null` to `undefined` and serializes
/// `undefined` back to `null`.
pub fn nullable(inner: Schema) -> Schema {
    wrap(Kind::Nullable(inner.clone()), |direction| Effect::Nullable {
        inner: inner.clone(),
        direction,
    })
}

/// The first member that accepts the value.
///
/// # Panics
///
/// With fewer than two members.
pub fn union(members: impl IntoIterator<Item = Schema>) -> Schema {
    let members: Arc<[Schema]> = members.into_iter().collect();
    if members.len() < 2 {
        UsageError::UnionTooSmall(members.len()).raise();
    }
    wrap(Kind::Union(Arc::clone(&members)), |direction| Effect::Union {
        members: Arc::clone(&members),
        direction,
    })
}

/// `inner`, with `value` produced when the input is `undefined`.
///
/// The fallback is used as-is, without running `inner`.
pub fn default(inner: Schema, value: impl Into<Value>) -> Schema {
    let value = value.into();
    Parts::new(
        Kind::Default(inner.clone(), value.clone()),
        vec![Effect::Default {
            inner: inner.clone(),
            value,
            direction: Direction::Parse,
        }],
        vec![Effect::Optional {
            inner,
            direction: Direction::Serialize,
        }],
    )
    .build()
}

/// `inner`, made optional and marked deprecated.
pub fn deprecate(inner: Schema, message: Option<&str>) -> Schema {
    let message = message.map(str::to_string);
    wrap(Kind::Deprecated(inner.clone(), message), |direction| {
        Effect::Optional {
            inner: inner.clone(),
            direction,
        }
    })
}
