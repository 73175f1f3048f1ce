//! Primitive constructors
//!
//! Each primitive checks its type with one guard in both directions. The
//! guards only live in the checked views, so trusted runs of primitives are
//! the identity.

use crate::config::global_config;
use crate::effect::{Effect, Guard};
use crate::schema::{Class, Kind, Parts, Schema};
use crate::value::Value;

fn guarded(kind: Kind, guard: Guard) -> Schema {
    Parts::new(kind, vec![Effect::Guard(guard)], vec![Effect::Guard(guard)]).build()
}

/// Any string.
pub fn string() -> Schema {
    guarded(Kind::String, Guard::String)
}

/// An integral number in the 32-bit signed range.
pub fn int() -> Schema {
    guarded(Kind::Int, Guard::Int)
}

/// Any number. `NaN` is rejected unless the global config disables the check.
pub fn float() -> Schema {
    let allow_nan = global_config().disable_nan_number_validation;
    guarded(Kind::Float, Guard::Float { allow_nan })
}

/// A boolean.
pub fn bool() -> Schema {
    guarded(Kind::Bool, Guard::Bool)
}

/// A big integer.
pub fn bigint() -> Schema {
    guarded(Kind::BigInt, Guard::BigInt)
}

/// A date instance.
pub fn date() -> Schema {
    guarded(Kind::Instance(Class::Date), Guard::Date)
}

/// Rejects every value in both directions.
pub fn never() -> Schema {
    Parts::new(Kind::Never, vec![Effect::Never], vec![Effect::Never]).build()
}

/// Accepts every value unchanged.
pub fn unknown() -> Schema {
    Parts::new(Kind::Unknown, Vec::new(), Vec::new()).build()
}

/// Exactly `value`. `NaN` matches `NaN`; `null` and `undefined` are distinct.
pub fn literal(value: impl Into<Value>) -> Schema {
    let value = value.into();
    Parts::new(
        Kind::Literal(value.clone()),
        vec![Effect::Expect(value.clone())],
        vec![Effect::Expect(value)],
    )
    .build()
}

/// Parses `literal` into `constant`, and serializes `constant` back to
/// `literal`.
///
/// # Example
/// ```rust
/// use shape_rs::{Value, literal_variant};
///
/// let yes = literal_variant("Y", true);
/// assert_eq!(yes.parse(&Value::from("Y")).unwrap(), Value::from(true));
/// assert_eq!(yes.convert(&Value::from(true)).unwrap(), Value::from("Y"));
/// ```
pub fn literal_variant(literal: impl Into<Value>, constant: impl Into<Value>) -> Schema {
    let literal = literal.into();
    let constant = constant.into();
    Parts::new(
        Kind::Literal(literal.clone()),
        vec![
            Effect::Expect(literal.clone()),
            Effect::Constant(constant.clone()),
        ],
        vec![Effect::Expect(constant), Effect::Constant(literal)],
    )
    .build()
}
