//! Shared proptest strategies

use crate::value::{Map, Value};
use proptest::prelude::*;

/// Keys short enough to collide now and then.
pub fn key() -> impl Strategy<Value = String> {
    "[a-z]{1,4}"
}

/// JSON-compatible values, nested up to three levels.
pub fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i32..1000).prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((key(), inner), 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map>())),
        ]
    })
}

/// Output values of [`user_schema`](super::roundtrip_tests::user_schema).
pub fn user_output() -> impl Strategy<Value = Value> {
    (
        "[A-Za-z]{1,12}",
        prop::option::of(0i32..130),
        prop::collection::vec("[a-z]{1,6}", 0..4),
    )
        .prop_map(|(name, age, tags)| {
            let mut map = Map::new();
            map.insert("name", Value::from(name));
            if let Some(age) = age {
                map.insert("age", Value::from(age));
            }
            map.insert(
                "tags",
                Value::Array(tags.into_iter().map(Value::from).collect()),
            );
            Value::Object(map)
        })
}
