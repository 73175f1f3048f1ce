//! Property-based tests for object and tuple records
//!
//! These tests validate the correctness properties of record parsing:
//! - Property 2: Unknown Keys Policy
//! - Property 3: Tuple Size Check
//! - Property 6: Path Accumulation

use crate::error::ErrorCode;
use crate::schema::{
    Shape, array, dict, int, merge, object, object_of, strict, string, strip, tuple_of,
};
use crate::tests::strategies::{json_value, key};
use crate::value::{Map, Value};
use proptest::prelude::*;

fn foo_object() -> crate::schema::Schema {
    object_of([("foo", string())])
}

// =============================================================================
// Property 2: Unknown Keys Policy
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 2: Unknown Keys Policy**
    /// *For any* object input with keys the schema does not declare, the
    /// default policy SHALL drop them and `strict` SHALL fail with
    /// `ExcessField` naming the first one in input order.

    /// Strip drops every undeclared key
    #[test]
    fn prop_strip_drops_excess(
        extra in prop::collection::vec((key(), json_value()), 1..4),
        foo in "[a-z]{0,6}"
    ) {
        let mut input = Map::new();
        input.insert("foo", Value::from(foo.as_str()));
        for (name, value) in &extra {
            if name != "foo" {
                input.insert(name.as_str(), value.clone());
            }
        }
        let output = foo_object().parse(&Value::Object(input)).unwrap();
        let expected: Map = [("foo", Value::from(foo))].into_iter().collect();
        prop_assert_eq!(output, Value::Object(expected));
    }

    /// Strict reports the first excess key
    #[test]
    fn prop_strict_rejects_excess(
        extra in prop::collection::vec((key(), json_value()), 1..4),
    ) {
        let extra: Vec<_> = extra.into_iter().filter(|(name, _)| name != "foo").collect();
        prop_assume!(!extra.is_empty());
        let mut input = Map::new();
        input.insert("foo", Value::from("bar"));
        for (name, value) in &extra {
            input.insert(name.as_str(), value.clone());
        }
        let first = input.keys().find(|name| *name != "foo").unwrap().to_string();
        let error = strict(&foo_object()).parse(&Value::Object(input)).unwrap_err();
        prop_assert_eq!(error.code, ErrorCode::ExcessField(first));
        prop_assert!(error.path.is_root());
    }

    /// strip undoes strict
    #[test]
    fn prop_strip_after_strict(name in key(), value in json_value()) {
        prop_assume!(name != "foo");
        let mut input = Map::new();
        input.insert("foo", Value::from("bar"));
        input.insert(name.as_str(), value);
        let schema = strip(&strict(&foo_object()));
        prop_assert!(schema.parse(&Value::Object(input)).is_ok());
    }
}

#[test]
fn test_object_strip_example() {
    let input = Value::from_json(serde_json::json!({"foo": "bar", "bar": true}));
    assert_eq!(
        foo_object().parse(&input).unwrap(),
        Value::from_json(serde_json::json!({"foo": "bar"}))
    );
    let error = strict(&foo_object()).parse(&input).unwrap_err();
    assert_eq!(error.code, ErrorCode::ExcessField("bar".to_string()));
    assert_eq!(
        error.reason(),
        "Encountered disallowed excess key \"bar\" on an object. Use Deprecated to ignore a specific field, or strip to ignore excess keys completely"
    );
}

#[test]
fn test_merge_combines_fields() {
    let left = object_of([("a", int())]);
    let right = object_of([("b", string())]);
    let merged = merge(&left, &right);
    let input = Value::from_json(serde_json::json!({"a": 1, "b": "x"}));
    assert_eq!(merged.parse(&input).unwrap(), input);
    assert_eq!(merged.name(), r#"Object({"a": Int, "b": String})"#);
}

#[test]
#[should_panic(expected = "declared more than once")]
fn test_merge_rejects_overlap() {
    merge(&object_of([("a", int())]), &object_of([("a", string())]));
}

#[test]
fn test_field_or_substitutes_default() {
    let schema = object(|s| Shape::object([("n", s.field_or("n", int(), 7))]));
    let output = schema.parse(&Value::from_json(serde_json::json!({}))).unwrap();
    assert_eq!(output, Value::from_json(serde_json::json!({"n": 7})));
}

// =============================================================================
// Property 3: Tuple Size Check
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 3: Tuple Size Check**
    /// *For any* array whose length differs from the tuple arity, parsing
    /// SHALL fail with `TupleSize` before any item is parsed.

    #[test]
    fn prop_tuple_size_mismatch(items in prop::collection::vec(json_value(), 0..6)) {
        prop_assume!(items.len() != 2);
        let received = items.len();
        let error = tuple_of([string(), int()]).parse(&Value::Array(items)).unwrap_err();
        prop_assert_eq!(error.code, ErrorCode::TupleSize { expected: 2, received });
        prop_assert!(error.path.is_root());
    }
}

// =============================================================================
// Property 6: Path Accumulation
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 6: Path Accumulation**
    /// *For any* failure inside nested containers, the error path SHALL list
    /// every enclosing key and index from the root to the failing value.

    /// Nested objects
    #[test]
    fn prop_nested_object_path(text in "[a-z]{0,6}") {
        let schema = object_of([("a", object_of([("b", int())]))]);
        let input = Value::from_json(serde_json::json!({"a": {"b": text}}));
        let error = schema.parse(&input).unwrap_err();
        prop_assert_eq!(error.path.segments(), ["a", "b"]);
        prop_assert_eq!(error.reason(), "Expected Int, received String");
    }

    /// Arrays and dicts contribute index and key segments
    #[test]
    fn prop_container_path(index in 0usize..4, name in key()) {
        let mut items = vec![Value::from(1); 4];
        items[index] = Value::from("x");
        let mut map = Map::new();
        map.insert(name.as_str(), Value::Array(items));
        let schema = dict(array(int()));
        let error = schema.parse(&Value::Object(map)).unwrap_err();
        prop_assert_eq!(error.path.segments(), [name, index.to_string()]);
    }
}

#[test]
fn test_nested_message() {
    let schema = object_of([("a", object_of([("b", int())]))]);
    let input = Value::from_json(serde_json::json!({"a": {"b": "x"}}));
    assert_eq!(
        schema.parse(&input).unwrap_err().to_string(),
        r#"Failed parsing at ["a"]["b"]. Reason: Expected Int, received String"#
    );
}
