//! Property-based tests for the specializer
//!
//! These tests validate the correctness properties of compiled functions:
//! - Property 7: Compiled Functions Match Interpretation

use crate::compile::{Data, Exec, Repr};
use crate::schema::{
    Schema, Shape, array, float, int, nullable, object, option, string, union, unknown,
};
use crate::tests::roundtrip_tests::user_schema;
use crate::tests::strategies::{json_value, user_output};
use crate::value::Value;
use proptest::prelude::*;

fn schemas() -> Vec<Schema> {
    vec![
        string(),
        array(int()),
        union([string(), float()]),
        nullable(int()),
        user_schema(),
        object(|s| {
            Shape::object([
                ("inner", s.nested("outer").field("inner", option(string()))),
                ("n", s.field("n", int())),
            ])
        }),
    ]
}

// =============================================================================
// Property 7: Compiled Functions Match Interpretation
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 7: Compiled Functions Match Interpretation**
    /// *For any* schema, representation pair and input, calling the compiled
    /// function SHALL give the same output or error as the execution API,
    /// and compiling twice SHALL give functions that behave identically.

    /// Input to output matches parse
    #[test]
    fn prop_input_to_output(input in json_value()) {
        for schema in schemas() {
            let first = schema.compile(Repr::Input, Repr::Output, Exec::Sync, false);
            let second = schema.compile(Repr::Input, Repr::Output, Exec::Sync, false);
            let expected = schema.parse(&input).map(Data::Value);
            prop_assert_eq!(first.call(Data::Value(input.clone())), expected.clone());
            prop_assert_eq!(second.call(Data::Value(input.clone())), expected);
        }
    }

    /// JSON text to output matches parse_json_string
    #[test]
    fn prop_json_string_to_output(input in json_value()) {
        let text = input.to_json().unwrap().to_string();
        for schema in schemas() {
            let compiled = schema.compile(Repr::JsonString, Repr::Output, Exec::Sync, false);
            prop_assert_eq!(
                compiled.call(Data::Text(text.clone())),
                schema.parse_json_string(&text).map(Data::Value)
            );
        }
    }

    /// Output to JSON matches convert_to_json
    #[test]
    fn prop_output_to_json(output in user_output()) {
        let schema = user_schema();
        let compiled = schema.compile(Repr::Output, Repr::Json, Exec::Sync, false);
        prop_assert_eq!(
            compiled.call(Data::Value(output.clone())),
            schema.convert_to_json(&output).map(Data::Json)
        );
    }

    /// JSON to JSON matches parse_json followed by convert_to_json, floats
    /// with integral values included
    #[test]
    fn prop_json_to_json(input in json_value(), n in -1000i32..1000) {
        let document = serde_json::json!({"doc": input.to_json().unwrap(), "n": f64::from(n)});
        for schema in schemas().into_iter().chain([unknown()]) {
            let compiled = schema.compile(Repr::Json, Repr::Json, Exec::Sync, false);
            let expected = schema
                .parse_json(document.clone())
                .and_then(|output| schema.convert_to_json(&output))
                .map(Data::Json);
            prop_assert_eq!(compiled.call(Data::Json(document.clone())), expected);
        }
    }

    /// Assert matches assert
    #[test]
    fn prop_assert_matches(input in json_value()) {
        for schema in schemas() {
            let compiled = schema.compile(Repr::Input, Repr::Assert, Exec::Sync, false);
            prop_assert_eq!(
                compiled.call(Data::Value(input.clone())).map(|_| ()),
                schema.assert(&input)
            );
        }
    }
}

#[tokio::test]
async fn test_async_exec_of_sync_schema_matches_sync() {
    let schema = user_schema();
    let input = Value::from_json(serde_json::json!({"version": 1, "full_name": "Ada", "tags": []}));
    let sync = schema.compile(Repr::Input, Repr::Output, Exec::Sync, false);
    let asynchronous = schema.compile(Repr::Input, Repr::Output, Exec::Async, false);
    assert_eq!(
        asynchronous.call_async(Data::Value(input.clone())).await,
        sync.call(Data::Value(input))
    );
}

#[test]
#[should_panic(expected = "Use parse_async instead of parse")]
fn test_call_on_async_plan_panics() {
    let compiled = int().compile(Repr::Input, Repr::Output, Exec::Async, false);
    let _ = compiled.call(Data::Value(Value::from(1)));
}

#[test]
fn test_compiled_outlives_schema_handle() {
    let compiled = array(int()).compile(Repr::Json, Repr::Output, Exec::Sync, false);
    let output = compiled.call(Data::Json(serde_json::json!([1, 2]))).unwrap();
    assert_eq!(output, Data::Value(Value::from_json(serde_json::json!([1, 2]))));
    assert_eq!(compiled.schema().name(), "Array(Int)");
}
