//! Tests for asynchronous execution
//!
//! Async steps run one at a time in declaration order, inside every kind of
//! container, and stop at the first failure just like the synchronous runner.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ErrorCode, Operation};
use crate::schema::{Schema, Shape, array, dict, int, object, option, recursive, string, union};
use crate::value::Value;
use serde_json::json;

fn slow_positive() -> Schema {
    int().refine_async(|value| async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        match value.as_f64() {
            Some(n) if n > 0.0 => Ok(()),
            _ => Err("Must be positive".to_string()),
        }
    })
}

fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> Schema {
    let log = Arc::clone(log);
    string().transform_async(move |value| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(label.to_string());
            Ok(value)
        }
    })
}

#[tokio::test]
async fn test_parse_async_matches_sync_for_sync_schema() {
    let schema = array(int());
    let input = Value::from_json(json!([1, "x"]));
    assert_eq!(schema.parse_async(input.clone()).await, schema.parse(&input));
}

#[tokio::test]
async fn test_object_fields_run_in_declaration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let schema = object(|s| {
        Shape::object([
            ("b", s.field("b", recorder(&log, "b"))),
            ("a", s.field("a", recorder(&log, "a"))),
        ])
    });
    let input = Value::from_json(json!({"a": "1", "b": "2"}));
    let output = schema.parse_async(input.clone()).await.unwrap();
    assert_eq!(output, input);
    assert_eq!(*log.lock().unwrap(), ["b", "a"]);
}

#[tokio::test]
async fn test_failure_stops_later_fields() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let schema = object(|s| {
        Shape::object([
            ("n", s.field("n", slow_positive())),
            ("later", s.field("later", recorder(&log, "later"))),
        ])
    });
    let error = schema
        .parse_async(Value::from_json(json!({"n": -1, "later": "x"})))
        .await
        .unwrap_err();
    assert_eq!(error.path.segments(), ["n"]);
    assert_eq!(error.code, ErrorCode::OperationFailed("Must be positive".to_string()));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_containers_prefix_async_errors() {
    let schema = dict(array(option(slow_positive())));
    let error = schema
        .parse_async(Value::from_json(json!({"k": [1, null, -2]})))
        .await
        .unwrap_err();
    assert_eq!(error.path.segments(), ["k", "1"]);
    assert_eq!(error.reason(), "Expected Int, received Null");

    let error = schema
        .parse_async(Value::from_json(json!({"k": [1, -2]})))
        .await
        .unwrap_err();
    assert_eq!(error.path.segments(), ["k", "1"]);
    assert_eq!(error.reason(), "Must be positive");
}

#[tokio::test]
async fn test_async_union_falls_through() {
    let schema = union([slow_positive(), string()]);
    assert!(schema.is_async());
    assert_eq!(
        schema.parse_async(Value::from("a")).await.unwrap(),
        Value::from("a")
    );
    let error = schema.parse_async(Value::from(-1)).await.unwrap_err();
    let ErrorCode::InvalidUnion(errors) = &error.code else {
        panic!("expected InvalidUnion, got {:?}", error.code);
    };
    assert_eq!(errors[0].reason(), "Must be positive");
    assert_eq!(errors[1].reason(), "Expected String, received Float");
}

#[tokio::test]
async fn test_async_inside_recursive_schema() {
    let schema = recursive(|node| {
        object(|s| {
            Shape::object([
                ("value", s.field("value", slow_positive())),
                ("next", s.field("next", option(node))),
            ])
        })
    });
    assert!(schema.is_async());
    let good = Value::from_json(json!({"value": 1, "next": {"value": 2}}));
    assert_eq!(schema.parse_async(good.clone()).await.unwrap(), good);
    let bad = Value::from_json(json!({"value": 1, "next": {"value": 0}}));
    let error = schema.parse_async(bad).await.unwrap_err();
    assert_eq!(error.path.segments(), ["next", "value"]);
    assert_eq!(error.operation, Operation::Parsing);
}

#[tokio::test]
async fn test_serializing_async_transform_is_missing() {
    let schema = string().transform_async(|value| async move { Ok(value) });
    let error = schema.convert(&Value::from("a")).unwrap_err();
    assert_eq!(error.code, ErrorCode::MissingSerializer);
}

#[test]
#[should_panic(expected = "Use parse_async instead of parse")]
fn test_sync_parse_of_nested_async_panics() {
    let schema = array(slow_positive());
    let _ = schema.parse(&Value::Array(vec![]));
}
