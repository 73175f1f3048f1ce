//! Property-based tests for bidirectional execution
//!
//! These tests validate the correctness properties of parse/serialize:
//! - Property 1: Serialize Then Parse Round Trip
//! - Property 8: Derivation Leaves The Original Untouched

use crate::schema::{
    Refinement, Schema, Shape, Transformer, array, int, literal_variant, object, option, string,
    tuple_of, union,
};
use crate::tests::strategies::{json_value, user_output};
use crate::value::Value;
use proptest::prelude::*;

/// External keys differ from output keys and a tag is written on serialize.
pub fn user_schema() -> Schema {
    object(|s| {
        s.tag("version", 1);
        Shape::object([
            ("name", s.field("full_name", string())),
            ("age", s.field("age", option(int()))),
            ("tags", s.field("tags", array(string()))),
        ])
    })
}

// =============================================================================
// Property 1: Serialize Then Parse Round Trip
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Serialize Then Parse Round Trip**
    /// *For any* output value of a schema without lossy transforms,
    /// serializing and then parsing SHALL return the same value.

    /// Trusted serialize followed by parse restores the value
    #[test]
    fn prop_convert_then_parse(output in user_output()) {
        let schema = user_schema();
        let external = schema.convert(&output).unwrap();
        prop_assert_eq!(external.get("version"), Some(&Value::from(1)));
        prop_assert_eq!(schema.parse(&external).unwrap(), output);
    }

    /// Parsing with the reversed schema is a checked serialize
    #[test]
    fn prop_reversed_parse_matches_convert(output in user_output()) {
        let schema = user_schema();
        let reversed = schema.reverse();
        let external = reversed.parse(&output).unwrap();
        prop_assert_eq!(&external, &schema.convert(&output).unwrap());
        prop_assert_eq!(reversed.convert(&external).unwrap(), output);
    }

    /// Reversing twice restores the original directions
    #[test]
    fn prop_double_reverse(output in user_output()) {
        let schema = user_schema();
        let twice = schema.reverse().reverse();
        prop_assert!(!twice.is_reversed());
        let external = schema.convert(&output).unwrap();
        prop_assert_eq!(twice.parse(&external), schema.parse(&external));
    }

    /// Literal variants map both ways
    #[test]
    fn prop_literal_variants_round_trip(flag in any::<bool>()) {
        let schema = union([literal_variant("yes", true), literal_variant("no", false)]);
        let external = schema.convert(&Value::from(flag)).unwrap();
        prop_assert_eq!(&external, &Value::from(if flag { "yes" } else { "no" }));
        prop_assert_eq!(schema.parse(&external).unwrap(), Value::from(flag));
    }

    /// Tuples round trip position by position
    #[test]
    fn prop_tuple_round_trip(text in "[a-z]{0,6}", n in -100i32..100) {
        let schema = tuple_of([string(), int()]);
        let value = Value::Array(vec![Value::from(text), Value::from(n)]);
        let external = schema.convert(&value).unwrap();
        prop_assert_eq!(schema.parse(&external).unwrap(), value);
    }
}

// =============================================================================
// Property 8: Derivation Leaves The Original Untouched
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 8: Derivation Leaves The Original Untouched**
    /// *For any* schema S and input v, building `refine`, `transform` or
    /// `describe` on top of S SHALL NOT change the result of parsing v with S.

    #[test]
    fn prop_derivation_is_pure(input in json_value()) {
        let base = int();
        let before = base.parse(&input);
        let _refined = base.refine(Refinement::both(|_, ctx| Err(ctx.fail("always"))));
        let _transformed = base.transform(
            Transformer::new().parser(|_, _| Ok(Value::Null)),
        );
        let _described = base.describe("An int").set_name("Renamed");
        prop_assert_eq!(base.parse(&input), before);
        prop_assert_eq!(base.name(), "Int");
        prop_assert_eq!(base.description(), None);
    }

    /// Failures carry the same message whichever handle ran them
    #[test]
    fn prop_clone_runs_identically(input in json_value()) {
        let schema = user_schema();
        let copy = schema.clone();
        prop_assert_eq!(schema.parse(&input), copy.parse(&input));
    }
}
