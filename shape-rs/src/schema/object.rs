//! Object schemas and their builder
//!
//! An object is declared by a closure that receives an [`ObjectBuilder`],
//! declares the external keys it reads, and returns the output [`Shape`].
//! The external layout and the output shape are independent, so fields can
//! be renamed, regrouped or flattened on the way through.
//!
//! # Example
//! ```rust
//! use shape_rs::{Shape, Value, int, object, string};
//!
//! let user = object(|s| {
//!     s.tag("type", "user");
//!     let name = s.field("full_name", string());
//!     let city = s.nested("address").field("city", string());
//!     let age = s.field_or("age", int(), 0);
//!     Shape::object([("name", name), ("city", city), ("age", age)])
//! });
//!
//! let input = Value::from_json(serde_json::json!({
//!     "type": "user",
//!     "full_name": "Ada",
//!     "address": {"city": "London"},
//! }));
//! let output = user.parse(&input).unwrap();
//! assert_eq!(output.get("age"), Some(&Value::from(0)));
//! assert_eq!(user.convert(&output).unwrap().get("type"), Some(&Value::from("user")));
//! ```

use std::sync::Arc;

use crate::config::{UnknownKeys, global_config};
use crate::effect::{Direction, Effect};
use crate::error::UsageError;
use crate::schema::containers::default;
use crate::schema::shape::next_owner;
use crate::schema::{Entry, FieldDef, FieldId, Group, Kind, Layout, Parts, RecordDef, Schema, Shape};
use crate::value::Value;

pub(crate) struct Draft {
    owner: u64,
    fields: Vec<FieldDef>,
    root: Group,
}

/// Declares the external keys of an object schema.
pub struct ObjectBuilder<'a> {
    draft: &'a mut Draft,
    prefix: Vec<String>,
}

impl ObjectBuilder<'_> {
    fn location(&self, name: &str) -> Vec<String> {
        let mut location = self.prefix.clone();
        location.push(name.to_string());
        location
    }

    fn group(&mut self) -> &mut Group {
        self.draft.root.descend(&self.prefix)
    }

    /// Read `name` with `schema`. Returns the parsed value's placeholder.
    ///
    /// # Panics
    ///
    /// When `name` is already declared at this level.
    pub fn field(&mut self, name: &str, schema: Schema) -> Shape {
        let index = self.draft.fields.len();
        self.group().declare(name.to_string(), Entry::Field(index));
        let location = self.location(name);
        self.draft.fields.push(FieldDef { schema, location });
        Shape::Field(FieldId {
            owner: self.draft.owner,
            index,
        })
    }

    /// Like [`ObjectBuilder::field`], producing `value` when the key is absent.
    pub fn field_or(&mut self, name: &str, schema: Schema, value: impl Into<Value>) -> Shape {
        self.field(name, default(schema, value))
    }

    /// Declare fields inside the nested object under `name`.
    pub fn nested(&mut self, name: &str) -> ObjectBuilder<'_> {
        self.group().group_mut(name);
        let prefix = self.location(name);
        ObjectBuilder {
            draft: &mut *self.draft,
            prefix,
        }
    }

    /// Require `name` to hold exactly `value`. The tag is written back when
    /// serializing and is not part of the output.
    pub fn tag(&mut self, name: &str, value: impl Into<Value>) {
        self.group().declare(name.to_string(), Entry::Tag(value.into()));
    }

    /// Declare every key of another object schema at this level and return
    /// its output shape.
    ///
    /// # Panics
    ///
    /// When `schema` is not an object, or declares a key that is already
    /// declared here.
    pub fn flatten(&mut self, schema: &Schema) -> Shape {
        let Some((root, def)) = object_layout(schema) else {
            UsageError::NotAnObject(schema.name().to_string()).raise();
        };
        let offset = self.draft.fields.len();
        let owner = self.draft.owner;
        for (key, entry) in root.remap(offset).entries {
            self.group().declare(key, entry);
        }
        for field in &def.fields {
            let mut location = self.prefix.clone();
            location.extend(field.location.iter().cloned());
            self.draft.fields.push(FieldDef {
                schema: field.schema.clone(),
                location,
            });
        }
        def.shape.remap(&|id| FieldId {
            owner,
            index: id.index + offset,
        })
    }
}

fn object_layout(schema: &Schema) -> Option<(&Group, &Arc<RecordDef>)> {
    if schema.is_reversed() {
        return None;
    }
    let def = schema.record()?;
    match &def.layout {
        Layout::Object { root, .. } => Some((root, def)),
        Layout::Tuple { .. } => None,
    }
}

pub(crate) fn record_schema(def: RecordDef) -> Schema {
    let def = Arc::new(def);
    let kind = match def.layout {
        Layout::Object { .. } => Kind::Object(Arc::clone(&def)),
        Layout::Tuple { .. } => Kind::Tuple(Arc::clone(&def)),
    };
    Parts::new(
        kind,
        vec![Effect::Record {
            def: Arc::clone(&def),
            direction: Direction::Parse,
        }],
        vec![Effect::Record {
            def,
            direction: Direction::Serialize,
        }],
    )
    .build()
}

/// An object schema declared by `builder`.
///
/// The unknown keys policy comes from the global configuration.
///
/// # Panics
///
/// When the returned shape references a field from another builder.
pub fn object<F>(builder: F) -> Schema
where
    F: FnOnce(&mut ObjectBuilder<'_>) -> Shape,
{
    let mut draft = Draft {
        owner: next_owner(),
        fields: Vec::new(),
        root: Group::default(),
    };
    let shape = builder(&mut ObjectBuilder {
        draft: &mut draft,
        prefix: Vec::new(),
    });
    shape.verify(draft.owner, draft.fields.len());
    record_schema(RecordDef {
        layout: Layout::Object {
            root: draft.root,
            unknown_keys: global_config().default_unknown_keys,
        },
        fields: draft.fields,
        shape,
    })
}

/// An object whose output keys equal its external keys.
pub fn object_of<K, I>(entries: I) -> Schema
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Schema)>,
{
    object(|s| {
        Shape::Object(
            entries
                .into_iter()
                .map(|(key, schema)| {
                    let key = key.into();
                    let field = s.field(&key, schema);
                    (key, field)
                })
                .collect(),
        )
    })
}

/// An object with the keys of both `left` and `right`.
///
/// # Panics
///
/// When either is not an object with an object output, or both declare
/// the same key.
pub fn merge(left: &Schema, right: &Schema) -> Schema {
    object(|s| {
        let left_shape = s.flatten(left);
        let right_shape = s.flatten(right);
        match (left_shape, right_shape) {
            (Shape::Object(mut entries), Shape::Object(more)) => {
                entries.extend(more);
                Shape::Object(entries)
            }
            (Shape::Object(_), _) => UsageError::NotAnObject(right.name().to_string()).raise(),
            _ => UsageError::NotAnObject(left.name().to_string()).raise(),
        }
    })
}

/// The object definition a schema runs directly, looking through refinements
/// and transforms.
fn underlying_object(schema: &Schema) -> Option<&Arc<RecordDef>> {
    let def = match schema.kind() {
        Kind::Transformed(inner) if !schema.is_reversed() => underlying_object(inner)?,
        _ => object_layout(schema)?.1,
    };
    schema
        .pipeline(Direction::Parse)
        .has_record(def)
        .then_some(def)
}

fn swap_object(schema: &Schema, from: &Arc<RecordDef>, to: &Arc<RecordDef>) -> Schema {
    let mut parts = schema.parts();
    parts.kind = match schema.kind() {
        Kind::Transformed(inner) => Kind::Transformed(swap_object(inner, from, to)),
        _ => Kind::Object(Arc::clone(to)),
    };
    parts.parser = parts.parser.swap_record(from, to);
    parts.serializer = parts.serializer.swap_record(from, to);
    parts.build()
}

fn with_policy(schema: &Schema, policy: UnknownKeys) -> Schema {
    let Some(def) = underlying_object(schema) else {
        UsageError::NotAnObject(schema.name().to_string()).raise();
    };
    let updated = Arc::new(def.with_unknown_keys(policy));
    swap_object(schema, def, &updated)
}

/// The same object, failing on undeclared keys.
///
/// Refinements and transforms added on top of the object are kept.
///
/// # Panics
///
/// When `schema` does not run an object directly: a tuple, a reversed
/// object, or an object wrapped by `json_string`.
pub fn strict(schema: &Schema) -> Schema {
    with_policy(schema, UnknownKeys::Strict)
}

/// The same object, dropping undeclared keys.
///
/// # Panics
///
/// Like [`strict`].
pub fn strip(schema: &Schema) -> Schema {
    with_policy(schema, UnknownKeys::Strip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::schema::{int, string};

    #[test]
    #[should_panic(expected = "declared more than once")]
    fn test_duplicate_key_panics() {
        object(|s| {
            let a = s.field("a", string());
            let _ = s.field("a", int());
            a
        });
    }

    #[test]
    #[should_panic(expected = "never declared")]
    fn test_foreign_field_panics() {
        let mut leaked = None;
        object(|s| {
            leaked = Some(s.field("a", string()));
            Shape::constant(1)
        });
        let foreign = leaked.unwrap();
        object(move |_| foreign);
    }

    #[test]
    #[should_panic(expected = "is not an object schema")]
    fn test_flatten_requires_object() {
        object(|s| s.flatten(&string()));
    }

    #[test]
    fn test_strict_keeps_fields() {
        let base = object_of([("a", string())]);
        let strict_schema = strict(&base);
        assert_eq!(strict_schema.name(), base.name());
        assert_eq!(
            strict_schema.record().unwrap().unknown_keys(),
            Some(UnknownKeys::Strict)
        );
        assert_eq!(
            base.record().unwrap().unknown_keys(),
            Some(UnknownKeys::Strip)
        );
    }

    #[test]
    fn test_strict_looks_through_refinements() {
        use crate::schema::Refinement;

        let refined = object_of([("foo", string())]).refine(Refinement::new().parser(
            |value, ctx| match value.get("foo").and_then(Value::as_str) {
                Some("") => Err(ctx.fail("Empty foo")),
                _ => Ok(()),
            },
        ));
        let schema = strict(&refined);
        assert!(matches!(schema.kind(), Kind::Transformed(_)));

        let input = Value::from_json(serde_json::json!({"foo": "x", "bar": 1}));
        let error = schema.parse(&input).unwrap_err();
        assert_eq!(error.code, ErrorCode::ExcessField("bar".to_string()));

        let empty = Value::from_json(serde_json::json!({"foo": ""}));
        assert_eq!(schema.parse(&empty).unwrap_err().reason(), "Empty foo");

        let loose = strip(&schema);
        let output = loose.parse(&input).unwrap();
        assert_eq!(output, Value::from_json(serde_json::json!({"foo": "x"})));
    }

    #[test]
    #[should_panic(expected = "is not an object schema")]
    fn test_strict_rejects_json_string_object() {
        strict(&object_of([("foo", string())]).json_string());
    }

    #[test]
    fn test_merge_combines_fields() {
        let merged = merge(&object_of([("a", string())]), &object_of([("b", int())]));
        assert_eq!(merged.name(), r#"Object({"a": String, "b": Int})"#);
    }

    #[test]
    fn test_flatten_under_nested_prefix() {
        let inner = object_of([("x", int())]);
        let outer = object(|s| {
            let point = s.nested("pos").flatten(&inner);
            Shape::object([("point", point)])
        });
        let def = outer.record().unwrap();
        let locations: Vec<_> = def.fields().map(|(location, _)| location.to_vec()).collect();
        assert_eq!(locations, vec![vec!["pos".to_string(), "x".to_string()]]);
    }
}
