//! Tuple schemas and their positional builder

use crate::error::UsageError;
use crate::schema::object::record_schema;
use crate::schema::shape::next_owner;
use crate::schema::{Entry, FieldDef, FieldId, Layout, RecordDef, Schema, Shape};
use crate::value::Value;

/// Declares the positions of a tuple schema.
pub struct TupleBuilder {
    owner: u64,
    fields: Vec<FieldDef>,
    items: Vec<Option<Entry>>,
}

impl TupleBuilder {
    fn place(&mut self, index: usize, entry: Entry) {
        if self.items.len() <= index {
            self.items.resize_with(index + 1, || None);
        }
        if self.items[index].is_some() {
            UsageError::DuplicateField(index.to_string()).raise();
        }
        self.items[index] = Some(entry);
    }

    /// Read position `index` with `schema`.
    pub fn item(&mut self, index: usize, schema: Schema) -> Shape {
        let field = self.fields.len();
        self.place(index, Entry::Field(field));
        self.fields.push(FieldDef {
            schema,
            location: vec![index.to_string()],
        });
        Shape::Field(FieldId {
            owner: self.owner,
            index: field,
        })
    }

    /// Require position `index` to hold exactly `value`.
    pub fn tag(&mut self, index: usize, value: impl Into<Value>) {
        self.place(index, Entry::Tag(value.into()));
    }
}

/// A tuple schema declared by `builder`.
///
/// # Panics
///
/// When a position below the highest declared one is left empty, or the
/// shape references a field from another builder.
///
/// # Example
/// ```rust
/// use shape_rs::{Shape, Value, float, tuple};
///
/// let point = tuple(|t| {
///     t.tag(0, "point");
///     Shape::object([("x", t.item(1, float())), ("y", t.item(2, float()))])
/// });
/// let input = Value::from_json(serde_json::json!(["point", 1.5, 2]));
/// assert_eq!(point.parse(&input).unwrap().get("y"), Some(&Value::from(2)));
/// ```
pub fn tuple<F>(builder: F) -> Schema
where
    F: FnOnce(&mut TupleBuilder) -> Shape,
{
    let mut draft = TupleBuilder {
        owner: next_owner(),
        fields: Vec::new(),
        items: Vec::new(),
    };
    let shape = builder(&mut draft);
    shape.verify(draft.owner, draft.fields.len());
    let items = draft
        .items
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.unwrap_or_else(|| UsageError::TupleHole(index).raise()))
        .collect();
    record_schema(RecordDef {
        layout: Layout::Tuple { items },
        fields: draft.fields,
        shape,
    })
}

/// A tuple whose output is an array of the parsed items.
pub fn tuple_of(items: impl IntoIterator<Item = Schema>) -> Schema {
    tuple(|t| {
        Shape::Tuple(
            items
                .into_iter()
                .enumerate()
                .map(|(index, schema)| t.item(index, schema))
                .collect(),
        )
    })
}
