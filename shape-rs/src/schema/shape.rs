//! Record layouts and output shapes
//!
//! Object and tuple schemas share one definition, [`RecordDef`]:
//!
//! - a *layout* describing where every field sits in the external data
//!   (object keys, nested object groups, tuple positions, constant tags),
//! - the list of declared fields with their schemas,
//! - an output [`Shape`] saying how parsed field values are arranged in the
//!   parsed value.
//!
//! Parsing reads fields through the layout and builds the output from the
//! shape; serializing walks the shape to find each field's value and writes
//! it back through the layout.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::config::UnknownKeys;
use crate::error::UsageError;
use crate::schema::Schema;
use crate::value::{Map, Value, quote};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_owner() -> u64 {
    NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a field declared in an object or tuple builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId {
    pub(crate) owner: u64,
    pub(crate) index: usize,
}

/// How parsed field values are arranged in the output.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// The parsed value of a declared field.
    Field(FieldId),
    /// A fixed value, checked when serializing.
    Constant(Value),
    /// An object with the given entries.
    Object(Vec<(String, Shape)>),
    /// An array with the given items.
    Tuple(Vec<Shape>),
}

impl Shape {
    /// An output object.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Shape)>,
    {
        Self::Object(
            entries
                .into_iter()
                .map(|(key, shape)| (key.into(), shape))
                .collect(),
        )
    }

    /// An output array.
    pub fn tuple(items: impl IntoIterator<Item = Shape>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    /// A fixed output value.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    pub(crate) fn for_each_field(&self, f: &mut impl FnMut(FieldId)) {
        match self {
            Self::Field(id) => f(*id),
            Self::Constant(_) => {}
            Self::Object(entries) => entries.iter().for_each(|(_, shape)| shape.for_each_field(f)),
            Self::Tuple(items) => items.iter().for_each(|shape| shape.for_each_field(f)),
        }
    }

    pub(crate) fn remap(&self, f: &impl Fn(FieldId) -> FieldId) -> Self {
        match self {
            Self::Field(id) => Self::Field(f(*id)),
            Self::Constant(value) => Self::Constant(value.clone()),
            Self::Object(entries) => Self::Object(
                entries
                    .iter()
                    .map(|(key, shape)| (key.clone(), shape.remap(f)))
                    .collect(),
            ),
            Self::Tuple(items) => Self::Tuple(items.iter().map(|shape| shape.remap(f)).collect()),
        }
    }

    /// Build the output value from parsed field values.
    pub(crate) fn assemble(&self, slots: &[Option<Value>]) -> Value {
        match self {
            Self::Field(id) => slots
                .get(id.index)
                .and_then(Option::clone)
                .unwrap_or_default(),
            Self::Constant(value) => value.clone(),
            Self::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, shape)| (key.as_str(), shape.assemble(slots)))
                    .filter(|(_, value)| !value.is_undefined())
                    .collect(),
            ),
            Self::Tuple(items) => {
                Value::Array(items.iter().map(|shape| shape.assemble(slots)).collect())
            }
        }
    }

    /// Panic unless every field belongs to `owner` and exists.
    pub(crate) fn verify(&self, owner: u64, count: usize) {
        self.for_each_field(&mut |id| {
            if id.owner != owner || id.index >= count {
                UsageError::ForeignField(id.index).raise();
            }
        });
    }
}

/// A declared field.
#[derive(Debug, Clone)]
pub(crate) struct FieldDef {
    pub(crate) schema: Schema,
    /// External location, root to leaf.
    pub(crate) location: Vec<String>,
}

/// One entry of the external layout.
#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Field(usize),
    Tag(Value),
    Group(Group),
}

/// The keys of one external object level.
#[derive(Debug, Clone, Default)]
pub(crate) struct Group {
    pub(crate) entries: IndexMap<String, Entry>,
}

impl Group {
    pub(crate) fn declares(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Add an entry, panicking on a repeated key.
    pub(crate) fn declare(&mut self, key: String, entry: Entry) {
        if self.declares(&key) {
            UsageError::DuplicateField(quote(&key)).raise();
        }
        self.entries.insert(key, entry);
    }

    /// The nested group under `key`, created on first use.
    pub(crate) fn group_mut(&mut self, key: &str) -> &mut Group {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Group(Group::default()));
        match entry {
            Entry::Group(group) => group,
            _ => UsageError::DuplicateField(quote(key)).raise(),
        }
    }

    /// Walk down `path`, creating groups as needed.
    pub(crate) fn descend(&mut self, path: &[String]) -> &mut Group {
        path.iter().fold(self, |group, key| group.group_mut(key))
    }

    pub(crate) fn remap(&self, offset: usize) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(key, entry)| {
                    let entry = match entry {
                        Entry::Field(index) => Entry::Field(index + offset),
                        Entry::Tag(value) => Entry::Tag(value.clone()),
                        Entry::Group(group) => Entry::Group(group.remap(offset)),
                    };
                    (key.clone(), entry)
                })
                .collect(),
        }
    }
}

/// Where fields sit in the external data.
#[derive(Debug, Clone)]
pub(crate) enum Layout {
    Object {
        root: Group,
        unknown_keys: UnknownKeys,
    },
    Tuple {
        items: Vec<Entry>,
    },
}

/// Definition shared by object and tuple schemas.
#[derive(Debug, Clone)]
pub struct RecordDef {
    pub(crate) layout: Layout,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) shape: Shape,
}

impl RecordDef {
    /// The unknown keys policy, or `None` for tuples.
    pub fn unknown_keys(&self) -> Option<UnknownKeys> {
        match &self.layout {
            Layout::Object { unknown_keys, .. } => Some(*unknown_keys),
            Layout::Tuple { .. } => None,
        }
    }

    /// Declared fields as `(external location, schema)` pairs.
    pub fn fields(&self) -> impl Iterator<Item = (&[String], &Schema)> {
        self.fields
            .iter()
            .map(|field| (field.location.as_slice(), &field.schema))
    }

    /// The output shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of tuple positions, or `None` for objects.
    pub fn arity(&self) -> Option<usize> {
        match &self.layout {
            Layout::Tuple { items } => Some(items.len()),
            Layout::Object { .. } => None,
        }
    }

    pub(crate) fn with_unknown_keys(&self, policy: UnknownKeys) -> Self {
        let layout = match &self.layout {
            Layout::Object { root, .. } => Layout::Object {
                root: root.clone(),
                unknown_keys: policy,
            },
            tuple => tuple.clone(),
        };
        Self {
            layout,
            fields: self.fields.clone(),
            shape: self.shape.clone(),
        }
    }

    pub(crate) fn render(&self) -> String {
        match &self.layout {
            Layout::Object { root, .. } => self.render_group(root),
            Layout::Tuple { items } => format!(
                "Tuple({})",
                items
                    .iter()
                    .map(|entry| self.render_entry(entry))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    pub(crate) fn render_group(&self, group: &Group) -> String {
        let entries = group
            .entries
            .iter()
            .map(|(key, entry)| format!("{}: {}", quote(key), self.render_entry(entry)))
            .collect::<Vec<_>>();
        format!("Object({{{}}})", entries.join(", "))
    }

    fn render_entry(&self, entry: &Entry) -> String {
        match entry {
            Entry::Field(index) => self.fields[*index].schema.name().to_string(),
            Entry::Tag(value) => value.to_literal_text(),
            Entry::Group(group) => self.render_group(group),
        }
    }
}

/// Serialize-side view of the output: where each field's value was found.
pub(crate) fn collect_output<'v>(
    shape: &Shape,
    value: &'v Value,
    at: &mut Vec<String>,
    slots: &mut [Option<(&'v Value, Vec<String>)>],
    check_constants: bool,
) -> Result<(), OutputMismatch> {
    match shape {
        Shape::Field(id) => {
            if let Some(slot) = slots.get_mut(id.index) {
                if slot.is_none() {
                    *slot = Some((value, at.clone()));
                }
            }
            Ok(())
        }
        Shape::Constant(expected) => {
            if check_constants && !expected.same_value(value) {
                Err(OutputMismatch::Value {
                    at: at.clone(),
                    expected: expected.clone(),
                    received: value.clone(),
                })
            } else {
                Ok(())
            }
        }
        Shape::Object(entries) => {
            let Value::Object(map) = value else {
                return Err(OutputMismatch::Type {
                    at: at.clone(),
                    expected: "Object",
                    received: value.classify(),
                });
            };
            for (key, shape) in entries {
                at.push(key.clone());
                let found = lookup(map, key);
                collect_output(shape, found, at, slots, check_constants)?;
                at.pop();
            }
            Ok(())
        }
        Shape::Tuple(items) => {
            let Value::Array(values) = value else {
                return Err(OutputMismatch::Type {
                    at: at.clone(),
                    expected: "Array",
                    received: value.classify(),
                });
            };
            for (index, shape) in items.iter().enumerate() {
                at.push(index.to_string());
                let found = values.get(index).unwrap_or(&crate::value::UNDEFINED);
                collect_output(shape, found, at, slots, check_constants)?;
                at.pop();
            }
            Ok(())
        }
    }
}

fn lookup<'v>(map: &'v Map, key: &str) -> &'v Value {
    map.get(key).unwrap_or(&crate::value::UNDEFINED)
}

/// A serialize input that does not match the output shape.
#[derive(Debug)]
pub(crate) enum OutputMismatch {
    Type {
        at: Vec<String>,
        expected: &'static str,
        received: &'static str,
    },
    Value {
        at: Vec<String>,
        expected: Value,
        received: Value,
    },
}
