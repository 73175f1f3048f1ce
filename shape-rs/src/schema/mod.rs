//! Schema graph
//!
//! A [`Schema`] is an immutable, cheaply cloneable handle to a node of the
//! schema graph. Each node holds its [`Kind`], one effect pipeline per
//! direction, metadata, and lazily computed caches (rendered name, async
//! scan, lowered pipelines, compiled functions).
//!
//! Constructors and combinators never touch their inputs: they build a new
//! node, usually by extending a copy of the input's pipelines.

mod combinators;
mod containers;
mod metadata;
mod object;
mod primitives;
mod recursive;
mod shape;
mod tuple;

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::compile::{CompileKey, Plan};
use crate::effect::{Direction, Effect, EffectCtx, Mode, Pipeline, run_effects};
use crate::error::{Error, Operation};
use crate::lower::LoweringCache;
use crate::value::Value;

pub use combinators::{Refinement, Transformer, custom};
pub use containers::{array, default, deprecate, dict, nullable, option, union};
pub use metadata::{Metadata, MetadataId};
pub use object::{ObjectBuilder, merge, object, object_of, strict, strip};
pub use primitives::{
    bigint, bool, date, float, int, literal, literal_variant, never, string, unknown,
};
pub use recursive::{Link, recursive};
pub use shape::{FieldId, RecordDef, Shape};
pub use tuple::{TupleBuilder, tuple, tuple_of};

pub(crate) use shape::{Entry, FieldDef, Group, Layout, OutputMismatch, collect_output};

/// Built-in instance classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    /// `chrono::DateTime<Utc>` values.
    Date,
}

/// What a schema node describes.
#[derive(Debug, Clone)]
pub enum Kind {
    /// Rejects everything.
    Never,
    /// Accepts everything unchanged.
    Unknown,
    /// A string.
    String,
    /// A 32-bit integer stored as a number.
    Int,
    /// Any number.
    Float,
    /// A boolean.
    Bool,
    /// A big integer.
    BigInt,
    /// One exact value.
    Literal(Value),
    /// The inner schema or `undefined`.
    Option(Schema),
    /// The inner schema or `null`.
    Nullable(Schema),
    /// A list of the inner schema.
    Array(Schema),
    /// A string-keyed map of the inner schema.
    Dict(Schema),
    /// A fixed-length positional record.
    Tuple(Arc<RecordDef>),
    /// A keyed record.
    Object(Arc<RecordDef>),
    /// The first member that matches.
    Union(Arc<[Schema]>),
    /// The inner schema, with a value substituted for `undefined`.
    Default(Schema, Value),
    /// The inner schema, optional, with a deprecation message.
    Deprecated(Schema, Option<String>),
    /// An instance of a built-in class.
    Instance(Class),
    /// A self-referential schema.
    Recursive(Link),
    /// The inner schema with transforms or refinements added.
    Transformed(Schema),
}

pub(crate) struct Node {
    pub(crate) kind: Kind,
    pub(crate) parser: Pipeline,
    pub(crate) serializer: Pipeline,
    pub(crate) metadata: Metadata,
    pub(crate) name: Option<String>,
    pub(crate) reversed: bool,
    rendered: OnceLock<String>,
    is_async: [OnceLock<bool>; 2],
    pub(crate) lowered: OnceLock<LoweringCache>,
    pub(crate) compiled: OnceLock<DashMap<CompileKey, Arc<Plan>>>,
}

/// Everything a combinator may change when deriving a node.
pub(crate) struct Parts {
    pub(crate) kind: Kind,
    pub(crate) parser: Pipeline,
    pub(crate) serializer: Pipeline,
    pub(crate) metadata: Metadata,
    pub(crate) name: Option<String>,
    pub(crate) reversed: bool,
}

impl Parts {
    pub(crate) fn new(kind: Kind, parser: Vec<Effect>, serializer: Vec<Effect>) -> Self {
        Self {
            kind,
            parser: Pipeline::new(parser),
            serializer: Pipeline::new(serializer),
            metadata: Metadata::default(),
            name: None,
            reversed: false,
        }
    }

    pub(crate) fn build(self) -> Schema {
        Schema(Arc::new(Node {
            kind: self.kind,
            parser: self.parser,
            serializer: self.serializer,
            metadata: self.metadata,
            name: self.name,
            reversed: self.reversed,
            rendered: OnceLock::new(),
            is_async: [OnceLock::new(), OnceLock::new()],
            lowered: OnceLock::new(),
            compiled: OnceLock::new(),
        }))
    }
}

/// An immutable description of a value plus its parse and serialize pipelines.
///
/// Cloning is cheap and shares the node.
///
/// # Example
/// ```rust
/// use shape_rs::{Shape, Value, int, object, string};
///
/// let user = object(|s| {
///     Shape::object([
///         ("name", s.field("name", string())),
///         ("age", s.field("age", int())),
///     ])
/// });
/// assert_eq!(user.name(), r#"Object({"name": String, "age": Int})"#);
///
/// let input = Value::from_json(serde_json::json!({"name": "Ada", "age": 36}));
/// assert!(user.parse(&input).is_ok());
/// ```
#[derive(Clone)]
pub struct Schema(pub(crate) Arc<Node>);

impl Schema {
    pub(crate) fn parts(&self) -> Parts {
        Parts {
            kind: self.0.kind.clone(),
            parser: self.0.parser.clone(),
            serializer: self.0.serializer.clone(),
            metadata: self.0.metadata.clone(),
            name: self.0.name.clone(),
            reversed: self.0.reversed,
        }
    }

    pub(crate) fn pipeline(&self, direction: Direction) -> &Pipeline {
        match direction {
            Direction::Parse => &self.0.parser,
            Direction::Serialize => &self.0.serializer,
        }
    }

    /// Run one direction of this schema over `input`.
    pub(crate) fn run<'v>(
        &self,
        direction: Direction,
        input: &'v Value,
        mode: Mode,
        operation: Operation,
    ) -> Result<Cow<'v, Value>, Error> {
        let ctx = EffectCtx {
            schema: self,
            operation,
            mode,
        };
        run_effects(self.pipeline(direction).effects(mode), input, &ctx)
    }

    /// What this node describes.
    pub fn kind(&self) -> &Kind {
        &self.0.kind
    }

    /// Human-readable name used in error messages.
    pub fn name(&self) -> &str {
        match &self.0.name {
            Some(name) => name,
            None => self.0.rendered.get_or_init(|| render(&self.0.kind)),
        }
    }

    /// Annotations on this node.
    pub fn metadata(&self) -> &Metadata {
        &self.0.metadata
    }

    /// The text set with [`Schema::describe`].
    pub fn description(&self) -> Option<&str> {
        self.0.metadata.get(MetadataId::DESCRIPTION)?.as_str()
    }

    /// The deprecation message, when this is a deprecated schema.
    pub fn deprecation(&self) -> Option<&str> {
        match &self.0.kind {
            Kind::Deprecated(_, message) => message.as_deref(),
            _ => None,
        }
    }

    /// Check whether this schema was produced by [`Schema::reverse`] an odd
    /// number of times.
    pub fn is_reversed(&self) -> bool {
        self.0.reversed
    }

    /// Check whether parsing needs [`Schema::parse_async`].
    pub fn is_async(&self) -> bool {
        self.is_async_in(Direction::Parse)
    }

    /// Check whether `direction` contains an asynchronous step, including in
    /// nested schemas.
    pub fn is_async_in(&self, direction: Direction) -> bool {
        *self.0.is_async[slot(direction)]
            .get_or_init(|| self.scan_async(direction, &mut HashSet::new()))
    }

    fn scan_async(&self, direction: Direction, visited: &mut HashSet<(usize, usize)>) -> bool {
        if let Some(known) = self.0.is_async[slot(direction)].get() {
            return *known;
        }
        if !visited.insert((self.addr(), slot(direction))) {
            return false;
        }
        self.pipeline(direction)
            .effects(Mode::Checked)
            .iter()
            .any(|effect| {
                matches!(effect, Effect::Async { .. })
                    || effect
                        .children()
                        .into_iter()
                        .any(|(child, direction)| child.scan_async(direction, visited))
            })
    }

    /// Check whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn record(&self) -> Option<&Arc<RecordDef>> {
        match &self.0.kind {
            Kind::Object(def) | Kind::Tuple(def) => Some(def),
            _ => None,
        }
    }
}

fn slot(direction: Direction) -> usize {
    match direction {
        Direction::Parse => 0,
        Direction::Serialize => 1,
    }
}

fn render(kind: &Kind) -> String {
    match kind {
        Kind::Never => "Never".to_string(),
        Kind::Unknown => "Unknown".to_string(),
        Kind::String => "String".to_string(),
        Kind::Int => "Int".to_string(),
        Kind::Float => "Float".to_string(),
        Kind::Bool => "Bool".to_string(),
        Kind::BigInt => "BigInt".to_string(),
        Kind::Literal(value) => value.to_literal_text(),
        Kind::Option(inner) => format!("Option({})", inner.name()),
        Kind::Nullable(inner) => format!("Null({})", inner.name()),
        Kind::Array(inner) => format!("Array({})", inner.name()),
        Kind::Dict(inner) => format!("Dict({})", inner.name()),
        Kind::Tuple(def) | Kind::Object(def) => def.render(),
        Kind::Union(members) => members
            .iter()
            .map(|member| member.name())
            .collect::<Vec<_>>()
            .join(" | "),
        Kind::Default(inner, _) | Kind::Deprecated(inner, _) | Kind::Transformed(inner) => {
            inner.name().to_string()
        }
        Kind::Instance(Class::Date) => "Date".to_string(),
        Kind::Recursive(link) => link.name(),
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schema").field(&self.name()).finish()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names() {
        assert_eq!(string().name(), "String");
        assert_eq!(int().name(), "Int");
        assert_eq!(literal("a").name(), "\"a\"");
        assert_eq!(option(array(float())).name(), "Option(Array(Float))");
        assert_eq!(nullable(dict(bool())).name(), "Null(Dict(Bool))");
        assert_eq!(union([string(), literal(1)]).name(), "String | 1");
    }

    #[test]
    fn test_record_names() {
        let point = tuple_of([int(), int()]);
        assert_eq!(point.name(), "Tuple(Int, Int)");
        let shape = object(|s| {
            s.tag("kind", "point");
            let x = s.nested("pos").field("x", int());
            Shape::object([("x", x)])
        });
        assert_eq!(shape.name(), r#"Object({"kind": "point", "pos": Object({"x": Int})})"#);
    }

    #[test]
    fn test_clone_shares_node() {
        let schema = string();
        assert!(schema.ptr_eq(&schema.clone()));
        assert!(!schema.ptr_eq(&string()));
    }

    #[test]
    fn test_is_async_scans_children() {
        let slow = string().transform_async(|value| Box::pin(async move { Ok(value) }));
        assert!(slow.is_async());
        assert!(array(slow.clone()).is_async());
        assert!(!array(string()).is_async());
        assert!(!slow.is_async_in(Direction::Serialize));
        assert!(slow.reverse().is_async_in(Direction::Serialize));
    }

    #[test]
    fn test_debug_shows_name() {
        assert_eq!(format!("{:?}", array(int())), "Schema(\"Array(Int)\")");
    }
}
