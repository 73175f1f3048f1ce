//! Self-referential schemas
//!
//! `recursive(f)` returns a root node that owns a cell. The cell runs `f`
//! once, on first use, with a placeholder schema standing for the root, and
//! keeps the result. The placeholder only holds a weak reference to the
//! cell, so the graph has no ownership cycle.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::effect::{Direction, Effect};
use crate::error::UsageError;
use crate::schema::{Kind, Parts, Schema};

type Builder = Box<dyn Fn(Schema) -> Schema + Send + Sync>;

pub(crate) struct Cell {
    builder: Builder,
    resolved: OnceLock<Schema>,
}

impl Cell {
    fn resolve(self: &Arc<Self>) -> Schema {
        self.resolved
            .get_or_init(|| {
                tracing::trace!("resolving recursive schema");
                let placeholder = link_schema(Link(Target::Back(Arc::downgrade(self))));
                (self.builder)(placeholder)
            })
            .clone()
    }
}

#[derive(Clone)]
enum Target {
    Root(Arc<Cell>),
    Back(Weak<Cell>),
}

/// Reference from a recursive node to the schema it stands for.
#[derive(Clone)]
pub struct Link(Target);

impl Link {
    /// The schema built by the recursive builder.
    ///
    /// # Panics
    ///
    /// When this is a placeholder whose root schema was dropped.
    pub fn resolve(&self) -> Schema {
        match &self.0 {
            Target::Root(cell) => cell.resolve(),
            Target::Back(weak) => match weak.upgrade() {
                Some(cell) => cell.resolve(),
                None => UsageError::DetachedRecursive.raise(),
            },
        }
    }

    /// Check whether this is the placeholder handed to the builder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.0, Target::Back(_))
    }

    pub(crate) fn name(&self) -> String {
        match &self.0 {
            Target::Root(cell) => cell.resolve().name().to_string(),
            Target::Back(_) => "Self".to_string(),
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Target::Root(_) => f.write_str("Link::Root"),
            Target::Back(_) => f.write_str("Link::Back"),
        }
    }
}

fn link_schema(link: Link) -> Schema {
    let effect = |direction| Effect::Recursive {
        link: link.clone(),
        direction,
    };
    Parts::new(
        Kind::Recursive(link.clone()),
        vec![effect(Direction::Parse)],
        vec![effect(Direction::Serialize)],
    )
    .build()
}

/// A schema that refers to itself.
///
/// `builder` receives a placeholder for the schema being defined and runs
/// once, the first time the schema is used.
///
/// # Example
/// ```rust
/// use shape_rs::{Shape, Value, array, object, recursive, string};
///
/// let node = recursive(|node| {
///     object(|s| {
///         Shape::object([
///             ("id", s.field("id", string())),
///             ("children", s.field("children", array(node))),
///         ])
///     })
/// });
/// let input = Value::from_json(serde_json::json!({
///     "id": "root",
///     "children": [{"id": "leaf", "children": []}],
/// }));
/// assert!(node.parse(&input).is_ok());
/// ```
pub fn recursive<F>(builder: F) -> Schema
where
    F: Fn(Schema) -> Schema + Send + Sync + 'static,
{
    let cell = Arc::new(Cell {
        builder: Box::new(builder),
        resolved: OnceLock::new(),
    });
    link_schema(Link(Target::Root(cell)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Shape, array, object, string};
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builder_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let schema = recursive(move |this| {
            counter.fetch_add(1, Ordering::SeqCst);
            array(this)
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let nested = Value::Array(vec![Value::Array(vec![]), Value::Array(vec![])]);
        assert!(schema.parse(&nested).is_ok());
        assert!(schema.parse(&nested).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_name_uses_placeholder() {
        let schema = recursive(|this| array(this));
        assert_eq!(schema.name(), "Array(Self)");
    }

    #[test]
    fn test_nested_error_path() {
        let schema = recursive(|this| {
            object(|s| {
                Shape::object([
                    ("name", s.field("name", string())),
                    ("next", s.field("next", crate::schema::option(this))),
                ])
            })
        });
        let input = Value::from_json(serde_json::json!({
            "name": "a",
            "next": {"name": "b", "next": {"name": 1}},
        }));
        let error = schema.parse(&input).unwrap_err();
        assert_eq!(error.path.segments(), ["next", "next", "name"]);
    }

    #[test]
    #[should_panic(expected = "root schema was dropped")]
    fn test_detached_placeholder_panics() {
        let escaped = Arc::new(std::sync::Mutex::new(None));
        let slot = Arc::clone(&escaped);
        let schema = recursive(move |this| {
            *slot.lock().unwrap() = Some(this.clone());
            array(this)
        });
        schema.parse(&Value::Array(vec![])).unwrap();
        drop(schema);
        let placeholder = escaped.lock().unwrap().take().unwrap();
        let _ = placeholder.parse(&Value::Array(vec![]));
    }
}
