//! Out-of-band annotations on schemas
//!
//! Metadata never changes how a schema parses or serializes. Keys are
//! namespaced so independent libraries can annotate the same schema.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::Value;

/// Namespaced metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetadataId {
    namespace: &'static str,
    name: &'static str,
}

impl MetadataId {
    /// Key used by `describe`.
    pub const DESCRIPTION: Self = Self::new("shape", "description");

    /// Create a key in `namespace`.
    pub const fn new(namespace: &'static str, name: &'static str) -> Self {
        Self { namespace, name }
    }

    /// The namespace part.
    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// The name part.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for MetadataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Annotations attached to one schema node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: BTreeMap<MetadataId, Value>,
}

impl Metadata {
    /// Look up a key.
    pub fn get(&self, id: MetadataId) -> Option<&Value> {
        self.entries.get(&id)
    }

    /// All entries, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (MetadataId, &Value)> {
        self.entries.iter().map(|(id, value)| (*id, value))
    }

    /// Check if no annotation is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn with(&self, id: MetadataId, value: Value) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(id, value);
        Self { entries }
    }
}
