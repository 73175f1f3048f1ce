//! Locations inside nested data
//!
//! A [`Path`] is only used for error reporting. Containers prepend their
//! segment while an error travels outward, so the finished path reads from
//! the root to the failing leaf.

use std::fmt;

use serde::Serialize;

/// An ordered list of field and index segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The empty path, pointing at the root value.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from root-to-leaf segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Segments from root to leaf.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if there are no segments. Same as [`Path::is_root`].
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Put `segment` in front of the existing ones.
    pub fn prepend(mut self, segment: impl Into<String>) -> Self {
        self.segments.insert(0, segment.into());
        self
    }

    /// Put every segment of `outer` in front of the existing ones.
    pub fn prepend_path(mut self, outer: &Path) -> Self {
        if !outer.is_root() {
            self.segments.splice(0..0, outer.segments.iter().cloned());
        }
        self
    }

    /// A new path one level deeper.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment.into());
        Self { segments }
    }
}

/// Renders as `["a"]["0"]`; the root renders as an empty string.
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "[{}]", crate::value::quote(segment))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_builds_root_to_leaf_order() {
        let path = Path::root().prepend("b").prepend("a");
        assert_eq!(path.segments(), ["a", "b"]);
        assert_eq!(path.to_string(), r#"["a"]["b"]"#);
    }

    #[test]
    fn test_prepend_path() {
        let inner = Path::from_segments(["0", "name"]);
        let outer = Path::from_segments(["users"]);
        assert_eq!(inner.prepend_path(&outer).segments(), ["users", "0", "name"]);
    }

    #[test]
    fn test_child_leaves_parent_untouched() {
        let parent = Path::from_segments(["a"]);
        let child = parent.child("b");
        assert_eq!(parent.len(), 1);
        assert_eq!(child.segments(), ["a", "b"]);
    }

    #[test]
    fn test_root_renders_empty() {
        assert!(Path::root().is_root());
        assert_eq!(Path::root().to_string(), "");
    }
}
