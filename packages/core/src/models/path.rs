//! Materialized Ancestor Paths
//!
//! A `NodePath` is the ordered chain of node ids from the root of a tree down
//! to (and including) one node. It is stored redundantly on every node so that
//! ancestor and subtree queries become indexed prefix scans instead of
//! recursive parent-pointer walks.
//!
//! The path is modeled as an id *sequence*, never as free-form text: prefix
//! and containment checks compare segments, so id contents can never collide
//! with an encoding detail. The separator-joined string form exists only for
//! storage and is produced/consumed through [`NodePath::storage_key`] and
//! [`NodePath::from_storage_key`]. Ids are store-generated UUIDs, which can
//! never contain the separator character.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator used by the on-disk path encoding.
///
/// Never occurs inside a segment: segments are UUIDv4 strings.
pub(crate) const PATH_SEPARATOR: char = '/';

/// Errors decoding a stored path back into a segment sequence
#[derive(Error, Debug)]
pub enum PathError {
    /// The stored encoding was empty
    #[error("empty path encoding")]
    Empty,

    /// The stored encoding contained an empty segment
    #[error("empty segment in path encoding '{0}'")]
    EmptySegment(String),
}

/// Ordered ancestor chain from root to self, inclusive.
///
/// Invariants (maintained by the store, see the db layer):
///
/// - A root's path is exactly `[own id]`.
/// - Every other node's path is its parent's path with the node's own id
///   appended.
///
/// # Examples
///
/// ```rust
/// use canopy_core::models::NodePath;
///
/// let root = NodePath::root("a");
/// let child = root.child("b");
/// let grandchild = child.child("c");
///
/// assert_eq!(grandchild.segments(), ["a", "b", "c"]);
/// assert!(root.is_prefix_of(&grandchild));
/// assert!(!grandchild.is_prefix_of(&root));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// Path of a root node: just the node's own id
    pub fn root(id: impl Into<String>) -> Self {
        Self {
            segments: vec![id.into()],
        }
    }

    /// Path of a child of `self` with the given id
    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(id.into());
        Self { segments }
    }

    /// Ancestor ids from root to self, inclusive
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (1 for a root)
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The node's own id (last segment)
    pub fn leaf(&self) -> &str {
        // A NodePath is never empty: every constructor starts from root()
        // or a validated storage key.
        self.segments
            .last()
            .expect("NodePath invariant violated: empty segment list")
    }

    /// Path of the parent, or `None` for a root
    pub fn parent(&self) -> Option<NodePath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Sequence-prefix containment: true when `other` is `self` or lies in
    /// the subtree rooted at `self`'s node.
    ///
    /// This is the cycle-guard primitive: a candidate parent whose path has
    /// the moved node's path as a prefix is inside the moved node's subtree.
    pub fn is_prefix_of(&self, other: &NodePath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Encode for storage: segments joined with the path separator
    pub fn storage_key(&self) -> String {
        self.segments.join(&PATH_SEPARATOR.to_string())
    }

    /// Decode a stored key back into a path
    ///
    /// # Errors
    ///
    /// Returns `PathError` if the key is empty or contains an empty segment.
    /// A failure here on a row read from the store is an integrity bug, not a
    /// caller-triggerable condition; callers in the db layer escalate it
    /// accordingly.
    pub fn from_storage_key(key: &str) -> Result<Self, PathError> {
        if key.is_empty() {
            return Err(PathError::Empty);
        }

        let segments: Vec<String> = key.split(PATH_SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment(key.to_string()));
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}
