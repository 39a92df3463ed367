//! Node Data Structures
//!
//! This module defines the core `Node` struct and related types for Canopy's
//! typed tree store.
//!
//! # Architecture
//!
//! - **Typed payloads**: Each node carries a `NodePayload` variant matching
//!   its `NodeType` (root / branch / leaf), so variant-specific fields are
//!   checked by the type system rather than runtime convention.
//! - **Materialized path**: Every node stores its full ancestor chain
//!   (`NodePath`), derived by the store and never hand-edited by callers.
//! - **Stable ids**: Ids are UUIDv4 strings assigned once at creation and
//!   never reissued, so external records keyed by node id can detect a
//!   deleted node as a dangling reference rather than a different node.
//!
//! # Examples
//!
//! ```rust
//! use canopy_core::models::{NewNode, NodePayload, NodeType};
//!
//! // Describe a root node
//! let root = NewNode::new(NodePayload::Root {
//!     title: "My collection".to_string(),
//! });
//! assert_eq!(root.payload.node_type(), NodeType::Root);
//!
//! // Describe a leaf under some parent, with an explicit sibling position
//! let leaf = NewNode::new(NodePayload::leaf("https://example.com/photo.jpg"))
//!     .with_parent("parent-id")
//!     .with_sort_order(2);
//! assert_eq!(leaf.sort_order, Some(2));
//! ```

use crate::models::path::NodePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Validation errors for node operations
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A required field was empty or missing
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A stored node type string could not be parsed
    #[error("Invalid node type: {0}")]
    InvalidNodeType(String),

    /// A payload variant disagrees with the node's fixed type
    #[error("Payload kind '{payload_kind}' does not match node type '{node_type}'")]
    PayloadKindMismatch {
        node_type: NodeType,
        payload_kind: NodeType,
    },
}

/// Structural role of a node, fixed at creation.
///
/// The store preserves whatever type each node records; it does not restrict
/// which types may nest under which (that is an application-domain concern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Root,
    Branch,
    Leaf,
}

impl NodeType {
    /// Stable string form used in the database column
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Branch => "branch",
            NodeType::Leaf => "leaf",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(NodeType::Root),
            "branch" => Ok(NodeType::Branch),
            "leaf" => Ok(NodeType::Leaf),
            other => Err(ValidationError::InvalidNodeType(other.to_string())),
        }
    }
}

fn empty_attributes() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Typed payload, tagged by node type.
///
/// The variant determines (and always agrees with) the node's `NodeType`:
/// `update_payload` rejects a variant change, so a node's type is effectively
/// immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodePayload {
    /// Top of a tree: a titled collection
    Root { title: String },

    /// Interior grouping node with a label and free-form attributes
    Branch {
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default = "empty_attributes")]
        attributes: serde_json::Value,
    },

    /// Terminal node referencing an external resource (typically an uploaded
    /// image); the upload metadata mirrors what the storage service reports
    Leaf {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        storage_path: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        hash: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl NodePayload {
    /// Convenience constructor for a branch with no extra attributes
    pub fn branch(label: impl Into<String>) -> Self {
        NodePayload::Branch {
            label: label.into(),
            description: None,
            attributes: empty_attributes(),
        }
    }

    /// Convenience constructor for a bare resource leaf
    pub fn leaf(url: impl Into<String>) -> Self {
        NodePayload::Leaf {
            url: url.into(),
            storage_path: None,
            size: None,
            mime_type: None,
            hash: None,
            description: None,
        }
    }

    /// The node type this payload variant corresponds to
    pub fn node_type(&self) -> NodeType {
        match self {
            NodePayload::Root { .. } => NodeType::Root,
            NodePayload::Branch { .. } => NodeType::Branch,
            NodePayload::Leaf { .. } => NodeType::Leaf,
        }
    }

    /// Validate variant-specific required fields
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` if a leaf's `url` is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let NodePayload::Leaf { url, .. } = self {
            if url.is_empty() {
                return Err(ValidationError::MissingField("payload.url".to_string()));
            }
        }
        Ok(())
    }
}

/// A stored tree node.
///
/// Nodes are only ever materialized from committed store state; the id, path
/// and timestamps are assigned by the store. Use [`NewNode`] to describe a
/// node to be created.
///
/// # Fields
///
/// - `id`: UUIDv4 string, immutable, never reissued after deletion
/// - `parent_id`: `None` marks a root
/// - `node_type`: fixed at creation, always equals `payload.node_type()`
/// - `name`: optional display label
/// - `payload`: typed variant data (see [`NodePayload`])
/// - `path`: materialized ancestor chain, root to self inclusive
/// - `sort_order`: sibling display order; ties break by `created_at`, then id
/// - `created_at` / `updated_at`: UTC timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub parent_id: Option<String>,
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub payload: NodePayload,
    pub path: NodePath,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Check if this node is a root (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check if this node is a terminal resource leaf
    pub fn is_leaf(&self) -> bool {
        self.node_type == NodeType::Leaf
    }
}

/// Description of a node to be created.
///
/// The store assigns the id, computes the path from the parent, and stamps
/// the timestamps; callers supply only the domain fields.
///
/// # Examples
///
/// ```rust
/// use canopy_core::models::{NewNode, NodePayload};
///
/// let branch = NewNode::new(NodePayload::branch("Holidays"))
///     .with_parent("root-id")
///     .with_name("2026 holidays");
/// assert!(branch.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    /// Parent node id; `None` creates a root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Typed payload; its variant fixes the node's type
    pub payload: NodePayload,

    /// Optional display label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Sibling display order; defaults to 0, ties break by creation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
}

impl NewNode {
    /// Describe a new node with the given payload
    pub fn new(payload: NodePayload) -> Self {
        Self {
            parent_id: None,
            payload,
            name: None,
            sort_order: None,
        }
    }

    /// Set the parent node id
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set the display label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an explicit sibling position
    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// Validate the creation request
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.payload.validate()
    }
}

/// Result of a delete operation
///
/// Deletes are idempotent: removing an id that no longer exists succeeds and
/// reports `existed: false` instead of failing. `removed` counts the node
/// plus every cascaded descendant, which is otherwise invisible to the
/// caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResult {
    /// Whether the node existed before deletion
    pub existed: bool,

    /// Number of rows removed (node plus descendants); 0 when `existed` is
    /// false
    pub removed: u64,
}

impl DeleteResult {
    /// Create a DeleteResult for a delete that removed `removed` nodes
    pub fn existed(removed: u64) -> Self {
        Self {
            existed: true,
            removed,
        }
    }

    /// Create a DeleteResult for an id that was already gone
    pub fn not_found() -> Self {
        Self {
            existed: false,
            removed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_node_type_agreement() {
        assert_eq!(
            NodePayload::Root {
                title: "t".to_string()
            }
            .node_type(),
            NodeType::Root
        );
        assert_eq!(NodePayload::branch("b").node_type(), NodeType::Branch);
        assert_eq!(
            NodePayload::leaf("https://example.com/a.jpg").node_type(),
            NodeType::Leaf
        );
    }

    #[test]
    fn test_node_type_string_roundtrip() {
        for node_type in [NodeType::Root, NodeType::Branch, NodeType::Leaf] {
            assert_eq!(node_type.as_str().parse::<NodeType>().unwrap(), node_type);
        }
        assert!(matches!(
            "chapter".parse::<NodeType>(),
            Err(ValidationError::InvalidNodeType(_))
        ));
    }

    #[test]
    fn test_payload_serialization_tagged() {
        let payload = NodePayload::branch("Holidays");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "branch");
        assert_eq!(json["label"], "Holidays");

        let back: NodePayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_leaf_payload_optional_fields_omitted() {
        let payload = NodePayload::leaf("https://example.com/a.jpg");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "leaf");
        assert!(json.get("storage_path").is_none());
        assert!(json.get("size").is_none());
    }

    #[test]
    fn test_leaf_payload_full_metadata_roundtrip() {
        let payload = NodePayload::Leaf {
            url: "https://cdn.example.com/images/u/n/abc.jpg".to_string(),
            storage_path: Some("images/u/n/abc.jpg".to_string()),
            size: Some(102_400),
            mime_type: Some("image/jpeg".to_string()),
            hash: Some("abc123".to_string()),
            description: Some("A red bicycle".to_string()),
        };

        let json = serde_json::to_string(&payload).unwrap();
        let back: NodePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_branch_attributes_default_to_empty_object() {
        let back: NodePayload =
            serde_json::from_value(json!({"kind": "branch", "label": "x"})).unwrap();
        match back {
            NodePayload::Branch { attributes, .. } => {
                assert_eq!(attributes, json!({}));
            }
            other => panic!("expected branch, got {:?}", other),
        }
    }

    #[test]
    fn test_leaf_validation_requires_url() {
        let payload = NodePayload::leaf("");
        assert!(matches!(
            payload.validate(),
            Err(ValidationError::MissingField(_))
        ));
        assert!(NodePayload::leaf("https://example.com/a.jpg")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_new_node_builder() {
        let new_node = NewNode::new(NodePayload::branch("b"))
            .with_parent("parent-1")
            .with_name("label")
            .with_sort_order(3);

        assert_eq!(new_node.parent_id.as_deref(), Some("parent-1"));
        assert_eq!(new_node.name.as_deref(), Some("label"));
        assert_eq!(new_node.sort_order, Some(3));
        assert!(new_node.validate().is_ok());
    }

    #[test]
    fn test_delete_result() {
        let result = DeleteResult::existed(4);
        assert!(result.existed);
        assert_eq!(result.removed, 4);

        let result = DeleteResult::not_found();
        assert!(!result.existed);
        assert_eq!(result.removed, 0);
    }
}
