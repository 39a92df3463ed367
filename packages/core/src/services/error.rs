//! Service Layer Error Types
//!
//! This module defines the public error taxonomy for tree operations. Every
//! failure a caller can trigger maps onto one of four structural variants
//! (`NotFound`, `InvalidParent`, `CircularReference`,
//! `ConcurrentModification`) plus validation; anything else is an
//! infrastructure failure wrapped as `Database`.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Tree service operation errors
///
/// All errors are reported synchronously to the caller of the operation;
/// nothing is swallowed. `ConcurrentModification` is the only variant that
/// is safe to retry as-is.
#[derive(Error, Debug)]
pub enum TreeServiceError {
    /// Referenced node id does not exist
    #[error("Node not found: {id}")]
    NotFound { id: String },

    /// Parent id absent at create time
    #[error("Invalid parent node: {parent_id}")]
    InvalidParent { parent_id: String },

    /// Structural mutation would create a cycle or self-parent; names both
    /// the node being moved and the candidate parent inside its subtree
    #[error("Circular reference detected: node {node_id} cannot be parented under {ancestor_id}")]
    CircularReference {
        node_id: String,
        ancestor_id: String,
    },

    /// Transaction conflict detected; safe to retry
    #[error("Concurrent modification detected: {context}")]
    ConcurrentModification { context: String },

    /// Validation failed for a node or payload
    #[error("Node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(DatabaseError),
}

impl TreeServiceError {
    /// Create a node not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an invalid parent error
    pub fn invalid_parent(parent_id: impl Into<String>) -> Self {
        Self::InvalidParent {
            parent_id: parent_id.into(),
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(
        node_id: impl Into<String>,
        ancestor_id: impl Into<String>,
    ) -> Self {
        Self::CircularReference {
            node_id: node_id.into(),
            ancestor_id: ancestor_id.into(),
        }
    }

    /// Create a concurrent modification error
    pub fn concurrent_modification(context: impl Into<String>) -> Self {
        Self::ConcurrentModification {
            context: context.into(),
        }
    }
}

impl From<DatabaseError> for TreeServiceError {
    /// Map the integrity variants a transaction detects onto the public
    /// taxonomy; everything else stays an infrastructure error.
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NodeNotFound { id } => Self::NotFound { id },
            DatabaseError::ParentNotFound { parent_id } => Self::InvalidParent { parent_id },
            DatabaseError::CycleDetected {
                node_id,
                ancestor_id,
            } => Self::CircularReference {
                node_id,
                ancestor_id,
            },
            DatabaseError::Busy { context } => Self::ConcurrentModification { context },
            other => Self::Database(other),
        }
    }
}
