//! TreeStore Trait - Database Abstraction Layer
//!
//! This module defines the `TreeStore` trait that abstracts persistence for
//! tree nodes. The trait sits between `TreeService` (business logic) and the
//! database implementation, so an alternative backend can be swapped in
//! without touching the service layer.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async to support both embedded and
//!    network backends
//! 2. **Typed errors**: Methods return `DatabaseError` so the integrity
//!    conditions a transaction detects (missing rows, cycles, contention)
//!    survive the seam and can be mapped onto the service taxonomy
//! 3. **Committed state only**: Reads (`get_node`, `get_children`,
//!    `get_ancestors`, `get_descendants`) never mutate anything and always
//!    re-derive from current committed state; there is no cached cursor
//!
//! # Examples
//!
//! ```no_run
//! use canopy_core::db::{DatabaseService, SqliteStore, TreeStore};
//! use canopy_core::models::{NewNode, NodePayload};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/canopy.db")).await?);
//!     let store: Arc<dyn TreeStore> = Arc::new(SqliteStore::new(db));
//!
//!     let root = store
//!         .create_node(NewNode::new(NodePayload::Root {
//!             title: "Inbox".to_string(),
//!         }))
//!         .await?;
//!     let fetched = store.get_node(&root.id).await?;
//!     assert!(fetched.is_some());
//!
//!     Ok(())
//! }
//! ```

use crate::db::error::DatabaseError;
use crate::models::{DeleteResult, NewNode, Node, NodePayload};
use async_trait::async_trait;

/// Abstraction layer for tree persistence operations
///
/// Implementations must be `Send + Sync` so futures holding them can move
/// between threads.
///
/// # Method Categories
///
/// - **Repository**: create, get, payload/name/sort-order updates, move,
///   delete
/// - **Traversal**: children, ancestors, descendants
/// - **Lifecycle**: close
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Create a new node from a creation request
    ///
    /// The store assigns a fresh UUIDv4 id, derives the materialized path
    /// from the parent inside the insert transaction, and stamps the
    /// timestamps.
    ///
    /// # Errors
    ///
    /// - `DatabaseError::ParentNotFound` if the request names an absent
    ///   parent
    async fn create_node(&self, new_node: NewNode) -> Result<Node, DatabaseError>;

    /// Point lookup by id; absence is not an error
    async fn get_node(&self, id: &str) -> Result<Option<Node>, DatabaseError>;

    /// Replace a node's payload; bumps `updated_at`, never touches the path
    ///
    /// The caller is responsible for variant/type agreement (the service
    /// layer checks it); the store only persists.
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NodeNotFound` if the id is unknown
    async fn update_payload(&self, id: &str, payload: &NodePayload)
        -> Result<Node, DatabaseError>;

    /// Update a node's display name
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NodeNotFound` if the id is unknown
    async fn rename_node(&self, id: &str, name: Option<String>) -> Result<Node, DatabaseError>;

    /// Update a node's sibling sort order
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NodeNotFound` if the id is unknown
    async fn set_sort_order(&self, id: &str, sort_order: i64) -> Result<Node, DatabaseError>;

    /// Re-parent a node (`None` makes it a root), recomputing the
    /// materialized path of the node and every descendant atomically
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NodeNotFound` if either id is unknown
    /// - `DatabaseError::CycleDetected` if the candidate parent is the node
    ///   itself or lies inside its subtree; nothing is committed
    async fn move_node(&self, id: &str, new_parent_id: Option<&str>)
        -> Result<(), DatabaseError>;

    /// Delete a node and its entire subtree; idempotent
    async fn delete_node(&self, id: &str) -> Result<DeleteResult, DatabaseError>;

    /// Children of a node (or the roots, for `None`), in sibling order
    async fn get_children(&self, parent_id: Option<&str>) -> Result<Vec<Node>, DatabaseError>;

    /// Ancestor chain ordered self-to-root; the node itself is hop 0 and
    /// `max_hops` bounds the number of parent steps (`None` = to the root)
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NodeNotFound` if the id is unknown
    ///
    /// # Panics
    ///
    /// Panics if the stored path references an ancestor that no longer
    /// exists: the path maintainer guarantees this cannot happen, so
    /// observing it means the store is corrupt.
    async fn get_ancestors(
        &self,
        id: &str,
        max_hops: Option<usize>,
    ) -> Result<Vec<Node>, DatabaseError>;

    /// Subtree rooted at `id`, including the node itself at relative depth
    /// 0, bounded by `max_depth` relative levels
    ///
    /// Breadth-first across levels; within a level: sort_order, creation
    /// time, id.
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NodeNotFound` if the id is unknown
    async fn get_descendants(&self, id: &str, max_depth: usize)
        -> Result<Vec<Node>, DatabaseError>;

    /// Flush pending writes before shutdown
    async fn close(&self) -> Result<(), DatabaseError>;
}
