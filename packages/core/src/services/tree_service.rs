//! Tree Service - Node Repository and Traversal Surface
//!
//! `TreeService` is the public face of the tree store. It validates
//! requests, delegates persistence to a [`TreeStore`] backend, and maps the
//! integrity conditions transactions detect onto the public error taxonomy
//! ([`TreeServiceError`]).
//!
//! # Responsibilities
//!
//! - **Node repository**: create, point lookup, payload/name/sort-order
//!   updates, move, cascading delete
//! - **Traversal**: ancestor chains, bounded breadth-first subtrees, nested
//!   subtree assembly, and caller-filtered traversal for access-control
//!   integration
//!
//! The service holds no state of its own: every read re-derives from the
//! store's committed state.
//!
//! # Examples
//!
//! ```no_run
//! use canopy_core::db::{DatabaseService, SqliteStore};
//! use canopy_core::models::{NewNode, NodePayload};
//! use canopy_core::services::TreeService;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/canopy.db")).await?);
//!     let service = TreeService::new(Arc::new(SqliteStore::new(db)));
//!
//!     let root = service
//!         .create_node(NewNode::new(NodePayload::Root {
//!             title: "Photos".to_string(),
//!         }))
//!         .await?;
//!
//!     let album = service
//!         .create_node(NewNode::new(NodePayload::branch("Summer")).with_parent(&root.id))
//!         .await?;
//!
//!     let subtree = service.descendants(&root.id, None).await?;
//!     assert_eq!(subtree.len(), 2);
//!     assert_eq!(subtree[1].id, album.id);
//!
//!     Ok(())
//! }
//! ```

use crate::db::TreeStore;
use crate::models::{
    DeleteResult, NewNode, Node, NodePayload, NodeTree, ValidationError,
};
use crate::services::error::TreeServiceError;
use std::sync::Arc;

/// Default bound for descendant traversal, in levels below the start node
pub const DEFAULT_TRAVERSAL_DEPTH: usize = 10;

/// Business-logic facade over a [`TreeStore`] backend
pub struct TreeService {
    store: Arc<dyn TreeStore>,
}

impl TreeService {
    /// Create a new TreeService over a store backend
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Create a new node
    ///
    /// The store assigns a fresh id and derives the materialized path before
    /// the node becomes visible to readers.
    ///
    /// # Errors
    ///
    /// - `TreeServiceError::InvalidParent` if `parent_id` is supplied but
    ///   does not exist
    /// - `TreeServiceError::ValidationFailed` if the payload is invalid
    ///   (e.g. a leaf without a URL)
    pub async fn create_node(&self, new_node: NewNode) -> Result<Node, TreeServiceError> {
        new_node.validate()?;

        let node = self.store.create_node(new_node).await?;

        tracing::debug!(
            node_id = %node.id,
            node_type = %node.node_type,
            parent_id = ?node.parent_id,
            "created node"
        );

        Ok(node)
    }

    /// Point lookup by id; absence is not an error
    pub async fn get_node(&self, id: &str) -> Result<Option<Node>, TreeServiceError> {
        Ok(self.store.get_node(id).await?)
    }

    /// Replace a node's payload
    ///
    /// The payload variant must match the node's fixed type: a node can
    /// never change from branch to leaf by a payload edit. Bumps
    /// `updated_at`; never touches the path.
    ///
    /// # Errors
    ///
    /// - `TreeServiceError::NotFound` if the id is unknown
    /// - `TreeServiceError::ValidationFailed` if the payload variant
    ///   disagrees with the node's type or fails field validation
    pub async fn update_payload(
        &self,
        id: &str,
        payload: NodePayload,
    ) -> Result<Node, TreeServiceError> {
        payload.validate()?;

        let node = self
            .store
            .get_node(id)
            .await?
            .ok_or_else(|| TreeServiceError::not_found(id))?;

        if node.node_type != payload.node_type() {
            return Err(ValidationError::PayloadKindMismatch {
                node_type: node.node_type,
                payload_kind: payload.node_type(),
            }
            .into());
        }

        Ok(self.store.update_payload(id, &payload).await?)
    }

    /// Update a node's display name
    ///
    /// # Errors
    ///
    /// - `TreeServiceError::NotFound` if the id is unknown
    pub async fn rename_node(
        &self,
        id: &str,
        name: Option<String>,
    ) -> Result<Node, TreeServiceError> {
        Ok(self.store.rename_node(id, name).await?)
    }

    /// Update a node's sibling sort order
    ///
    /// # Errors
    ///
    /// - `TreeServiceError::NotFound` if the id is unknown
    pub async fn set_sort_order(
        &self,
        id: &str,
        sort_order: i64,
    ) -> Result<Node, TreeServiceError> {
        Ok(self.store.set_sort_order(id, sort_order).await?)
    }

    /// Move a node under a new parent (`None` makes it a root)
    ///
    /// Recomputes the materialized path for the node and every descendant as
    /// one atomic unit; a reader can never observe the tree mid-rewrite.
    ///
    /// # Errors
    ///
    /// - `TreeServiceError::NotFound` if either id is unknown
    /// - `TreeServiceError::CircularReference` if the new parent is the node
    ///   itself or lies inside its subtree; the tree is left unchanged
    /// - `TreeServiceError::ConcurrentModification` on write contention;
    ///   safe to retry
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use canopy_core::db::{DatabaseService, SqliteStore};
    /// # use canopy_core::services::TreeService;
    /// # use std::path::PathBuf;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let db = Arc::new(DatabaseService::new(PathBuf::from("./canopy.db")).await?);
    /// # let service = TreeService::new(Arc::new(SqliteStore::new(db)));
    /// // Move under a new parent
    /// service.move_node("node-id", Some("new-parent-id")).await?;
    ///
    /// // Make the node a root
    /// service.move_node("node-id", None).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn move_node(
        &self,
        id: &str,
        new_parent_id: Option<&str>,
    ) -> Result<(), TreeServiceError> {
        self.store.move_node(id, new_parent_id).await?;

        tracing::debug!(node_id = %id, new_parent_id = ?new_parent_id, "moved node");

        Ok(())
    }

    /// Delete a node and its entire subtree
    ///
    /// Idempotent: deleting an id that is already gone succeeds with
    /// `existed: false`. Auxiliary records elsewhere that reference deleted
    /// ids become dangling; ids are never reissued, so such references can
    /// be detected rather than silently re-bound.
    pub async fn delete_node(&self, id: &str) -> Result<DeleteResult, TreeServiceError> {
        let result = self.store.delete_node(id).await?;

        if result.existed {
            tracing::debug!(node_id = %id, removed = result.removed, "deleted subtree");
        }

        Ok(result)
    }

    /// Children of a node (or the roots, for `None`), in sibling order:
    /// sort_order, then creation time, then id
    pub async fn get_children(
        &self,
        parent_id: Option<&str>,
    ) -> Result<Vec<Node>, TreeServiceError> {
        Ok(self.store.get_children(parent_id).await?)
    }

    /// Ancestor chain of a node, ordered **self-to-root**
    ///
    /// The node itself is hop 0; `max_hops` bounds the number of parent
    /// steps (`None` walks to the root). Reversing the returned ids
    /// reconstructs the node's materialized path.
    ///
    /// # Errors
    ///
    /// - `TreeServiceError::NotFound` if the id is unknown
    pub async fn ancestors(
        &self,
        id: &str,
        max_hops: Option<usize>,
    ) -> Result<Vec<Node>, TreeServiceError> {
        Ok(self.store.get_ancestors(id, max_hops).await?)
    }

    /// Subtree rooted at `id`, breadth-first, bounded by `max_depth` levels
    /// (default [`DEFAULT_TRAVERSAL_DEPTH`])
    ///
    /// The node itself appears first at relative depth 0; within a depth
    /// level, ordering follows sort_order, then creation time, then id.
    /// Every call re-derives from current committed state.
    ///
    /// # Errors
    ///
    /// - `TreeServiceError::NotFound` if the id is unknown
    pub async fn descendants(
        &self,
        id: &str,
        max_depth: Option<usize>,
    ) -> Result<Vec<Node>, TreeServiceError> {
        let max_depth = max_depth.unwrap_or(DEFAULT_TRAVERSAL_DEPTH);
        Ok(self.store.get_descendants(id, max_depth).await?)
    }

    /// Descendants with a caller-supplied visibility predicate over node ids
    ///
    /// This is the integration point for identity/access services: the
    /// caller supplies the set of ids a principal may see and the store
    /// stays free of authorization logic. The predicate is applied per node;
    /// children of a hidden node are still returned when their own ids pass.
    pub async fn descendants_filtered<F>(
        &self,
        id: &str,
        max_depth: Option<usize>,
        mut visible: F,
    ) -> Result<Vec<Node>, TreeServiceError>
    where
        F: FnMut(&str) -> bool + Send,
    {
        let mut nodes = self.descendants(id, max_depth).await?;
        nodes.retain(|node| visible(&node.id));
        Ok(nodes)
    }

    /// Nested subtree assembly of a descendants read
    ///
    /// # Errors
    ///
    /// - `TreeServiceError::NotFound` if the id is unknown
    pub async fn subtree(
        &self,
        id: &str,
        max_depth: Option<usize>,
    ) -> Result<NodeTree, TreeServiceError> {
        let nodes = self.descendants(id, max_depth).await?;
        NodeTree::from_nodes(nodes).ok_or_else(|| TreeServiceError::not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseService, SqliteStore};
    use crate::models::NodeType;
    use anyhow::Result;
    use tempfile::TempDir;

    async fn create_test_service() -> Result<(TreeService, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        let service = TreeService::new(Arc::new(SqliteStore::new(db)));
        Ok((service, temp_dir))
    }

    fn root_request(title: &str) -> NewNode {
        NewNode::new(NodePayload::Root {
            title: title.to_string(),
        })
    }

    #[tokio::test]
    async fn test_create_with_absent_parent_is_invalid_parent() -> Result<()> {
        let (service, _temp) = create_test_service().await?;

        let result = service
            .create_node(NewNode::new(NodePayload::branch("B")).with_parent("no-such-id"))
            .await;

        assert!(matches!(
            result,
            Err(TreeServiceError::InvalidParent { parent_id }) if parent_id == "no-such-id"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_payload() -> Result<()> {
        let (service, _temp) = create_test_service().await?;

        let result = service.create_node(NewNode::new(NodePayload::leaf(""))).await;
        assert!(matches!(
            result,
            Err(TreeServiceError::ValidationFailed(_))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_payload_rejects_kind_change() -> Result<()> {
        let (service, _temp) = create_test_service().await?;

        let root = service.create_node(root_request("R")).await?;

        let result = service
            .update_payload(&root.id, NodePayload::branch("not a root"))
            .await;

        assert!(matches!(
            result,
            Err(TreeServiceError::ValidationFailed(
                ValidationError::PayloadKindMismatch {
                    node_type: NodeType::Root,
                    payload_kind: NodeType::Branch,
                }
            ))
        ));

        // The node is untouched
        let fetched = service.get_node(&root.id).await?.unwrap();
        assert_eq!(fetched.payload, root.payload);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_payload_same_kind() -> Result<()> {
        let (service, _temp) = create_test_service().await?;

        let root = service.create_node(root_request("Before")).await?;
        let updated = service
            .update_payload(
                &root.id,
                NodePayload::Root {
                    title: "After".to_string(),
                },
            )
            .await?;

        assert_eq!(
            updated.payload,
            NodePayload::Root {
                title: "After".to_string()
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_move_errors_use_public_taxonomy() -> Result<()> {
        let (service, _temp) = create_test_service().await?;

        let root = service.create_node(root_request("R")).await?;
        let branch = service
            .create_node(NewNode::new(NodePayload::branch("B")).with_parent(&root.id))
            .await?;

        let result = service.move_node(&root.id, Some(&branch.id)).await;
        assert!(matches!(
            result,
            Err(TreeServiceError::CircularReference { node_id, ancestor_id })
                if node_id == root.id && ancestor_id == branch.id
        ));

        let result = service.move_node("no-such-id", None).await;
        assert!(matches!(result, Err(TreeServiceError::NotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_descendants_default_depth_bound() -> Result<()> {
        let (service, _temp) = create_test_service().await?;

        // Chain of 13 nodes: root plus 12 levels
        let root = service.create_node(root_request("R")).await?;
        let mut parent_id = root.id.clone();
        for i in 0..12 {
            let child = service
                .create_node(
                    NewNode::new(NodePayload::branch(format!("level-{}", i)))
                        .with_parent(&parent_id),
                )
                .await?;
            parent_id = child.id;
        }

        // Default bound keeps self plus DEFAULT_TRAVERSAL_DEPTH levels
        let bounded = service.descendants(&root.id, None).await?;
        assert_eq!(bounded.len(), DEFAULT_TRAVERSAL_DEPTH + 1);

        // An explicit large bound returns the whole chain
        let all = service.descendants(&root.id, Some(usize::MAX)).await?;
        assert_eq!(all.len(), 13);

        Ok(())
    }

    #[tokio::test]
    async fn test_descendants_filtered_by_predicate() -> Result<()> {
        let (service, _temp) = create_test_service().await?;

        let root = service.create_node(root_request("R")).await?;
        let visible_child = service
            .create_node(NewNode::new(NodePayload::branch("visible")).with_parent(&root.id))
            .await?;
        let hidden_child = service
            .create_node(NewNode::new(NodePayload::branch("hidden")).with_parent(&root.id))
            .await?;

        let granted = [root.id.clone(), visible_child.id.clone()];
        let nodes = service
            .descendants_filtered(&root.id, None, |id| granted.iter().any(|g| g == id))
            .await?;

        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, [&root.id, &visible_child.id]);
        assert!(!ids.contains(&hidden_child.id.as_str()));

        Ok(())
    }

    #[tokio::test]
    async fn test_subtree_assembly() -> Result<()> {
        let (service, _temp) = create_test_service().await?;

        let root = service.create_node(root_request("R")).await?;
        let branch = service
            .create_node(NewNode::new(NodePayload::branch("B")).with_parent(&root.id))
            .await?;
        let leaf = service
            .create_node(
                NewNode::new(NodePayload::leaf("https://example.com/a.jpg"))
                    .with_parent(&branch.id),
            )
            .await?;

        let tree = service.subtree(&root.id, None).await?;
        assert_eq!(tree.node.id, root.id);
        assert_eq!(tree.count_nodes(), 3);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.find(&leaf.id).unwrap().node.id, leaf.id);
        assert_eq!(tree.collect_leaves().len(), 1);

        let result = service.subtree("no-such-id", None).await;
        assert!(matches!(result, Err(TreeServiceError::NotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_ancestors_reversed_reconstructs_path() -> Result<()> {
        let (service, _temp) = create_test_service().await?;

        let root = service.create_node(root_request("R")).await?;
        let branch = service
            .create_node(NewNode::new(NodePayload::branch("B")).with_parent(&root.id))
            .await?;
        let leaf = service
            .create_node(
                NewNode::new(NodePayload::leaf("https://example.com/a.jpg"))
                    .with_parent(&branch.id),
            )
            .await?;

        let ancestors = service.ancestors(&leaf.id, None).await?;
        let mut ids: Vec<String> = ancestors.iter().map(|n| n.id.clone()).collect();
        ids.reverse();

        let stored = service.get_node(&leaf.id).await?.unwrap();
        assert_eq!(ids, stored.path.segments());

        Ok(())
    }
}
