//! SqliteStore - TreeStore Implementation for the libsql Backend
//!
//! This module implements the `TreeStore` trait over `DatabaseService`,
//! providing the only concrete backend. It is a thin layer: all SQL and
//! transaction discipline live in `DatabaseService`; this type handles id
//! and timestamp assignment plus `libsql::Row` → `Node` conversion.

use crate::db::database::{DatabaseService, DbCreateNodeParams};
use crate::db::error::DatabaseError;
use crate::db::tree_store::TreeStore;
use crate::models::{DeleteResult, NewNode, Node, NodePath, NodePayload, NodeType};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use libsql::Row;
use std::sync::Arc;
use uuid::Uuid;

/// TreeStore implementation backed by libsql/SQLite
pub struct SqliteStore {
    /// Underlying database service (SQL primitives and transactions)
    db: Arc<DatabaseService>,
}

impl SqliteStore {
    /// Create a new SqliteStore over a DatabaseService
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use canopy_core::db::{DatabaseService, SqliteStore};
    /// # use std::path::PathBuf;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Arc::new(DatabaseService::new(PathBuf::from("./canopy.db")).await?);
    /// let store = SqliteStore::new(db);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Render a timestamp in the fixed-width RFC3339 form used in the
    /// database.
    ///
    /// Microsecond precision with a `Z` suffix keeps the lexicographic order
    /// of the column equal to chronological order, which the sibling
    /// tie-break relies on.
    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parse a timestamp from the database - handles both SQLite and RFC3339
    /// formats
    ///
    /// SQLite CURRENT_TIMESTAMP (the column default) returns
    /// "YYYY-MM-DD HH:MM:SS"; rows written by this store use RFC3339.
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        Err(DatabaseError::row_decode(format!(
            "unable to parse timestamp '{}' as SQLite or RFC3339 format",
            s
        )))
    }

    /// Convert a libsql::Row to a Node model
    ///
    /// Expected columns (in order, see `NODE_COLUMNS`):
    /// id, node_type, name, parent_id, path, depth, sort_order, payload,
    /// created_at, updated_at
    fn row_to_node(row: &Row) -> Result<Node, DatabaseError> {
        let id: String = row
            .get(0)
            .map_err(|e| DatabaseError::row_decode(format!("id: {}", e)))?;
        let node_type_str: String = row
            .get(1)
            .map_err(|e| DatabaseError::row_decode(format!("node_type: {}", e)))?;
        let name: Option<String> = row
            .get(2)
            .map_err(|e| DatabaseError::row_decode(format!("name: {}", e)))?;
        let parent_id: Option<String> = row
            .get(3)
            .map_err(|e| DatabaseError::row_decode(format!("parent_id: {}", e)))?;
        let path_key: String = row
            .get(4)
            .map_err(|e| DatabaseError::row_decode(format!("path: {}", e)))?;
        let _depth: i64 = row
            .get(5)
            .map_err(|e| DatabaseError::row_decode(format!("depth: {}", e)))?;
        let sort_order: i64 = row
            .get(6)
            .map_err(|e| DatabaseError::row_decode(format!("sort_order: {}", e)))?;
        let payload_json: String = row
            .get(7)
            .map_err(|e| DatabaseError::row_decode(format!("payload: {}", e)))?;
        let created_at_str: String = row
            .get(8)
            .map_err(|e| DatabaseError::row_decode(format!("created_at: {}", e)))?;
        let updated_at_str: String = row
            .get(9)
            .map_err(|e| DatabaseError::row_decode(format!("updated_at: {}", e)))?;

        let node_type: NodeType = node_type_str
            .parse()
            .map_err(|e| DatabaseError::row_decode(format!("node_type: {}", e)))?;

        let payload: NodePayload = serde_json::from_str(&payload_json)
            .map_err(|e| DatabaseError::row_decode(format!("payload JSON: {}", e)))?;

        // The column and the payload tag are written together; disagreement
        // means the store is corrupt.
        debug_assert_eq!(node_type, payload.node_type());

        let path = NodePath::from_storage_key(&path_key).map_err(|e| {
            DatabaseError::row_decode(format!("stored path '{}' for node {}: {}", path_key, id, e))
        })?;

        let created_at = Self::parse_timestamp(&created_at_str)?;
        let updated_at = Self::parse_timestamp(&updated_at_str)?;

        Ok(Node {
            id,
            parent_id,
            node_type,
            name,
            payload,
            path,
            sort_order,
            created_at,
            updated_at,
        })
    }

    /// Drain a Rows cursor into Node models
    async fn collect_nodes(mut rows: libsql::Rows) -> Result<Vec<Node>, DatabaseError> {
        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to fetch row: {}", e)))?
        {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }
}

#[async_trait]
impl TreeStore for SqliteStore {
    async fn create_node(&self, new_node: NewNode) -> Result<Node, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Self::format_timestamp(&Utc::now());
        let payload_json = serde_json::to_string(&new_node.payload)?;
        let node_type = new_node.payload.node_type();

        let params = DbCreateNodeParams {
            id: &id,
            node_type: node_type.as_str(),
            name: new_node.name.as_deref(),
            parent_id: new_node.parent_id.as_deref(),
            sort_order: new_node.sort_order.unwrap_or(0),
            payload: &payload_json,
            created_at: &now,
            updated_at: &now,
        };

        self.db.db_create_node(params).await?;

        self.get_node(&id)
            .await?
            .ok_or_else(|| DatabaseError::sql_execution("Node not found after creation"))
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>, DatabaseError> {
        match self.db.db_get_node(id).await? {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_payload(
        &self,
        id: &str,
        payload: &NodePayload,
    ) -> Result<Node, DatabaseError> {
        let payload_json = serde_json::to_string(payload)?;
        let now = Self::format_timestamp(&Utc::now());

        let rows_affected = self.db.db_update_payload(id, &payload_json, &now).await?;
        if rows_affected == 0 {
            return Err(DatabaseError::node_not_found(id));
        }

        self.get_node(id)
            .await?
            .ok_or_else(|| DatabaseError::node_not_found(id))
    }

    async fn rename_node(&self, id: &str, name: Option<String>) -> Result<Node, DatabaseError> {
        let now = Self::format_timestamp(&Utc::now());

        let rows_affected = self.db.db_rename_node(id, name.as_deref(), &now).await?;
        if rows_affected == 0 {
            return Err(DatabaseError::node_not_found(id));
        }

        self.get_node(id)
            .await?
            .ok_or_else(|| DatabaseError::node_not_found(id))
    }

    async fn set_sort_order(&self, id: &str, sort_order: i64) -> Result<Node, DatabaseError> {
        let now = Self::format_timestamp(&Utc::now());

        let rows_affected = self.db.db_set_sort_order(id, sort_order, &now).await?;
        if rows_affected == 0 {
            return Err(DatabaseError::node_not_found(id));
        }

        self.get_node(id)
            .await?
            .ok_or_else(|| DatabaseError::node_not_found(id))
    }

    async fn move_node(
        &self,
        id: &str,
        new_parent_id: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let now = Self::format_timestamp(&Utc::now());
        self.db.db_move_node(id, new_parent_id, &now).await
    }

    async fn delete_node(&self, id: &str) -> Result<DeleteResult, DatabaseError> {
        let removed = self.db.db_delete_subtree(id).await?;
        Ok(DeleteResult {
            existed: removed > 0,
            removed,
        })
    }

    async fn get_children(&self, parent_id: Option<&str>) -> Result<Vec<Node>, DatabaseError> {
        let rows = self.db.db_get_children(parent_id).await?;
        Self::collect_nodes(rows).await
    }

    async fn get_ancestors(
        &self,
        id: &str,
        max_hops: Option<usize>,
    ) -> Result<Vec<Node>, DatabaseError> {
        let node = self
            .get_node(id)
            .await?
            .ok_or_else(|| DatabaseError::node_not_found(id))?;

        let path = node.path.clone();
        let hops = max_hops.unwrap_or(usize::MAX);

        let mut ancestors = vec![node];
        for ancestor_id in path.segments().iter().rev().skip(1).take(hops) {
            let ancestor = self.get_node(ancestor_id).await?.unwrap_or_else(|| {
                panic!(
                    "materialized path for node {} references missing ancestor {}",
                    id, ancestor_id
                )
            });
            ancestors.push(ancestor);
        }

        Ok(ancestors)
    }

    async fn get_descendants(
        &self,
        id: &str,
        max_depth: usize,
    ) -> Result<Vec<Node>, DatabaseError> {
        let node = self
            .get_node(id)
            .await?
            .ok_or_else(|| DatabaseError::node_not_found(id))?;

        let max_abs_depth = (node.path.depth() as i64)
            .saturating_add(i64::try_from(max_depth).unwrap_or(i64::MAX));

        let rows = self
            .db
            .db_get_descendants(&node.path.storage_key(), max_abs_depth)
            .await?;

        Self::collect_nodes(rows).await
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        self.db.db_close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    async fn create_test_store() -> Result<(SqliteStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        Ok((SqliteStore::new(db), temp_dir))
    }

    fn root_request(title: &str) -> NewNode {
        NewNode::new(NodePayload::Root {
            title: title.to_string(),
        })
    }

    fn branch_request(label: &str, parent_id: &str) -> NewNode {
        NewNode::new(NodePayload::branch(label)).with_parent(parent_id)
    }

    fn leaf_request(url: &str, parent_id: &str) -> NewNode {
        NewNode::new(NodePayload::leaf(url)).with_parent(parent_id)
    }

    #[tokio::test]
    async fn test_create_and_get_root() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("Collection")).await?;

        assert_eq!(root.node_type, NodeType::Root);
        assert!(root.is_root());
        assert_eq!(root.path.segments(), [root.id.clone()]);
        assert_eq!(root.sort_order, 0);

        let fetched = store.get_node(&root.id).await?;
        assert_eq!(fetched, Some(root));

        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_node_is_none() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        assert!(store.get_node("no-such-id").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_child_derives_path_from_parent() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("Collection")).await?;
        let branch = store.create_node(branch_request("B", &root.id)).await?;
        let leaf = store
            .create_node(leaf_request("https://example.com/a.jpg", &branch.id))
            .await?;

        assert_eq!(branch.path, root.path.child(&branch.id));
        assert_eq!(leaf.path, branch.path.child(&leaf.id));
        assert_eq!(leaf.path.segments().len(), 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_with_missing_parent_fails() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let result = store
            .create_node(branch_request("orphan", "no-such-parent"))
            .await;

        assert!(matches!(
            result,
            Err(DatabaseError::ParentNotFound { parent_id }) if parent_id == "no-such-parent"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_payload_keeps_path() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("Before")).await?;
        let updated = store
            .update_payload(
                &root.id,
                &NodePayload::Root {
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
        assert_eq!(updated.path, root.path);
        assert!(updated.updated_at >= root.updated_at);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_payload_unknown_id() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let result = store
            .update_payload(
                "no-such-id",
                &NodePayload::Root {
                    title: "x".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(DatabaseError::NodeNotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_rename_and_sort_order() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("Collection")).await?;

        let renamed = store
            .rename_node(&root.id, Some("My collection".to_string()))
            .await?;
        assert_eq!(renamed.name.as_deref(), Some("My collection"));

        let cleared = store.rename_node(&root.id, None).await?;
        assert!(cleared.name.is_none());

        let reordered = store.set_sort_order(&root.id, 7).await?;
        assert_eq!(reordered.sort_order, 7);

        Ok(())
    }

    #[tokio::test]
    async fn test_move_rewrites_subtree_paths() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("R")).await?;
        let b1 = store.create_node(branch_request("B1", &root.id)).await?;
        let b2 = store.create_node(branch_request("B2", &root.id)).await?;
        let leaf = store
            .create_node(leaf_request("https://example.com/a.jpg", &b1.id))
            .await?;

        store.move_node(&b1.id, Some(&b2.id)).await?;

        let b1_after = store.get_node(&b1.id).await?.unwrap();
        let leaf_after = store.get_node(&leaf.id).await?.unwrap();

        assert_eq!(b1_after.parent_id.as_deref(), Some(b2.id.as_str()));
        assert_eq!(b1_after.path, b2.path.child(&b1.id));
        assert_eq!(leaf_after.path, b1_after.path.child(&leaf.id));
        assert_eq!(
            leaf_after.path.segments(),
            [
                root.id.clone(),
                b2.id.clone(),
                b1.id.clone(),
                leaf.id.clone()
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_move_to_root() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("R")).await?;
        let branch = store.create_node(branch_request("B", &root.id)).await?;

        store.move_node(&branch.id, None).await?;

        let branch_after = store.get_node(&branch.id).await?.unwrap();
        assert!(branch_after.is_root());
        assert_eq!(branch_after.path.segments(), [branch.id.clone()]);

        Ok(())
    }

    #[tokio::test]
    async fn test_move_under_own_descendant_fails_unchanged() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("R")).await?;
        let branch = store.create_node(branch_request("B", &root.id)).await?;
        let grandchild = store.create_node(branch_request("G", &branch.id)).await?;

        let result = store.move_node(&root.id, Some(&grandchild.id)).await;
        assert!(matches!(
            result,
            Err(DatabaseError::CycleDetected { ref node_id, ref ancestor_id })
                if node_id == &root.id && ancestor_id == &grandchild.id
        ));

        // No partial path rewrite
        let root_after = store.get_node(&root.id).await?.unwrap();
        let grandchild_after = store.get_node(&grandchild.id).await?.unwrap();
        assert_eq!(root_after.path, root.path);
        assert_eq!(root_after.parent_id, None);
        assert_eq!(grandchild_after.path, grandchild.path);

        Ok(())
    }

    #[tokio::test]
    async fn test_move_under_self_fails() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("R")).await?;

        let result = store.move_node(&root.id, Some(&root.id)).await;
        assert!(matches!(result, Err(DatabaseError::CycleDetected { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_move_unknown_ids() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("R")).await?;

        let result = store.move_node("no-such-id", Some(&root.id)).await;
        assert!(matches!(result, Err(DatabaseError::NodeNotFound { .. })));

        let result = store.move_node(&root.id, Some("no-such-parent")).await;
        assert!(matches!(
            result,
            Err(DatabaseError::NodeNotFound { id }) if id == "no-such-parent"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_cascades_and_is_idempotent() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("R")).await?;
        let b1 = store.create_node(branch_request("B1", &root.id)).await?;
        let b2 = store.create_node(branch_request("B2", &root.id)).await?;
        let leaf = store
            .create_node(leaf_request("https://example.com/a.jpg", &b1.id))
            .await?;

        let result = store.delete_node(&b1.id).await?;
        assert!(result.existed);
        assert_eq!(result.removed, 2);

        assert!(store.get_node(&b1.id).await?.is_none());
        assert!(store.get_node(&leaf.id).await?.is_none());
        // Sibling and ancestor untouched
        assert!(store.get_node(&b2.id).await?.is_some());
        assert!(store.get_node(&root.id).await?.is_some());

        // Second delete is a no-op
        let result = store.delete_node(&b1.id).await?;
        assert!(!result.existed);
        assert_eq!(result.removed, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_children_ordering() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("R")).await?;
        let first = store
            .create_node(branch_request("first", &root.id).with_sort_order(2))
            .await?;
        let second = store
            .create_node(branch_request("second", &root.id).with_sort_order(1))
            .await?;
        let third = store
            .create_node(branch_request("third", &root.id).with_sort_order(1))
            .await?;

        let children = store.get_children(Some(&root.id)).await?;
        let ids: Vec<&str> = children.iter().map(|n| n.id.as_str()).collect();

        // sort_order first; the tie between `second` and `third` breaks by
        // creation time
        assert_eq!(ids, [&second.id, &third.id, &first.id]);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_children_roots() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root_a = store.create_node(root_request("A")).await?;
        let root_b = store.create_node(root_request("B")).await?;
        store.create_node(branch_request("child", &root_a.id)).await?;

        let roots = store.get_children(None).await?;
        let ids: Vec<&str> = roots.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, [&root_a.id, &root_b.id]);

        Ok(())
    }

    #[tokio::test]
    async fn test_descendants_breadth_first_and_bounded() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("R")).await?;
        let b1 = store.create_node(branch_request("B1", &root.id)).await?;
        let b2 = store.create_node(branch_request("B2", &root.id)).await?;
        let leaf = store
            .create_node(leaf_request("https://example.com/a.jpg", &b1.id))
            .await?;

        let all = store.get_descendants(&root.id, 10).await?;
        let ids: Vec<&str> = all.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, [&root.id, &b1.id, &b2.id, &leaf.id]);

        // Depth 0 is the node itself
        let only_self = store.get_descendants(&root.id, 0).await?;
        assert_eq!(only_self.len(), 1);
        assert_eq!(only_self[0].id, root.id);

        // Depth 1 stops above the leaf
        let one_level = store.get_descendants(&root.id, 1).await?;
        let ids: Vec<&str> = one_level.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, [&root.id, &b1.id, &b2.id]);

        Ok(())
    }

    #[tokio::test]
    async fn test_descendants_unknown_id() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let result = store.get_descendants("no-such-id", 10).await;
        assert!(matches!(result, Err(DatabaseError::NodeNotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_ancestors_self_to_root() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let root = store.create_node(root_request("R")).await?;
        let branch = store.create_node(branch_request("B", &root.id)).await?;
        let leaf = store
            .create_node(leaf_request("https://example.com/a.jpg", &branch.id))
            .await?;

        let ancestors = store.get_ancestors(&leaf.id, None).await?;
        let ids: Vec<&str> = ancestors.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, [&leaf.id, &branch.id, &root.id]);

        // max_hops bounds the walk; hop 0 is the node itself
        let bounded = store.get_ancestors(&leaf.id, Some(1)).await?;
        let ids: Vec<&str> = bounded.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, [&leaf.id, &branch.id]);

        let just_self = store.get_ancestors(&leaf.id, Some(0)).await?;
        assert_eq!(just_self.len(), 1);

        Ok(())
    }
}
