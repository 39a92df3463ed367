//! Database Connection Management
//!
//! This module provides the core database connection, schema initialization,
//! and SQL primitives for the Canopy tree store, using libsql (embedded
//! SQLite).
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf for the database file
//! - **WAL mode**: Write-Ahead Logging so readers see a consistent snapshot
//!   while a structural mutation is in flight
//! - **Foreign keys**: Enabled per connection; the parent edge cascades on
//!   delete
//! - **Single-transaction mutations**: Every structural mutation (create,
//!   move, delete) runs inside one `BEGIN IMMEDIATE ... COMMIT` block, so the
//!   cycle check, path recomputation, and commit can never interleave with a
//!   concurrent writer
//!
//! # Database Connection Patterns
//!
//! Always use `connect_with_timeout()` in async functions: the 5-second busy
//! timeout lets concurrent operations wait and retry instead of failing
//! immediately with `SQLITE_BUSY`, and it enables foreign-key enforcement on
//! the connection. A writer that still cannot acquire the lock surfaces as
//! `DatabaseError::Busy`, which callers may retry.

use crate::db::error::DatabaseError;
use crate::models::{NodePath, PATH_SEPARATOR};
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Column list shared by every node SELECT; `row_to_node` in the store layer
/// decodes rows in exactly this order.
pub(crate) const NODE_COLUMNS: &str =
    "id, node_type, name, parent_id, path, depth, sort_order, payload, created_at, updated_at";

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use canopy_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/canopy.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database connection (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

/// Parameters for node insertion (avoids too-many-arguments lint)
pub struct DbCreateNodeParams<'a> {
    pub id: &'a str,
    pub node_type: &'a str,
    pub name: Option<&'a str>,
    pub parent_id: Option<&'a str>,
    pub sort_order: i64,
    pub payload: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, foreign keys)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        // A fresh database gets a WAL checkpoint after schema creation
        let is_new_database = !db_path.exists();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Create a connection handle to the database
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Create a connection with the busy timeout and foreign keys configured
    ///
    /// Both pragmas are per-connection in SQLite, so every connection used
    /// for real work must go through here.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of
    /// execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates the nodes table and indexes using CREATE TABLE IF NOT EXISTS,
    /// ensuring idempotent initialization (safe to call multiple times).
    ///
    /// # Schema
    ///
    /// - `nodes` table: one row per tree node with the materialized `path`
    ///   (separator-joined ancestor ids) and its segment count in `depth`
    /// - Indexes on parent (child listing), path (subtree prefix scans) and
    ///   node type
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        // Enable WAL mode for better concurrency
        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                node_type TEXT NOT NULL,
                name TEXT,
                parent_id TEXT,
                path TEXT NOT NULL,
                depth INTEGER NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                payload JSON NOT NULL DEFAULT '{}',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                -- Parent deletion cascades to children (tree structure)
                FOREIGN KEY (parent_id) REFERENCES nodes(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create nodes table: {}", e))
        })?;

        self.create_core_indexes(&conn).await?;

        // Flush the schema to disk for newly created databases so rapid
        // open/close cycles in tests never observe a missing table.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        tracing::debug!(path = %self.db_path.display(), "database schema initialized");

        Ok(())
    }

    /// Create core indexes for the nodes table
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        // Child listing and sibling ordering
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id, sort_order)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_nodes_parent': {}",
                e
            ))
        })?;

        // Subtree prefix scans
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_path ON nodes(path)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create index 'idx_nodes_path': {}", e))
        })?;

        // Type filter
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(node_type)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create index 'idx_nodes_type': {}", e))
        })?;

        Ok(())
    }

    /// Insert a new node, deriving its materialized path from the parent
    ///
    /// Runs as one transaction: the parent's current path is read and the
    /// row inserted without any interleaved writer, so the path invariant
    /// holds the instant the node becomes visible.
    ///
    /// # Errors
    ///
    /// - `DatabaseError::ParentNotFound` if `parent_id` is supplied but does
    ///   not exist
    /// - `DatabaseError::Busy` if the write lock cannot be acquired
    pub async fn db_create_node(
        &self,
        params: DbCreateNodeParams<'_>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| DatabaseError::execution("Failed to begin create transaction", e))?;

        match Self::create_in_txn(&conn, params).await {
            Ok(()) => {
                conn.execute("COMMIT", ()).await.map_err(|e| {
                    DatabaseError::execution("Failed to commit create transaction", e)
                })?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn create_in_txn(
        conn: &libsql::Connection,
        params: DbCreateNodeParams<'_>,
    ) -> Result<(), DatabaseError> {
        let path = match params.parent_id {
            Some(parent_id) => {
                let parent_path = Self::path_of(conn, parent_id)
                    .await?
                    .ok_or_else(|| DatabaseError::parent_not_found(parent_id))?;
                parent_path.child(params.id)
            }
            None => NodePath::root(params.id),
        };

        conn.execute(
            "INSERT INTO nodes (id, node_type, name, parent_id, path, depth, sort_order, payload, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                params.id,
                params.node_type,
                params.name,
                params.parent_id,
                path.storage_key(),
                path.depth() as i64,
                params.sort_order,
                params.payload,
                params.created_at,
                params.updated_at,
            ),
        )
        .await
        .map_err(|e| DatabaseError::execution("Failed to insert node", e))?;

        Ok(())
    }

    /// Retrieve a single node row by id
    ///
    /// Returns the raw libsql Row; the store layer converts it to a `Node`.
    pub async fn db_get_node(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM nodes WHERE id = ?",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare get_node query: {}", e))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_node query: {}", e))
        })?;

        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    /// Replace a node's payload; bumps updated_at, never touches path
    ///
    /// Returns the number of affected rows (0 when the id is unknown).
    pub async fn db_update_payload(
        &self,
        id: &str,
        payload: &str,
        updated_at: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE nodes SET payload = ?, updated_at = ? WHERE id = ?",
            (payload, updated_at, id),
        )
        .await
        .map_err(|e| DatabaseError::execution("Failed to update node payload", e))
    }

    /// Update a node's display name
    pub async fn db_rename_node(
        &self,
        id: &str,
        name: Option<&str>,
        updated_at: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE nodes SET name = ?, updated_at = ? WHERE id = ?",
            (name, updated_at, id),
        )
        .await
        .map_err(|e| DatabaseError::execution("Failed to rename node", e))
    }

    /// Update a node's sibling sort order
    pub async fn db_set_sort_order(
        &self,
        id: &str,
        sort_order: i64,
        updated_at: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE nodes SET sort_order = ?, updated_at = ? WHERE id = ?",
            (sort_order, updated_at, id),
        )
        .await
        .map_err(|e| DatabaseError::execution("Failed to set node sort order", e))
    }

    /// Re-parent a node, recomputing the materialized path of the node and
    /// its entire subtree
    ///
    /// Runs as one transaction:
    /// 1. Read the node's and the candidate parent's current paths
    /// 2. Cycle guard: the candidate parent must not be the node itself and
    ///    must not lie inside the node's subtree (sequence-prefix check)
    /// 3. Rewrite the node's `parent_id`, `path`, `depth`, `updated_at`
    /// 4. Rewrite every descendant's path prefix and depth in one UPDATE
    ///
    /// A reader can never observe a node whose `parent_id` and `path`
    /// disagree: both change in the same commit.
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NodeNotFound` if either id is unknown
    /// - `DatabaseError::CycleDetected` if the move would make the node its
    ///   own ancestor; nothing is committed
    /// - `DatabaseError::Busy` if the write lock cannot be acquired
    pub async fn db_move_node(
        &self,
        node_id: &str,
        new_parent_id: Option<&str>,
        updated_at: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| DatabaseError::execution("Failed to begin move transaction", e))?;

        match Self::move_in_txn(&conn, node_id, new_parent_id, updated_at).await {
            Ok(()) => {
                conn.execute("COMMIT", ())
                    .await
                    .map_err(|e| DatabaseError::execution("Failed to commit move transaction", e))?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn move_in_txn(
        conn: &libsql::Connection,
        node_id: &str,
        new_parent_id: Option<&str>,
        updated_at: &str,
    ) -> Result<(), DatabaseError> {
        let old_path = Self::path_of(conn, node_id)
            .await?
            .ok_or_else(|| DatabaseError::node_not_found(node_id))?;

        let new_path = match new_parent_id {
            Some(parent_id) => {
                if parent_id == node_id {
                    return Err(DatabaseError::cycle_detected(node_id, parent_id));
                }

                let parent_path = Self::path_of(conn, parent_id)
                    .await?
                    .ok_or_else(|| DatabaseError::node_not_found(parent_id))?;

                if old_path.is_prefix_of(&parent_path) {
                    return Err(DatabaseError::cycle_detected(node_id, parent_id));
                }

                parent_path.child(node_id)
            }
            None => NodePath::root(node_id),
        };

        let old_key = old_path.storage_key();
        let new_key = new_path.storage_key();
        let depth_delta = new_path.depth() as i64 - old_path.depth() as i64;

        conn.execute(
            "UPDATE nodes SET parent_id = ?, path = ?, depth = ?, updated_at = ? WHERE id = ?",
            (
                new_parent_id,
                new_key.as_str(),
                new_path.depth() as i64,
                updated_at,
                node_id,
            ),
        )
        .await
        .map_err(|e| DatabaseError::execution("Failed to re-parent node", e))?;

        // Descendant paths are prefixed strings: splice the new prefix over
        // the old one. The moved node's own row no longer matches the
        // pattern, so only true descendants are touched.
        conn.execute(
            "UPDATE nodes SET path = ? || substr(path, ?), depth = depth + ? WHERE path LIKE ?",
            (
                new_key.as_str(),
                (old_key.len() + 1) as i64,
                depth_delta,
                format!("{}{}%", old_key, PATH_SEPARATOR),
            ),
        )
        .await
        .map_err(|e| DatabaseError::execution("Failed to rewrite descendant paths", e))?;

        Ok(())
    }

    /// Delete a node and its entire subtree
    ///
    /// Returns the number of removed rows; 0 when the id was already gone
    /// (idempotent).
    pub async fn db_delete_subtree(&self, id: &str) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| DatabaseError::execution("Failed to begin delete transaction", e))?;

        match Self::delete_in_txn(&conn, id).await {
            Ok(removed) => {
                conn.execute("COMMIT", ()).await.map_err(|e| {
                    DatabaseError::execution("Failed to commit delete transaction", e)
                })?;
                Ok(removed)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn delete_in_txn(conn: &libsql::Connection, id: &str) -> Result<u64, DatabaseError> {
        let path = match Self::path_of(conn, id).await? {
            Some(path) => path,
            None => return Ok(0),
        };

        let key = path.storage_key();

        conn.execute(
            "DELETE FROM nodes WHERE path = ? OR path LIKE ?",
            (key.as_str(), format!("{}{}%", key, PATH_SEPARATOR)),
        )
        .await
        .map_err(|e| DatabaseError::execution("Failed to delete subtree", e))
    }

    /// Fetch the children of a node (or the roots, for `None`), ordered by
    /// sort_order, then creation time, then id
    pub async fn db_get_children(
        &self,
        parent_id: Option<&str>,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let rows = if let Some(parent_id) = parent_id {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM nodes WHERE parent_id = ?
                     ORDER BY sort_order ASC, created_at ASC, id ASC",
                    NODE_COLUMNS
                ))
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to prepare get_children query: {}",
                        e
                    ))
                })?;

            stmt.query([parent_id]).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute get_children query: {}", e))
            })?
        } else {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM nodes WHERE parent_id IS NULL
                     ORDER BY sort_order ASC, created_at ASC, id ASC",
                    NODE_COLUMNS
                ))
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to prepare get_roots query: {}",
                        e
                    ))
                })?;

            stmt.query(()).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute get_roots query: {}", e))
            })?
        };

        Ok(rows)
    }

    /// Fetch a subtree by path prefix, bounded by absolute depth
    ///
    /// Rows come back breadth-first (depth ascending) with sibling order
    /// inside each level: sort_order, then creation time, then id.
    pub async fn db_get_descendants(
        &self,
        path_key: &str,
        max_abs_depth: i64,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM nodes
                 WHERE (path = ? OR path LIKE ?) AND depth <= ?
                 ORDER BY depth ASC, sort_order ASC, created_at ASC, id ASC",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to prepare get_descendants query: {}",
                    e
                ))
            })?;

        let rows = stmt
            .query((
                path_key,
                format!("{}{}%", path_key, PATH_SEPARATOR),
                max_abs_depth,
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to execute get_descendants query: {}",
                    e
                ))
            })?;

        Ok(rows)
    }

    /// Checkpoint the WAL so all writes are flushed before shutdown
    pub async fn db_close(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
            .await?;

        // Connection handles are cleaned up on drop; libsql manages the
        // underlying file handles.
        Ok(())
    }

    /// Read a node's materialized path inside the current connection state
    async fn path_of(
        conn: &libsql::Connection,
        id: &str,
    ) -> Result<Option<NodePath>, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT path FROM nodes WHERE id = ?")
            .await
            .map_err(|e| DatabaseError::execution("Failed to prepare path lookup", e))?;

        let mut rows = stmt
            .query([id])
            .await
            .map_err(|e| DatabaseError::execution("Failed to execute path lookup", e))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::execution("Failed to read path lookup row", e))?
        {
            Some(row) => {
                let key: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::row_decode(format!("path: {}", e)))?;
                let path = NodePath::from_storage_key(&key).map_err(|e| {
                    DatabaseError::row_decode(format!("stored path '{}' for node {}: {}", key, id, e))
                })?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }
}
