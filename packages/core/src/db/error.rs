//! Database Error Types
//!
//! This module defines error types for database operations, providing
//! clear error handling for connection, initialization, and query failures,
//! plus the structural-integrity conditions the transactional mutations
//! detect (missing rows, cycles, write contention).

use std::path::PathBuf;
use thiserror::Error;

/// Database operation errors
///
/// Covers connection, initialization, and query failures, and the typed
/// integrity conditions raised inside mutation transactions. The service
/// layer maps the integrity variants onto its public error taxonomy.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A stored row could not be decoded into a model
    #[error("Failed to decode stored row: {context}")]
    RowDecodeError { context: String },

    /// Payload serialization failed
    #[error("Failed to serialize payload: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// A mutation referenced a node id that does not exist
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// A create referenced a parent id that does not exist
    #[error("Parent node not found: {parent_id}")]
    ParentNotFound { parent_id: String },

    /// A re-parent would make a node its own ancestor
    #[error("Cycle detected: node {node_id} cannot be parented under {ancestor_id}")]
    CycleDetected {
        node_id: String,
        ancestor_id: String,
    },

    /// Write contention: another transaction held the database past the busy
    /// timeout. Safe for the caller to retry.
    #[error("Database is busy: {context}")]
    Busy { context: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a row decode error with context
    pub fn row_decode(context: impl Into<String>) -> Self {
        Self::RowDecodeError {
            context: context.into(),
        }
    }

    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a parent not found error
    pub fn parent_not_found(parent_id: impl Into<String>) -> Self {
        Self::ParentNotFound {
            parent_id: parent_id.into(),
        }
    }

    /// Create a cycle detected error
    pub fn cycle_detected(node_id: impl Into<String>, ancestor_id: impl Into<String>) -> Self {
        Self::CycleDetected {
            node_id: node_id.into(),
            ancestor_id: ancestor_id.into(),
        }
    }

    /// Triage a libsql execution failure: lock contention becomes `Busy`
    /// (retryable), everything else a contextual SQL error.
    pub(crate) fn execution(context: impl Into<String>, source: libsql::Error) -> Self {
        Self::from_execution_context(format!("{}: {}", context.into(), source))
    }

    fn from_execution_context(context: String) -> Self {
        let lower = context.to_lowercase();
        if lower.contains("busy") || lower.contains("locked") {
            Self::Busy { context }
        } else {
            Self::SqlExecutionError { context }
        }
    }
}
