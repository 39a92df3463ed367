//! Canopy Core Tree Store
//!
//! This crate provides the hierarchical data store at the heart of Canopy: a
//! tree of typed nodes (root / branch / leaf) persisted with a materialized
//! ancestor path for efficient ancestor/descendant queries, ordered sibling
//! traversal, and structural-integrity guarantees (no cycles, no orphaned
//! paths).
//!
//! # Architecture
//!
//! - **Typed payloads**: variant data per node type, checked by the type
//!   system, stored as tagged JSON
//! - **Materialized paths**: every node stores its full ancestor chain,
//!   maintained transactionally on create and move
//! - **libsql/SQLite**: embedded transactional backend; each structural
//!   mutation commits atomically, readers see snapshots under WAL
//!
//! # Modules
//!
//! - [`models`] - Data structures (`Node`, `NodePath`, `NodeTree`, ...)
//! - [`db`] - Database layer: `DatabaseService`, the `TreeStore` trait and
//!   its libsql implementation
//! - [`services`] - `TreeService`, the repository and traversal surface

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use db::*;
pub use models::*;
pub use services::*;
