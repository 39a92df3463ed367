//! Database Layer
//!
//! This module handles all database interactions using libsql (embedded
//! SQLite):
//!
//! - Database initialization and connection management
//! - The `nodes` table with its materialized path column
//! - Transactional structural mutations (create, move, delete)
//!
//! # Architecture
//!
//! `DatabaseService` owns the connection and every SQL statement.
//! `SqliteStore` implements the `TreeStore` trait over it; the service layer
//! only ever talks to the trait, so the backend can be swapped without
//! touching business logic.

mod database;
mod error;
mod sqlite_store;
mod tree_store;

pub use database::{DatabaseService, DbCreateNodeParams};
pub use error::DatabaseError;
pub use sqlite_store::SqliteStore;
pub use tree_store::TreeStore;
