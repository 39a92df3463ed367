//! Business Services
//!
//! This module contains the core business logic:
//!
//! - `TreeService` - node repository operations and tree traversal
//!
//! Services coordinate between the database layer and application logic,
//! implementing validation and the public error taxonomy.

pub mod error;
pub mod tree_service;

pub use error::TreeServiceError;
pub use tree_service::{TreeService, DEFAULT_TRAVERSAL_DEPTH};
