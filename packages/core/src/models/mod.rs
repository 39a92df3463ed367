//! Data Models
//!
//! This module contains the core data structures used throughout Canopy:
//!
//! - `Node` - typed tree node (root / branch / leaf payload variants)
//! - `NodePath` - materialized ancestor chain, root to self
//! - `NodeTree` - nested subtree assembly of a descendants read
//!
//! All structural derivation (ids, paths, timestamps) happens in the store;
//! the models describe committed state plus creation requests.

mod node;
mod path;
mod tree;

pub(crate) use path::PATH_SEPARATOR;

pub use node::{DeleteResult, NewNode, Node, NodePayload, NodeType, ValidationError};
pub use path::{NodePath, PathError};
pub use tree::NodeTree;
