//! Nested subtree assembly.
//!
//! `NodeTree` turns the flat, breadth-first node list a descendants read
//! produces into the nested parent/children shape frontends consume.

use crate::models::node::Node;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node together with its (transitively) nested children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    pub node: Node,
    #[serde(default)]
    pub children: Vec<NodeTree>,
}

impl NodeTree {
    /// Assemble a nested tree from a flat breadth-first node list.
    ///
    /// The first element is taken as the subtree root; every other element
    /// must appear after its parent (which a descendants read guarantees).
    /// Child order follows the input order, so the store's sibling ordering
    /// is preserved. Returns `None` for an empty list.
    pub fn from_nodes(nodes: Vec<Node>) -> Option<NodeTree> {
        let mut iter = nodes.into_iter();
        let root = iter.next()?;

        let mut children_of: HashMap<String, Vec<Node>> = HashMap::new();
        for node in iter {
            // Descendants of the subtree root always have a parent
            if let Some(parent_id) = node.parent_id.clone() {
                children_of.entry(parent_id).or_default().push(node);
            }
        }

        Some(Self::attach(root, &mut children_of))
    }

    fn attach(node: Node, children_of: &mut HashMap<String, Vec<Node>>) -> NodeTree {
        let children = children_of
            .remove(&node.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| Self::attach(child, children_of))
            .collect();

        NodeTree { node, children }
    }

    /// Height of this subtree: 0 when there are no children
    pub fn depth(&self) -> usize {
        if self.children.is_empty() {
            0
        } else {
            1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
        }
    }

    /// Total number of nodes in this subtree, including self
    pub fn count_nodes(&self) -> usize {
        1 + self.children.iter().map(|c| c.count_nodes()).sum::<usize>()
    }

    /// Find a node in this subtree by id
    pub fn find(&self, id: &str) -> Option<&NodeTree> {
        if self.node.id == id {
            Some(self)
        } else {
            self.children.iter().find_map(|c| c.find(id))
        }
    }

    /// Collect all resource leaves in this subtree, in traversal order
    pub fn collect_leaves(&self) -> Vec<&Node> {
        if self.node.is_leaf() {
            vec![&self.node]
        } else {
            self.children
                .iter()
                .flat_map(|c| c.collect_leaves())
                .collect()
        }
    }
}
