//! Nested tree materialization
//!
//! Builds `{node, tree: [...]}` structures from flat rows by following each
//! row's stored `children_pks`. This is a pure in-memory build over rows that
//! were already resolved; it never recomputes anything.

use crate::models::key::TreeKey;
use crate::models::node::TreeNode;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A node together with its nested children, in stored child order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "K: TreeKey")]
pub struct NodeTree<K> {
    pub node: TreeNode<K>,
    pub tree: Vec<NodeTree<K>>,
}

impl<K: TreeKey> NodeTree<K> {
    /// Ids of this node and all nested nodes, in preorder
    pub fn preorder_ids(&self) -> Vec<K> {
        let mut ids = vec![self.node.id.clone()];
        for child in &self.tree {
            ids.extend(child.preorder_ids());
        }
        ids
    }
}

/// Lookup of candidate rows by their id token
pub struct TreeBuilder<K> {
    by_token: HashMap<String, TreeNode<K>>,
}

impl<K: TreeKey> TreeBuilder<K> {
    /// Index the candidate rows; rows absent here are skipped while building.
    pub fn new(nodes: impl IntoIterator<Item = TreeNode<K>>) -> Self {
        let by_token = nodes
            .into_iter()
            .map(|node| (node.id.to_string(), node))
            .collect();
        Self { by_token }
    }

    /// Nested trees for every candidate at level 1, in order.
    pub fn forest(&self) -> Vec<NodeTree<K>> {
        let mut roots: Vec<&TreeNode<K>> = self
            .by_token
            .values()
            .filter(|node| node.fields.ancestors_count == 0)
            .collect();
        roots.sort_by_key(|node| node.fields.order);

        let mut visited = HashSet::new();
        roots
            .into_iter()
            .map(|root| self.subtree(root, &mut visited))
            .collect()
    }

    /// Nested trees of the children of `node`, following its `children_pks`.
    pub fn children_of(&self, node: &TreeNode<K>) -> Vec<NodeTree<K>> {
        let mut visited = HashSet::from([node.id.to_string()]);
        self.children_trees(node, &mut visited)
    }

    fn subtree(&self, node: &TreeNode<K>, visited: &mut HashSet<String>) -> NodeTree<K> {
        visited.insert(node.id.to_string());
        NodeTree {
            node: node.clone(),
            tree: self.children_trees(node, visited),
        }
    }

    fn children_trees(
        &self,
        node: &TreeNode<K>,
        visited: &mut HashSet<String>,
    ) -> Vec<NodeTree<K>> {
        let mut trees = Vec::new();
        for child_token in node.children_ids() {
            // Stale child lists must not loop forever
            if visited.contains(&child_token) {
                continue;
            }
            if let Some(child) = self.by_token.get(&child_token) {
                trees.push(self.subtree(child, visited));
            }
        }
        trees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, order: usize, ancestors: usize, children: &str) -> TreeNode<u64> {
        let mut node = TreeNode::new("category", id, format!("n{}", id));
        node.fields.order = order;
        node.fields.ancestors_count = ancestors;
        node.fields.children_pks = children.to_string();
        node
    }

    fn sample() -> Vec<TreeNode<u64>> {
        vec![
            node(1, 0, 0, "2,3"),
            node(2, 1, 1, "4"),
            node(4, 2, 2, ""),
            node(3, 3, 1, ""),
            node(5, 4, 0, ""),
        ]
    }

    #[test]
    fn test_forest_follows_children_pks() {
        let forest = TreeBuilder::new(sample()).forest();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].node.id, 1);
        assert_eq!(forest[0].preorder_ids(), vec![1, 2, 4, 3]);
        assert_eq!(forest[1].node.id, 5);
        assert!(forest[1].tree.is_empty());
    }

    #[test]
    fn test_children_of_skips_missing_candidates() {
        let rows: Vec<_> = sample().into_iter().filter(|n| n.id != 4).collect();
        let builder = TreeBuilder::new(rows);
        let root = node(1, 0, 0, "2,3");
        let trees = builder.children_of(&root);

        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].node.id, 2);
        assert!(trees[0].tree.is_empty());
    }

    #[test]
    fn test_stale_cycle_in_children_does_not_recurse_forever() {
        let rows = vec![node(1, 0, 0, "2"), node(2, 1, 1, "1")];
        let forest = TreeBuilder::new(rows).forest();
        assert_eq!(forest[0].preorder_ids(), vec![1, 2]);
    }
}
