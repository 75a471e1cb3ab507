//! Tree Events
//!
//! Events emitted by `TreeService` after a write succeeds. They follow the
//! observer pattern: hosts subscribe through a tokio broadcast channel and
//! react to changes without coupling to the storage layer.
//!
//! # Event Flow
//!
//! 1. `TreeService` performs a write (create, save, delete, recomputation)
//! 2. The write commits
//! 3. The event is sent on the broadcast channel
//! 4. Every subscriber receives it asynchronously

use crate::models::{TreeKey, TreeNode};

/// Domain events emitted for tree-indexed entities
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent<K> {
    /// A row was inserted (provisional tree fields)
    NodeCreated(TreeNode<K>),

    /// User fields of a row were saved
    NodeUpdated(TreeNode<K>),

    /// A row was deleted
    NodeDeleted { entity: String, id: K },

    /// A recomputation wrote new tree fields for `changed` rows
    TreeUpdated { entity: String, changed: Vec<K> },

    /// Every row of the entity was deleted
    TreeCleared { entity: String },
}

impl<K: TreeKey> TreeEvent<K> {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            TreeEvent::NodeCreated(_) => "node:created",
            TreeEvent::NodeUpdated(_) => "node:updated",
            TreeEvent::NodeDeleted { .. } => "node:deleted",
            TreeEvent::TreeUpdated { .. } => "tree:updated",
            TreeEvent::TreeCleared { .. } => "tree:cleared",
        }
    }

    /// Entity the event belongs to
    pub fn entity(&self) -> &str {
        match self {
            TreeEvent::NodeCreated(node) | TreeEvent::NodeUpdated(node) => &node.entity,
            TreeEvent::NodeDeleted { entity, .. }
            | TreeEvent::TreeUpdated { entity, .. }
            | TreeEvent::TreeCleared { entity } => entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_and_entity() {
        let created: TreeEvent<u64> = TreeEvent::NodeCreated(TreeNode::new("category", 1, "a"));
        assert_eq!(created.event_type(), "node:created");
        assert_eq!(created.entity(), "category");

        let updated: TreeEvent<u64> = TreeEvent::TreeUpdated {
            entity: "tag".to_string(),
            changed: vec![1, 2],
        };
        assert_eq!(updated.event_type(), "tree:updated");
        assert_eq!(updated.entity(), "tag");

        let cleared: TreeEvent<u64> = TreeEvent::TreeCleared {
            entity: "tag".to_string(),
        };
        assert_eq!(cleared.event_type(), "tree:cleared");
    }
}
