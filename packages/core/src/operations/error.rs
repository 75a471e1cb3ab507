//! Error types for tree recomputation
//!
//! Every variant is fatal: the snapshot is structurally invalid, no diff is
//! produced, and retrying cannot succeed until the offending rows are fixed.

use thiserror::Error;

/// Errors that reject a snapshot before any diff is produced
///
/// # Examples
///
/// ```rust
/// use treeindex_core::operations::RecomputeError;
///
/// let err = RecomputeError::circular_reference("42");
/// assert_eq!(err.to_string(), "Circular reference: node '42' is its own ancestor");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecomputeError {
    /// Following `parent_id` from this node never reaches a root
    #[error("Circular reference: node '{node_id}' is its own ancestor")]
    CircularReference { node_id: String },

    /// A `parent_id` points at a row missing from the snapshot
    ///
    /// The storage layer is expected to enforce the foreign key; reaching this
    /// means that constraint was bypassed.
    #[error("Referential integrity violation: node '{node_id}' references missing parent '{parent_id}'")]
    ReferentialIntegrity { node_id: String, parent_id: String },

    /// The snapshot contains two rows with the same primary key
    #[error("Duplicate node '{node_id}' in snapshot")]
    DuplicateNode { node_id: String },
}

impl RecomputeError {
    /// Create a CircularReference error
    pub fn circular_reference(node_id: impl Into<String>) -> Self {
        Self::CircularReference {
            node_id: node_id.into(),
        }
    }

    /// Create a ReferentialIntegrity error
    pub fn referential_integrity(node_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self::ReferentialIntegrity {
            node_id: node_id.into(),
            parent_id: parent_id.into(),
        }
    }

    /// Create a DuplicateNode error
    pub fn duplicate_node(node_id: impl Into<String>) -> Self {
        Self::DuplicateNode {
            node_id: node_id.into(),
        }
    }

    /// Whether this is a cycle in the parent links
    pub fn is_circular_reference(&self) -> bool {
        matches!(self, Self::CircularReference { .. })
    }
}
