//! Storage Error Types
//!
//! Constraint violations raised by the bundled [`MemoryStore`](super::MemoryStore).
//! Other backends may surface their own errors through `anyhow`; these are
//! the ones the in-memory store emulates from a relational schema.

use thiserror::Error;

/// Storage constraint violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row with this primary key
    #[error("Node '{id}' not found in '{entity}'")]
    NodeNotFound { entity: String, id: String },

    /// Primary-key uniqueness violation
    #[error("Duplicate key '{id}' in '{entity}'")]
    DuplicateKey { entity: String, id: String },

    /// Foreign-key violation on `parent_id`
    #[error("Parent '{parent_id}' of node '{id}' not found in '{entity}'")]
    ParentNotFound {
        entity: String,
        id: String,
        parent_id: String,
    },

    /// `parent_id` resolves to a row of another entity
    #[error("Parent '{parent_id}' belongs to '{parent_entity}', not '{entity}'")]
    ParentEntityMismatch {
        entity: String,
        parent_id: String,
        parent_entity: String,
    },
}

impl StoreError {
    /// Create a NodeNotFound error
    pub fn node_not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NodeNotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a DuplicateKey error
    pub fn duplicate_key(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::DuplicateKey {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a ParentNotFound error
    pub fn parent_not_found(
        entity: impl Into<String>,
        id: impl ToString,
        parent_id: impl ToString,
    ) -> Self {
        Self::ParentNotFound {
            entity: entity.into(),
            id: id.to_string(),
            parent_id: parent_id.to_string(),
        }
    }

    /// Create a ParentEntityMismatch error
    pub fn parent_entity_mismatch(
        entity: impl Into<String>,
        parent_id: impl ToString,
        parent_entity: impl Into<String>,
    ) -> Self {
        Self::ParentEntityMismatch {
            entity: entity.into(),
            parent_id: parent_id.to_string(),
            parent_entity: parent_entity.into(),
        }
    }
}
