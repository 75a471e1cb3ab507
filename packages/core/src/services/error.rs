//! Service Layer Error Types
//!
//! This module defines the errors raised by `TreeService`. Recomputation and
//! storage errors are passed through unchanged so callers can match on the
//! original variant.

use crate::db::StoreError;
use crate::operations::RecomputeError;
use thiserror::Error;

/// Tree service operation errors
///
/// None of these are retried internally: a structurally invalid tree cannot
/// be fixed by retrying until the caller corrects the data.
#[derive(Error, Debug)]
pub enum TreeServiceError {
    /// `set_parent` to self or to a node of another entity
    #[error("Invalid parent: {reason}")]
    InvalidParent { reason: String },

    /// Priority above the configured maximum
    #[error("Invalid priority {value}: must be between 0 and {max}")]
    InvalidPriority { value: u32, max: u32 },

    /// The cache backend did not retain a write
    #[error("Cache unavailable for '{entity}': written rows could not be read back")]
    CacheUnavailable { entity: String },

    /// Node not found by ID
    #[error("Node not found: {entity}#{id}")]
    NodeNotFound { entity: String, id: String },

    /// A stored id token could not be parsed back into a key
    #[error("Invalid key token '{token}'")]
    InvalidKey { token: String },

    /// Cycle, dangling parent or duplicate row in the snapshot
    #[error(transparent)]
    Recompute(#[from] RecomputeError),

    /// Storage error, propagated as-is
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl TreeServiceError {
    /// Create an invalid parent error
    pub fn invalid_parent(reason: impl Into<String>) -> Self {
        Self::InvalidParent {
            reason: reason.into(),
        }
    }

    /// Create an invalid priority error
    pub fn invalid_priority(value: u32, max: u32) -> Self {
        Self::InvalidPriority { value, max }
    }

    /// Create a cache unavailable error
    pub fn cache_unavailable(entity: impl Into<String>) -> Self {
        Self::CacheUnavailable {
            entity: entity.into(),
        }
    }

    /// Create a node not found error
    pub fn node_not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NodeNotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(token: impl Into<String>) -> Self {
        Self::InvalidKey {
            token: token.into(),
        }
    }

    /// Whether recomputation rejected a cycle
    pub fn is_circular_reference(&self) -> bool {
        matches!(self, Self::Recompute(err) if err.is_circular_reference())
    }

    /// The storage constraint violation behind this error, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(err) => err.downcast_ref::<StoreError>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recompute_errors_pass_through() {
        let err: TreeServiceError = RecomputeError::circular_reference("7").into();
        assert!(err.is_circular_reference());
        assert_eq!(err.to_string(), "Circular reference: node '7' is its own ancestor");
    }

    #[test]
    fn test_store_errors_pass_through() {
        let err: TreeServiceError =
            anyhow::Error::from(StoreError::node_not_found("category", 3)).into();
        assert_eq!(
            err.store_error(),
            Some(&StoreError::node_not_found("category", 3))
        );
        assert!(!err.is_circular_reference());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            TreeServiceError::invalid_priority(10_000, 9999).to_string(),
            "Invalid priority 10000: must be between 0 and 9999"
        );
        assert_eq!(
            TreeServiceError::node_not_found("category", 5).to_string(),
            "Node not found: category#5"
        );
    }
}
