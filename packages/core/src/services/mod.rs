//! Business Services
//!
//! This module contains the tree-indexing service and its collaborators:
//!
//! - `TreeService` - lifecycle, queries, structural mutations and `update_tree`
//! - `NodeCache` - read-through cache of entity row sets (moka by default)
//! - `LiveRegistry` - weak references to live node handles, patched in place
//! - `RecomputeTrigger` - scoped suppression and per-entity serialization
//!
//! Services coordinate between the storage layer and the pure recomputation
//! engine in `operations`.

pub mod error;
pub mod live_refs;
pub mod node_cache;
pub mod tree_service;
pub mod trigger;

pub use error::TreeServiceError;
pub use live_refs::{LiveRegistry, NodeHandle};
pub use node_cache::{CacheBackend, CachedRows, MokaBackend, NodeCache};
pub use tree_service::TreeService;
pub use trigger::{RecomputeTrigger, SuppressionGuard};
