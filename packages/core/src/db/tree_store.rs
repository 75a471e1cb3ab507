//! TreeStore Trait - Storage Abstraction Layer
//!
//! This module defines the `TreeStore` trait that abstracts persistence of
//! tree-indexed rows. `TreeService` only talks to storage through it, so any
//! relational or embedded backend can be plugged in.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so both embedded and network
//!    backends fit
//! 2. **Atomic batches**: `set_parents`, `apply_patches` and `delete_nodes`
//!    apply all rows or none
//! 3. **Error Handling**: Uses `anyhow::Result` so transport errors reach the
//!    caller untouched
//! 4. **Tables by entity**: Every method is scoped to one entity; rows of
//!    different entities never reference each other
//!
//! # Examples
//!
//! ```rust
//! use treeindex_core::db::{MemoryStore, TreeStore};
//! use treeindex_core::models::TreeNode;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store: MemoryStore<u64> = MemoryStore::new();
//! store.insert_node(TreeNode::new("category", 1, "Root")).await?;
//! store.insert_node(TreeNode::new("category", 2, "Child").with_parent(1)).await?;
//!
//! assert_eq!(store.load_all("category").await?.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::models::{TreeDiff, TreeKey, TreeNode};
use anyhow::Result;
use async_trait::async_trait;

/// Abstraction layer for tree-indexed row persistence
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow usage in async contexts where
/// futures may be moved between threads.
#[async_trait]
pub trait TreeStore<K: TreeKey>: Send + Sync {
    //
    // READS
    //

    /// Every row of `entity`; the order is unspecified
    async fn load_all(&self, entity: &str) -> Result<Vec<TreeNode<K>>>;

    /// Get a row by primary key
    ///
    /// # Returns
    ///
    /// - `Ok(Some(node))` if the row exists
    /// - `Ok(None)` if it doesn't (not an error)
    async fn get_node(&self, entity: &str, id: &K) -> Result<Option<TreeNode<K>>>;

    /// Rows for `ids`, in the order requested; missing ids are skipped
    async fn get_nodes(&self, entity: &str, ids: &[K]) -> Result<Vec<TreeNode<K>>>;

    async fn contains(&self, entity: &str, id: &K) -> Result<bool>;

    //
    // USER FIELD WRITES
    //

    /// Insert a new row with provisional tree fields
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The primary key already exists
    /// - `parent_id` does not resolve to a row of the same entity
    async fn insert_node(&self, node: TreeNode<K>) -> Result<TreeNode<K>>;

    /// Write the user-settable fields of an existing row
    ///
    /// Only `parent_id`, `priority`, `display_text` and `properties` are
    /// written; stored tree fields are left untouched.
    ///
    /// # Errors
    ///
    /// Returns error if the row doesn't exist or `parent_id` is dangling.
    async fn update_node(&self, node: &TreeNode<K>) -> Result<TreeNode<K>>;

    /// Reassign parents of several rows in one transaction
    async fn set_parents(&self, entity: &str, moves: &[(K, Option<K>)]) -> Result<()>;

    //
    // TREE FIELD WRITES
    //

    /// Apply a recomputation diff in one transaction
    ///
    /// Only the fields carried by each patch are overwritten.
    async fn apply_patches(&self, entity: &str, diff: &TreeDiff<K>) -> Result<()>;

    //
    // DELETES
    //

    /// Delete rows in one transaction, returning how many existed
    async fn delete_nodes(&self, entity: &str, ids: &[K]) -> Result<usize>;

    /// Delete every row of `entity`, returning how many existed
    async fn delete_all(&self, entity: &str) -> Result<usize>;
}
