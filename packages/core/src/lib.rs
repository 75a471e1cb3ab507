//! TreeIndex Core
//!
//! Materialized-path tree indexing for self-referencing tables. Every row of a
//! tree-indexed entity carries precomputed ancestors, children, descendants,
//! siblings, depth, level, index and global order, so tree queries never need
//! recursive lookups.
//!
//! # Architecture
//!
//! - **Full-table recomputation**: every write recomputes the whole entity and
//!   persists only the fields that changed
//! - **Pure engine**: [`operations::recompute`] is a deterministic function of
//!   the snapshot; storage, cache and live references are collaborators
//! - **Fail loudly**: cycles and dangling parents reject the snapshot before
//!   anything is written
//!
//! # Modules
//!
//! - [`models`] - Rows, tree fields, patches and nested trees
//! - [`operations`] - Ordering keys and the recomputation engine
//! - [`db`] - Storage abstraction, in-memory store and events
//! - [`services`] - `TreeService`, cache, live references and trigger
//! - [`config`] - Configuration loaded from JSON
//! - [`utils`] - Id list codec and slugs

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::TreeConfig;
pub use models::*;
pub use services::*;
