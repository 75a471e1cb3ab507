//! Storage Layer
//!
//! This module holds everything `TreeService` needs from persistence:
//!
//! - `TreeStore` - the async storage abstraction
//! - `MemoryStore` - an in-memory backend enforcing relational constraints
//! - `TreeEvent` - domain events emitted after successful writes

mod error;
pub mod events;
mod memory_store;
mod tree_store;

pub use error::StoreError;
pub use events::TreeEvent;
pub use memory_store::MemoryStore;
pub use tree_store::TreeStore;
