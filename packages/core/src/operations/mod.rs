//! Tree Operations
//!
//! Pure computations over a snapshot of one tree-indexed entity. Nothing here
//! touches storage; `services::TreeService` loads the snapshot, runs
//! [`recompute`] and persists the resulting diff.

pub mod error;
pub mod ordering;
pub mod recompute;

pub use error::RecomputeError;
pub use ordering::OrderingKeyBuilder;
pub use recompute::{compute_fields, recompute, RecomputeOutcome};
