//! Utility functions for TreeIndex Core
//!
//! This module provides the small, dependency-free helpers shared by the
//! ordering key builder and the persisted tree fields.

mod pks;
mod slug;

pub use pks::{contains_pk, join_pks, split_pks, PKS_SEPARATOR};
pub use slug::slugify;
