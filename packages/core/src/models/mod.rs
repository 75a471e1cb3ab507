//! Data Models
//!
//! This module contains the core data structures used throughout TreeIndex:
//!
//! - `TreeNode` - One row of a tree-indexed entity with its derived tree fields
//! - `TreePatch` / `TreeDiff` - Sparse field updates produced by recomputation
//! - `NodeTree` - Nested `{node, tree}` materialization
//! - `TreeKey` - Primary key types accepted by the engine

mod key;
mod node;
mod patch;
mod tree;

pub use key::{KeyProjection, TreeKey};
pub use node::{TreeFields, TreeNode, DEFAULT_DISPLAY_MARK};
pub use patch::{TreeDiff, TreePatch};
pub use tree::{NodeTree, TreeBuilder};
