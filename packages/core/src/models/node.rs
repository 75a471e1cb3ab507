//! Tree Node Data Structures
//!
//! This module defines the `TreeNode` row type and its denormalized
//! [`TreeFields`].
//!
//! # Architecture
//!
//! - **User fields**: `parent_id`, `priority`, `display_text` and `properties`
//!   are the only fields callers ever set.
//! - **Tree fields**: every other column is derived by a full-table
//!   recomputation and written back as a sparse patch. They are never edited by
//!   hand and never mutated incrementally.
//! - **Pure predicates**: `is_ancestor_of`, `is_sibling_of` and friends only
//!   read stored fields; they never touch storage.
//!
//! # Examples
//!
//! ```rust
//! use treeindex_core::models::TreeNode;
//!
//! let root: TreeNode<u64> = TreeNode::new("category", 1, "Root");
//! let child = TreeNode::new("category", 2, "Child").with_parent(1);
//!
//! assert!(root.is_root());
//! assert_eq!(child.parent_id, Some(1));
//! ```

use crate::models::key::TreeKey;
use crate::models::patch::TreePatch;
use crate::utils::{contains_pk, split_pks};
use serde::{Deserialize, Serialize};

/// Default indentation mark used by [`TreeNode::display`]
pub const DEFAULT_DISPLAY_MARK: &str = "— ";

/// Denormalized tree columns of one row.
///
/// Field names are the persisted column names. New rows start with the
/// provisional `Default` values until the recomputation triggered by their
/// own insert overwrites them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeFields {
    /// Delimiter-joined ancestor ids, root first
    pub ancestors_pks: String,
    pub ancestors_count: usize,
    /// Delimiter-joined child ids, in global order
    pub children_pks: String,
    pub children_count: usize,
    /// Delimiter-joined descendant ids, in global order
    pub descendants_pks: String,
    pub descendants_count: usize,
    /// Delimiter-joined sibling ids (self excluded), in global order
    pub siblings_pks: String,
    pub siblings_count: usize,
    /// Height of the subtree rooted here (0 for leaves)
    pub depth: usize,
    /// 1 for roots, +1 per generation
    pub level: usize,
    /// Position among siblings
    pub index: usize,
    /// Position in the global preorder of the whole table
    pub order: usize,
}

/// One row of a tree-indexed entity.
///
/// # Fields
///
/// - `id`: Primary key (integer, string or UUID)
/// - `entity`: Name of the tree-indexed table this row belongs to
/// - `parent_id`: Parent row, `None` for roots
/// - `priority`: Higher priorities sort first among siblings
/// - `display_text`: Used for deterministic ordering and text rendering
/// - `properties`: The host row's own columns
/// - `fields`: Derived tree columns (flattened into the row when serialized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "K: TreeKey")]
pub struct TreeNode<K> {
    pub id: K,

    pub entity: String,

    pub parent_id: Option<K>,

    #[serde(default)]
    pub priority: u32,

    #[serde(default)]
    pub display_text: String,

    #[serde(default)]
    pub properties: serde_json::Value,

    #[serde(flatten)]
    pub fields: TreeFields,
}

impl<K: TreeKey> TreeNode<K> {
    /// Create a root node with default priority and provisional tree fields
    pub fn new(entity: impl Into<String>, id: K, display_text: impl Into<String>) -> Self {
        Self {
            id,
            entity: entity.into(),
            parent_id: None,
            priority: 0,
            display_text: display_text.into(),
            properties: serde_json::Value::Null,
            fields: TreeFields::default(),
        }
    }

    /// Set the parent reference
    pub fn with_parent(mut self, parent_id: K) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the sibling priority
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach the host row's own columns
    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    /// Overwrite only the tree fields carried by `patch`.
    pub fn apply_patch(&mut self, patch: &TreePatch) {
        patch.apply(&mut self.fields);
    }

    /// Reset tree fields to their provisional values (used on insert)
    pub fn reset_tree_fields(&mut self) {
        self.fields = TreeFields::default();
    }

    //
    // STORED ACCESSORS
    //

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn depth(&self) -> usize {
        self.fields.depth
    }

    pub fn level(&self) -> usize {
        self.fields.level
    }

    pub fn index(&self) -> usize {
        self.fields.index
    }

    pub fn order(&self) -> usize {
        self.fields.order
    }

    pub fn ancestors_count(&self) -> usize {
        self.fields.ancestors_count
    }

    pub fn children_count(&self) -> usize {
        self.fields.children_count
    }

    pub fn descendants_count(&self) -> usize {
        self.fields.descendants_count
    }

    pub fn siblings_count(&self) -> usize {
        self.fields.siblings_count
    }

    /// Ancestor id tokens, root first
    pub fn ancestor_ids(&self) -> Vec<String> {
        split_pks(&self.fields.ancestors_pks)
    }

    pub fn children_ids(&self) -> Vec<String> {
        split_pks(&self.fields.children_pks)
    }

    pub fn descendant_ids(&self) -> Vec<String> {
        split_pks(&self.fields.descendants_pks)
    }

    pub fn sibling_ids(&self) -> Vec<String> {
        split_pks(&self.fields.siblings_pks)
    }

    /// Id token of the tree root this node belongs to (itself for roots)
    pub fn root_id(&self) -> String {
        self.ancestor_ids()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.id.to_string())
    }

    //
    // PREDICATES
    //

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.fields.children_count == 0
    }

    pub fn is_first_child(&self) -> bool {
        self.fields.index == 0
    }

    pub fn is_last_child(&self) -> bool {
        self.fields.index == self.fields.siblings_count
    }

    /// True when `self` appears anywhere in `other`'s ancestor chain.
    pub fn is_ancestor_of(&self, other: &TreeNode<K>) -> bool {
        self.entity == other.entity
            && self.id != other.id
            && contains_pk(&other.fields.ancestors_pks, &self.id.to_string())
    }

    pub fn is_descendant_of(&self, other: &TreeNode<K>) -> bool {
        other.is_ancestor_of(self)
    }

    /// True only for the immediate parent, not more distant ancestors.
    pub fn is_parent_of(&self, other: &TreeNode<K>) -> bool {
        self.is_ancestor_of(other)
            && other.ancestor_ids().last() == Some(&self.id.to_string())
    }

    pub fn is_child_of(&self, other: &TreeNode<K>) -> bool {
        other.is_parent_of(self)
    }

    /// Siblings share the exact same ancestor chain.
    pub fn is_sibling_of(&self, other: &TreeNode<K>) -> bool {
        self.entity == other.entity
            && self.id != other.id
            && self.fields.ancestors_pks == other.fields.ancestors_pks
    }

    pub fn is_root_of(&self, other: &TreeNode<K>) -> bool {
        self.is_root() && self.is_ancestor_of(other)
    }

    //
    // DISPLAY
    //

    /// Display text, or the id when no display text is set
    pub fn display_text_or_id(&self) -> String {
        if self.display_text.is_empty() {
            self.id.to_string()
        } else {
            self.display_text.clone()
        }
    }

    /// Render the node for a text tree, indented by `mark` once per ancestor.
    pub fn display(&self, indent: bool, mark: &str) -> String {
        let indentation = if indent {
            mark.repeat(self.fields.ancestors_count)
        } else {
            String::new()
        };
        format!("{}{}", indentation, self.display_text_or_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::join_pks;
    use serde_json::json;

    fn node(id: u64, ancestors: &[u64]) -> TreeNode<u64> {
        let mut node = TreeNode::new("category", id, format!("n{}", id));
        node.parent_id = ancestors.last().copied();
        node.fields.ancestors_pks = join_pks(ancestors);
        node.fields.ancestors_count = ancestors.len();
        node.fields.level = ancestors.len() + 1;
        node
    }

    #[test]
    fn test_ancestor_predicates() {
        let a = node(1, &[]);
        let aa = node(2, &[1]);
        let aaa = node(3, &[1, 2]);

        assert!(a.is_ancestor_of(&aa));
        assert!(a.is_ancestor_of(&aaa));
        assert!(!aa.is_ancestor_of(&a));
        assert!(!a.is_ancestor_of(&a));

        assert!(aaa.is_descendant_of(&a));
        assert!(aaa.is_descendant_of(&aa));
        assert!(!a.is_descendant_of(&aaa));
    }

    #[test]
    fn test_parent_predicates_only_match_immediate_parent() {
        let a = node(1, &[]);
        let aa = node(2, &[1]);
        let aaa = node(3, &[1, 2]);

        assert!(a.is_parent_of(&aa));
        assert!(!a.is_parent_of(&aaa));
        assert!(aa.is_parent_of(&aaa));
        assert!(aaa.is_child_of(&aa));
        assert!(!aaa.is_child_of(&a));
    }

    #[test]
    fn test_sibling_and_root_predicates() {
        let a = node(1, &[]);
        let b = node(4, &[]);
        let aa = node(2, &[1]);
        let ab = node(5, &[1]);
        let ba = node(6, &[4]);

        assert!(a.is_sibling_of(&b));
        assert!(aa.is_sibling_of(&ab));
        assert!(!aa.is_sibling_of(&ba));
        assert!(!aa.is_sibling_of(&aa));

        assert!(a.is_root_of(&aa));
        assert!(!a.is_root_of(&ba));
        assert!(!aa.is_root_of(&ab));
    }

    #[test]
    fn test_predicates_require_same_entity() {
        let a = node(1, &[]);
        let mut other = node(2, &[1]);
        other.entity = "tag".to_string();
        assert!(!a.is_ancestor_of(&other));

        let mut foreign_root = node(3, &[]);
        foreign_root.entity = "tag".to_string();
        assert!(!a.is_sibling_of(&foreign_root));
    }

    #[test]
    fn test_first_and_last_child() {
        let mut first = node(1, &[]);
        first.fields.siblings_count = 2;
        first.fields.index = 0;
        let mut last = node(3, &[]);
        last.fields.siblings_count = 2;
        last.fields.index = 2;

        assert!(first.is_first_child());
        assert!(!first.is_last_child());
        assert!(last.is_last_child());
        assert!(!last.is_first_child());
    }

    #[test]
    fn test_display_indents_per_ancestor() {
        let aaa = node(3, &[1, 2]);
        assert_eq!(aaa.display(true, DEFAULT_DISPLAY_MARK), "— — n3");
        assert_eq!(aaa.display(false, DEFAULT_DISPLAY_MARK), "n3");

        let unnamed: TreeNode<u64> = TreeNode::new("category", 9, "");
        assert_eq!(unnamed.display(true, "-"), "9");
    }

    #[test]
    fn test_root_id() {
        assert_eq!(node(1, &[]).root_id(), "1");
        assert_eq!(node(3, &[1, 2]).root_id(), "1");
    }

    #[test]
    fn test_serialized_row_uses_stable_column_names() {
        let aa = node(2, &[1]).with_properties(json!({"name": "aa"}));
        let value = serde_json::to_value(&aa).unwrap();

        assert_eq!(value["parent_id"], 1);
        assert_eq!(value["ancestors_pks"], "1");
        assert_eq!(value["ancestors_count"], 1);
        assert_eq!(value["level"], 2);
        assert_eq!(value["properties"]["name"], "aa");

        let back: TreeNode<u64> = serde_json::from_value(value).unwrap();
        assert_eq!(back, aa);
    }
}
