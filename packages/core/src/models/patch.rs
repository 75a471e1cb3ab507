//! Sparse tree-field patches
//!
//! A recomputation emits one [`TreePatch`] per row whose tree fields actually
//! changed. The same patch is applied to storage, to the cache and to every
//! live in-memory copy of the row, so only the changed columns are ever
//! overwritten.

use crate::models::node::TreeFields;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Changed tree fields of every affected row, keyed by primary key.
///
/// Rows whose recomputed fields equal their stored fields are absent.
pub type TreeDiff<K> = BTreeMap<K, TreePatch>;

/// Sparse update of the derived tree fields.
///
/// `None` means "unchanged"; serialized patches only contain the changed
/// columns, under their persisted names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestors_pks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestors_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_pks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descendants_pks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descendants_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub siblings_pks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub siblings_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

/// `Some(new)` when the value changed, `None` otherwise
fn changed<T: PartialEq + Clone>(current: &T, recomputed: &T) -> Option<T> {
    if current == recomputed {
        None
    } else {
        Some(recomputed.clone())
    }
}

fn overwrite<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

impl TreePatch {
    /// Build the patch that turns `current` into `recomputed`.
    pub fn between(current: &TreeFields, recomputed: &TreeFields) -> Self {
        Self {
            ancestors_pks: changed(&current.ancestors_pks, &recomputed.ancestors_pks),
            ancestors_count: changed(&current.ancestors_count, &recomputed.ancestors_count),
            children_pks: changed(&current.children_pks, &recomputed.children_pks),
            children_count: changed(&current.children_count, &recomputed.children_count),
            descendants_pks: changed(&current.descendants_pks, &recomputed.descendants_pks),
            descendants_count: changed(
                &current.descendants_count,
                &recomputed.descendants_count,
            ),
            siblings_pks: changed(&current.siblings_pks, &recomputed.siblings_pks),
            siblings_count: changed(&current.siblings_count, &recomputed.siblings_count),
            depth: changed(&current.depth, &recomputed.depth),
            level: changed(&current.level, &recomputed.level),
            index: changed(&current.index, &recomputed.index),
            order: changed(&current.order, &recomputed.order),
        }
    }

    /// Overwrite only the fields this patch carries.
    pub fn apply(&self, fields: &mut TreeFields) {
        overwrite(&mut fields.ancestors_pks, &self.ancestors_pks);
        overwrite(&mut fields.ancestors_count, &self.ancestors_count);
        overwrite(&mut fields.children_pks, &self.children_pks);
        overwrite(&mut fields.children_count, &self.children_count);
        overwrite(&mut fields.descendants_pks, &self.descendants_pks);
        overwrite(&mut fields.descendants_count, &self.descendants_count);
        overwrite(&mut fields.siblings_pks, &self.siblings_pks);
        overwrite(&mut fields.siblings_count, &self.siblings_count);
        overwrite(&mut fields.depth, &self.depth);
        overwrite(&mut fields.level, &self.level);
        overwrite(&mut fields.index, &self.index);
        overwrite(&mut fields.order, &self.order);
    }

    /// Names of the columns this patch changes
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let flags = [
            ("ancestors_pks", self.ancestors_pks.is_some()),
            ("ancestors_count", self.ancestors_count.is_some()),
            ("children_pks", self.children_pks.is_some()),
            ("children_count", self.children_count.is_some()),
            ("descendants_pks", self.descendants_pks.is_some()),
            ("descendants_count", self.descendants_count.is_some()),
            ("siblings_pks", self.siblings_pks.is_some()),
            ("siblings_count", self.siblings_count.is_some()),
            ("depth", self.depth.is_some()),
            ("level", self.level.is_some()),
            ("index", self.index.is_some()),
            ("order", self.order.is_some()),
        ];
        flags
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(children: &str, children_count: usize, depth: usize) -> TreeFields {
        TreeFields {
            children_pks: children.to_string(),
            children_count,
            depth,
            level: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_between_identical_fields_is_empty() {
        let current = fields("2,3", 2, 1);
        let patch = TreePatch::between(&current, &current.clone());
        assert!(patch.is_empty());
    }

    #[test]
    fn test_between_only_carries_changed_fields() {
        let current = fields("2,3", 2, 1);
        let recomputed = fields("3", 1, 1);
        let patch = TreePatch::between(&current, &recomputed);

        assert_eq!(patch.children_pks.as_deref(), Some("3"));
        assert_eq!(patch.children_count, Some(1));
        assert_eq!(patch.depth, None);
        assert_eq!(patch.changed_fields(), vec!["children_pks", "children_count"]);
    }

    #[test]
    fn test_apply_leaves_untouched_fields_alone() {
        let mut target = fields("2,3", 2, 4);
        target.order = 7;
        let patch = TreePatch {
            children_pks: Some(String::new()),
            children_count: Some(0),
            ..Default::default()
        };
        patch.apply(&mut target);

        assert_eq!(target.children_pks, "");
        assert_eq!(target.children_count, 0);
        assert_eq!(target.depth, 4);
        assert_eq!(target.order, 7);
    }

    #[test]
    fn test_serialized_patch_only_contains_changed_columns() {
        let patch = TreePatch {
            index: Some(0),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({ "index": 0 }));
    }
}
