//! In-memory TreeStore
//!
//! Emulates a relational table per entity: primary-key uniqueness, the
//! `parent_id` foreign key and all-or-nothing batch writes. Used by tests and
//! by hosts that keep their trees in memory.

use crate::db::error::StoreError;
use crate::db::tree_store::TreeStore;
use crate::models::{TreeDiff, TreeKey, TreeNode};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

type Table<K> = BTreeMap<K, TreeNode<K>>;

/// TreeStore backed by one ordered map per entity
pub struct MemoryStore<K> {
    tables: RwLock<HashMap<String, Table<K>>>,

    /// Rows written by `apply_patches` since creation
    patched_rows: AtomicUsize,
}

impl<K: TreeKey> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TreeKey> MemoryStore<K> {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            patched_rows: AtomicUsize::new(0),
        }
    }

    /// Number of row writes performed by `apply_patches` so far
    pub fn patched_rows(&self) -> usize {
        self.patched_rows.load(Ordering::Relaxed)
    }

    /// Number of rows of `entity`
    pub async fn len(&self, entity: &str) -> usize {
        self.tables
            .read()
            .await
            .get(entity)
            .map(|table| table.len())
            .unwrap_or(0)
    }

    /// Overwrite `parent_id` without any validation.
    ///
    /// Emulates bulk updates that bypass the normal write path; the next
    /// recomputation is what catches cycles or dangling parents.
    pub async fn raw_set_parent(&self, entity: &str, id: &K, parent_id: Option<K>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(entity)
            .and_then(|table| table.get_mut(id))
            .ok_or_else(|| StoreError::node_not_found(entity, id))?;
        row.parent_id = parent_id;
        Ok(())
    }
}

/// Enforce the `parent_id` foreign key of `id` within `entity`.
fn check_parent<K: TreeKey>(
    tables: &HashMap<String, Table<K>>,
    entity: &str,
    id: &K,
    parent_id: Option<&K>,
) -> Result<(), StoreError> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    if tables
        .get(entity)
        .is_some_and(|table| table.contains_key(parent_id))
    {
        return Ok(());
    }
    let foreign = tables
        .iter()
        .find(|(name, table)| name.as_str() != entity && table.contains_key(parent_id));
    match foreign {
        Some((parent_entity, _)) => Err(StoreError::parent_entity_mismatch(
            entity,
            parent_id,
            parent_entity.clone(),
        )),
        None => Err(StoreError::parent_not_found(entity, id, parent_id)),
    }
}

#[async_trait]
impl<K: TreeKey> TreeStore<K> for MemoryStore<K> {
    async fn load_all(&self, entity: &str) -> Result<Vec<TreeNode<K>>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(entity)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_node(&self, entity: &str, id: &K) -> Result<Option<TreeNode<K>>> {
        let tables = self.tables.read().await;
        Ok(tables.get(entity).and_then(|table| table.get(id)).cloned())
    }

    async fn get_nodes(&self, entity: &str, ids: &[K]) -> Result<Vec<TreeNode<K>>> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| table.get(id)).cloned().collect())
    }

    async fn contains(&self, entity: &str, id: &K) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(entity)
            .is_some_and(|table| table.contains_key(id)))
    }

    async fn insert_node(&self, mut node: TreeNode<K>) -> Result<TreeNode<K>> {
        let mut tables = self.tables.write().await;
        if tables
            .get(&node.entity)
            .is_some_and(|table| table.contains_key(&node.id))
        {
            return Err(StoreError::duplicate_key(&node.entity, &node.id).into());
        }
        check_parent(&tables, &node.entity, &node.id, node.parent_id.as_ref())?;

        node.reset_tree_fields();
        tables
            .entry(node.entity.clone())
            .or_default()
            .insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn update_node(&self, node: &TreeNode<K>) -> Result<TreeNode<K>> {
        let mut tables = self.tables.write().await;
        check_parent(&tables, &node.entity, &node.id, node.parent_id.as_ref())?;

        let row = tables
            .get_mut(&node.entity)
            .and_then(|table| table.get_mut(&node.id))
            .ok_or_else(|| StoreError::node_not_found(&node.entity, &node.id))?;
        row.parent_id = node.parent_id.clone();
        row.priority = node.priority;
        row.display_text = node.display_text.clone();
        row.properties = node.properties.clone();
        Ok(row.clone())
    }

    async fn set_parents(&self, entity: &str, moves: &[(K, Option<K>)]) -> Result<()> {
        let mut tables = self.tables.write().await;

        // Validate everything before the first write
        for (id, parent_id) in moves {
            let exists = tables
                .get(entity)
                .is_some_and(|table| table.contains_key(id));
            if !exists {
                return Err(StoreError::node_not_found(entity, id).into());
            }
            check_parent(&tables, entity, id, parent_id.as_ref())?;
        }

        if let Some(table) = tables.get_mut(entity) {
            for (id, parent_id) in moves {
                if let Some(row) = table.get_mut(id) {
                    row.parent_id = parent_id.clone();
                }
            }
        }
        Ok(())
    }

    async fn apply_patches(&self, entity: &str, diff: &TreeDiff<K>) -> Result<()> {
        if diff.is_empty() {
            return Ok(());
        }
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(entity)
            .ok_or_else(|| StoreError::node_not_found(entity, "*"))?;

        if let Some(missing) = diff.keys().find(|id| !table.contains_key(*id)) {
            return Err(StoreError::node_not_found(entity, missing).into());
        }
        for (id, patch) in diff {
            if let Some(row) = table.get_mut(id) {
                row.apply_patch(patch);
            }
        }
        self.patched_rows.fetch_add(diff.len(), Ordering::Relaxed);
        Ok(())
    }

    async fn delete_nodes(&self, entity: &str, ids: &[K]) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(entity) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| table.remove(*id).is_some()).count())
    }

    async fn delete_all(&self, entity: &str) -> Result<usize> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove(entity).map(|table| table.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TreePatch;

    const ENTITY: &str = "category";

    async fn seeded() -> MemoryStore<u64> {
        let store = MemoryStore::new();
        store.insert_node(TreeNode::new(ENTITY, 1, "a")).await.unwrap();
        store
            .insert_node(TreeNode::new(ENTITY, 2, "aa").with_parent(1))
            .await
            .unwrap();
        store
    }

    fn store_error(err: anyhow::Error) -> StoreError {
        err.downcast::<StoreError>().unwrap()
    }

    #[tokio::test]
    async fn test_insert_enforces_keys() {
        let store = seeded().await;

        let duplicate = store.insert_node(TreeNode::new(ENTITY, 1, "again")).await;
        assert_eq!(
            store_error(duplicate.unwrap_err()),
            StoreError::duplicate_key(ENTITY, 1)
        );

        let dangling = store
            .insert_node(TreeNode::new(ENTITY, 3, "x").with_parent(99))
            .await;
        assert_eq!(
            store_error(dangling.unwrap_err()),
            StoreError::parent_not_found(ENTITY, 3, 99)
        );
        assert_eq!(store.len(ENTITY).await, 2);
    }

    #[tokio::test]
    async fn test_parent_from_another_entity_is_rejected() {
        let store = seeded().await;
        store.insert_node(TreeNode::new("tag", 10, "t")).await.unwrap();

        let err = store
            .insert_node(TreeNode::new(ENTITY, 3, "x").with_parent(10))
            .await
            .unwrap_err();
        assert_eq!(
            store_error(err),
            StoreError::parent_entity_mismatch(ENTITY, 10, "tag")
        );
    }

    #[tokio::test]
    async fn test_insert_resets_tree_fields() {
        let store: MemoryStore<u64> = MemoryStore::new();
        let mut node = TreeNode::new(ENTITY, 1, "a");
        node.fields.order = 42;
        node.fields.children_pks = "7".to_string();

        let stored = store.insert_node(node).await.unwrap();
        assert_eq!(stored.order(), 0);
        assert!(stored.children_ids().is_empty());
    }

    #[tokio::test]
    async fn test_update_only_writes_user_fields() {
        let store = seeded().await;
        store
            .apply_patches(
                ENTITY,
                &TreeDiff::from([(
                    1,
                    TreePatch {
                        children_pks: Some("2".to_string()),
                        ..Default::default()
                    },
                )]),
            )
            .await
            .unwrap();

        let mut a = store.get_node(ENTITY, &1).await.unwrap().unwrap();
        a.display_text = "renamed".to_string();
        a.priority = 5;
        a.fields.children_pks = String::new();

        let updated = store.update_node(&a).await.unwrap();
        assert_eq!(updated.display_text, "renamed");
        assert_eq!(updated.priority, 5);
        assert_eq!(updated.fields.children_pks, "2");
    }

    #[tokio::test]
    async fn test_set_parents_is_all_or_nothing() {
        let store = seeded().await;
        store.insert_node(TreeNode::new(ENTITY, 3, "b")).await.unwrap();

        let result = store
            .set_parents(ENTITY, &[(3, Some(1)), (2, Some(99))])
            .await;
        assert!(result.is_err());
        let b = store.get_node(ENTITY, &3).await.unwrap().unwrap();
        assert_eq!(b.parent_id, None);

        store
            .set_parents(ENTITY, &[(3, Some(1)), (2, None)])
            .await
            .unwrap();
        let rows = store.get_nodes(ENTITY, &[3, 2]).await.unwrap();
        assert_eq!(rows[0].parent_id, Some(1));
        assert_eq!(rows[1].parent_id, None);
    }

    #[tokio::test]
    async fn test_apply_patches_rejects_unknown_rows() {
        let store = seeded().await;
        let diff = TreeDiff::from([
            (1, TreePatch { depth: Some(1), ..Default::default() }),
            (99, TreePatch { depth: Some(0), ..Default::default() }),
        ]);
        assert!(store.apply_patches(ENTITY, &diff).await.is_err());

        let a = store.get_node(ENTITY, &1).await.unwrap().unwrap();
        assert_eq!(a.depth(), 0);
        assert_eq!(store.patched_rows(), 0);
    }

    #[tokio::test]
    async fn test_raw_set_parent_skips_validation() {
        let store = seeded().await;
        store.raw_set_parent(ENTITY, &1, Some(2)).await.unwrap();
        let a = store.get_node(ENTITY, &1).await.unwrap().unwrap();
        assert_eq!(a.parent_id, Some(2));
    }

    #[tokio::test]
    async fn test_deletes() {
        let store = seeded().await;
        assert_eq!(store.delete_nodes(ENTITY, &[2, 99]).await.unwrap(), 1);
        assert!(!store.contains(ENTITY, &2).await.unwrap());
        assert_eq!(store.delete_all(ENTITY).await.unwrap(), 1);
        assert!(store.load_all(ENTITY).await.unwrap().is_empty());
    }
}
