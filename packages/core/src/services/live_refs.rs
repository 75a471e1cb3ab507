//! Live node references
//!
//! Callers hold [`NodeHandle`]s to rows they loaded. After every
//! recomputation the changed tree fields are patched into each handle still
//! alive, so callers never observe stale fields and keep the same object.

use crate::models::{TreeDiff, TreeKey, TreeNode};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Shared, mutable in-memory copy of one row
pub type NodeHandle<K> = Arc<RwLock<TreeNode<K>>>;

type WeakHandle<K> = Weak<RwLock<TreeNode<K>>>;

/// Weak references to every live handle, per entity and primary key
pub struct LiveRegistry<K> {
    instances: Mutex<HashMap<String, HashMap<K, Vec<WeakHandle<K>>>>>,
}

impl<K: TreeKey> Default for LiveRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TreeKey> LiveRegistry<K> {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Wrap `node` in a new tracked handle
    pub fn register(&self, node: TreeNode<K>) -> NodeHandle<K> {
        let handle = Arc::new(RwLock::new(node));
        self.track(&handle);
        handle
    }

    /// Start tracking an existing handle; tracking twice is a no-op
    pub fn track(&self, handle: &NodeHandle<K>) {
        let (entity, id) = {
            let node = handle.read();
            (node.entity.clone(), node.id.clone())
        };
        let weak = Arc::downgrade(handle);

        let mut instances = self.instances.lock();
        let refs = instances.entry(entity).or_default().entry(id).or_default();
        if !refs.iter().any(|existing| existing.ptr_eq(&weak)) {
            refs.push(weak);
        }
    }

    /// Run `f` on every live copy of `(entity, id)`
    pub fn for_each_live_instance<F>(&self, entity: &str, id: &K, mut f: F)
    where
        F: FnMut(&mut TreeNode<K>),
    {
        // Upgrade under the registry lock, mutate after releasing it
        let live: Vec<NodeHandle<K>> = {
            let mut instances = self.instances.lock();
            let Some(by_id) = instances.get_mut(entity) else {
                return;
            };
            let Some(refs) = by_id.get_mut(id) else {
                return;
            };
            refs.retain(|weak| weak.strong_count() > 0);
            let live = refs.iter().filter_map(Weak::upgrade).collect();
            if refs.is_empty() {
                by_id.remove(id);
            }
            live
        };

        for handle in live {
            let mut node = handle.write();
            f(&mut *node);
        }
    }

    /// Overwrite only the changed tree fields on every live copy
    pub fn apply_patch(&self, entity: &str, diff: &TreeDiff<K>) {
        for (id, patch) in diff {
            self.for_each_live_instance(entity, id, |node| node.apply_patch(patch));
        }
    }

    /// Stop tracking deleted rows of `entity`
    pub fn forget(&self, entity: &str, ids: &[K]) {
        let mut instances = self.instances.lock();
        if let Some(by_id) = instances.get_mut(entity) {
            for id in ids {
                by_id.remove(id);
            }
        }
    }

    /// Forget every handle of `entity`
    pub fn clear(&self, entity: &str) {
        self.instances.lock().remove(entity);
    }

    /// Number of live handles of `entity`, pruning dead references
    pub fn live_count(&self, entity: &str) -> usize {
        let mut instances = self.instances.lock();
        let Some(by_id) = instances.get_mut(entity) else {
            return 0;
        };
        by_id.retain(|_, refs| {
            refs.retain(|weak| weak.strong_count() > 0);
            !refs.is_empty()
        });
        by_id.values().map(Vec::len).sum()
    }
}
