//! Read-through node cache
//!
//! Caches the full row set of each entity. A warm entity answers every
//! `get`/`get_many`/`get_all` without touching storage; a cold one is rebuilt
//! with a single `load_all`. Recomputation diffs are patched into warm
//! entries so they never go stale through `TreeService`.
//!
//! Every invalidation and patch bumps the entity's generation. A read-through
//! load only fills the cache when the generation it started from is still
//! current, so rows loaded before a concurrent write are never cached.

use crate::config::CacheConfig;
use crate::db::TreeStore;
use crate::models::{TreeDiff, TreeKey, TreeNode};
use crate::services::error::TreeServiceError;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Cached rows of one entity, by primary key
pub type CachedRows<K> = Arc<BTreeMap<K, TreeNode<K>>>;

/// Storage for cached entities
pub trait CacheBackend<K>: Send + Sync {
    fn get(&self, entity: &str) -> Option<CachedRows<K>>;

    fn insert(&self, entity: &str, rows: CachedRows<K>);

    fn invalidate(&self, entity: &str);
}

/// Bounded in-process backend
#[derive(Clone)]
pub struct MokaBackend<K: TreeKey> {
    cache: Cache<String, CachedRows<K>>,
}

impl<K: TreeKey> MokaBackend<K> {
    pub fn new(config: &CacheConfig) -> Self {
        let max_capacity = if config.max_entities == 0 {
            1
        } else {
            config.max_entities
        };
        let mut builder = Cache::builder().max_capacity(max_capacity);
        if let Some(ttl) = config.time_to_live_secs {
            builder = builder.time_to_live(Duration::from_secs(ttl));
        }
        Self {
            cache: builder.build(),
        }
    }
}

impl<K: TreeKey> CacheBackend<K> for MokaBackend<K> {
    fn get(&self, entity: &str) -> Option<CachedRows<K>> {
        self.cache.get(entity)
    }

    fn insert(&self, entity: &str, rows: CachedRows<K>) {
        self.cache.insert(entity.to_string(), rows);
    }

    fn invalidate(&self, entity: &str) {
        self.cache.invalidate(entity);
    }
}

/// Read-through cache of entity row sets
#[derive(Clone)]
pub struct NodeCache<K> {
    backend: Arc<dyn CacheBackend<K>>,

    /// Per-entity write generation; also serializes fills against writes
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl<K: TreeKey> NodeCache<K> {
    pub fn new(backend: Arc<dyn CacheBackend<K>>) -> Self {
        Self {
            backend,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Cache over a [`MokaBackend`]
    pub fn with_config(config: &CacheConfig) -> Self {
        Self::new(Arc::new(MokaBackend::new(config)))
    }

    pub fn is_warm(&self, entity: &str) -> bool {
        self.backend.get(entity).is_some()
    }

    /// Every row of `entity`, loading it from `store` when cold
    pub async fn get_all<S>(
        &self,
        entity: &str,
        store: &S,
    ) -> Result<CachedRows<K>, TreeServiceError>
    where
        S: TreeStore<K> + ?Sized,
    {
        if let Some(rows) = self.backend.get(entity) {
            return Ok(rows);
        }
        tracing::debug!(entity, "Node cache miss, loading entity");
        let generation = self.generation(entity);
        let rows = store.load_all(entity).await?;
        self.fill(entity, generation, rows)
    }

    pub async fn get<S>(
        &self,
        entity: &str,
        id: &K,
        store: &S,
    ) -> Result<Option<TreeNode<K>>, TreeServiceError>
    where
        S: TreeStore<K> + ?Sized,
    {
        Ok(self.get_all(entity, store).await?.get(id).cloned())
    }

    /// Rows for `ids` in the order requested; missing ids are skipped
    pub async fn get_many<S>(
        &self,
        entity: &str,
        ids: &[K],
        store: &S,
    ) -> Result<Vec<TreeNode<K>>, TreeServiceError>
    where
        S: TreeStore<K> + ?Sized,
    {
        let rows = self.get_all(entity, store).await?;
        Ok(ids.iter().filter_map(|id| rows.get(id)).cloned().collect())
    }

    /// Replace the cached rows of `entity` and verify the backend kept them.
    ///
    /// # Errors
    ///
    /// [`TreeServiceError::CacheUnavailable`] when the immediate read-back
    /// misses.
    pub fn refresh(
        &self,
        entity: &str,
        rows: Vec<TreeNode<K>>,
    ) -> Result<CachedRows<K>, TreeServiceError> {
        let _generations = self.generations.lock();
        self.insert_rows(entity, rows)
    }

    /// Cache `rows` loaded at `generation`, unless `entity` was written since.
    ///
    /// Stale rows are still returned to the reader that loaded them.
    fn fill(
        &self,
        entity: &str,
        generation: u64,
        rows: Vec<TreeNode<K>>,
    ) -> Result<CachedRows<K>, TreeServiceError> {
        let generations = self.generations.lock();
        if generations.get(entity).copied().unwrap_or(0) != generation {
            tracing::debug!(entity, "Entity written during load, not caching");
            return Ok(Arc::new(by_id(rows)));
        }
        self.insert_rows(entity, rows)
    }

    fn insert_rows(
        &self,
        entity: &str,
        rows: Vec<TreeNode<K>>,
    ) -> Result<CachedRows<K>, TreeServiceError> {
        self.backend.insert(entity, Arc::new(by_id(rows)));
        self.backend
            .get(entity)
            .ok_or_else(|| TreeServiceError::cache_unavailable(entity))
    }

    fn generation(&self, entity: &str) -> u64 {
        self.generations.lock().get(entity).copied().unwrap_or(0)
    }

    pub fn invalidate(&self, entity: &str) {
        let mut generations = self.generations.lock();
        *generations.entry(entity.to_string()).or_insert(0) += 1;
        self.backend.invalidate(entity);
    }

    /// Patch changed fields into a warm entry; cold entries are left cold.
    ///
    /// Either way loads already in flight for `entity` will not be cached.
    /// Returns whether the entry was warm.
    pub fn apply_patch(&self, entity: &str, diff: &TreeDiff<K>) -> bool {
        let mut generations = self.generations.lock();
        *generations.entry(entity.to_string()).or_insert(0) += 1;
        let Some(cached) = self.backend.get(entity) else {
            return false;
        };
        if diff.is_empty() {
            return true;
        }
        let mut rows = (*cached).clone();
        for (id, patch) in diff {
            if let Some(node) = rows.get_mut(id) {
                node.apply_patch(patch);
            }
        }
        self.backend.insert(entity, Arc::new(rows));
        true
    }
}

fn by_id<K: TreeKey>(rows: Vec<TreeNode<K>>) -> BTreeMap<K, TreeNode<K>> {
    rows.into_iter().map(|node| (node.id.clone(), node)).collect()
}
