//! Tree Service - Tree-Indexed Entity Operations
//!
//! This module is the facade every host goes through:
//!
//! - Lifecycle (create, save, get, all, refresh) of rows held as live handles
//! - Query surface resolving stored id lists into rows (ancestors, children,
//!   descendants, siblings, roots, nested trees, text displays)
//! - Structural mutations (set_parent, set_priority, delete, delete_tree)
//! - `update_tree`, the full-table recomputation every write ends with
//!
//! # Write Path
//!
//! 1. A new parent link is checked against the stored links; one that would
//!    close a cycle is rejected before anything is written
//! 2. The user fields are persisted through the `TreeStore`
//! 3. The cache entry of the entity is invalidated
//! 4. Unless the host suppressed it, `update_tree` runs for the entity: load snapshot,
//!    recompute, apply the diff atomically, then patch the cache and every
//!    live handle
//! 5. Events are emitted after each successful write
//!
//! Multi-step mutations (`set_parent`, `delete`) persist every step first and
//! recompute once at the end; they never suppress other writers.
//!
//! Writes that bypass the service (bulk SQL, migrations) must call
//! [`TreeService::on_commit`] afterwards and invalidate the cache.

use crate::config::TreeConfig;
use crate::db::{TreeEvent, TreeStore};
use crate::models::{NodeTree, TreeBuilder, TreeKey, TreeNode, DEFAULT_DISPLAY_MARK};
use crate::operations::{recompute, RecomputeError, RecomputeOutcome};
use crate::services::error::TreeServiceError;
use crate::services::live_refs::{LiveRegistry, NodeHandle};
use crate::services::node_cache::NodeCache;
use crate::services::trigger::{RecomputeTrigger, SuppressionGuard};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, OwnedMutexGuard};

type Result<T> = std::result::Result<T, TreeServiceError>;

/// Facade over one storage backend for any number of tree-indexed entities
///
/// Query methods return plain row snapshots; `create`, `get` and `all` return
/// live [`NodeHandle`]s whose tree fields are kept current by every
/// recomputation.
///
/// # Examples
///
/// ```rust
/// use treeindex_core::db::MemoryStore;
/// use treeindex_core::models::TreeNode;
/// use treeindex_core::services::TreeService;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let service = TreeService::new(Arc::new(MemoryStore::<u64>::new()));
///
/// let root = service.create(TreeNode::new("category", 1, "Root")).await?;
/// let child = service
///     .create(TreeNode::new("category", 2, "Child").with_parent(1))
///     .await?;
///
/// assert_eq!(root.read().children_count(), 1);
/// assert_eq!(child.read().level(), 2);
/// # Ok(())
/// # }
/// ```
pub struct TreeService<K: TreeKey, S: TreeStore<K>> {
    store: Arc<S>,

    config: TreeConfig,

    /// Read-through cache of entity row sets
    cache: NodeCache<K>,

    /// Handles returned to callers, patched after each recomputation
    live: Arc<LiveRegistry<K>>,

    /// Suppression and per-entity serialization of `update_tree`
    trigger: RecomputeTrigger,

    event_tx: broadcast::Sender<TreeEvent<K>>,
}

// Manual Clone: S itself doesn't need to be Clone
impl<K: TreeKey, S: TreeStore<K>> Clone for TreeService<K, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            cache: self.cache.clone(),
            live: self.live.clone(),
            trigger: self.trigger.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

impl<K: TreeKey, S: TreeStore<K>> TreeService<K, S> {
    /// Create a service with the default configuration
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, TreeConfig::default())
    }

    /// Create a service with a moka-backed cache sized from `config`
    pub fn with_config(store: Arc<S>, config: TreeConfig) -> Self {
        let cache = NodeCache::with_config(&config.cache);
        Self::with_cache(store, config, cache)
    }

    /// Create a service over a custom cache backend
    pub fn with_cache(store: Arc<S>, config: TreeConfig, cache: NodeCache<K>) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            store,
            config,
            cache,
            live: Arc::new(LiveRegistry::new()),
            trigger: RecomputeTrigger::new(),
            event_tx,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn cache(&self) -> &NodeCache<K> {
        &self.cache
    }

    pub fn live_refs(&self) -> &Arc<LiveRegistry<K>> {
        &self.live
    }

    /// Subscribe to tree events
    ///
    /// ```rust
    /// # use treeindex_core::db::MemoryStore;
    /// # use treeindex_core::services::TreeService;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let service = TreeService::new(Arc::new(MemoryStore::<u64>::new()));
    /// let mut rx = service.subscribe_to_events();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = rx.recv().await {
    ///         println!("Event: {}", event.event_type());
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<TreeEvent<K>> {
        self.event_tx.subscribe()
    }

    /// Ignores errors if there are no subscribers
    fn emit_event(&self, event: TreeEvent<K>) {
        let _ = self.event_tx.send(event);
    }

    /// Suppress recomputation of `entity` while the guard lives.
    ///
    /// Meant for host bulk loads. Suppression covers every writer of the
    /// entity, so writes made meanwhile return with provisional tree fields
    /// until the first trigger after the guard is dropped, or an explicit
    /// `update_tree`.
    pub fn suppress_recompute(&self, entity: &str) -> SuppressionGuard {
        self.trigger.suppress(entity)
    }

    fn check_priority(&self, priority: u32) -> Result<()> {
        let max = self.config.ordering.max_priority;
        if priority > max {
            return Err(TreeServiceError::invalid_priority(priority, max));
        }
        Ok(())
    }

    /// Serialize user-field writes and recomputations of `entity`
    async fn lock_entity(&self, entity: &str) -> OwnedMutexGuard<()> {
        self.trigger.entity_lock(entity).lock_owned().await
    }

    //
    // LIFECYCLE
    //

    /// Insert a new row and recompute its entity
    pub async fn create(&self, node: TreeNode<K>) -> Result<NodeHandle<K>> {
        self.check_priority(node.priority)?;
        let entity = node.entity.clone();

        let serialized = self.lock_entity(&entity).await;
        let stored = self.store.insert_node(node).await?;
        self.cache.invalidate(&entity);
        drop(serialized);
        self.emit_event(TreeEvent::NodeCreated(stored.clone()));

        let handle = self.live.register(stored);
        self.on_commit(&entity).await?;
        Ok(handle)
    }

    /// Persist the user fields of `handle` (inserting it when new) and
    /// recompute its entity
    ///
    /// # Errors
    ///
    /// `Recompute(CircularReference)` when the new `parent_id` is the node
    /// itself or one of its stored descendants; nothing is persisted.
    pub async fn save(&self, handle: &NodeHandle<K>) -> Result<()> {
        let entity = self.persist(handle).await?;
        self.on_commit(&entity).await?;
        Ok(())
    }

    /// Write the user fields of `handle` without recomputing, returning its
    /// entity
    async fn persist(&self, handle: &NodeHandle<K>) -> Result<String> {
        let node = handle.read().clone();
        self.check_priority(node.priority)?;

        // The cycle check and the write share the entity lock
        let _serialized = self.lock_entity(&node.entity).await;
        self.check_acyclic(&node).await?;

        if self.store.contains(&node.entity, &node.id).await? {
            let stored = self.store.update_node(&node).await?;
            self.emit_event(TreeEvent::NodeUpdated(stored));
        } else {
            let stored = self.store.insert_node(node.clone()).await?;
            handle.write().fields = stored.fields.clone();
            self.emit_event(TreeEvent::NodeCreated(stored));
        }
        self.live.track(handle);
        self.cache.invalidate(&node.entity);
        Ok(node.entity)
    }

    /// Reject a `parent_id` that would make `node` its own ancestor
    async fn check_acyclic(&self, node: &TreeNode<K>) -> Result<()> {
        let Some(parent_id) = &node.parent_id else {
            return Ok(());
        };
        let closes_cycle = if parent_id == &node.id {
            true
        } else {
            let snapshot = self.store.load_all(&node.entity).await?;
            chain_reaches(&snapshot, parent_id, &node.id)
        };
        if closes_cycle {
            tracing::warn!(
                "Rejected parent '{}' for '{}' in '{}': cycle",
                parent_id,
                node.id,
                node.entity
            );
            return Err(RecomputeError::circular_reference(node.id.to_string()).into());
        }
        Ok(())
    }

    /// Load a row as a live handle
    pub async fn get(&self, entity: &str, id: &K) -> Result<NodeHandle<K>> {
        let node = self
            .store
            .get_node(entity, id)
            .await?
            .ok_or_else(|| TreeServiceError::node_not_found(entity, id))?;
        Ok(self.live.register(node))
    }

    /// Every row of `entity` as live handles, in global order
    pub async fn all(&self, entity: &str) -> Result<Vec<NodeHandle<K>>> {
        let mut nodes = self.store.load_all(entity).await?;
        nodes.sort_by_key(|node| node.order());
        Ok(nodes.into_iter().map(|node| self.live.register(node)).collect())
    }

    /// Reload `handle` in place from storage
    pub async fn refresh(&self, handle: &NodeHandle<K>) -> Result<()> {
        let (entity, id) = {
            let node = handle.read();
            (node.entity.clone(), node.id.clone())
        };
        let fresh = self
            .store
            .get_node(&entity, &id)
            .await?
            .ok_or_else(|| TreeServiceError::node_not_found(&entity, &id))?;
        *handle.write() = fresh;
        self.live.track(handle);
        Ok(())
    }

    //
    // RECOMPUTATION
    //

    /// Post-commit hook: recompute `entity` unless recomputation is suppressed.
    ///
    /// Hosts writing rows outside the service call this after their commit;
    /// it doubles as the post-migration hook.
    pub async fn on_commit(&self, entity: &str) -> Result<Option<RecomputeOutcome<K>>> {
        if self.trigger.is_suppressed(entity) {
            tracing::debug!("Recomputation of '{}' suppressed", entity);
            return Ok(None);
        }
        self.update_tree(entity).await.map(Some)
    }

    /// Recompute every tree field of `entity` and persist the changed ones.
    ///
    /// Recomputations of the same entity are serialized; different entities
    /// run independently.
    ///
    /// # Errors
    ///
    /// - `Recompute(CircularReference)` / `Recompute(ReferentialIntegrity)`
    ///   when the stored parent links are invalid; nothing is written
    /// - `Store` when loading or applying the diff fails
    pub async fn update_tree(&self, entity: &str) -> Result<RecomputeOutcome<K>> {
        let _serialized = self.lock_entity(entity).await;
        let started = Instant::now();

        let nodes = self.store.load_all(entity).await?;
        let outcome = recompute(&nodes, &self.config.ordering).map_err(|err| {
            tracing::warn!("Recomputation of '{}' rejected: {}", entity, err);
            err
        })?;

        if !outcome.is_unchanged() {
            self.store.apply_patches(entity, &outcome.diff).await?;
            self.cache.apply_patch(entity, &outcome.diff);
            self.live.apply_patch(entity, &outcome.diff);
            self.emit_event(TreeEvent::TreeUpdated {
                entity: entity.to_string(),
                changed: outcome.diff.keys().cloned().collect(),
            });
        }

        tracing::debug!(
            entity,
            nodes = nodes.len(),
            changed = outcome.changed_rows(),
            elapsed = ?started.elapsed(),
            "Tree updated"
        );
        Ok(outcome)
    }

    //
    // STRUCTURAL MUTATIONS
    //

    /// Move `handle` under `parent` (or make it a root with `None`).
    ///
    /// An unsaved parent is persisted first. When `parent` is currently a
    /// descendant of `handle`, it is first promoted to `handle`'s current
    /// parent so no cycle is ever written.
    ///
    /// # Errors
    ///
    /// `InvalidParent` when `parent` belongs to another entity or is the node
    /// itself; nothing is persisted in that case.
    pub async fn set_parent(
        &self,
        handle: &NodeHandle<K>,
        parent: Option<&NodeHandle<K>>,
    ) -> Result<()> {
        let node = handle.read().clone();
        let entity = node.entity.clone();

        let parent_node = parent.map(|p| p.read().clone());
        if let Some(parent_node) = &parent_node {
            if parent_node.entity != node.entity {
                return Err(TreeServiceError::invalid_parent(format!(
                    "parent belongs to '{}', node to '{}'",
                    parent_node.entity, node.entity
                )));
            }
            if parent_node.id == node.id {
                return Err(TreeServiceError::invalid_parent(format!(
                    "node '{}' cannot be its own parent",
                    node.id
                )));
            }
        }

        if let (Some(parent), Some(parent_node)) = (parent, &parent_node) {
            if !self.store.contains(&entity, &parent_node.id).await? {
                self.persist(parent).await?;
            }
            self.promote_if_descendant(&entity, &node.id, &parent_node.id)
                .await?;
        }
        handle.write().parent_id = parent_node.map(|p| p.id);
        self.persist(handle).await?;

        self.on_commit(&entity).await?;
        Ok(())
    }

    /// Reassign `candidate` to `node_id`'s stored parent when it is currently
    /// one of `node_id`'s descendants.
    async fn promote_if_descendant(&self, entity: &str, node_id: &K, candidate: &K) -> Result<()> {
        let snapshot = self.store.load_all(entity).await?;
        if candidate == node_id || !chain_reaches(&snapshot, candidate, node_id) {
            return Ok(());
        }

        let promoted_parent = snapshot
            .iter()
            .find(|row| &row.id == node_id)
            .and_then(|row| row.parent_id.clone());
        tracing::debug!(
            "Promoting '{}' to parent {:?} before moving '{}' under it",
            candidate,
            promoted_parent,
            node_id
        );
        self.store
            .set_parents(entity, &[(candidate.clone(), promoted_parent.clone())])
            .await?;
        self.live.for_each_live_instance(entity, candidate, |row| {
            row.parent_id = promoted_parent.clone();
        });
        self.cache.invalidate(entity);
        Ok(())
    }

    /// Set the sibling priority of `handle` and recompute
    ///
    /// # Errors
    ///
    /// `InvalidPriority` above the configured maximum; nothing is persisted.
    pub async fn set_priority(&self, handle: &NodeHandle<K>, priority: u32) -> Result<()> {
        self.check_priority(priority)?;
        handle.write().priority = priority;
        self.save(handle).await
    }

    /// Delete `handle`'s row, returning how many rows were removed.
    ///
    /// With `cascade` the whole subtree goes; otherwise the direct children
    /// are first reparented to the node's own parent (or become roots).
    pub async fn delete(&self, handle: &NodeHandle<K>, cascade: bool) -> Result<usize> {
        let (entity, id) = {
            let node = handle.read();
            (node.entity.clone(), node.id.clone())
        };

        let serialized = self.lock_entity(&entity).await;
        let snapshot = self.store.load_all(&entity).await?;
        let stored = snapshot
            .iter()
            .find(|row| row.id == id)
            .ok_or_else(|| TreeServiceError::node_not_found(&entity, &id))?;

        let (removed, doomed) = if cascade {
            let doomed = subtree_ids(&snapshot, &id);
            let removed = self.store.delete_nodes(&entity, &doomed).await?;
            (removed, doomed)
        } else {
            let new_parent = stored.parent_id.clone();
            let moves: Vec<(K, Option<K>)> = snapshot
                .iter()
                .filter(|row| row.parent_id.as_ref() == Some(&id))
                .map(|row| (row.id.clone(), new_parent.clone()))
                .collect();
            self.store.set_parents(&entity, &moves).await?;
            for (child_id, _) in &moves {
                self.live.for_each_live_instance(&entity, child_id, |row| {
                    row.parent_id = new_parent.clone();
                });
            }

            let removed = self.store.delete_nodes(&entity, &[id.clone()]).await?;
            (removed, vec![id])
        };
        self.live.forget(&entity, &doomed);
        self.cache.invalidate(&entity);
        drop(serialized);
        for doomed_id in doomed {
            self.emit_event(TreeEvent::NodeDeleted {
                entity: entity.clone(),
                id: doomed_id,
            });
        }

        self.on_commit(&entity).await?;
        Ok(removed)
    }

    /// Delete every row of `entity` and forget its cache and live handles.
    ///
    /// No recomputation runs: an empty table has nothing to recompute.
    pub async fn delete_tree(&self, entity: &str) -> Result<usize> {
        let _serialized = self.lock_entity(entity).await;

        let removed = self.store.delete_all(entity).await?;
        self.cache.invalidate(entity);
        self.live.clear(entity);

        tracing::info!(entity, removed, "Tree deleted");
        self.emit_event(TreeEvent::TreeCleared {
            entity: entity.to_string(),
        });
        Ok(removed)
    }

    //
    // QUERIES
    //

    /// Fetch rows by id through the cache or straight from storage
    pub async fn get_nodes(
        &self,
        entity: &str,
        ids: &[K],
        prefer_cache: bool,
    ) -> Result<Vec<TreeNode<K>>> {
        if prefer_cache {
            self.cache.get_many(entity, ids, self.store.as_ref()).await
        } else {
            Ok(self.store.get_nodes(entity, ids).await?)
        }
    }

    /// Every row of `entity`, in global order
    pub async fn get_all_nodes(&self, entity: &str, prefer_cache: bool) -> Result<Vec<TreeNode<K>>> {
        let mut nodes: Vec<TreeNode<K>> = if prefer_cache {
            self.cache
                .get_all(entity, self.store.as_ref())
                .await?
                .values()
                .cloned()
                .collect()
        } else {
            self.store.load_all(entity).await?
        };
        nodes.sort_by_key(|node| node.order());
        Ok(nodes)
    }

    /// Parse stored id tokens and fetch the rows, preserving token order
    async fn resolve(
        &self,
        entity: &str,
        tokens: Vec<String>,
        prefer_cache: bool,
    ) -> Result<Vec<TreeNode<K>>> {
        let ids = tokens
            .iter()
            .map(|token| K::from_token(token).ok_or_else(|| TreeServiceError::invalid_key(token)))
            .collect::<Result<Vec<K>>>()?;
        self.get_nodes(entity, &ids, prefer_cache).await
    }

    /// Ancestors, root first
    pub async fn get_ancestors(
        &self,
        handle: &NodeHandle<K>,
        prefer_cache: bool,
    ) -> Result<Vec<TreeNode<K>>> {
        let node = handle.read().clone();
        self.resolve(&node.entity, node.ancestor_ids(), prefer_cache)
            .await
    }

    pub async fn get_children(
        &self,
        handle: &NodeHandle<K>,
        prefer_cache: bool,
    ) -> Result<Vec<TreeNode<K>>> {
        let node = handle.read().clone();
        self.resolve(&node.entity, node.children_ids(), prefer_cache)
            .await
    }

    pub async fn get_descendants(
        &self,
        handle: &NodeHandle<K>,
        prefer_cache: bool,
    ) -> Result<Vec<TreeNode<K>>> {
        let node = handle.read().clone();
        self.resolve(&node.entity, node.descendant_ids(), prefer_cache)
            .await
    }

    pub async fn get_siblings(
        &self,
        handle: &NodeHandle<K>,
        prefer_cache: bool,
    ) -> Result<Vec<TreeNode<K>>> {
        let node = handle.read().clone();
        self.resolve(&node.entity, node.sibling_ids(), prefer_cache)
            .await
    }

    /// Immediate parent, `None` for roots
    pub async fn get_parent(
        &self,
        handle: &NodeHandle<K>,
        prefer_cache: bool,
    ) -> Result<Option<TreeNode<K>>> {
        let node = handle.read().clone();
        let Some(parent_id) = node.parent_id else {
            return Ok(None);
        };
        let parent = self
            .get_nodes(&node.entity, std::slice::from_ref(&parent_id), prefer_cache)
            .await?
            .pop()
            .ok_or_else(|| TreeServiceError::node_not_found(&node.entity, &parent_id))?;
        Ok(Some(parent))
    }

    /// Root of the tree `handle` belongs to (the node itself for roots)
    pub async fn get_root(&self, handle: &NodeHandle<K>, prefer_cache: bool) -> Result<TreeNode<K>> {
        let node = handle.read().clone();
        let Some(root_token) = node.ancestor_ids().into_iter().next() else {
            return Ok(node);
        };
        self.resolve(&node.entity, vec![root_token.clone()], prefer_cache)
            .await?
            .pop()
            .ok_or_else(|| TreeServiceError::node_not_found(&node.entity, root_token))
    }

    /// Rows without a parent, in order
    pub async fn get_roots(&self, entity: &str, prefer_cache: bool) -> Result<Vec<TreeNode<K>>> {
        let mut nodes = self.get_all_nodes(entity, prefer_cache).await?;
        nodes.retain(|node| node.is_root());
        Ok(nodes)
    }

    /// Nested `{node, tree}` forest of the whole entity
    pub async fn get_tree(&self, entity: &str, prefer_cache: bool) -> Result<Vec<NodeTree<K>>> {
        let nodes = self.get_all_nodes(entity, prefer_cache).await?;
        Ok(TreeBuilder::new(nodes).forest())
    }

    /// Nested trees of `handle`'s children, built from its descendants
    pub async fn get_descendants_tree(
        &self,
        handle: &NodeHandle<K>,
        prefer_cache: bool,
    ) -> Result<Vec<NodeTree<K>>> {
        let node = handle.read().clone();
        let descendants = self.get_descendants(handle, prefer_cache).await?;
        Ok(TreeBuilder::new(descendants).children_of(&node))
    }

    /// Every row's indented display, one per line, in order
    pub async fn get_tree_display(&self, entity: &str, prefer_cache: bool) -> Result<String> {
        let nodes = self.get_all_nodes(entity, prefer_cache).await?;
        Ok(display_lines(&nodes))
    }

    /// Indented displays of `handle`'s descendants, one per line, in order
    pub async fn get_descendants_tree_display(
        &self,
        handle: &NodeHandle<K>,
        prefer_cache: bool,
    ) -> Result<String> {
        let descendants = self.get_descendants(handle, prefer_cache).await?;
        Ok(display_lines(&descendants))
    }
}

fn display_lines<K: TreeKey>(nodes: &[TreeNode<K>]) -> String {
    nodes
        .iter()
        .map(|node| node.display(true, DEFAULT_DISPLAY_MARK))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether walking parent links up from `start` (inclusive) meets `target`.
///
/// The walk is bounded by the snapshot size since stored links may already be
/// corrupt.
fn chain_reaches<K: TreeKey>(snapshot: &[TreeNode<K>], start: &K, target: &K) -> bool {
    let parents: HashMap<&K, Option<&K>> = snapshot
        .iter()
        .map(|row| (&row.id, row.parent_id.as_ref()))
        .collect();

    let mut current = Some(start);
    for _ in 0..=snapshot.len() {
        match current {
            Some(id) if id == target => return true,
            Some(id) => current = parents.get(id).copied().flatten(),
            None => return false,
        }
    }
    false
}

/// `root` and every row below it, following stored parent links
fn subtree_ids<K: TreeKey>(snapshot: &[TreeNode<K>], root: &K) -> Vec<K> {
    let mut children: HashMap<&K, Vec<&K>> = HashMap::new();
    for row in snapshot {
        if let Some(parent_id) = &row.parent_id {
            children.entry(parent_id).or_default().push(&row.id);
        }
    }

    let mut ids = vec![root.clone()];
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for &child in children.get(current).into_iter().flatten() {
            // Self-parented rows would otherwise loop
            if !ids.contains(child) {
                ids.push(child.clone());
                queue.push_back(child);
            }
        }
    }
    ids
}
