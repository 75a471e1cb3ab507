//! Recomputation trigger state
//!
//! Every write through `TreeService` ends with `update_tree` for the written
//! entity. Hosts running bulk loads enter a scoped suppression for the
//! entity and recompute once afterwards. User-field writes and
//! recomputations of the same entity are serialized by a per-entity lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Counters = Arc<Mutex<HashMap<String, usize>>>;

/// Per-entity suppression counters and recomputation locks
#[derive(Debug, Clone, Default)]
pub struct RecomputeTrigger {
    suppressed: Counters,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl RecomputeTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress recomputation of `entity` until the guard is dropped.
    ///
    /// Guards nest; the trigger fires again once every guard is gone.
    pub fn suppress(&self, entity: &str) -> SuppressionGuard {
        *self
            .suppressed
            .lock()
            .entry(entity.to_string())
            .or_insert(0) += 1;
        SuppressionGuard {
            suppressed: self.suppressed.clone(),
            entity: entity.to_string(),
        }
    }

    pub fn is_suppressed(&self, entity: &str) -> bool {
        self.suppressed
            .lock()
            .get(entity)
            .is_some_and(|count| *count > 0)
    }

    /// Lock serializing writes and recomputations of `entity`
    pub fn entity_lock(&self, entity: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(entity.to_string())
            .or_default()
            .clone()
    }
}

/// Scoped recomputation suppression for one entity
#[must_use = "suppression ends when the guard is dropped"]
#[derive(Debug)]
pub struct SuppressionGuard {
    suppressed: Counters,
    entity: String,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        let mut suppressed = self.suppressed.lock();
        if let Some(count) = suppressed.get_mut(&self.entity) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                suppressed.remove(&self.entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_nest_per_entity() {
        let trigger = RecomputeTrigger::new();
        assert!(!trigger.is_suppressed("category"));

        let outer = trigger.suppress("category");
        let inner = trigger.suppress("category");
        assert!(trigger.is_suppressed("category"));
        assert!(!trigger.is_suppressed("tag"));

        drop(inner);
        assert!(trigger.is_suppressed("category"));
        drop(outer);
        assert!(!trigger.is_suppressed("category"));
    }

    #[test]
    fn test_clones_share_state() {
        let trigger = RecomputeTrigger::new();
        let clone = trigger.clone();
        let _guard = clone.suppress("category");
        assert!(trigger.is_suppressed("category"));
    }

    #[test]
    fn test_entity_lock_is_shared_per_entity() {
        let trigger = RecomputeTrigger::new();
        let a = trigger.entity_lock("category");
        let b = trigger.entity_lock("category");
        let c = trigger.entity_lock("tag");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_entity_lock_blocks_second_holder() {
        let trigger = RecomputeTrigger::new();
        let lock = trigger.entity_lock("category");
        tokio_test::block_on(async {
            let _held = lock.lock().await;
            assert!(trigger.entity_lock("category").try_lock().is_err());
            assert!(trigger.entity_lock("tag").try_lock().is_ok());
        });
    }
}
