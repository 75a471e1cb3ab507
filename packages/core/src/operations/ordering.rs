//! Ordering key builder
//!
//! Each node gets a fixed-width string key such that ascending lexicographic
//! order is the desired sibling order:
//!
//! 1. inverted, zero-padded priority (higher priority sorts first),
//! 2. display-text slug, right-padded with `z` and truncated, so short names
//!    do not jump ahead of longer ones,
//! 3. padded id projection, always distinct.
//!
//! A node's global key is its ancestors' keys (root first) followed by its
//! own. All own keys have the same length, so a parent's global key is a
//! strict prefix of its descendants' keys and sorts before them.

use crate::config::OrderingConfig;
use crate::models::{TreeKey, TreeNode};
use crate::utils::slugify;

/// Padding used for short display-text slugs.
///
/// Slugs only hold `[a-z0-9-]`, so once upper-cased no slug character sorts
/// after the padding.
const TEXT_PADDING: char = 'z';

/// Builds per-node and global ordering keys for one snapshot
#[derive(Debug, Clone)]
pub struct OrderingKeyBuilder {
    priority_width: usize,
    text_width: usize,
    id_width: usize,
    max_priority: u32,
}

impl OrderingKeyBuilder {
    /// Builder whose id component is `key_width` wide.
    ///
    /// Use [`OrderingKeyBuilder::for_keys`] when ids may be longer.
    pub fn new(config: &OrderingConfig) -> Self {
        let priority_width = config
            .key_width
            .max(config.max_priority.to_string().len());
        Self {
            priority_width,
            text_width: config.key_width,
            id_width: config.key_width,
            max_priority: config.max_priority,
        }
    }

    /// Builder whose id component fits every key of the snapshot.
    pub fn for_keys<'a, K: TreeKey>(
        config: &OrderingConfig,
        keys: impl IntoIterator<Item = &'a K>,
    ) -> Self {
        let mut builder = Self::new(config);
        builder.id_width = keys
            .into_iter()
            .map(|key| key.projection().len())
            .fold(builder.id_width, usize::max);
        builder
    }

    /// Length of every key produced by [`OrderingKeyBuilder::node_key`]
    pub fn key_len(&self) -> usize {
        self.priority_width + self.text_width + self.id_width
    }

    pub fn priority_component(&self, priority: u32) -> String {
        let inverted = self.max_priority - priority.min(self.max_priority);
        format!("{:0>width$}", inverted, width = self.priority_width)
    }

    pub fn text_component(&self, display_text: &str) -> String {
        let mut component: String = slugify(display_text)
            .chars()
            .take(self.text_width)
            .collect();
        while component.len() < self.text_width {
            component.push(TEXT_PADDING);
        }
        component
    }

    pub fn id_component<K: TreeKey>(&self, id: &K) -> String {
        id.projection().render(self.id_width)
    }

    /// The node's own key (not including its ancestors)
    pub fn node_key<K: TreeKey>(&self, node: &TreeNode<K>) -> String {
        let key = format!(
            "{}{}{}",
            self.priority_component(node.priority),
            self.text_component(&node.display_text),
            self.id_component(&node.id),
        );
        key.to_uppercase()
    }

    /// Concatenate precomputed own keys of the ancestors and the node itself.
    pub fn global_key<'a>(&self, chain: impl IntoIterator<Item = &'a str>) -> String {
        chain.into_iter().collect()
    }
}
