//! Configuration for tree indexing
//!
//! All settings have working defaults; hosts only override what they need,
//! typically from a JSON document:
//!
//! ```rust
//! use treeindex_core::config::TreeConfig;
//!
//! let config = TreeConfig::from_json(r#"{ "ordering": { "max_priority": 500 } }"#).unwrap();
//! assert_eq!(config.ordering.max_priority, 500);
//! assert_eq!(config.ordering.key_width, 10);
//! ```

use serde::{Deserialize, Serialize};

/// Default width of each fixed-width ordering key component
pub const DEFAULT_KEY_WIDTH: usize = 10;

/// Highest priority a node may carry
pub const DEFAULT_MAX_PRIORITY: u32 = 9999;

/// Broadcast channel capacity for tree events.
///
/// Observers that lag by more than this many events miss the oldest ones;
/// they only ever need the latest tree state.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Settings of the ordering key builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    /// Width of the priority and display-text components, and the minimum
    /// width of the id component
    pub key_width: usize,

    /// Priorities are clamped to this value when building keys and rejected
    /// above it when set through the service
    pub max_priority: u32,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            key_width: DEFAULT_KEY_WIDTH,
            max_priority: DEFAULT_MAX_PRIORITY,
        }
    }
}

/// Settings of the read-through node cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entities whose full row set is cached at once
    pub max_entities: u64,

    /// Optional expiry of a cached entity, in seconds
    pub time_to_live_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entities: 64,
            time_to_live_secs: None,
        }
    }
}

/// Top-level configuration of a `TreeService`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub ordering: OrderingConfig,
    pub cache: CacheConfig,
    pub event_channel_capacity: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            ordering: OrderingConfig::default(),
            cache: CacheConfig::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl TreeConfig {
    /// Parse a (possibly partial) JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TreeConfig::default();
        assert_eq!(config.ordering.key_width, 10);
        assert_eq!(config.ordering.max_priority, 9999);
        assert_eq!(config.cache.max_entities, 64);
        assert_eq!(config.cache.time_to_live_secs, None);
        assert_eq!(config.event_channel_capacity, 128);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            TreeConfig::from_json(r#"{ "cache": { "time_to_live_secs": 30 } }"#).unwrap();
        assert_eq!(config.cache.time_to_live_secs, Some(30));
        assert_eq!(config.cache.max_entities, 64);
        assert_eq!(config.ordering, OrderingConfig::default());
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(TreeConfig::from_json("{}").unwrap(), TreeConfig::default());
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(TreeConfig::from_json(r#"{ "event_channel_capacity": "many" }"#).is_err());
    }
}
