//! Module cache — process-lifetime export store.
//!
//! Keyed by `packageName::exportName`. No eviction: every distinct key ever
//! resolved stays cached until an explicit `clear`. Safe for concurrent
//! `get`/`put`; `put` overwrites silently so idempotent re-resolution is safe.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::tools::RawExport;

/// A cached export with its insertion timestamp.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub export: RawExport,
    pub cached_at: DateTime<Utc>,
}

/// Cache occupancy snapshot for `/cache/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Process-lifetime key-value store of resolved exports.
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(1), side-effect free lookup.
    pub async fn get(&self, key: &str) -> Option<CachedEntry> {
        self.entries.read().await.get(key).cloned()
    }

    /// Insert or overwrite.
    pub async fn put(&self, key: String, export: RawExport) -> CachedEntry {
        let entry = CachedEntry {
            export,
            cached_at: Utc::now(),
        };
        self.entries.write().await.insert(key, entry.clone());
        entry
    }

    /// Drop all entries, returning how many were removed.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }

    /// Occupancy snapshot with sorted keys.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: entries.len(),
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::RawExport;
    use serde_json::Value;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let cache = ModuleCache::new();
        assert!(cache.get("a::b").await.is_none());

        cache
            .put("a::b".to_string(), RawExport::Opaque(Value::Null))
            .await;
        assert!(cache.get("a::b").await.is_some());

        // Overwrite is silent
        cache
            .put("a::b".to_string(), RawExport::Opaque(Value::Bool(true)))
            .await;
        assert_eq!(cache.stats().await.size, 1);
    }

    #[tokio::test]
    async fn test_clear_reports_count_and_empties() {
        let cache = ModuleCache::new();
        cache
            .put("a::b".to_string(), RawExport::Opaque(Value::Null))
            .await;
        cache
            .put("c::d".to_string(), RawExport::Opaque(Value::Null))
            .await;

        assert_eq!(cache.clear().await, 2);
        let stats = cache.stats().await;
        assert_eq!(stats.size, 0);
        assert!(stats.keys.is_empty());
    }

    #[tokio::test]
    async fn test_stats_keys_sorted() {
        let cache = ModuleCache::new();
        cache
            .put("z::z".to_string(), RawExport::Opaque(Value::Null))
            .await;
        cache
            .put("a::a".to_string(), RawExport::Opaque(Value::Null))
            .await;

        let stats = cache.stats().await;
        assert_eq!(stats.keys, vec!["a::a", "z::z"]);
    }
}
