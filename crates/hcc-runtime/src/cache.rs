//! Caching layer for hcc-runtime.
//!
//! Provides in-memory caching of extraction results so repeated identical
//! notes skip the model.

use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::config::CacheConfig;

/// Cache key for extraction results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    note_hash: u64,
    model_hash: u64,
}

impl CacheKey {
    /// Key a note by its text and the model that read it.
    pub fn new(note: &str, model: &str) -> Self {
        Self {
            note_hash: hash_str(note.trim()),
            model_hash: hash_str(model),
        }
    }
}

/// Extraction cache using moka.
pub struct ExtractionCache {
    cache: Cache<CacheKey, Vec<String>>,
}

impl ExtractionCache {
    /// Create a new cache with the given configuration.
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    /// Get cached condition names.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<String>> {
        self.cache.get(key).await
    }

    /// Store condition names. Empty results are not cached.
    pub async fn insert(&self, key: CacheKey, conditions: Vec<String>) {
        if conditions.is_empty() {
            return;
        }
        self.cache.insert(key, conditions).await;
    }
}

impl Default for ExtractionCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

fn hash_str(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
