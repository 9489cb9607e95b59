//! In-memory TTL cache for search responses and embeddings.
//!
//! Reads take a shared lock; writes to the same key race with last write
//! winning, which is fine because values for one key are equivalent.
//! An expired entry is indistinguishable from a miss.

use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::config::SearchMode;
use crate::metrics::{CACHE_HITS, CACHE_MISSES};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl
            .map(|ttl| now.duration_since(self.inserted_at) >= ttl)
            .unwrap_or(false)
    }
}

/// Hit/miss counters of one cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    fn new(keys: usize, hits: u64, misses: u64) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        Self {
            keys,
            hits,
            misses,
            hit_rate,
        }
    }

    /// Sum of several caches' counters.
    pub fn combine(stats: &[CacheStats]) -> Self {
        Self::new(
            stats.iter().map(|s| s.keys).sum(),
            stats.iter().map(|s| s.hits).sum(),
            stats.iter().map(|s| s.misses).sum(),
        )
    }
}

/// Thread-safe key/value cache with per-entry TTL and a size bound.
pub struct TtlCache<V: Clone> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a live entry.
    pub fn get(&self, key: &str) -> Option<V> {
        let found = {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            entries
                .get(key)
                .filter(|entry| !entry.is_expired(Instant::now()))
                .map(|entry| entry.value.clone())
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            CACHE_HITS.inc();
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            CACHE_MISSES.inc();
        }
        found
    }

    /// Store `value` under `key`. `None` TTL never expires.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            Self::evict(&mut entries, self.max_entries);
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Drop expired entries, then the oldest ones until there is room for one more.
    fn evict(entries: &mut HashMap<String, CacheEntry<V>>, max_entries: usize) {
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));

        if entries.len() < max_entries {
            return;
        }

        let mut by_age: Vec<(String, Instant)> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

        let excess = entries.len() + 1 - max_entries;
        for (key, _) in by_age.into_iter().take(excess) {
            entries.remove(&key);
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.remove(key).map(|e| e.value)
    }

    /// Remove every entry and reset the counters.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let keys = {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            let now = Instant::now();
            entries.values().filter(|e| !e.is_expired(now)).count()
        };
        CacheStats::new(
            keys,
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Key of a full search response computed against one snapshot version.
pub fn search_key(snapshot_version: u64, mode: SearchMode, top_k: usize, query: &str) -> String {
    format!("search:v{}:{}:{}:{}", snapshot_version, mode, top_k, query)
}

/// Key of an ad-hoc embedding request.
pub fn embedding_key(text: &str) -> String {
    format!("embedding:{}", text)
}

/// Key of a corpus document's embedding.
///
/// Includes a fingerprint of the content so an edited document under the
/// same id misses.
pub fn document_key(doc_id: &str, content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("document:{}:{:016x}", doc_id, hasher.finish())
}
