//! In-memory TTL cache for LLM responses.
//!
//! Identical requests (by structural hash of the prompt-relevant
//! fields) are served from cache within the TTL. The cache is an
//! optimization only: disabling it must not change results.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Default entry lifetime.
const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    inserted_at: Instant,
}

/// TTL-bounded response cache.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    enabled: bool,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            enabled: true,
        }
    }

    /// A cache that never hits, for callers that need fresh calls.
    pub fn disabled() -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::ZERO,
            enabled: false,
        }
    }

    /// Structural hash of the prompt-relevant request fields.
    pub fn key(parts: &impl Serialize) -> String {
        let serialized = serde_json::to_vec(parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&serialized);
        hex::encode(hasher.finalize())
    }

    /// Look up an unexpired entry; expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        if let Some(entry) = self.entries.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    pub fn put(&self, key: String, value: Value) {
        if !self.enabled {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_structural() {
        let a = ResponseCache::key(&serde_json::json!({"dimension": "safety", "count": 3}));
        let b = ResponseCache::key(&serde_json::json!({"dimension": "safety", "count": 3}));
        let c = ResponseCache::key(&serde_json::json!({"dimension": "safety", "count": 4}));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_roundtrip() {
        let cache = ResponseCache::default();
        let key = ResponseCache::key(&"request");
        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), serde_json::json!({"tests": [1, 2]}));
        assert_eq!(cache.get(&key).unwrap()["tests"][0], 1);
    }

    #[test]
    fn test_expiry() {
        let cache = ResponseCache::new(Duration::ZERO);
        let key = ResponseCache::key(&"request");
        cache.put(key.clone(), serde_json::json!(1));
        // TTL of zero expires immediately and evicts on lookup.
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_never_hits() {
        let cache = ResponseCache::disabled();
        let key = ResponseCache::key(&"request");
        cache.put(key.clone(), serde_json::json!(1));
        assert!(cache.get(&key).is_none());
    }
}
