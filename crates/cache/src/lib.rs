//! Namespaced, TTL + LRU bounded cache layer (C2).
//!
//! Backing store is a single in-process [`Cache`], shared across four logical
//! namespaces (`tools`, `results`, `schema`, `session`) each with its own
//! default TTL. Operations are atomic per key; `DashMap`'s internal sharding
//! gives multiple-readers/single-writer semantics per shard without an
//! outer lock.

use std::{
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use serde_json::Value;

mod namespace;
pub mod stats;

pub use namespace::{CacheConfig, Namespace, NamespacedCache};
pub use stats::CacheStats;

struct Entry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
    hit_count: AtomicU64,
    last_touch: AtomicU64,
}

impl Entry {
    fn expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// A bounded, thread-safe key-value cache with TTL expiry and approximate
/// least-recently-used eviction once `max_entries` is exceeded.
pub struct Cache {
    store: DashMap<String, Entry>,
    max_entries: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Cache {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: DashMap::new(),
            max_entries,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let Some(entry) = self.store.get(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        if entry.expired() {
            drop(entry);
            self.store.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        entry.hit_count.fetch_add(1, Ordering::Relaxed);
        entry.last_touch.store(self.tick(), Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let key = key.into();
        let touch = self.tick();
        self.store.insert(
            key,
            Entry { value, stored_at: Instant::now(), ttl, hit_count: AtomicU64::new(0), last_touch: AtomicU64::new(touch) },
        );
        self.evict_over_capacity();
    }

    pub fn delete(&self, key: &str) -> bool {
        self.store.remove(key).is_some()
    }

    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.store.get(key).is_some_and(|e| !e.expired())
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            size: self.store.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }

    /// Evict entries beyond `max_entries`, oldest-touched first.
    ///
    /// `max_entries == 0` disables the bound.
    fn evict_over_capacity(&self) {
        if self.max_entries == 0 {
            return;
        }
        while self.store.len() > self.max_entries {
            let Some(victim) = self
                .store
                .iter()
                .min_by_key(|e| e.last_touch.load(Ordering::Relaxed))
                .map(|e| e.key().clone())
            else {
                break;
            };
            if self.store.remove(&victim).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                break;
            }
        }
    }
}

/// Stable hash over provider/tool/canonical-args used as `request_fingerprint`.
///
/// Relies on `serde_json::to_string` producing a deterministic key order for
/// a `Value` built from a `BTreeMap` or already-canonical object — callers
/// must canonicalize `args` (sort object keys) before calling this so that
/// argument reordering never changes the fingerprint (R1).
#[must_use]
pub fn request_fingerprint(provider_id: &str, tool_name: &str, canonical_args: &Value) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    provider_id.hash(&mut hasher);
    tool_name.hash(&mut hasher);
    canonical_args.to_string().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Recursively sort all JSON object keys so that two argument maps built in
/// different insertion order produce byte-identical canonical output.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        },
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let cache = Cache::new(10);
        cache.set("k", serde_json::json!({"a": 1}), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn expired_entries_are_treated_as_misses() {
        let cache = Cache::new(10);
        cache.set("k", serde_json::json!(1), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn eviction_keeps_size_at_capacity() {
        let cache = Cache::new(2);
        cache.set("a", serde_json::json!(1), Duration::from_secs(60));
        cache.set("b", serde_json::json!(2), Duration::from_secs(60));
        cache.set("c", serde_json::json!(3), Duration::from_secs(60));
        assert_eq!(cache.stats().size, 2);
        assert!(cache.stats().evictions >= 1);
    }

    #[test]
    fn fingerprint_is_stable_under_key_reordering() {
        let a = serde_json::json!({"x": 1, "y": 2});
        let b = serde_json::json!({"y": 2, "x": 1});
        let fp_a = request_fingerprint("tickets", "list_projects", &canonicalize(&a));
        let fp_b = request_fingerprint("tickets", "list_projects", &canonicalize(&b));
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn hit_rate_reflects_hits_and_misses() {
        let cache = Cache::new(10);
        cache.set("k", serde_json::json!(1), Duration::from_secs(60));
        cache.get("k");
        cache.get("missing");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }
}
