use std::time::Duration;

use serde_json::Value;

use crate::{Cache, CacheStats};

/// The four logical views over the shared cache, each with its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Tool descriptor lists, keyed by `provider_id`.
    Tools,
    /// Tool call results, keyed by `request_fingerprint`.
    Results,
    /// Provider schema fragments, keyed by `(provider_id, entity)`.
    Schema,
    /// Session metadata, keyed by `session_id`.
    Session,
}

impl Namespace {
    fn prefix(self) -> &'static str {
        match self {
            Self::Tools => "tools",
            Self::Results => "results",
            Self::Schema => "schema",
            Self::Session => "session",
        }
    }
}

/// Configurable TTLs for the tools/results namespaces; schema and session
/// TTLs are fixed per spec (10 min / 24 h) and are not exposed as config.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub tools_ttl: Duration,
    pub results_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 10_000, tools_ttl: Duration::from_secs(300), results_ttl: Duration::from_secs(30) }
    }
}

const SCHEMA_TTL: Duration = Duration::from_secs(600);
const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The cache layer's public capability set: `get`, `set`, `delete`, `exists`,
/// `clear`, `get_stats`, scoped by [`Namespace`].
pub struct NamespacedCache {
    inner: Cache,
    config: CacheConfig,
}

impl NamespacedCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self { inner: Cache::new(config.max_entries), config }
    }

    fn key(namespace: Namespace, key: &str) -> String {
        format!("{}:{key}", namespace.prefix())
    }

    fn ttl(&self, namespace: Namespace) -> Duration {
        match namespace {
            Namespace::Tools => self.config.tools_ttl,
            Namespace::Results => self.config.results_ttl,
            Namespace::Schema => SCHEMA_TTL,
            Namespace::Session => SESSION_TTL,
        }
    }

    #[must_use]
    pub fn get(&self, namespace: Namespace, key: &str) -> Option<Value> {
        self.inner.get(&Self::key(namespace, key))
    }

    pub fn set(&self, namespace: Namespace, key: impl AsRef<str>, value: Value) {
        let ttl = self.ttl(namespace);
        self.inner.set(Self::key(namespace, key.as_ref()), value, ttl);
    }

    pub fn delete(&self, namespace: Namespace, key: &str) -> bool {
        self.inner.delete(&Self::key(namespace, key))
    }

    #[must_use]
    pub fn exists(&self, namespace: Namespace, key: &str) -> bool {
        self.inner.exists(&Self::key(namespace, key))
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_do_not_collide_on_equal_keys() {
        let cache = NamespacedCache::new(CacheConfig::default());
        cache.set(Namespace::Tools, "tickets", serde_json::json!(["list_projects"]));
        cache.set(Namespace::Results, "tickets", serde_json::json!({"ok": true}));
        assert_eq!(cache.get(Namespace::Tools, "tickets"), Some(serde_json::json!(["list_projects"])));
        assert_eq!(cache.get(Namespace::Results, "tickets"), Some(serde_json::json!({"ok": true})));
    }
}
