use serde::Serialize;

/// Snapshot of cache effectiveness, as exported by `get_stats` and surfaced
/// through the observability substrate (C12).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub evictions: u64,
    pub hit_rate: f64,
}
