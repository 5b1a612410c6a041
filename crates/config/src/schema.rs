//! Configuration schema: every knob enumerated in the system's external
//! interfaces, with the defaults the core falls back to absent a file.
use serde::{Deserialize, Serialize};

/// Circuit breaker tuning (per provider, shared across all providers for now).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout_seconds: u64,
    /// Error codes that never consume a failure slot, e.g. `VALIDATION_ERROR`.
    pub excluded_errors: Vec<String>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout_seconds: 60,
            excluded_errors: vec!["VALIDATION_ERROR".to_string()],
        }
    }
}

/// Namespaced cache sizing and TTLs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub tools_ttl_seconds: u64,
    pub results_ttl_seconds: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { tools_ttl_seconds: 300, results_ttl_seconds: 30, max_entries: 10_000 }
    }
}

/// Sliding-window request rate limiting, per principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { per_minute: 60, per_hour: 1000 }
    }
}

/// HTTP server bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1".to_string(), port: 8080 }
    }
}

/// Top-level configuration surface (spec §6).
///
/// `max_concurrent_legs_per_request`, `request_deadline_seconds`, and
/// `tool_call_timeout_seconds` bound the executor's fan-out; `reasoner_max_iterations`
/// bounds the tool-calling loop (§4.6, open question O2 — fixed at 10 absent
/// an override).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_concurrent_legs_per_request: usize,
    pub request_deadline_seconds: u64,
    pub tool_call_timeout_seconds: u64,
    pub reasoner_max_iterations: u32,
    pub breaker: BreakerConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub server: ServerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_legs_per_request: 3,
            request_deadline_seconds: 120,
            tool_call_timeout_seconds: 60,
            reasoner_max_iterations: 10,
            breaker: BreakerConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrent_legs_per_request, 3);
        assert_eq!(config.request_deadline_seconds, 120);
        assert_eq!(config.tool_call_timeout_seconds, 60);
        assert_eq!(config.reasoner_max_iterations, 10);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.success_threshold, 2);
        assert_eq!(config.breaker.open_timeout_seconds, 60);
        assert_eq!(config.breaker.excluded_errors, vec!["VALIDATION_ERROR".to_string()]);
        assert_eq!(config.cache.tools_ttl_seconds, 300);
        assert_eq!(config.cache.results_ttl_seconds, 30);
        assert_eq!(config.cache.max_entries, 10_000);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = OrchestratorConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: OrchestratorConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults_for_missing_fields() {
        let parsed: OrchestratorConfig = toml::from_str("reasoner_max_iterations = 20").unwrap();
        assert_eq!(parsed.reasoner_max_iterations, 20);
        assert_eq!(parsed.max_concurrent_legs_per_request, 3);
    }
}
