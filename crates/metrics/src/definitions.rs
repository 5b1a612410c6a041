//! Metric name and label definitions.
//!
//! Centralizing these as constants keeps every emitter and the Prometheus
//! bucket configuration in the recorder pointed at the same strings.

/// HTTP request metrics, emitted by the server crate's tracing/metrics middleware.
pub mod http {
    pub const REQUESTS_TOTAL: &str = "conflux_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "conflux_request_duration_seconds";
    pub const REQUESTS_IN_FLIGHT: &str = "conflux_requests_in_flight";
}

/// Reasoner (LLM) call metrics.
pub mod llm {
    pub const CALLS_TOTAL: &str = "conflux_llm_calls_total";
    pub const CALL_DURATION_SECONDS: &str = "conflux_llm_call_duration_seconds";
    pub const TOKENS_TOTAL: &str = "conflux_llm_tokens_total";
}

/// Tool Gateway call metrics.
pub mod tool {
    pub const CALLS_TOTAL: &str = "conflux_tool_calls_total";
    pub const CALL_DURATION_SECONDS: &str = "conflux_tool_call_duration_seconds";
}

/// Cache layer metrics.
pub mod cache {
    pub const HITS_TOTAL: &str = "conflux_cache_hits_total";
    pub const MISSES_TOTAL: &str = "conflux_cache_misses_total";
    pub const SIZE: &str = "conflux_cache_size";
    pub const EVICTIONS_TOTAL: &str = "conflux_cache_evictions_total";
}

/// Circuit-breaker metrics.
pub mod breaker {
    pub const STATE: &str = "conflux_breaker_state";
    pub const TRIPS_TOTAL: &str = "conflux_breaker_trips_total";
    pub const REJECTED_TOTAL: &str = "conflux_breaker_rejected_total";
}

/// Rate-limiter metrics.
pub mod rate_limit {
    pub const REJECTED_TOTAL: &str = "conflux_rate_limit_rejected_total";
}

/// Orchestration-level metrics (detector / planner / executor / synthesizer).
pub mod orchestration {
    pub const CHAT_MESSAGES_TOTAL: &str = "conflux_chat_messages_total";
    pub const LEG_DURATION_SECONDS: &str = "conflux_leg_duration_seconds";
    pub const QUEUE_DEPTH: &str = "conflux_queue_depth";
}

/// Error metrics.
pub mod errors {
    pub const ERRORS_TOTAL: &str = "conflux_errors_total";
}

/// Common label keys used across metrics.
pub mod labels {
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const PROVIDER: &str = "provider";
    pub const TOOL: &str = "tool";
    pub const ERROR_CODE: &str = "code";
    pub const DIRECTION: &str = "direction";
    pub const PURPOSE: &str = "purpose";
    pub const NAMESPACE: &str = "namespace";
    pub const ROUTING_PATH: &str = "routing_path";
}

/// Standard histogram buckets for different metric types.
pub mod buckets {
    use once_cell::sync::Lazy;

    /// HTTP/tool-call duration buckets (in seconds). Covers 1ms to 60s.
    pub static HTTP_DURATION: Lazy<Vec<f64>> =
        Lazy::new(|| vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]);

    /// LLM completion duration buckets (in seconds). Covers 100ms to 5 minutes.
    pub static LLM_DURATION: Lazy<Vec<f64>> =
        Lazy::new(|| vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 180.0, 300.0]);

    /// Per-leg duration buckets (in seconds). A leg runs a bounded tool-use loop
    /// against a single provider, so its tail is close to the request deadline.
    pub static LEG_DURATION: Lazy<Vec<f64>> =
        Lazy::new(|| vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]);
}
