use std::{sync::Arc, time::Duration};

use conflux_breaker::BreakerRegistry;
use conflux_cache::NamespacedCache;
use conflux_config::OrchestratorConfig;
use conflux_connector::{InMemoryCredentialStore, ProviderRegistry};
use conflux_detector::Detector;
use conflux_executor::{Executor, ExecutorConfig};
use conflux_gateway::{Gateway, GatewayConfig};
use conflux_orchestrator::Orchestrator;
use conflux_planner::Planner;
use conflux_ratelimit::RateLimiter;
use conflux_reasoner::{Reasoner, RuleBasedReasoner};
use conflux_synthesizer::Synthesizer;

use crate::demo;

/// Everything an axum handler needs, built once at startup and cloned
/// (cheaply, via `Arc`) into every request.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub detector: Arc<Detector>,
    pub providers: Arc<ProviderRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    #[cfg(feature = "metrics")]
    pub metrics: Arc<conflux_metrics::MetricsHandle>,
}

impl AppState {
    /// Wire the full pipeline (gateway → detector → planner → executor →
    /// synthesizer → orchestrator) from a loaded [`OrchestratorConfig`],
    /// seeded with the demo provider set so the binary runs out of the box.
    #[must_use]
    pub fn build(config: &OrchestratorConfig, #[cfg(feature = "metrics")] metrics: Arc<conflux_metrics::MetricsHandle>) -> Self {
        let providers = Arc::new(ProviderRegistry::new());
        let credentials = Arc::new(InMemoryCredentialStore::new());
        demo::seed(&providers, &credentials);

        let cache = Arc::new(NamespacedCache::new(conflux_cache::CacheConfig {
            max_entries: config.cache.max_entries,
            tools_ttl: Duration::from_secs(config.cache.tools_ttl_seconds),
            results_ttl: Duration::from_secs(config.cache.results_ttl_seconds),
        }));
        let excluded_errors = config
            .breaker
            .excluded_errors
            .iter()
            .filter_map(|code| {
                let parsed = conflux_common::ErrorCode::parse(code);
                if parsed.is_none() {
                    tracing::warn!(code, "unknown breaker excluded_errors code, ignoring");
                }
                parsed
            })
            .collect();
        let breakers = Arc::new(BreakerRegistry::new(conflux_breaker::BreakerConfig {
            failure_threshold: config.breaker.failure_threshold as usize,
            success_threshold: config.breaker.success_threshold as usize,
            open_timeout: Duration::from_secs(config.breaker.open_timeout_seconds),
            excluded_errors,
        }));
        let gateway_config =
            GatewayConfig { tool_call_timeout: Duration::from_secs(config.tool_call_timeout_seconds) };
        let gateway = Arc::new(Gateway::new(gateway_config, providers.clone(), credentials, cache, breakers));

        let reasoner: Arc<dyn Reasoner> = Arc::new(RuleBasedReasoner::new());
        let detector = Arc::new(Detector::with_default_keywords(reasoner.clone()));
        let planner = Arc::new(Planner::new(detector.clone()));

        let executor_config = ExecutorConfig {
            max_concurrent_legs: config.max_concurrent_legs_per_request,
            max_iterations: config.reasoner_max_iterations as usize,
            total_deadline: Duration::from_secs(config.request_deadline_seconds),
            ..ExecutorConfig::default()
        };
        let executor = Arc::new(Executor::new(gateway, reasoner.clone(), executor_config));
        let synthesizer = Arc::new(Synthesizer::new(reasoner));
        let orchestrator = Arc::new(Orchestrator::new(providers.clone(), planner, executor, synthesizer));

        let rate_limiter = Arc::new(RateLimiter::new(conflux_ratelimit::RateLimitConfig {
            per_minute: config.rate_limit.per_minute,
            per_hour: config.rate_limit.per_hour,
        }));

        Self {
            orchestrator,
            detector,
            providers,
            rate_limiter,
            #[cfg(feature = "metrics")]
            metrics,
        }
    }
}
