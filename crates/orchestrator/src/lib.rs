//! Orchestrator (C11): binds the detector/planner/executor/synthesizer
//! pipeline behind two public contracts — a synchronous `process` and an
//! incremental `stream` that emits progress events as the pipeline advances.

mod event;
mod latency;
mod request;

use std::sync::Arc;

use chrono::Utc;
use conflux_common::{Error, Result};
use conflux_connector::{Provider, ProviderRegistry};
use conflux_executor::{Executor, SourceQueryResult};
use conflux_planner::{Plan, PlanInput, Planner};
use conflux_synthesizer::Synthesizer;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

pub use event::{Event, EventType};
pub use request::MultiSourceRequest;

use latency::LatencyTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Completed,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiSourceResponse {
    pub response: String,
    pub session_id: String,
    pub status: ResponseStatus,
    pub plan: Option<Plan>,
    pub source_results: Vec<SourceQueryResult>,
    pub successful_sources: Vec<String>,
    pub failed_sources: Vec<String>,
    pub total_duration_ms: u64,
    pub completed_at: chrono::DateTime<Utc>,
}

/// `status` is derived from the fan-out results alone (I3): `completed` iff
/// nothing failed, `failed` iff nothing succeeded, `partial` otherwise.
fn derive_status(results: &[SourceQueryResult]) -> ResponseStatus {
    let failed = results.iter().filter(|r| !r.succeeded).count();
    if failed == 0 {
        ResponseStatus::Completed
    } else if failed == results.len() {
        ResponseStatus::Failed
    } else {
        ResponseStatus::Partial
    }
}

pub struct Orchestrator {
    providers: Arc<ProviderRegistry>,
    planner: Arc<Planner>,
    executor: Arc<Executor>,
    synthesizer: Arc<Synthesizer>,
    latencies: LatencyTracker,
}

impl Orchestrator {
    #[must_use]
    pub fn new(providers: Arc<ProviderRegistry>, planner: Arc<Planner>, executor: Arc<Executor>, synthesizer: Arc<Synthesizer>) -> Self {
        Self { providers, planner, executor, synthesizer, latencies: LatencyTracker::new() }
    }

    fn configured_providers(&self) -> Vec<Provider> {
        self.providers.describe_all().into_iter().filter(|p| p.enabled).collect()
    }

    async fn build_plan(&self, request: &MultiSourceRequest) -> Result<Plan> {
        let configured = self.configured_providers();
        let input = PlanInput {
            query: &request.query,
            sources: request.sources.as_deref(),
            confidence_threshold: request.confidence_threshold,
            max_sources: request.max_sources,
        };
        self.planner.plan(input, &configured, &self.latencies.medians()).await
    }

    fn record_latencies(&self, results: &[SourceQueryResult]) {
        for result in results {
            self.latencies.record(&result.provider_id, result.duration_ms);
        }
    }

    #[cfg(feature = "metrics")]
    fn record_completion_metrics(status: ResponseStatus) {
        let status_label = match status {
            ResponseStatus::Completed => "completed",
            ResponseStatus::Partial => "partial",
            ResponseStatus::Failed => "failed",
        };
        conflux_metrics::counter!(conflux_metrics::http::REQUESTS_TOTAL, "endpoint" => "query", "status" => status_label).increment(1);
        conflux_metrics::counter!(conflux_metrics::orchestration::CHAT_MESSAGES_TOTAL, "routing_path" => "multi_source").increment(1);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_completion_metrics(_status: ResponseStatus) {}

    /// Synchronous contract: run the full pipeline and return the finished
    /// response. No progress events are observable from this entry point.
    pub async fn process(&self, request: MultiSourceRequest, principal_id: &str) -> Result<MultiSourceResponse> {
        request.validate()?;
        let started_at = std::time::Instant::now();
        let session_id = request.session_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let plan = self.build_plan(&request).await?;
        let results = self.executor.execute(&plan, principal_id, CancellationToken::new()).await;
        self.record_latencies(&results);

        let status = derive_status(&results);
        let response_text = if status == ResponseStatus::Failed {
            conflux_synthesizer::NO_RESULTS_FALLBACK.to_string()
        } else {
            match self.synthesizer.synthesize(&request.query, &results, |_| {}).await {
                Some(synthesis) => synthesis.text,
                None => conflux_synthesizer::NO_RESULTS_FALLBACK.to_string(),
            }
        };

        let successful_sources = results.iter().filter(|r| r.succeeded).map(|r| r.provider_id.clone()).collect();
        let failed_sources = results.iter().filter(|r| !r.succeeded).map(|r| r.provider_id.clone()).collect();
        let include_plan = request.include_plan;

        Self::record_completion_metrics(status);

        Ok(MultiSourceResponse {
            response: response_text,
            session_id,
            status,
            plan: include_plan.then_some(plan),
            source_results: results,
            successful_sources,
            failed_sources,
            total_duration_ms: started_at.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        })
    }

    /// Incremental contract: a live progress stream. Terminates with exactly
    /// one `done` or `error` event; no events are emitted after that.
    pub fn stream(self: Arc<Self>, request: MultiSourceRequest, principal_id: String, cancel: CancellationToken) -> impl Stream<Item = Event> + Send + 'static {
        async_stream::stream! {
            let orchestrator = self;
            let started_at = std::time::Instant::now();

            if let Err(error) = request.validate() {
                yield Event::error(&error);
                return;
            }

            yield Event::plain(EventType::Started);
            yield Event::plain(EventType::Planning);

            let plan = match orchestrator.build_plan(&request).await {
                Ok(plan) => plan,
                Err(error) => {
                    yield Event::error(&error);
                    return;
                },
            };
            yield Event::new(EventType::PlanComplete, None, serde_json::json!({ "plan": plan }));

            for provider_id in &plan.chosen {
                yield Event::new(EventType::SourceStart, None, serde_json::json!({ "provider_id": provider_id }));
            }

            if cancel.is_cancelled() {
                yield Event::cancelled();
                return;
            }

            let (tx, mut rx) = mpsc::unbounded_channel::<SourceQueryResult>();
            let fanout_executor = orchestrator.executor.clone();
            let fanout_plan = plan.clone();
            let fanout_principal = principal_id.clone();
            let fanout_cancel = cancel.clone();
            let fanout = tokio::spawn(async move {
                fanout_executor
                    .execute_with_progress(&fanout_plan, &fanout_principal, fanout_cancel, move |result| {
                        let _ = tx.send(result.clone());
                    })
                    .await
            });

            let mut received = 0usize;
            let mut cancelled = false;
            while received < plan.chosen.len() {
                tokio::select! {
                    maybe_result = rx.recv() => {
                        match maybe_result {
                            Some(result) => {
                                received += 1;
                                yield Event::new(
                                    EventType::SourceComplete,
                                    None,
                                    serde_json::json!({
                                        "provider_id": result.provider_id,
                                        "succeeded": result.succeeded,
                                        "duration_ms": result.duration_ms,
                                    }),
                                );
                            },
                            None => break,
                        }
                    },
                    () = cancel.cancelled() => {
                        cancelled = true;
                        break;
                    },
                }
            }

            if cancelled {
                fanout.abort();
                yield Event::cancelled();
                return;
            }

            let results = match fanout.await {
                Ok(results) => results,
                Err(_) => {
                    yield Event::error(&Error::internal("fan-out task did not complete"));
                    return;
                },
            };
            orchestrator.record_latencies(&results);

            yield Event::plain(EventType::Synthesizing);

            let status = derive_status(&results);
            if status == ResponseStatus::Failed {
                yield Event::new(EventType::SynthesisChunk, None, serde_json::json!({ "content": conflux_synthesizer::NO_RESULTS_FALLBACK }));
            } else {
                let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<String>();
                let synthesizer = orchestrator.synthesizer.clone();
                let query = request.query.clone();
                let results_for_synthesis = results.clone();
                let synth_task = tokio::spawn(async move {
                    synthesizer
                        .synthesize(&query, &results_for_synthesis, move |chunk| {
                            let _ = chunk_tx.send(chunk.to_string());
                        })
                        .await
                });

                let mut synth_cancelled = false;
                loop {
                    tokio::select! {
                        maybe_chunk = chunk_rx.recv() => {
                            match maybe_chunk {
                                Some(chunk) => yield Event::new(EventType::SynthesisChunk, None, serde_json::json!({ "content": chunk })),
                                None => break,
                            }
                        },
                        () = cancel.cancelled() => {
                            synth_cancelled = true;
                            break;
                        },
                    }
                }

                if synth_cancelled {
                    synth_task.abort();
                    yield Event::cancelled();
                    return;
                }

                let _ = synth_task.await;
            }

            Self::record_completion_metrics(status);
            yield Event::new(EventType::Done, None, serde_json::json!({ "total_duration_ms": started_at.elapsed().as_millis() as u64 }));
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use conflux_breaker::{BreakerConfig, BreakerRegistry};
    use conflux_cache::{CacheConfig, NamespacedCache};
    use conflux_connector::{InMemoryCredentialStore, ProviderConnector, ToolDescriptor};
    use conflux_detector::Detector;
    use conflux_executor::ExecutorConfig;
    use conflux_gateway::{Gateway, GatewayConfig};
    use conflux_reasoner::RuleBasedReasoner;
    use serde_json::Value;
    use tokio_stream::StreamExt;

    use super::*;

    struct EchoTicketsConnector;

    #[async_trait]
    impl ProviderConnector for EchoTicketsConnector {
        fn provider_id(&self) -> &str {
            "tickets"
        }

        async fn list_tools(&self, _credentials: &HashMap<String, String>) -> Result<Vec<ToolDescriptor>> {
            Ok(vec![ToolDescriptor {
                name: "list_tickets".into(),
                description: "list open tickets".into(),
                input_schema: serde_json::json!({"properties": {"query": {"type": "string"}}}),
            }])
        }

        async fn call_tool(&self, _credentials: &HashMap<String, String>, _tool_name: &str, _args: &Value) -> Result<Value> {
            Ok(serde_json::json!({"open": 3}))
        }
    }

    fn orchestrator() -> Arc<Orchestrator> {
        let providers = Arc::new(ProviderRegistry::new());
        providers.register(
            Provider { id: "tickets".into(), display_name: "Tickets".into(), enabled: true, priority: 0 },
            Arc::new(EchoTicketsConnector),
        );
        let credentials = Arc::new(InMemoryCredentialStore::new());
        credentials.insert("alice", "tickets", HashMap::from([("token".to_string(), "secret".to_string())]));
        let cache = Arc::new(NamespacedCache::new(CacheConfig::default()));
        let breakers = Arc::new(BreakerRegistry::new(BreakerConfig::default()));
        let gateway = Arc::new(Gateway::new(GatewayConfig::default(), providers.clone(), credentials, cache, breakers));
        let reasoner = Arc::new(RuleBasedReasoner::new());
        let detector = Arc::new(Detector::with_default_keywords(reasoner.clone()));
        let planner = Arc::new(Planner::new(detector));
        let executor = Arc::new(Executor::new(gateway, reasoner.clone(), ExecutorConfig::default()));
        let synthesizer = Arc::new(Synthesizer::new(reasoner));
        Arc::new(Orchestrator::new(providers, planner, executor, synthesizer))
    }

    #[tokio::test]
    async fn process_returns_completed_response_for_a_matching_query() {
        let request = MultiSourceRequest { query: "open tickets".into(), ..Default::default() };
        let response = orchestrator().process(request, "alice").await.unwrap();
        assert_eq!(response.status, ResponseStatus::Completed);
        assert_eq!(response.successful_sources, vec!["tickets".to_string()]);
        assert!(response.failed_sources.is_empty());
    }

    #[tokio::test]
    async fn process_rejects_an_empty_query() {
        let request = MultiSourceRequest { query: String::new(), ..Default::default() };
        let error = orchestrator().process(request, "alice").await.unwrap_err();
        assert_eq!(error.code(), conflux_common::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn stream_emits_events_in_the_required_order_and_terminates_with_done() {
        let request = MultiSourceRequest { query: "open tickets".into(), sources: Some(vec!["tickets".to_string()]), ..Default::default() };
        let orchestrator = orchestrator();
        let events: Vec<Event> = orchestrator.stream(request, "alice".to_string(), CancellationToken::new()).collect().await;

        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types.first(), Some(&EventType::Started));
        let plan_complete_idx = types.iter().position(|t| *t == EventType::PlanComplete).unwrap();
        let first_source_start_idx = types.iter().position(|t| *t == EventType::SourceStart).unwrap();
        assert!(plan_complete_idx < first_source_start_idx);

        let source_starts = types.iter().filter(|t| **t == EventType::SourceStart).count();
        let source_completes = types.iter().filter(|t| **t == EventType::SourceComplete).count();
        assert_eq!(source_starts, source_completes);

        let last_source_complete_idx = types.iter().rposition(|t| *t == EventType::SourceComplete).unwrap();
        let first_chunk_idx = types.iter().position(|t| *t == EventType::SynthesisChunk);
        if let Some(first_chunk_idx) = first_chunk_idx {
            assert!(last_source_complete_idx < first_chunk_idx);
        }

        assert_eq!(types.last(), Some(&EventType::Done));
    }

    #[tokio::test]
    async fn stream_emits_error_event_and_stops_for_an_invalid_request() {
        let request = MultiSourceRequest { query: String::new(), ..Default::default() };
        let orchestrator = orchestrator();
        let events: Vec<Event> = orchestrator.stream(request, "alice".to_string(), CancellationToken::new()).collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Error);
    }

    #[tokio::test]
    async fn stream_honours_pre_cancelled_token() {
        let request = MultiSourceRequest { query: "open tickets".into(), ..Default::default() };
        let orchestrator = orchestrator();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events: Vec<Event> = orchestrator.stream(request, "alice".to_string(), cancel).collect().await;
        assert_eq!(events.last().map(|e| e.event_type), Some(EventType::Error));
    }
}
