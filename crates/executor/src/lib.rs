//! Fan-out Executor (C9): runs one tool-use loop per provider in a `Plan`,
//! bounded by a semaphore, an iteration cap, a loop-fault guard, and a
//! shared request deadline.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use conflux_cache::{canonicalize, request_fingerprint};
use conflux_common::{Error, Result};
use conflux_gateway::Gateway;
use conflux_planner::Plan;
use conflux_reasoner::{HistoryTurn, Reasoner, ToolResult, ToolUseStep};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Tunables for the fan-out executor, independent of the gateway's own
/// per-call timeout (which bounds a single tool invocation, not a leg).
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub max_concurrent_legs: usize,
    /// `reasoner_max_iterations` (spec §6, default 10).
    pub max_iterations: usize,
    pub total_deadline: Duration,
    pub payload_cap_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_concurrent_legs: 3, max_iterations: 10, total_deadline: Duration::from_secs(30), payload_cap_bytes: 65_536 }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceQueryResult {
    pub provider_id: String,
    pub succeeded: bool,
    pub summary: String,
    pub payload: Value,
    pub tools_called: Vec<String>,
    pub duration_ms: u64,
    pub completed_at: chrono::DateTime<Utc>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl SourceQueryResult {
    fn failed(provider_id: &str, started_at: std::time::Instant, tools_called: Vec<String>, error: &Error) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            succeeded: false,
            summary: String::new(),
            payload: Value::Null,
            tools_called,
            duration_ms: started_at.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
            error_code: Some(error.code().as_str().to_string()),
            error_message: Some(error.to_string()),
        }
    }
}

pub struct Executor {
    gateway: Arc<Gateway>,
    reasoner: Arc<dyn Reasoner>,
    config: ExecutorConfig,
}

impl Executor {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>, reasoner: Arc<dyn Reasoner>, config: ExecutorConfig) -> Self {
        Self { gateway, reasoner, config }
    }

    /// Run every leg named in `plan.chosen`, preserving plan order in the
    /// returned list. Legs run concurrently under `max_concurrent_legs`;
    /// completion order is unrelated to the returned order.
    pub async fn execute(&self, plan: &Plan, principal_id: &str, cancel: CancellationToken) -> Vec<SourceQueryResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_legs.max(1)));
        let deadline = tokio::time::Instant::now() + self.config.total_deadline;

        let legs = plan.chosen.iter().map(|provider_id| {
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let provider_id = provider_id.clone();
            let query = plan.query.clone();
            async move {
                let _permit = semaphore.acquire().await.ok();
                let started_at = std::time::Instant::now();
                match tokio::time::timeout_at(deadline, self.run_leg(&provider_id, principal_id, &query, &cancel)).await {
                    Ok(result) => result,
                    Err(_) => SourceQueryResult::failed(&provider_id, started_at, vec![], &Error::internal("deadline")),
                }
            }
        });

        futures::future::join_all(legs).await
    }

    /// Like [`Executor::execute`], but invokes `on_leg_complete` as each leg
    /// finishes (completion order, not plan order) so a caller can emit
    /// progress events without waiting for the whole fan-out to resolve. The
    /// returned list is still reordered to match `plan.chosen`.
    pub async fn execute_with_progress(
        &self,
        plan: &Plan,
        principal_id: &str,
        cancel: CancellationToken,
        on_leg_complete: impl Fn(&SourceQueryResult) + Send + Sync,
    ) -> Vec<SourceQueryResult> {
        use futures::stream::{FuturesUnordered, StreamExt};

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_legs.max(1)));
        let deadline = tokio::time::Instant::now() + self.config.total_deadline;

        let mut legs: FuturesUnordered<_> = plan
            .chosen
            .iter()
            .map(|provider_id| {
                let semaphore = semaphore.clone();
                let cancel = cancel.clone();
                let provider_id = provider_id.clone();
                let query = plan.query.clone();
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    let started_at = std::time::Instant::now();
                    match tokio::time::timeout_at(deadline, self.run_leg(&provider_id, principal_id, &query, &cancel)).await {
                        Ok(result) => result,
                        Err(_) => SourceQueryResult::failed(&provider_id, started_at, vec![], &Error::internal("deadline")),
                    }
                }
            })
            .collect();

        let mut results = Vec::with_capacity(plan.chosen.len());
        while let Some(result) = legs.next().await {
            on_leg_complete(&result);
            results.push(result);
        }
        results.sort_by_key(|r| plan.chosen.iter().position(|p| p == &r.provider_id).unwrap_or(usize::MAX));
        results
    }

    async fn run_leg(&self, provider_id: &str, principal_id: &str, query: &str, cancel: &CancellationToken) -> SourceQueryResult {
        let started_at = std::time::Instant::now();
        let mut tools_called = Vec::new();

        let tools = match self.gateway.list_tools(principal_id, provider_id).await {
            Ok(tools) => tools,
            Err(error) => return SourceQueryResult::failed(provider_id, started_at, tools_called, &error),
        };

        let mut history: Vec<HistoryTurn> = Vec::new();
        let mut last_failed_fingerprint: Option<String> = None;
        let mut consecutive_same_failures = 0usize;
        let mut last_payload = Value::Null;

        for iteration in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                return SourceQueryResult::failed(provider_id, started_at, tools_called, &Error::internal("cancelled"));
            }

            let step = match self.reasoner.select_tools(query, &tools, &history).await {
                Ok(step) => step,
                Err(error) => return SourceQueryResult::failed(provider_id, started_at, tools_called, &error),
            };

            let calls = match step {
                ToolUseStep::FinalAnswer(summary) => {
                    return SourceQueryResult {
                        provider_id: provider_id.to_string(),
                        succeeded: true,
                        summary,
                        payload: last_payload,
                        tools_called,
                        duration_ms: started_at.elapsed().as_millis() as u64,
                        completed_at: Utc::now(),
                        error_code: None,
                        error_message: None,
                    };
                },
                ToolUseStep::ToolCalls(calls) => calls,
            };

            history.push(HistoryTurn::ToolCalls(calls.clone()));
            let mut results = Vec::with_capacity(calls.len());

            for call in &calls {
                tools_called.push(call.name.clone());
                let canonical_args = canonicalize(&call.arguments);
                let fingerprint = request_fingerprint(provider_id, &call.name, &canonical_args);

                match self.gateway.call_tool(principal_id, provider_id, &call.name, &canonical_args).await {
                    Ok((output, cached)) => {
                        last_payload = self.cap_payload(output.clone());
                        results.push(ToolResult {
                            tool_call_id: call.id.clone(),
                            name: call.name.clone(),
                            output,
                            succeeded: true,
                            cached,
                        });
                        last_failed_fingerprint = None;
                        consecutive_same_failures = 0;
                    },
                    Err(error) => {
                        if error.code() == conflux_common::ErrorCode::CircuitOpen {
                            return SourceQueryResult::failed(provider_id, started_at, tools_called, &error);
                        }
                        results.push(ToolResult {
                            tool_call_id: call.id.clone(),
                            name: call.name.clone(),
                            output: Value::Null,
                            succeeded: false,
                            cached: false,
                        });
                        if last_failed_fingerprint.as_deref() == Some(fingerprint.as_str()) {
                            consecutive_same_failures += 1;
                        } else {
                            consecutive_same_failures = 1;
                            last_failed_fingerprint = Some(fingerprint);
                        }
                        if consecutive_same_failures >= 2 {
                            return SourceQueryResult::failed(provider_id, started_at, tools_called, &error);
                        }
                    },
                }
            }

            history.push(HistoryTurn::ToolResults(results));
            if iteration + 1 == self.config.max_iterations {
                tracing::warn!(provider = provider_id, "tool-use loop exceeded max_iterations");
                return SourceQueryResult::failed(
                    provider_id,
                    started_at,
                    tools_called,
                    &Error::internal("max_iterations_exceeded"),
                );
            }
        }

        SourceQueryResult::failed(provider_id, started_at, tools_called, &Error::internal("max_iterations_exceeded"))
    }

    fn cap_payload(&self, value: Value) -> Value {
        let serialized = value.to_string();
        if serialized.len() <= self.config.payload_cap_bytes {
            return value;
        }
        serde_json::json!({ "truncated": true, "original_size_bytes": serialized.len() })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::atomic::AtomicUsize};

    use async_trait::async_trait;
    use conflux_breaker::{BreakerConfig, BreakerRegistry};
    use conflux_cache::{CacheConfig, NamespacedCache};
    use conflux_connector::{InMemoryCredentialStore, Provider, ProviderConnector, ProviderRegistry, ToolDescriptor};
    use conflux_gateway::GatewayConfig;
    use conflux_planner::ExecutionMode;
    use conflux_reasoner::ProviderRelevance;

    use super::*;

    struct FixedToolConnector;

    #[async_trait]
    impl ProviderConnector for FixedToolConnector {
        fn provider_id(&self) -> &str {
            "tickets"
        }

        async fn list_tools(&self, _credentials: &HashMap<String, String>) -> Result<Vec<ToolDescriptor>> {
            Ok(vec![ToolDescriptor {
                name: "list_projects".into(),
                description: "list ticket projects".into(),
                input_schema: serde_json::json!({"properties": {"query": {"type": "string"}}}),
            }])
        }

        async fn call_tool(&self, _credentials: &HashMap<String, String>, _tool_name: &str, _args: &Value) -> Result<Value> {
            Ok(serde_json::json!(["alpha", "beta"]))
        }
    }

    struct AlwaysFailingConnector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderConnector for AlwaysFailingConnector {
        fn provider_id(&self) -> &str {
            "tickets"
        }

        async fn list_tools(&self, _credentials: &HashMap<String, String>) -> Result<Vec<ToolDescriptor>> {
            Ok(vec![ToolDescriptor {
                name: "list_projects".into(),
                description: "list ticket projects".into(),
                input_schema: serde_json::json!({}),
            }])
        }

        async fn call_tool(&self, _credentials: &HashMap<String, String>, _tool_name: &str, _args: &Value) -> Result<Value> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(Error::tool_execution("boom"))
        }
    }

    fn plan(chosen: Vec<&str>) -> Plan {
        Plan {
            query: "list my ticket projects".to_string(),
            ranked: vec![ProviderRelevance {
                provider_id: "tickets".into(),
                confidence: 0.9,
                reasoning: "test".into(),
                suggested_approach: "direct".into(),
            }],
            chosen: chosen.into_iter().map(str::to_string).collect(),
            mode: ExecutionMode::Parallel,
            reasoning: "test".into(),
            estimated_ms: 100,
        }
    }

    fn gateway_with(connector: Arc<dyn ProviderConnector>) -> Arc<Gateway> {
        let providers = Arc::new(ProviderRegistry::new());
        providers.register(Provider { id: "tickets".into(), display_name: "Tickets".into(), enabled: true, priority: 0 }, connector);
        let credentials = Arc::new(InMemoryCredentialStore::new());
        credentials.insert("alice", "tickets", HashMap::from([("token".to_string(), "secret".to_string())]));
        Arc::new(Gateway::new(
            GatewayConfig::default(),
            providers,
            credentials,
            Arc::new(NamespacedCache::new(CacheConfig::default())),
            Arc::new(BreakerRegistry::new(BreakerConfig::default())),
        ))
    }

    #[tokio::test]
    async fn successful_leg_reports_summary_and_preserves_plan_order() {
        let gateway = gateway_with(Arc::new(FixedToolConnector));
        let executor = Executor::new(gateway, Arc::new(conflux_reasoner::RuleBasedReasoner::new()), ExecutorConfig::default());
        let results = executor.execute(&plan(vec!["tickets"]), "alice", CancellationToken::new()).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].succeeded);
        assert_eq!(results[0].provider_id, "tickets");
        assert_eq!(results[0].tools_called, vec!["list_projects".to_string()]);
    }

    #[tokio::test]
    async fn loop_fault_guard_stops_after_two_consecutive_same_fingerprint_failures() {
        let connector = Arc::new(AlwaysFailingConnector { calls: AtomicUsize::new(0) });
        let gateway = gateway_with(connector.clone());
        let executor = Executor::new(gateway, Arc::new(conflux_reasoner::RuleBasedReasoner::new()), ExecutorConfig::default());
        let results = executor.execute(&plan(vec!["tickets"]), "alice", CancellationToken::new()).await;
        assert!(!results[0].succeeded);
        assert_eq!(connector.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn execute_with_progress_invokes_callback_for_every_leg() {
        let gateway = gateway_with(Arc::new(FixedToolConnector));
        let executor = Executor::new(gateway, Arc::new(conflux_reasoner::RuleBasedReasoner::new()), ExecutorConfig::default());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_for_callback = seen.clone();
        let results = executor
            .execute_with_progress(&plan(vec!["tickets"]), "alice", CancellationToken::new(), move |result| {
                seen_for_callback.lock().unwrap().push(result.provider_id.clone());
            })
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["tickets".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_before_first_iteration_fails_the_leg() {
        let gateway = gateway_with(Arc::new(FixedToolConnector));
        let executor = Executor::new(gateway, Arc::new(conflux_reasoner::RuleBasedReasoner::new()), ExecutorConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let results = executor.execute(&plan(vec!["tickets"]), "alice", cancel).await;
        assert!(!results[0].succeeded);
        assert_eq!(results[0].error_message.as_deref(), Some("internal error: cancelled"));
    }
}
