//! Tool Gateway (C5): the only crate allowed to hold decrypted credentials
//! or a live connector session.
//!
//! Grounded on the teacher's `McpManager` session-map pattern: sessions are
//! created lazily per `(principal_id, provider_id)`, touched on every use,
//! and never handed out by value — callers only ever see the gateway's
//! public, session-free surface (`list_tools`/`call_tool`).

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::Utc;
use conflux_breaker::BreakerRegistry;
use conflux_cache::{Namespace, NamespacedCache, canonicalize, request_fingerprint};
use conflux_common::{Error, Result};
use conflux_connector::{CredentialStore, ProviderConnector, ProviderRegistry, ProviderSession, ToolCallRecord, ToolDescriptor};
use serde_json::Value;

/// Tunables for the gateway's own behaviour, separate from the breaker's and
/// cache's own configs (owned by their respective crates).
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    pub tool_call_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { tool_call_timeout: Duration::from_secs(60) }
    }
}

type SessionKey = (String, String);

/// Façade in front of the provider registry, credential store, cache and
/// breaker registry. Owns every [`ProviderSession`] in the process.
pub struct Gateway {
    config: GatewayConfig,
    providers: Arc<ProviderRegistry>,
    credentials: Arc<dyn CredentialStore>,
    cache: Arc<NamespacedCache>,
    breakers: Arc<BreakerRegistry>,
    sessions: RwLock<HashMap<SessionKey, Arc<RwLock<ProviderSession>>>>,
}

impl Gateway {
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        providers: Arc<ProviderRegistry>,
        credentials: Arc<dyn CredentialStore>,
        cache: Arc<NamespacedCache>,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self { config, providers, credentials, cache, breakers, sessions: RwLock::new(HashMap::new()) }
    }

    /// Fetch (or create) the session for `(principal_id, provider_id)`,
    /// touching it on the way out.
    async fn session_for(&self, principal_id: &str, provider_id: &str) -> Result<Arc<RwLock<ProviderSession>>> {
        let key: SessionKey = (principal_id.to_string(), provider_id.to_string());
        if let Some(existing) = self.sessions.read().expect("session map lock poisoned").get(&key) {
            existing.write().expect("session lock poisoned").touch();
            return Ok(existing.clone());
        }

        let credentials = self
            .credentials
            .get_credentials(principal_id, provider_id)
            .await?
            .ok_or_else(|| Error::missing_credentials(provider_id))?;
        let session = Arc::new(RwLock::new(ProviderSession::new(provider_id, principal_id, credentials)));

        let mut sessions = self.sessions.write().expect("session map lock poisoned");
        let session = sessions.entry(key).or_insert(session).clone();
        Ok(session)
    }

    fn credentials_snapshot(session: &Arc<RwLock<ProviderSession>>) -> HashMap<String, String> {
        session.read().expect("session lock poisoned").decrypted_credentials.clone()
    }

    /// List a provider's tools, consulting the tools-namespace cache first.
    pub async fn list_tools(&self, principal_id: &str, provider_id: &str) -> Result<Vec<ToolDescriptor>> {
        if let Some(cached) = self.cache.get(Namespace::Tools, provider_id) {
            if let Ok(tools) = serde_json::from_value::<Vec<ToolDescriptor>>(cached) {
                return Ok(tools);
            }
        }

        let connector = self.providers.require(provider_id)?;
        let session = self.session_for(principal_id, provider_id).await?;
        let credentials = Self::credentials_snapshot(&session);

        let outcome = self.breakers.guard(provider_id, || connector.list_tools(&credentials)).await;
        let tools = Self::unwrap_breaker_outcome(provider_id, outcome)?;

        if let Ok(value) = serde_json::to_value(&tools) {
            self.cache.set(Namespace::Tools, provider_id, value);
        }
        Ok(tools)
    }

    /// Invoke `tool_name` on `provider_id` with `args`, consulting and then
    /// populating the results-namespace cache keyed by `request_fingerprint`.
    ///
    /// `args` is validated against the tool's own [`ToolDescriptor::input_schema`]
    /// before anything is dispatched; an unknown tool or a schema mismatch
    /// returns `VALIDATION_ERROR` without touching the cache, the session, or
    /// the breaker (B3). The returned `bool` is `true` when the value came
    /// from the results cache rather than a live connector call.
    pub async fn call_tool(&self, principal_id: &str, provider_id: &str, tool_name: &str, args: &Value) -> Result<(Value, bool)> {
        self.providers.require(provider_id)?;
        let tools = self.list_tools(principal_id, provider_id).await?;
        Self::validate_args(&tools, tool_name, args)?;

        let canonical_args = canonicalize(args);
        let fingerprint = request_fingerprint(provider_id, tool_name, &canonical_args);

        if let Some(cached) = self.cache.get(Namespace::Results, &fingerprint) {
            Self::log_call(ToolCallRecord {
                request_fingerprint: fingerprint,
                started_at: Utc::now(),
                ended_at: Some(Utc::now()),
                cached: true,
                succeeded: true,
                error_code: None,
            });
            return Ok((cached, true));
        }

        let connector = self.providers.require(provider_id)?;
        let session = self.session_for(principal_id, provider_id).await?;
        let credentials = Self::credentials_snapshot(&session);

        let started_at = Utc::now();
        let call = connector.call_tool(&credentials, tool_name, &canonical_args);
        let timed = tokio::time::timeout(self.config.tool_call_timeout, call);

        let outcome = self
            .breakers
            .guard(provider_id, || async {
                match timed.await {
                    Ok(result) => result,
                    Err(_) => Err(Error::connector_unreachable(provider_id, "tool call timed out")),
                }
            })
            .await;
        let result = Self::unwrap_breaker_outcome(provider_id, outcome);

        Self::log_call(ToolCallRecord {
            request_fingerprint: fingerprint.clone(),
            started_at,
            ended_at: Some(Utc::now()),
            cached: false,
            succeeded: result.is_ok(),
            error_code: result.as_ref().err().map(|e| e.code().as_str().to_string()),
        });

        let result = result?;
        self.cache.set(Namespace::Results, &fingerprint, result.clone());
        Ok((result, false))
    }

    /// Structural check that `tool_name` is one of `tools` and that `args`
    /// satisfies its `input_schema` — an object with every `required` key
    /// present when the schema declares one. Not a general JSON Schema
    /// validator, just enough to catch the unknown-tool and missing-field
    /// cases the spec calls out.
    fn validate_args(tools: &[ToolDescriptor], tool_name: &str, args: &Value) -> Result<()> {
        let descriptor = tools
            .iter()
            .find(|t| t.name == tool_name)
            .ok_or_else(|| Error::validation_field(format!("unknown tool '{tool_name}'"), "tool_name"))?;

        let schema = &descriptor.input_schema;
        if schema.get("type").and_then(Value::as_str) == Some("object") && !args.is_object() {
            return Err(Error::validation_field(format!("'{tool_name}' requires an object argument"), "args"));
        }

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            let provided = args.as_object();
            for field in required {
                let Some(field_name) = field.as_str() else { continue };
                let present = provided.is_some_and(|map| map.contains_key(field_name));
                if !present {
                    return Err(Error::validation_field(
                        format!("'{tool_name}' is missing required argument '{field_name}'"),
                        field_name,
                    ));
                }
            }
        }

        Ok(())
    }

    fn log_call(record: ToolCallRecord) {
        tracing::debug!(
            fingerprint = %record.request_fingerprint,
            cached = record.cached,
            succeeded = record.succeeded,
            error_code = ?record.error_code,
            "tool call"
        );
    }

    fn unwrap_breaker_outcome<T>(provider_id: &str, outcome: Result<Result<T>, u64>) -> Result<T> {
        match outcome {
            Ok(inner) => inner,
            Err(retry_after_seconds) => Err(Error::circuit_open(provider_id, retry_after_seconds)),
        }
    }

    /// Best-effort warm-up: populate the tools cache for each provider,
    /// logging and skipping failures rather than propagating them.
    pub async fn prewarm(&self, principal_id: &str, provider_ids: &[String]) {
        for provider_id in provider_ids {
            if let Err(error) = self.list_tools(principal_id, provider_id).await {
                tracing::warn!(provider = %provider_id, %error, "prewarm failed");
            }
        }
    }

    /// Drop every live session. Idempotent.
    pub fn shutdown(&self) {
        self.sessions.write().expect("session map lock poisoned").clear();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use conflux_breaker::BreakerConfig;
    use conflux_cache::CacheConfig;
    use conflux_connector::{InMemoryCredentialStore, Provider};

    use super::*;

    struct CountingConnector {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ProviderConnector for CountingConnector {
        fn provider_id(&self) -> &str {
            "tickets"
        }

        async fn list_tools(&self, _credentials: &HashMap<String, String>) -> Result<Vec<ToolDescriptor>> {
            Ok(vec![
                ToolDescriptor { name: "list_projects".into(), description: "list projects".into(), input_schema: serde_json::json!({}) },
                ToolDescriptor {
                    name: "create_project".into(),
                    description: "create a project".into(),
                    input_schema: serde_json::json!({"type": "object", "required": ["name"]}),
                },
            ])
        }

        async fn call_tool(&self, _credentials: &HashMap<String, String>, _tool_name: &str, _args: &Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::tool_execution("boom"));
            }
            Ok(serde_json::json!({"ok": true}))
        }
    }

    fn gateway(connector: Arc<CountingConnector>) -> Gateway {
        let providers = Arc::new(ProviderRegistry::new());
        providers.register(
            Provider { id: "tickets".into(), display_name: "Tickets".into(), enabled: true, priority: 0 },
            connector,
        );
        let credentials = Arc::new(InMemoryCredentialStore::new());
        credentials.insert("alice", "tickets", HashMap::from([("token".to_string(), "secret".to_string())]));
        Gateway::new(
            GatewayConfig::default(),
            providers,
            credentials,
            Arc::new(NamespacedCache::new(CacheConfig::default())),
            Arc::new(BreakerRegistry::new(BreakerConfig::default())),
        )
    }

    #[tokio::test]
    async fn missing_credentials_surface_as_taxonomy_error() {
        let providers = Arc::new(ProviderRegistry::new());
        providers.register(
            Provider { id: "tickets".into(), display_name: "Tickets".into(), enabled: true, priority: 0 },
            Arc::new(CountingConnector { calls: AtomicUsize::new(0), fail: false }),
        );
        let gw = Gateway::new(
            GatewayConfig::default(),
            providers,
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(NamespacedCache::new(CacheConfig::default())),
            Arc::new(BreakerRegistry::new(BreakerConfig::default())),
        );
        let err = gw.list_tools("alice", "tickets").await.unwrap_err();
        assert_eq!(err.code(), conflux_common::ErrorCode::MissingCredentials);
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected_before_session_lookup() {
        let gw = gateway(Arc::new(CountingConnector { calls: AtomicUsize::new(0), fail: false }));
        let err = gw.call_tool("alice", "ghost", "x", &serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.code(), conflux_common::ErrorCode::InvalidProvider);
    }

    #[tokio::test]
    async fn repeated_call_tool_hits_cache_on_second_invocation() {
        let connector = Arc::new(CountingConnector { calls: AtomicUsize::new(0), fail: false });
        let gw = gateway(connector.clone());
        let args = serde_json::json!({"b": 1, "a": 2});
        let (_, first_cached) = gw.call_tool("alice", "tickets", "list_projects", &args).await.unwrap();
        let (_, second_cached) = gw.call_tool("alice", "tickets", "list_projects", &args).await.unwrap();
        assert!(!first_cached);
        assert!(second_cached);
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn argument_reordering_still_hits_cache() {
        let connector = Arc::new(CountingConnector { calls: AtomicUsize::new(0), fail: false });
        let gw = gateway(connector.clone());
        gw.call_tool("alice", "tickets", "list_projects", &serde_json::json!({"a": 1, "b": 2})).await.unwrap();
        let (_, cached) =
            gw.call_tool("alice", "tickets", "list_projects", &serde_json::json!({"b": 2, "a": 1})).await.unwrap();
        assert!(cached);
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_tool_name_is_rejected_as_validation_error() {
        let gw = gateway(Arc::new(CountingConnector { calls: AtomicUsize::new(0), fail: false }));
        let err = gw.call_tool("alice", "tickets", "delete_everything", &serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.code(), conflux_common::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn missing_required_argument_is_rejected_as_validation_error() {
        let gw = gateway(Arc::new(CountingConnector { calls: AtomicUsize::new(0), fail: false }));
        let err = gw.call_tool("alice", "tickets", "create_project", &serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.code(), conflux_common::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn validation_failures_never_consume_a_breaker_failure_slot() {
        let connector = Arc::new(CountingConnector { calls: AtomicUsize::new(0), fail: false });
        let gw = gateway(connector.clone());
        for _ in 0..5 {
            let err = gw.call_tool("alice", "tickets", "create_project", &serde_json::json!({})).await.unwrap_err();
            assert_eq!(err.code(), conflux_common::ErrorCode::ValidationError);
        }
        // A real call still goes through afterwards: the breaker never tripped.
        let (_, cached) = gw.call_tool("alice", "tickets", "list_projects", &serde_json::json!({})).await.unwrap();
        assert!(!cached);
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_failures_trip_breaker_into_circuit_open() {
        let connector = Arc::new(CountingConnector { calls: AtomicUsize::new(0), fail: true });
        let gw = gateway(connector);
        for i in 0..3 {
            let args = serde_json::json!({"i": i});
            let _ = gw.call_tool("alice", "tickets", "list_projects", &args).await;
        }
        let err = gw.call_tool("alice", "tickets", "list_projects", &serde_json::json!({"i": 99})).await.unwrap_err();
        assert_eq!(err.code(), conflux_common::ErrorCode::CircuitOpen);
    }

    #[tokio::test]
    async fn shutdown_clears_sessions_and_forces_recreation() {
        let connector = Arc::new(CountingConnector { calls: AtomicUsize::new(0), fail: false });
        let gw = gateway(connector);
        gw.list_tools("alice", "tickets").await.unwrap();
        assert_eq!(gw.sessions.read().expect("lock").len(), 1);
        gw.shutdown();
        assert_eq!(gw.sessions.read().expect("lock").len(), 0);
    }
}
