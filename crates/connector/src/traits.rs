use std::collections::HashMap;

use async_trait::async_trait;
use conflux_common::Result;
use serde_json::Value;

use crate::model::ToolDescriptor;

/// A provider connector's wire protocol, reduced to the two operations the
/// core assumes (§6): `list_tools` and `call_tool`. Implementations wrap
/// their own transport (HTTP, subprocess, SDK) and must translate any
/// transport-native error into [`conflux_common::Error`] before returning.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    /// Stable identity used for cache/breaker/session keys.
    fn provider_id(&self) -> &str;

    async fn list_tools(&self, credentials: &HashMap<String, String>) -> Result<Vec<ToolDescriptor>>;

    async fn call_tool(&self, credentials: &HashMap<String, String>, tool_name: &str, args: &Value) -> Result<Value>;
}

/// `get_credentials(principal, provider) → map | not_found`, called once per
/// session creation (§6).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credentials(&self, principal_id: &str, provider_id: &str) -> Result<Option<HashMap<String, String>>>;
}

/// A credential store backed by an in-process map, standing in for the
/// encrypted persistence layer the spec places out of core scope (§1).
#[derive(Default)]
pub struct InMemoryCredentialStore {
    entries: dashmap::DashMap<(String, String), HashMap<String, String>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, principal_id: impl Into<String>, provider_id: impl Into<String>, credentials: HashMap<String, String>) {
        self.entries.insert((principal_id.into(), provider_id.into()), credentials);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_credentials(&self, principal_id: &str, provider_id: &str) -> Result<Option<HashMap<String, String>>> {
        Ok(self.entries.get(&(principal_id.to_string(), provider_id.to_string())).map(|e| e.clone()))
    }
}
