use std::{collections::HashMap, time::Instant};

use serde::{Deserialize, Serialize};

/// One external system the orchestrator can query — immutable identity (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// From a closed set, e.g. `tickets`, `chat`, `object-store`, `mail`,
    /// `db`, `code-host`, `shop`.
    pub id: String,
    pub display_name: String,
    pub enabled: bool,
    /// Tie-break priority used by the detector (§4.7) when confidence ties.
    pub priority: i32,
}

/// A named, schema-described operation exposed by a connector (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Mutable, principal-scoped handle to a live connector session (§3).
///
/// `decrypted_credentials` and `connection_handle` never leave the Tool
/// Gateway; nothing outside `conflux-gateway` is allowed to hold a clone.
pub struct ProviderSession {
    pub provider_id: String,
    pub principal_id: String,
    pub decrypted_credentials: HashMap<String, String>,
    pub last_used_at: Instant,
}

impl ProviderSession {
    #[must_use]
    pub fn new(provider_id: impl Into<String>, principal_id: impl Into<String>, credentials: HashMap<String, String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            principal_id: principal_id.into(),
            decrypted_credentials: credentials,
            last_used_at: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }

    #[must_use]
    pub fn idle_for(&self) -> std::time::Duration {
        self.last_used_at.elapsed()
    }
}

/// Per-attempt record of a tool call (§3).
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub request_fingerprint: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub cached: bool,
    pub succeeded: bool,
    pub error_code: Option<String>,
}
