//! In-memory demo connectors and credentials, registered so the binary is
//! runnable end-to-end without wiring real upstreams. Not part of the core;
//! a real deployment swaps these for `ProviderConnector` impls over its own
//! transports and a persisted `CredentialStore` (§6, egress collaborators).
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use conflux_common::Result;
use conflux_connector::{InMemoryCredentialStore, Provider, ProviderConnector, ProviderRegistry, ToolDescriptor};
use serde_json::Value;

struct EchoConnector {
    provider_id: &'static str,
    tool_name: &'static str,
    tool_description: &'static str,
    canned_result: Value,
}

#[async_trait]
impl ProviderConnector for EchoConnector {
    fn provider_id(&self) -> &str {
        self.provider_id
    }

    async fn list_tools(&self, _credentials: &HashMap<String, String>) -> Result<Vec<ToolDescriptor>> {
        Ok(vec![ToolDescriptor {
            name: self.tool_name.to_string(),
            description: self.tool_description.to_string(),
            input_schema: serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        }])
    }

    async fn call_tool(&self, _credentials: &HashMap<String, String>, _tool_name: &str, _args: &Value) -> Result<Value> {
        Ok(self.canned_result.clone())
    }
}

/// Demo principal every seeded credential is scoped to.
pub const DEMO_PRINCIPAL: &str = "demo";

/// Register the closed demo provider set with canned connectors, and seed
/// matching credentials for [`DEMO_PRINCIPAL`].
pub fn seed(providers: &ProviderRegistry, credentials: &InMemoryCredentialStore) {
    let specs: [(&'static str, &'static str, &'static str, &'static str, Value); 3] = [
        (
            "tickets",
            "Tickets",
            "list_tickets",
            "list open tickets matching a query",
            serde_json::json!({"open": 3, "items": ["TICK-101", "TICK-102", "TICK-103"]}),
        ),
        (
            "mail",
            "Mail",
            "search_mail",
            "search inbox messages matching a query",
            serde_json::json!({"unread": 2, "items": ["Re: deployment window", "Invoice #882"]}),
        ),
        (
            "chat",
            "Chat",
            "search_messages",
            "search channel messages matching a query",
            serde_json::json!({"matches": 1, "items": ["#ops: rollout complete"]}),
        ),
    ];

    for (id, display_name, tool_name, tool_description, canned_result) in specs {
        providers.register(
            Provider { id: id.to_string(), display_name: display_name.to_string(), enabled: true, priority: 0 },
            Arc::new(EchoConnector { provider_id: id, tool_name, tool_description, canned_result }),
        );
        credentials.insert(DEMO_PRINCIPAL, id, HashMap::from([("token".to_string(), "demo-token".to_string())]));
    }
}
