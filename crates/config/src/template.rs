//! Default configuration template with every option documented.
//!
//! Written out by `conflux-server --init-config`; uncommented defaults match
//! [`crate::schema::OrchestratorConfig::default`] exactly.

/// Generate the default config template, with the server bound to `port`.
pub fn default_config_template(port: u16) -> String {
    format!(
        r##"# Conflux orchestrator configuration
# ===================================
# Environment variable substitution is supported: ${{ENV_VAR}}

max_concurrent_legs_per_request = 3   # upper bound on parallel provider fan-out per query
request_deadline_seconds        = 120  # whole-request wall-clock budget
tool_call_timeout_seconds       = 60   # per tool-call budget within a reasoner loop
reasoner_max_iterations         = 10   # tool-calling round cap before forcing a final answer

[breaker]
failure_threshold    = 3   # consecutive failures before a provider's circuit opens
success_threshold    = 2   # consecutive half-open successes before the circuit closes
open_timeout_seconds = 60  # time an open circuit waits before allowing a trial request

[cache]
tools_ttl_seconds   = 300    # provider tool-descriptor cache lifetime
results_ttl_seconds = 30     # per-query result cache lifetime
max_entries         = 10000  # eviction ceiling across all cache namespaces

[rate_limit]
per_minute = 60    # requests allowed per principal per rolling minute
per_hour   = 1000  # requests allowed per principal per rolling hour

[server]
bind = "127.0.0.1"
port = {port}
"##
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OrchestratorConfig;

    #[test]
    fn template_parses_back_to_the_documented_defaults() {
        let rendered = default_config_template(8080);
        let parsed: OrchestratorConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, OrchestratorConfig::default());
    }

    #[test]
    fn template_honours_the_requested_port() {
        let rendered = default_config_template(9090);
        let parsed: OrchestratorConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.server.port, 9090);
    }
}
