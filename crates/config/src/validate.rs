//! Range and consistency checks over a loaded [`OrchestratorConfig`].
//!
//! Unlike parse errors (which abort loading), these are collected and
//! returned together so an operator sees every problem in one pass.
use crate::schema::OrchestratorConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "breaker.failure_threshold"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration value.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

fn error(diagnostics: &mut Vec<Diagnostic>, path: &str, message: impl Into<String>) {
    diagnostics.push(Diagnostic { severity: Severity::Error, path: path.to_string(), message: message.into() });
}

fn warning(diagnostics: &mut Vec<Diagnostic>, path: &str, message: impl Into<String>) {
    diagnostics.push(Diagnostic { severity: Severity::Warning, path: path.to_string(), message: message.into() });
}

/// Validate a loaded config against the constraints spec §6 implies:
/// nothing here is zero, breaker thresholds must make sense together, and
/// cache/rate-limit bounds must leave headroom for real traffic.
pub fn validate(config: &OrchestratorConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    if config.max_concurrent_legs_per_request == 0 {
        error(&mut diagnostics, "max_concurrent_legs_per_request", "must be at least 1");
    }
    if config.request_deadline_seconds == 0 {
        error(&mut diagnostics, "request_deadline_seconds", "must be at least 1");
    }
    if config.tool_call_timeout_seconds == 0 {
        error(&mut diagnostics, "tool_call_timeout_seconds", "must be at least 1");
    }
    if config.tool_call_timeout_seconds > config.request_deadline_seconds {
        warning(
            &mut diagnostics,
            "tool_call_timeout_seconds",
            "exceeds request_deadline_seconds; a single slow tool call can consume the whole request budget",
        );
    }
    if config.reasoner_max_iterations == 0 {
        error(&mut diagnostics, "reasoner_max_iterations", "must be at least 1");
    }

    if config.breaker.failure_threshold == 0 {
        error(&mut diagnostics, "breaker.failure_threshold", "must be at least 1");
    }
    if config.breaker.success_threshold == 0 {
        error(&mut diagnostics, "breaker.success_threshold", "must be at least 1");
    }
    if config.breaker.open_timeout_seconds == 0 {
        error(&mut diagnostics, "breaker.open_timeout_seconds", "must be at least 1");
    }

    if config.cache.max_entries == 0 {
        error(&mut diagnostics, "cache.max_entries", "must be at least 1");
    }

    if config.rate_limit.per_minute == 0 {
        warning(&mut diagnostics, "rate_limit.per_minute", "zero blocks every request");
    }
    if config.rate_limit.per_hour != 0 && config.rate_limit.per_hour < config.rate_limit.per_minute {
        warning(
            &mut diagnostics,
            "rate_limit.per_hour",
            "lower than per_minute; the hourly bound will bind first",
        );
    }

    ValidationResult { diagnostics }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let result = validate(&OrchestratorConfig::default());
        assert!(!result.has_errors());
    }

    #[test]
    fn zero_deadline_is_an_error() {
        let config = OrchestratorConfig { request_deadline_seconds: 0, ..Default::default() };
        let result = validate(&config);
        assert!(result.has_errors());
    }

    #[test]
    fn tool_timeout_exceeding_request_deadline_is_a_warning_not_an_error() {
        let config = OrchestratorConfig {
            tool_call_timeout_seconds: 200,
            request_deadline_seconds: 120,
            ..Default::default()
        };
        let result = validate(&config);
        assert!(!result.has_errors());
        assert!(result.diagnostics.iter().any(|d| d.path == "tool_call_timeout_seconds"));
    }

    #[test]
    fn inconsistent_rate_limit_bounds_warn() {
        let config = OrchestratorConfig {
            rate_limit: crate::schema::RateLimitConfig { per_minute: 100, per_hour: 50 },
            ..Default::default()
        };
        let result = validate(&config);
        assert!(result.diagnostics.iter().any(|d| d.path == "rate_limit.per_hour"));
    }
}
