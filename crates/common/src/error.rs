use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// The flat, finite error taxonomy shared by every layer of the orchestrator.
///
/// Every code path returns either a value or one of these variants; no
/// component may let a provider-native or library-native exception escape
/// upward unwrapped — it gets mapped into this taxonomy at the boundary
/// where it was produced.
#[derive(Error, Debug)]
pub enum Error {
    #[error("authentication token missing")]
    AuthTokenMissing,

    #[error("authentication token invalid")]
    AuthTokenInvalid,

    #[error("authentication token expired")]
    AuthTokenExpired,

    #[error("user not found")]
    UserNotFound,

    #[error("{message}")]
    Validation { message: String, details: Option<Value> },

    #[error("unknown provider: {provider_id}")]
    InvalidProvider { provider_id: String },

    #[error("missing credentials for provider: {provider_id}")]
    MissingCredentials { provider_id: String },

    #[error("tool execution failed: {message}")]
    ToolExecution { message: String, details: Option<Value> },

    #[error("connector unreachable: {provider_id}: {message}")]
    ConnectorUnreachable { provider_id: String, message: String },

    #[error("circuit open for provider {provider_id}")]
    CircuitOpen { provider_id: String, retry_after_seconds: u64 },

    #[error("rate limit exceeded")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("upstream rate limit: {message}")]
    UpstreamRateLimit { message: String, retry_after_seconds: Option<u64> },

    #[error("database error: {message}")]
    Database { message: String },

    #[error("internal error: {message}")]
    Internal { message: String, details: Option<Value> },
}

/// Machine-readable code, stable across releases — this is what callers
/// should branch on, never the display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthTokenMissing,
    AuthTokenInvalid,
    AuthTokenExpired,
    UserNotFound,
    ValidationError,
    InvalidProvider,
    MissingCredentials,
    ToolExecutionError,
    ConnectorUnreachable,
    CircuitOpen,
    RateLimitExceeded,
    UpstreamRateLimit,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthTokenMissing => "AUTH_TOKEN_MISSING",
            Self::AuthTokenInvalid => "AUTH_TOKEN_INVALID",
            Self::AuthTokenExpired => "AUTH_TOKEN_EXPIRED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidProvider => "INVALID_PROVIDER",
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::ToolExecutionError => "TOOL_EXECUTION_ERROR",
            Self::ConnectorUnreachable => "CONNECTOR_UNREACHABLE",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::UpstreamRateLimit => "UPSTREAM_RATE_LIMIT",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Inverse of [`ErrorCode::as_str`], for config-driven code lists (e.g. a
    /// breaker's `excluded_errors`) that arrive as strings.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "AUTH_TOKEN_MISSING" => Some(Self::AuthTokenMissing),
            "AUTH_TOKEN_INVALID" => Some(Self::AuthTokenInvalid),
            "AUTH_TOKEN_EXPIRED" => Some(Self::AuthTokenExpired),
            "USER_NOT_FOUND" => Some(Self::UserNotFound),
            "VALIDATION_ERROR" => Some(Self::ValidationError),
            "INVALID_PROVIDER" => Some(Self::InvalidProvider),
            "MISSING_CREDENTIALS" => Some(Self::MissingCredentials),
            "TOOL_EXECUTION_ERROR" => Some(Self::ToolExecutionError),
            "CONNECTOR_UNREACHABLE" => Some(Self::ConnectorUnreachable),
            "CIRCUIT_OPEN" => Some(Self::CircuitOpen),
            "RATE_LIMIT_EXCEEDED" => Some(Self::RateLimitExceeded),
            "UPSTREAM_RATE_LIMIT" => Some(Self::UpstreamRateLimit),
            "DATABASE_ERROR" => Some(Self::DatabaseError),
            "INTERNAL_ERROR" => Some(Self::InternalError),
            _ => None,
        }
    }
}

impl Error {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), details: None }
    }

    #[must_use]
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(serde_json::json!({ "field": field.into() })),
        }
    }

    #[must_use]
    pub fn invalid_provider(provider_id: impl Into<String>) -> Self {
        Self::InvalidProvider { provider_id: provider_id.into() }
    }

    #[must_use]
    pub fn missing_credentials(provider_id: impl Into<String>) -> Self {
        Self::MissingCredentials { provider_id: provider_id.into() }
    }

    #[must_use]
    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::ToolExecution { message: message.into(), details: None }
    }

    #[must_use]
    pub fn connector_unreachable(provider_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectorUnreachable { provider_id: provider_id.into(), message: message.into() }
    }

    #[must_use]
    pub fn circuit_open(provider_id: impl Into<String>, retry_after_seconds: u64) -> Self {
        Self::CircuitOpen { provider_id: provider_id.into(), retry_after_seconds }
    }

    #[must_use]
    pub fn rate_limit_exceeded(retry_after_seconds: u64) -> Self {
        Self::RateLimitExceeded { retry_after_seconds }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), details: None }
    }

    /// Stable machine-readable classification of this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthTokenMissing => ErrorCode::AuthTokenMissing,
            Self::AuthTokenInvalid => ErrorCode::AuthTokenInvalid,
            Self::AuthTokenExpired => ErrorCode::AuthTokenExpired,
            Self::UserNotFound => ErrorCode::UserNotFound,
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::InvalidProvider { .. } => ErrorCode::InvalidProvider,
            Self::MissingCredentials { .. } => ErrorCode::MissingCredentials,
            Self::ToolExecution { .. } => ErrorCode::ToolExecutionError,
            Self::ConnectorUnreachable { .. } => ErrorCode::ConnectorUnreachable,
            Self::CircuitOpen { .. } => ErrorCode::CircuitOpen,
            Self::RateLimitExceeded { .. } => ErrorCode::RateLimitExceeded,
            Self::UpstreamRateLimit { .. } => ErrorCode::UpstreamRateLimit,
            Self::Database { .. } => ErrorCode::DatabaseError,
            Self::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Transport status this error maps to, for HTTP-shaped ingress.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthTokenMissing | Self::AuthTokenInvalid | Self::AuthTokenExpired => 401,
            Self::UserNotFound => 404,
            Self::Validation { .. } => 422,
            Self::InvalidProvider { .. } | Self::MissingCredentials { .. } => 400,
            Self::ToolExecution { .. } | Self::Database { .. } | Self::Internal { .. } => 500,
            Self::ConnectorUnreachable { .. } => 502,
            Self::CircuitOpen { .. } => 503,
            Self::RateLimitExceeded { .. } | Self::UpstreamRateLimit { .. } => 429,
        }
    }

    /// Structured, secret-free details suitable for a JSON error body.
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Validation { details, .. } | Self::ToolExecution { details, .. } | Self::Internal { details, .. } => {
                details.clone()
            },
            Self::InvalidProvider { provider_id } | Self::MissingCredentials { provider_id } => {
                Some(serde_json::json!({ "provider_id": provider_id }))
            },
            Self::ConnectorUnreachable { provider_id, .. } => Some(serde_json::json!({ "provider_id": provider_id })),
            Self::CircuitOpen { provider_id, retry_after_seconds } => {
                Some(serde_json::json!({ "provider_id": provider_id, "retry_after_seconds": retry_after_seconds }))
            },
            Self::RateLimitExceeded { retry_after_seconds } => {
                Some(serde_json::json!({ "retry_after_seconds": retry_after_seconds }))
            },
            Self::UpstreamRateLimit { retry_after_seconds, .. } => {
                retry_after_seconds.map(|s| serde_json::json!({ "retry_after_seconds": s }))
            },
            Self::AuthTokenMissing
            | Self::AuthTokenInvalid
            | Self::AuthTokenExpired
            | Self::UserNotFound
            | Self::Database { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_matches_taxonomy() {
        assert_eq!(Error::AuthTokenMissing.http_status(), 401);
        assert_eq!(Error::UserNotFound.http_status(), 404);
        assert_eq!(Error::validation("bad").http_status(), 422);
        assert_eq!(Error::invalid_provider("foo").http_status(), 400);
        assert_eq!(Error::circuit_open("tickets", 30).http_status(), 503);
        assert_eq!(Error::rate_limit_exceeded(5).http_status(), 429);
    }

    #[test]
    fn details_never_leak_on_auth_errors() {
        assert!(Error::AuthTokenMissing.details().is_none());
        assert!(Error::AuthTokenInvalid.details().is_none());
    }

    #[test]
    fn circuit_open_details_carry_retry_after() {
        let err = Error::circuit_open("mail", 42);
        let details = err.details().expect("circuit_open always carries details");
        assert_eq!(details["retry_after_seconds"], 42);
    }

    #[test]
    fn error_code_parse_is_the_inverse_of_as_str() {
        assert_eq!(ErrorCode::parse("VALIDATION_ERROR"), Some(ErrorCode::ValidationError));
        assert_eq!(ErrorCode::parse("CIRCUIT_OPEN"), Some(ErrorCode::CircuitOpen));
        assert_eq!(ErrorCode::parse("not_a_code"), None);
    }
}
