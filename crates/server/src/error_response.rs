use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    Json,
};
use conflux_common::Error;

/// Wraps [`Error`] so it can be returned directly from an axum handler,
/// mapping its taxonomy to transport status and a structured JSON body
/// (§7 — errors carry a stable `code`, a message, and optional `details`).
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": {
                "code": self.0.code().as_str(),
                "message": self.0.to_string(),
                "details": self.0.details(),
            }
        }));
        let mut response = (status, body).into_response();

        if let Error::CircuitOpen { retry_after_seconds, .. } | Error::RateLimitExceeded { retry_after_seconds } = &self.0 {
            if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
