//! Per-principal sliding-window rate limiting, mirrored on the response
//! headers the Python reference implementation's middleware set
//! (`X-RateLimit-Limit-Minute` / `X-RateLimit-Remaining-Minute`; `Retry-After`
//! plus `X-RateLimit-*` on the 429 itself).
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use conflux_common::Error;

use crate::{error_response::ApiError, state::AppState};

/// Paths exempt from rate limiting, mirroring the Python middleware's
/// `excluded_paths` default.
const EXCLUDED_PATHS: &[&str] = &["/healthz", "/metrics"];

pub async fn rate_limit_gate(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if EXCLUDED_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let forwarded_for = request.headers().get("x-forwarded-for").and_then(|v| v.to_str().ok());
    let principal_id = request.headers().get("x-principal-id").and_then(|v| v.to_str().ok());
    let key = conflux_ratelimit::resolve_key(principal_id, forwarded_for, &addr.ip().to_string());

    let now = std::time::Instant::now();
    match state.rate_limiter.check(&key, now) {
        conflux_ratelimit::Decision::Allow => {
            let mut response = next.run(request).await;
            let remaining = state.rate_limiter.remaining_minute(&key, now);
            let limit = state.rate_limiter.limit_per_minute();
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
                headers.insert("x-ratelimit-remaining-minute", value);
            }
            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                headers.insert("x-ratelimit-limit-minute", value);
            }
            response
        },
        conflux_ratelimit::Decision::Reject { retry_after_seconds } => {
            ApiError(Error::rate_limit_exceeded(retry_after_seconds)).into_response()
        },
    }
}
