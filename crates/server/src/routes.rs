use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use conflux_common::Error;
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::{error_response::ApiError, state::AppState};

/// Request body for `POST /api/query` and `POST /api/query/stream` (§6).
#[derive(Debug, Deserialize)]
pub struct QueryRequestBody {
    pub query: String,
    pub sources: Option<Vec<String>>,
    pub session_id: Option<String>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    #[serde(default = "default_include_plan")]
    pub include_plan: bool,
}

fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_max_sources() -> usize {
    3
}

fn default_include_plan() -> bool {
    true
}

fn validate_session_id(session_id: &Option<String>) -> Result<(), Error> {
    let Some(session_id) = session_id else { return Ok(()) };
    let len_ok = (8..=64).contains(&session_id.len());
    let chars_ok = session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !len_ok || !chars_ok {
        return Err(Error::validation_field("session_id must match [A-Za-z0-9-]{8,64}", "session_id"));
    }
    Ok(())
}

impl TryFrom<QueryRequestBody> for conflux_orchestrator::MultiSourceRequest {
    type Error = Error;

    fn try_from(body: QueryRequestBody) -> Result<Self, Self::Error> {
        validate_session_id(&body.session_id)?;
        Ok(Self {
            query: body.query,
            sources: body.sources,
            session_id: body.session_id,
            confidence_threshold: body.confidence_threshold,
            max_sources: body.max_sources,
            include_plan: body.include_plan,
        })
    }
}

/// `POST /api/query` — synchronous multi-source query (§6).
pub async fn query(State(state): State<AppState>, Json(body): Json<QueryRequestBody>) -> Response {
    let request = match conflux_orchestrator::MultiSourceRequest::try_from(body) {
        Ok(request) => request,
        Err(error) => return ApiError(error).into_response(),
    };
    match state.orchestrator.process(request, crate::demo::DEMO_PRINCIPAL).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => ApiError(error).into_response(),
    }
}

/// `POST /api/query/stream` — Server-Sent-Events progress stream (§4.11, §6).
///
/// Headers mirror the reference implementation's streaming endpoint: no
/// caching, a held-open connection, and a hint (`X-Accel-Buffering: no`) for
/// proxies that would otherwise buffer the body and defeat incremental
/// delivery.
pub async fn query_stream(State(state): State<AppState>, Json(body): Json<QueryRequestBody>) -> Response {
    let request = match conflux_orchestrator::MultiSourceRequest::try_from(body) {
        Ok(request) => request,
        Err(error) => return ApiError(error).into_response(),
    };

    let orchestrator: Arc<conflux_orchestrator::Orchestrator> = state.orchestrator;
    let cancel = CancellationToken::new();
    let events = orchestrator.stream(request, crate::demo::DEMO_PRINCIPAL.to_string(), cancel);
    let sse_events = events.map(to_sse_event);

    let mut response = Sse::new(sse_events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

fn to_sse_event(event: conflux_orchestrator::Event) -> Result<SseEvent, Infallible> {
    let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
    Ok(SseEvent::default().data(data))
}

#[derive(Debug, Deserialize)]
pub struct DetectRequestBody {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestedSource {
    pub provider_id: String,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct DetectResponseBody {
    pub is_multi_source: bool,
    pub suggested: Vec<SuggestedSource>,
    pub reasoning: String,
}

/// `POST /api/detect` — is this query multi-source, and which providers look
/// relevant (§6)?
pub async fn detect(State(state): State<AppState>, Json(body): Json<DetectRequestBody>) -> Result<Json<DetectResponseBody>, ApiError> {
    let providers = state.providers.describe_all().into_iter().filter(|p| p.enabled).collect::<Vec<_>>();
    let ranked = state.detector.detect(&body.query, &providers).await?;
    let is_multi_source = ranked.iter().filter(|r| r.confidence >= 0.5).count() >= 2;
    let reasoning = ranked
        .iter()
        .map(|r| format!("{}: {}", r.provider_id, r.reasoning))
        .collect::<Vec<_>>()
        .join("; ");
    let suggested =
        ranked.iter().map(|r| SuggestedSource { provider_id: r.provider_id.clone(), confidence: r.confidence }).collect();
    Ok(Json(DetectResponseBody { is_multi_source, suggested, reasoning }))
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequestBody {
    pub query: String,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_max_suggestions() -> usize {
    5
}

/// `POST /api/suggest` — ranked provider relevance, truncated to
/// `max_suggestions` (§6).
pub async fn suggest(
    State(state): State<AppState>,
    Json(body): Json<SuggestRequestBody>,
) -> Result<Json<Vec<conflux_reasoner::ProviderRelevance>>, ApiError> {
    let providers = state.providers.describe_all().into_iter().filter(|p| p.enabled).collect::<Vec<_>>();
    let mut ranked = state.detector.detect(&body.query, &providers).await?;
    ranked.truncate(body.max_suggestions);
    Ok(Json(ranked))
}

/// `GET /api/sources` — every registered provider, enabled or not (§6).
pub async fn sources(State(state): State<AppState>) -> Json<Vec<conflux_connector::Provider>> {
    Json(state.providers.describe_all())
}

/// `GET /healthz` — liveness probe, excluded from rate limiting.
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /metrics` — Prometheus exposition format.
#[cfg(feature = "metrics")]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
