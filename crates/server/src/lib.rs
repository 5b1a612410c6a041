//! HTTP surface for the multi-source query orchestrator (§6).
//!
//! Thin axum wiring over the core crates: request/response shapes, an
//! SSE transcoding of the orchestrator's progress events, rate-limit and
//! tracing middleware, and Prometheus exposition. No orchestration logic
//! lives here.
pub mod demo;
pub mod error_response;
pub mod rate_limit;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveHeadersLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

pub use state::AppState;

/// Build the full router: routes, then the middleware stack (outermost to
/// innermost as applied): panic catching, sensitive-header marking, request
/// ID generation/propagation, tracing, CORS, security headers, rate
/// limiting.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/query", post(routes::query))
        .route("/api/query/stream", post(routes::query_stream))
        .route("/api/detect", post(routes::detect))
        .route("/api/suggest", post(routes::suggest))
        .route("/api/sources", get(routes::sources));

    let router = Router::new().route("/healthz", get(routes::healthz)).merge(api);

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(routes::metrics));

    let cors = CorsLayer::new().allow_origin(Any).allow_methods([Method::GET, Method::POST]).allow_headers(Any);

    router
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_gate))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION]))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

/// Bind and serve `router` on `addr`, shutting down gracefully on ctrl-c.
pub async fn serve(router: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install ctrl-c handler; shutdown signal disabled");
        std::future::pending::<()>().await;
    }
}
