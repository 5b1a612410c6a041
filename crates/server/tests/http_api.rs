#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the HTTP surface: bind a real listener and drive it
//! with `reqwest`, the way the teacher's gateway tests exercise its router.

use std::{net::SocketAddr, sync::OnceLock};

use conflux_config::OrchestratorConfig;

#[cfg(feature = "metrics")]
fn metrics_handle() -> std::sync::Arc<conflux_metrics::MetricsHandle> {
    static HANDLE: OnceLock<std::sync::Arc<conflux_metrics::MetricsHandle>> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            std::sync::Arc::new(
                conflux_metrics::init_metrics(conflux_metrics::MetricsRecorderConfig {
                    enabled: true,
                    global_labels: Vec::new(),
                })
                .expect("metrics recorder installs exactly once per test binary"),
            )
        })
        .clone()
}

async fn start_server() -> SocketAddr {
    let config = OrchestratorConfig::default();
    let state = conflux_server::AppState::build(
        &config,
        #[cfg(feature = "metrics")]
        metrics_handle(),
    );
    let router = conflux_server::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn healthz_reports_ok_and_is_not_rate_limited() {
    let addr = start_server().await;
    let client = reqwest::Client::new();
    for _ in 0..5 {
        let resp = client.get(format!("http://{addr}/healthz")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().get("x-ratelimit-limit-minute").is_none());
    }
}

#[tokio::test]
async fn sources_lists_the_seeded_demo_providers() {
    let addr = start_server().await;
    let resp = reqwest::get(format!("http://{addr}/api/sources")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Vec<conflux_connector::Provider> = resp.json().await.unwrap();
    let ids: Vec<_> = body.into_iter().map(|p| p.id).collect();
    assert!(ids.contains(&"tickets".to_string()));
    assert!(ids.contains(&"mail".to_string()));
}

#[tokio::test]
async fn query_against_a_single_source_returns_a_synthesized_answer() {
    let addr = start_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/query"))
        .json(&serde_json::json!({"query": "list open tickets", "sources": ["tickets"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body.get("response").is_some());
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn query_with_malformed_session_id_returns_validation_error() {
    let addr = start_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/query"))
        .json(&serde_json::json!({"query": "hi", "session_id": "a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn detect_reports_is_multi_source_for_a_cross_provider_query() {
    let addr = start_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/detect"))
        .json(&serde_json::json!({"query": "tickets and mail"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body.get("suggested").is_some());
}

#[tokio::test]
async fn rate_limited_routes_carry_ratelimit_headers() {
    let addr = start_server().await;
    let resp = reqwest::get(format!("http://{addr}/api/sources")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-ratelimit-limit-minute"));
    assert!(resp.headers().contains_key("x-ratelimit-remaining-minute"));
}
