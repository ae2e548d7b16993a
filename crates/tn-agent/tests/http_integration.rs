//! HTTP-level integration tests for the agent's control API.
//!
//! Exercises only routes that do not touch the external command surface
//! (overlay/shaping/probe calls shell out to `ip`/`tc`/`iperf3`, which this
//! sandboxed test run does not assume are present) — route wiring, request
//! validation, and error-body shape are all reachable without it.

use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use tn_agent::core::AgentCore;
use tn_agent::router::build_router;
use tn_agent::state::AgentState;
use tn_types::{AgentNodeConfig, QosClass};
use tower::ServiceExt;

fn empty_node_config() -> AgentNodeConfig {
    AgentNodeConfig {
        cluster_name: "test-cluster".into(),
        network_cidr: "10.0.0.0/16".into(),
        vxlan: None,
        bandwidth_policy: None,
        monitoring_port: 9100,
        qos_class: QosClass::default(),
    }
}

async fn build_test_app() -> axum::Router {
    let state = Arc::new(AgentState::new(empty_node_config()));
    let core = Arc::new(AgentCore::new(state.clone()));
    core.start(&[]).await.expect("startup with no declared vxlan must not touch the command surface");
    build_router(state, core)
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::json!({ "raw": String::from_utf8_lossy(&bytes).to_string() }))
}

#[tokio::test]
async fn health_is_ok_once_started() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_reports_no_slices_initially() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["slices"].as_array().unwrap().is_empty());
    assert_eq!(body["healthy"], serde_json::json!(true));
}

#[tokio::test]
async fn get_config_round_trips() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(Request::builder().uri("/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["cluster_name"], serde_json::json!("test-cluster"));
}

#[tokio::test]
async fn put_config_replaces_it() {
    let app = build_test_app().await;
    let mut new_config = empty_node_config();
    new_config.cluster_name = "updated-cluster".into();
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/config")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&new_config).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::builder().uri("/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["cluster_name"], serde_json::json!("updated-cluster"));
}

#[tokio::test]
async fn run_test_rejects_excess_throughput_duration_before_touching_probe() {
    let app = build_test_app().await;
    let req_body = serde_json::json!({
        "kind": "throughput",
        "server_ip": "10.0.0.1",
        "server_port": 5201,
        "duration_secs": 999999,
    });
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tests")
                .header("content-type", "application/json")
                .body(Body::from(req_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap_or("").contains("duration"));
}

#[tokio::test]
async fn get_unknown_test_is_404() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/tests/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_vxlan_peers_rejects_injection_payload_before_invoking_secure_exec() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/vxlan/peers")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!(["10.0.0.1; rm -rf /"]).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn vxlan_status_without_any_slice_is_400() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/vxlan/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_export_is_empty_before_any_sample() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/metrics/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body.as_object().unwrap().is_empty());
}
