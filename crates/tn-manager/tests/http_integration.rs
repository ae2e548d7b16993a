//! HTTP-level integration tests for the manager's control API, mirroring
//! `tn-agent`'s `tests/http_integration.rs`.

use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use serde_json::json;
use tn_manager::router::build_router;
use tn_reconciler::{InMemoryConfigStore, Reconciler};
use tower::ServiceExt;

fn build_test_app() -> axum::Router {
    let reconciler = Arc::new(Reconciler::new(Arc::new(InMemoryConfigStore::new())));
    build_router(reconciler)
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn slice_payload(id: &str) -> serde_json::Value {
    json!({
        "slice_id": id,
        "endpoints": [
            {"node_name": "node-a", "ip": "10.0.0.1"},
            {"node_name": "node-b", "ip": "10.0.0.2"}
        ],
        "vni": 100,
        "policy": {
            "downlink_mbps": null,
            "uplink_mbps": null,
            "latency_ms": null,
            "jitter_ms": null,
            "loss_percent": null,
            "priority": null,
            "qos_class": "best_effort"
        },
        "profile": "eMBB",
        "generation": 0
    })
}

#[tokio::test]
async fn health_is_ok() {
    let app = build_test_app();
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_list_get_slice_round_trips() {
    let app = build_test_app();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/slices")
                .header("content-type", "application/json")
                .body(Body::from(slice_payload("s1").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/slices").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let resp = app
        .oneshot(Request::builder().uri("/slices/s1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["spec"]["slice_id"], json!("s1"));
    assert_eq!(body["status"]["phase"], json!("pending"));
}

#[tokio::test]
async fn creating_duplicate_slice_is_conflict() {
    let app = build_test_app();
    let req = || {
        Request::builder()
            .method("POST")
            .uri("/slices")
            .header("content-type", "application/json")
            .body(Body::from(slice_payload("dup").to_string()))
            .unwrap()
    };
    let resp = app.clone().oneshot(req()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app.oneshot(req()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn get_unknown_slice_is_404() {
    let app = build_test_app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/slices/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ack_on_unknown_slice_is_404() {
    let app = build_test_app();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/slices/does-not-exist/ack")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"node_name": "node-a", "observed_generation": 0}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_marks_slice_deleting() {
    let app = build_test_app();
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/slices")
                .header("content-type", "application/json")
                .body(Body::from(slice_payload("to-delete").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let resp = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/slices/to-delete")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["phase"], json!("deleting"));
}
