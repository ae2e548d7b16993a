//! `GET /health` — 200 if healthy, 503 otherwise.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AgentState;

pub async fn health(Extension(state): Extension<Arc<AgentState>>) -> (StatusCode, Json<Value>) {
    if state.is_healthy().await {
        (StatusCode::OK, Json(json!({"status": "ok"})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy"})),
        )
    }
}
