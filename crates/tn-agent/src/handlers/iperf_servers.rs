//! `GET`/`POST`/`DELETE /iperf/servers[/{port}]` — list, start, or stop probe
//! servers.

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AgentState;

pub async fn list_servers(Extension(state): Extension<Arc<AgentState>>) -> Json<Vec<u16>> {
    Json(state.probe.active_ports().await)
}

pub async fn start_server(
    Extension(state): Extension<Arc<AgentState>>,
    Path(port): Path<u16>,
) -> Result<Json<Value>, AppError> {
    state.probe.start_server(port).await.map_err(tn_types::error::TnError::from)?;
    Ok(Json(json!({"port": port, "started": true})))
}

pub async fn stop_server(
    Extension(state): Extension<Arc<AgentState>>,
    Path(port): Path<u16>,
) -> Result<Json<Value>, AppError> {
    state.probe.stop_server(port).await.map_err(tn_types::error::TnError::from)?;
    Ok(Json(json!({"port": port, "stopped": true})))
}
