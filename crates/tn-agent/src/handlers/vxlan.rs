//! `GET /vxlan/status`, `PUT /vxlan/peers`, `POST /vxlan/connectivity`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::Json;
use serde::{Deserialize, Serialize};
use tn_validators::validate_ip_address;

use crate::error::AppError;
use crate::state::AgentState;

#[derive(Debug, Deserialize)]
pub struct SliceQuery {
    pub slice_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VxlanStatusView {
    pub slice_id: String,
    pub device_name: String,
    pub state: String,
    pub remote_ips: Vec<String>,
    pub failing_peers: Vec<String>,
    pub encap_overhead_bytes: u32,
}

pub async fn vxlan_status(
    Extension(state): Extension<Arc<AgentState>>,
    Query(q): Query<SliceQuery>,
) -> Result<Json<VxlanStatusView>, AppError> {
    let (slice_id, overlay, _shaping) = state.resolve_slice(q.slice_id.as_deref()).await?;
    let status = overlay.status().await;
    Ok(Json(VxlanStatusView {
        slice_id,
        device_name: status.device_name,
        state: format!("{:?}", status.state),
        remote_ips: status.remote_ips,
        failing_peers: status.failing_peers,
        encap_overhead_bytes: overlay.overhead_bytes(),
    }))
}

pub async fn put_peers(
    Extension(state): Extension<Arc<AgentState>>,
    Query(q): Query<SliceQuery>,
    Json(peers): Json<Vec<String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    for peer in &peers {
        validate_ip_address(peer).map_err(tn_types::error::TnError::from)?;
    }

    let (_slice_id, overlay, _shaping) = state.resolve_slice(q.slice_id.as_deref()).await?;
    let report = overlay.update_peers(peers.into_iter().collect()).await;
    Ok(Json(serde_json::json!({
        "added": report.added_ok,
        "removed": report.removed_ok,
        "failed": report.failed,
    })))
}

pub async fn connectivity(
    Extension(state): Extension<Arc<AgentState>>,
    Query(q): Query<SliceQuery>,
) -> Result<Json<HashMap<String, bool>>, AppError> {
    let (_slice_id, overlay, _shaping) = state.resolve_slice(q.slice_id.as_deref()).await?;
    overlay.health_tick().await;
    let status = overlay.status().await;
    let mut result = HashMap::new();
    for peer in status.remote_ips {
        let reachable = !status.failing_peers.contains(&peer);
        result.insert(peer, reachable);
    }
    Ok(Json(result))
}
