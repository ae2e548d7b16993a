//! `GET /status` — composite agent status across every owned component.

use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AgentState;

#[derive(Debug, Serialize)]
pub struct SliceStatusView {
    pub slice_id: String,
    pub overlay_device: String,
    pub overlay_state: String,
    pub shaping_rule_count: usize,
    pub shaping_degraded: bool,
}

#[derive(Debug, Serialize)]
pub struct AgentStatusView {
    pub healthy: bool,
    pub slices: Vec<SliceStatusView>,
    pub active_probe_servers: Vec<u16>,
}

pub async fn status(Extension(state): Extension<Arc<AgentState>>) -> Result<Json<AgentStatusView>, AppError> {
    let healthy = state.is_healthy().await;
    let active_probe_servers = state.probe.active_ports().await;

    let slices = state.slices.read().await;
    let mut views = Vec::with_capacity(slices.len());
    for (slice_id, runtime) in slices.iter() {
        let overlay_status = runtime.overlay.status().await;
        let shaping_snapshot = runtime.shaping.snapshot().await;
        views.push(SliceStatusView {
            slice_id: slice_id.clone(),
            overlay_device: overlay_status.device_name,
            overlay_state: format!("{:?}", overlay_status.state),
            shaping_rule_count: shaping_snapshot.rules.len(),
            shaping_degraded: shaping_snapshot.degraded,
        });
    }

    Ok(Json(AgentStatusView {
        healthy,
        slices: views,
        active_probe_servers,
    }))
}
