//! `GET /metrics`, `GET /metrics/export` — aggregate monitor summary and a
//! full JSON dump of every tracked interface's ring.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use serde::Serialize;
use tn_types::CounterSample;

use crate::state::AgentState;

const MOVING_AVERAGE_WINDOW_SECS: i64 = 30;

#[derive(Debug, Serialize)]
pub struct InterfaceSummary {
    pub latest: Option<CounterSample>,
    pub moving_average_bps: Option<f64>,
}

pub async fn metrics(
    Extension(state): Extension<Arc<AgentState>>,
) -> Json<HashMap<String, InterfaceSummary>> {
    let mut out = HashMap::new();
    for iface in state.monitor.tracked_interfaces().await {
        let latest = state.monitor.latest(&iface).await.ok();
        let moving_average_bps = state
            .monitor
            .moving_average_bps(&iface, MOVING_AVERAGE_WINDOW_SECS)
            .await
            .ok();
        out.insert(iface, InterfaceSummary { latest, moving_average_bps });
    }
    Json(out)
}

pub async fn metrics_export(
    Extension(state): Extension<Arc<AgentState>>,
) -> Json<HashMap<String, Vec<CounterSample>>> {
    let mut out = HashMap::new();
    for iface in state.monitor.tracked_interfaces().await {
        if let Ok(samples) = state.monitor.export(&iface).await {
            out.insert(iface, samples);
        }
    }
    Json(out)
}
