//! Agent Runtime State (spec §3, §5) — the set of live component instances
//! plus the locks that guard config mutation and cross-component reads.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tn_monitor::BandwidthMonitor;
use tn_overlay::OverlayManager;
use tn_probe::{LatencyResult, ProbeEngine, ThroughputResult};
use tn_shaping::ShapingEngine;
use tn_types::error::TnError;
use tn_types::{AgentConfig, AgentNodeConfig};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProbeResultRecord {
    Throughput(ThroughputResult),
    Latency(LatencyResult),
}

/// Per-slice set of live components (spec §3 "Agent Runtime State": one
/// overlay per active tunnel, one shaping engine per shaped interface).
pub struct SliceRuntime {
    pub config: AgentConfig,
    pub overlay: Arc<OverlayManager>,
    pub shaping: Arc<ShapingEngine>,
    pub applied_at: DateTime<Utc>,
}

pub struct AgentState {
    pub node_config: RwLock<AgentNodeConfig>,
    pub healthy: RwLock<bool>,
    pub slices: RwLock<HashMap<String, SliceRuntime>>,
    pub probe: Arc<ProbeEngine>,
    pub monitor: Arc<BandwidthMonitor>,
    /// In-memory only — see DESIGN.md's resolution of the open question on
    /// whether probe-result storage must survive an agent restart.
    pub probe_results: RwLock<HashMap<String, ProbeResultRecord>>,
    /// Stop handles for the monitor's per-interface sampling loops spawned
    /// by `AgentCore::start`, sent to on `AgentCore::shutdown`.
    pub monitor_stop: RwLock<Vec<tokio::sync::oneshot::Sender<()>>>,
}

impl AgentState {
    pub fn new(node_config: AgentNodeConfig) -> Self {
        Self {
            node_config: RwLock::new(node_config),
            healthy: RwLock::new(false),
            slices: RwLock::new(HashMap::new()),
            probe: Arc::new(ProbeEngine::new()),
            monitor: Arc::new(BandwidthMonitor::default()),
            probe_results: RwLock::new(HashMap::new()),
            monitor_stop: RwLock::new(Vec::new()),
        }
    }

    pub async fn mark_healthy(&self, healthy: bool) {
        *self.healthy.write().await = healthy;
    }

    pub async fn is_healthy(&self) -> bool {
        *self.healthy.read().await
    }

    /// Resolve which slice's overlay/shaping instance a `/vxlan/*` or
    /// `/tc/*` request addresses: the explicitly named slice, or — when the
    /// agent carries exactly one — its sole slice. Ambiguous with neither
    /// named nor singular is a 400.
    pub async fn resolve_slice(
        &self,
        slice_id: Option<&str>,
    ) -> Result<(String, Arc<OverlayManager>, Arc<ShapingEngine>), TnError> {
        let slices = self.slices.read().await;
        let key = match slice_id {
            Some(id) => id.to_string(),
            None if slices.len() == 1 => slices.keys().next().cloned().unwrap(),
            None => {
                return Err(TnError::Validation(tn_types::error::ValidationError::Field {
                    field: "slice_id".into(),
                    reason: "must be specified when the agent carries more than one slice".into(),
                }))
            }
        };
        let runtime = slices
            .get(&key)
            .ok_or_else(|| TnError::NotFound(format!("slice {key:?} not applied on this agent")))?;
        Ok((key, runtime.overlay.clone(), runtime.shaping.clone()))
    }
}
