//! Agent Core (spec §4.7) — composes the overlay, shaping, probe and
//! monitor components, owns startup/shutdown ordering, slice application,
//! and the periodic self-check.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tn_overlay::{OverlayConfig, OverlayManager, OverlayState};
use tn_shaping::ShapingEngine;
use tn_types::error::TnError;
use tn_types::AgentConfig;
use tracing::{error, info, warn};

use crate::state::{AgentState, SliceRuntime};

/// Bandwidth Monitor sample period (spec §4.6 "default 1 s").
const MONITOR_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("slice apply had {0} failing sub-operation(s): {1:?}")]
    Partial(usize, Vec<String>),
}

pub struct AgentCore {
    pub state: Arc<AgentState>,
}

impl AgentCore {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }

    /// Startup order (spec §4.7): overlay, shaping, probe servers, monitor,
    /// control API (started by the caller after this returns), mark healthy.
    /// Any step failure aborts start-up and tears down in reverse.
    pub async fn start(&self, initial_probe_ports: &[u16]) -> Result<(), TnError> {
        // The node-level config's vxlan/bandwidth_policy, if declared, seed
        // a default tunnel; per-slice overlays/shaping are created later by
        // `configure_slice`. A node with neither is a valid idle agent.
        let node_config = self.state.node_config.read().await.clone();

        if let Some(vxlan) = &node_config.vxlan {
            let overlay = Arc::new(OverlayManager::new(OverlayConfig {
                device_name: vxlan.device_name.clone(),
                vni: vxlan.vni,
                local_ip: vxlan.local_ip.clone(),
                port: vxlan.port,
                mtu: vxlan.mtu,
                remote_ips: vxlan.remote_ips.iter().cloned().collect(),
                learning: vxlan.learning,
            }));
            if let Err(e) = overlay.create().await {
                error!(error = %e, "agent: startup overlay create failed, aborting");
                return Err(TnError::from(e));
            }
        }

        for &port in initial_probe_ports {
            if let Err(e) = self.state.probe.start_server(port).await {
                error!(port, error = %e, "agent: startup probe server failed, aborting");
                self.teardown().await;
                return Err(TnError::from(e));
            }
        }

        if let Some(vxlan) = &node_config.vxlan {
            self.spawn_monitor(vxlan.device_name.clone()).await;
        }

        self.state.mark_healthy(true).await;
        info!("agent: startup complete, marked healthy");
        Ok(())
    }

    /// Spawn the Bandwidth Monitor's sampling loop for `iface`, registering
    /// its stop handle so `shutdown` can cancel it (spec §4.7 "start the
    /// monitor" / "stop the monitor").
    async fn spawn_monitor(&self, iface: String) {
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
        let monitor = self.state.monitor.clone();
        tokio::spawn(async move { monitor.run(iface, MONITOR_SAMPLE_INTERVAL, stop_rx).await });
        self.state.monitor_stop.write().await.push(stop_tx);
    }

    async fn teardown(&self) {
        for port in self.state.probe.active_ports().await {
            let _ = self.state.probe.stop_server(port).await;
        }
    }

    /// `configure_slice(slice_id, agent_config)` (spec §4.7): diff the
    /// incoming tunnel config against the current state, ordered overlay
    /// then shaping then probe-server reconciliation. Not transactional —
    /// on partial failure, the successfully-applied portion is retained and
    /// a structured error lists what failed so the self-heal tick retries.
    pub async fn configure_slice(
        &self,
        slice_id: &str,
        config: AgentConfig,
    ) -> Result<(), ApplyError> {
        let mut failed: Vec<String> = Vec::new();

        let mut slices = self.state.slices.write().await;
        let existing = slices.remove(slice_id);

        let mut overlay = match existing {
            Some(prev) => prev.overlay,
            None => Arc::new(OverlayManager::new(OverlayConfig {
                device_name: format!("vxlan-{slice_id}"),
                vni: config.vni,
                local_ip: String::new(),
                port: 4789,
                mtu: 1450,
                remote_ips: HashSet::new(),
                learning: false,
            })),
        };

        if let Some(tunnel) = config.tunnel_configs.first() {
            let identity_changed = overlay.state().await == OverlayState::Absent
                || {
                    let status = overlay.status().await;
                    status.device_name != tunnel.device_name
                };

            if identity_changed {
                overlay = Arc::new(OverlayManager::new(OverlayConfig {
                    device_name: tunnel.device_name.clone(),
                    vni: tunnel.vni,
                    local_ip: tunnel.local_ip.clone(),
                    port: tunnel.port,
                    mtu: tunnel.mtu,
                    remote_ips: tunnel.remote_ips.iter().cloned().collect(),
                    learning: tunnel.learning,
                }));
                if let Err(e) = overlay.create().await {
                    warn!(slice_id, error = %e, "agent: overlay create failed during apply");
                    failed.push(format!("overlay_create: {e}"));
                }
            } else {
                let new_peers: HashSet<String> = tunnel.remote_ips.iter().cloned().collect();
                let report = overlay.update_peers(new_peers).await;
                if !report.failed.is_empty() {
                    failed.push(format!("overlay_update_peers: {} peer(s) failed", report.failed.len()));
                }
            }
        }

        let shaping = Arc::new(ShapingEngine::new(
            config
                .tunnel_configs
                .first()
                .map(|t| t.device_name.clone())
                .unwrap_or_else(|| format!("shaping-{slice_id}")),
            None,
        ));
        if let Err(e) = shaping.update(config.shaping_rules.clone()).await {
            warn!(slice_id, error = %e, "agent: shaping update failed during apply");
            failed.push(format!("shaping_update: {e}"));
        }

        slices.insert(
            slice_id.to_string(),
            SliceRuntime {
                config,
                overlay,
                shaping,
                applied_at: Utc::now(),
            },
        );
        drop(slices);

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ApplyError::Partial(failed.len(), failed))
        }
    }

    pub async fn retract_slice(&self, slice_id: &str) -> Result<(), TnError> {
        let mut slices = self.state.slices.write().await;
        if let Some(runtime) = slices.remove(slice_id) {
            runtime.shaping.clear().await.map_err(TnError::from)?;
            runtime.overlay.delete().await.map_err(TnError::from)?;
        }
        Ok(())
    }

    /// Cancel the root scope in reverse startup order (spec §4.7 "Shutdown").
    pub async fn shutdown(&self) {
        self.state.mark_healthy(false).await;

        for port in self.state.probe.active_ports().await {
            let _ = self.state.probe.stop_server(port).await;
        }

        let slices = self.state.slices.read().await;
        for runtime in slices.values() {
            let _ = runtime.shaping.clear().await;
            let _ = runtime.overlay.delete().await;
        }
        drop(slices);

        for stop_tx in self.state.monitor_stop.write().await.drain(..) {
            let _ = stop_tx.send(());
        }
        info!("agent: shutdown complete");
    }

    /// Periodic self-check (spec §4.7, every 30s): verify overlay is Up and
    /// shaping is installed per slice; mark unhealthy and attempt recreate
    /// on failure.
    pub async fn self_check_tick(&self) {
        let slices = self.state.slices.read().await;
        let mut all_ok = true;
        for (slice_id, runtime) in slices.iter() {
            runtime.overlay.health_tick().await;
            let state = runtime.overlay.state().await;
            if !matches!(state, OverlayState::Up) {
                warn!(slice_id, ?state, "agent: self-check found degraded overlay");
                all_ok = false;
            }
            let snapshot = runtime.shaping.snapshot().await;
            if snapshot.degraded {
                warn!(slice_id, "agent: self-check found degraded shaping");
                all_ok = false;
                if let Err(e) = runtime.shaping.update(runtime.config.shaping_rules.clone()).await {
                    error!(slice_id, error = %e, "agent: self-check shaping re-install failed");
                }
            }
        }
        self.state.mark_healthy(all_ok || slices.is_empty()).await;
    }

    pub async fn run_self_check_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.self_check_tick().await;
        }
    }
}
