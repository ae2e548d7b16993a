//! Overlay Manager (spec §4.3) — owns the lifecycle of a single overlay
//! device and its FDB entries toward peer IPs.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use tn_secure_exec::execute;
use tn_types::error::TnError;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const ALL_ZEROS_MAC: &str = "00:00:00:00:00:00";
const DEFAULT_EXEC_DEADLINE: Duration = Duration::from_secs(5);
const HEALTH_PING_COUNT: &str = "2";
const HEALTH_PING_TIMEOUT: &str = "1";

/// Header overhead (VXLAN + UDP + IPv4) the encapsulating device adds over a
/// v4 underlay — spec §4.3 "Encapsulation overhead reporting".
pub const V4_ENCAP_OVERHEAD_BYTES: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Absent,
    Created,
    Up,
    Degraded,
    Gone,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub device_name: String,
    pub vni: u32,
    pub local_ip: String,
    pub port: u16,
    pub mtu: u32,
    pub remote_ips: HashSet<String>,
    pub learning: bool,
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("device create failed: {0}")]
    DeviceCreateFailed(#[source] TnError),
    #[error("fdb update failed for peer {peer}: {source}")]
    FdbUpdateFailed { peer: String, source: TnError },
}

/// Device-create errors are fatal to the current transition (spec §4.3
/// "Failure taxonomy"); FDB and probe failures are non-fatal and reported.
#[derive(Debug, Default, Clone)]
pub struct PeerUpdateReport {
    pub added_ok: Vec<String>,
    pub removed_ok: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct OverlayStatus {
    pub device_name: String,
    pub state: OverlayState,
    pub remote_ips: Vec<String>,
    pub failing_peers: Vec<String>,
}

/// Diff `old` against `new`: returns `(added, removed)`. Pure function so the
/// convergence property (spec §8) can be tested without touching the
/// network stack.
pub fn diff_peers<'a>(
    old: &'a HashSet<String>,
    new: &'a HashSet<String>,
) -> (Vec<&'a String>, Vec<&'a String>) {
    let added = new.difference(old).collect();
    let removed = old.difference(new).collect();
    (added, removed)
}

pub struct OverlayManager {
    config: RwLock<OverlayConfig>,
    state: RwLock<OverlayState>,
    failing_peers: RwLock<Vec<String>>,
}

impl OverlayManager {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            config: RwLock::new(config),
            state: RwLock::new(OverlayState::Absent),
            failing_peers: RwLock::new(Vec::new()),
        }
    }

    pub async fn state(&self) -> OverlayState {
        *self.state.read().await
    }

    pub async fn status(&self) -> OverlayStatus {
        let cfg = self.config.read().await;
        OverlayStatus {
            device_name: cfg.device_name.clone(),
            state: *self.state.read().await,
            remote_ips: cfg.remote_ips.iter().cloned().collect(),
            failing_peers: self.failing_peers.read().await.clone(),
        }
    }

    /// `Absent -> Created`: idempotently remove any pre-existing device of
    /// the same name, create the encapsulating device, apply MTU, bring it
    /// up, then install FDB entries for the declared remotes.
    pub async fn create(&self) -> Result<(), OverlayError> {
        let cfg = self.config.read().await.clone_for_create();

        // Idempotent pre-clean: ignore "no such device" errors.
        let _ = execute(
            "ip",
            &str_vec(&["link", "del", &cfg.device_name]),
            DEFAULT_EXEC_DEADLINE,
        )
        .await;

        let mut add_args = vec![
            "link".to_string(),
            "add".to_string(),
            cfg.device_name.clone(),
            "type".to_string(),
            "vxlan".to_string(),
            "id".to_string(),
            cfg.vni.to_string(),
            "local".to_string(),
            cfg.local_ip.clone(),
            "dstport".to_string(),
            cfg.port.to_string(),
        ];
        add_args.push(if cfg.learning { "learning" } else { "nolearning" }.to_string());

        execute("ip", &add_args, DEFAULT_EXEC_DEADLINE)
            .await
            .map_err(|e| OverlayError::DeviceCreateFailed(e.into()))?;

        execute(
            "ip",
            &str_vec(&["link", "set", &cfg.device_name, "mtu", &cfg.mtu.to_string()]),
            DEFAULT_EXEC_DEADLINE,
        )
        .await
        .map_err(|e| OverlayError::DeviceCreateFailed(e.into()))?;

        execute(
            "ip",
            &str_vec(&["link", "set", &cfg.device_name, "up"]),
            DEFAULT_EXEC_DEADLINE,
        )
        .await
        .map_err(|e| OverlayError::DeviceCreateFailed(e.into()))?;

        *self.state.write().await = OverlayState::Created;

        let report = self
            .install_fdb(&cfg.device_name, cfg.remote_ips.iter().cloned().collect(), true)
            .await;
        *self.failing_peers.write().await =
            report.failed.iter().map(|(p, _)| p.clone()).collect();

        *self.state.write().await = if report.failed.is_empty() {
            OverlayState::Up
        } else {
            OverlayState::Degraded
        };

        Ok(())
    }

    /// `update_peers(new_set)`: not atomic across peers, idempotent. A
    /// partial failure leaves the system consistent with the subset that
    /// succeeded; the caller's health tick retries it (spec §4.3).
    pub async fn update_peers(&self, new_set: HashSet<String>) -> PeerUpdateReport {
        let device_name = self.config.read().await.device_name.clone();
        let old_set = self.config.read().await.remote_ips.clone();
        let (added, removed) = diff_peers(&old_set, &new_set);
        let added: Vec<String> = added.into_iter().cloned().collect();
        let removed: Vec<String> = removed.into_iter().cloned().collect();

        let mut report = PeerUpdateReport::default();

        for peer in &removed {
            match fdb_del(&device_name, peer).await {
                Ok(()) => report.removed_ok.push(peer.clone()),
                Err(e) => report.failed.push((peer.clone(), e.to_string())),
            }
        }
        for peer in &added {
            match fdb_append(&device_name, peer).await {
                Ok(()) => report.added_ok.push(peer.clone()),
                Err(e) => report.failed.push((peer.clone(), e.to_string())),
            }
        }

        // Reflect what actually succeeded, not the full requested set —
        // idempotent retries on the next health tick pick up the rest.
        let mut cfg = self.config.write().await;
        for peer in &report.removed_ok {
            cfg.remote_ips.remove(peer);
        }
        for peer in &report.added_ok {
            cfg.remote_ips.insert(peer.clone());
        }
        drop(cfg);

        *self.failing_peers.write().await =
            report.failed.iter().map(|(p, _)| p.clone()).collect();

        report
    }

    async fn install_fdb(
        &self,
        device_name: &str,
        peers: Vec<String>,
        is_append: bool,
    ) -> PeerUpdateReport {
        let mut report = PeerUpdateReport::default();
        for peer in peers {
            let result = if is_append {
                fdb_append(device_name, &peer).await
            } else {
                fdb_del(device_name, &peer).await
            };
            match result {
                Ok(()) => report.added_ok.push(peer),
                Err(e) => report.failed.push((peer, e.to_string())),
            }
        }
        report
    }

    /// `delete()`: any state transitions to `Gone`.
    pub async fn delete(&self) -> Result<(), OverlayError> {
        let device_name = self.config.read().await.device_name.clone();
        let _ = execute(
            "ip",
            &str_vec(&["link", "del", &device_name]),
            DEFAULT_EXEC_DEADLINE,
        )
        .await;
        *self.state.write().await = OverlayState::Gone;
        Ok(())
    }

    /// Fixed-period health tick (spec §4.3, default 30 s when driven by
    /// `tn-agent`). Queries link state, pings each remote with a bounded
    /// count/timeout. Attempts recreate on link-down; otherwise exposes
    /// failing peers without tearing the device down.
    pub async fn health_tick(&self) {
        let device_name = self.config.read().await.device_name.clone();
        let link_up = check_link_up(&device_name).await;

        if !link_up {
            warn!(device = %device_name, "overlay: link down, attempting recreate");
            *self.state.write().await = OverlayState::Degraded;
            if self.create().await.is_err() {
                return;
            }
        }

        let remotes: Vec<String> = self.config.read().await.remote_ips.iter().cloned().collect();
        let mut failing = Vec::new();
        for remote in remotes {
            if ping_peer(&remote).await.is_err() {
                failing.push(remote);
            }
        }

        *self.failing_peers.write().await = failing.clone();
        *self.state.write().await = if failing.is_empty() {
            OverlayState::Up
        } else {
            OverlayState::Degraded
        };
    }

    pub fn overhead_bytes(&self) -> u32 {
        V4_ENCAP_OVERHEAD_BYTES
    }
}

impl OverlayConfig {
    fn clone_for_create(&self) -> OverlayConfig {
        self.clone()
    }
}

async fn fdb_append(device_name: &str, peer: &str) -> Result<(), TnError> {
    execute(
        "bridge",
        &str_vec(&[
            "fdb", "append", ALL_ZEROS_MAC, "dev", device_name, "dst", peer,
        ]),
        DEFAULT_EXEC_DEADLINE,
    )
    .await
    .map(|_| ())
    .map_err(TnError::from)
}

async fn fdb_del(device_name: &str, peer: &str) -> Result<(), TnError> {
    // "errors for non-existent entries are ignored" (spec §4.3).
    match execute(
        "bridge",
        &str_vec(&["fdb", "del", ALL_ZEROS_MAC, "dev", device_name, "dst", peer]),
        DEFAULT_EXEC_DEADLINE,
    )
    .await
    {
        Ok(_) => Ok(()),
        Err(tn_secure_exec::CommandError::ExecFailed { .. }) => Ok(()),
        Err(e) => Err(TnError::from(e)),
    }
}

async fn check_link_up(device_name: &str) -> bool {
    match execute(
        "ip",
        &str_vec(&["link", "show", device_name]),
        DEFAULT_EXEC_DEADLINE,
    )
    .await
    {
        Ok(out) => out.combined.contains("UP"),
        Err(_) => false,
    }
}

async fn ping_peer(peer: &str) -> Result<(), TnError> {
    debug!(peer, "overlay: health-probing peer");
    execute(
        "ping",
        &str_vec(&["-c", HEALTH_PING_COUNT, "-W", HEALTH_PING_TIMEOUT, peer]),
        DEFAULT_EXEC_DEADLINE,
    )
    .await
    .map(|_| ())
    .map_err(TnError::from)
}

fn str_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl From<OverlayError> for TnError {
    fn from(e: OverlayError) -> Self {
        match e {
            OverlayError::DeviceCreateFailed(inner) => inner,
            OverlayError::FdbUpdateFailed { peer, source } => {
                TnError::Command(format!("fdb update failed for peer {peer}: {source}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_computes_added_and_removed() {
        let old = set(&["10.0.0.1", "10.0.0.2"]);
        let new = set(&["10.0.0.2", "10.0.0.3"]);
        let (added, removed) = diff_peers(&old, &new);
        assert_eq!(added, vec![&"10.0.0.3".to_string()]);
        assert_eq!(removed, vec![&"10.0.0.1".to_string()]);
    }

    #[test]
    fn diff_is_empty_for_identical_sets() {
        let a = set(&["10.0.0.1"]);
        let (added, removed) = diff_peers(&a, &a.clone());
        assert!(added.is_empty() && removed.is_empty());
    }

    #[test]
    fn overhead_is_fixed_per_spec() {
        let cfg = OverlayConfig {
            device_name: "vxlan100".into(),
            vni: 100,
            local_ip: "10.0.0.1".into(),
            port: 4789,
            mtu: 1450,
            remote_ips: HashSet::new(),
            learning: false,
        };
        let mgr = OverlayManager::new(cfg);
        assert_eq!(mgr.overhead_bytes(), 50);
    }
}
