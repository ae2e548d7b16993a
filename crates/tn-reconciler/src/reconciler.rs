//! Slice Reconciler control loop (spec §4.8): phase machine driving each
//! declarative `Slice` from `Pending` through `Configuring` to `Active`,
//! with drift detection and deletion.

use std::collections::HashMap;

use chrono::Utc;
use tn_types::{
    AgentConfig, Condition, ConditionStatus, Endpoint, Phase, Policy, Slice, SliceStatus,
    TunnelConfig, TunnelState, TunnelStatus,
};
use tokio::sync::RwLock;

use crate::error::ReconcilerError;
use crate::store::SharedConfigStore;

const DEFAULT_VXLAN_PORT: u16 = 4789;
const DEFAULT_MTU: u32 = 1450;
/// Consecutive drift observations tolerated in `Active` before re-driving
/// `Pending` (spec §4.8: "if persistent, re-drives Pending").
const DRIFT_STREAK_THRESHOLD: u32 = 3;

struct SliceRecord {
    spec: Slice,
    status: SliceStatus,
    /// `node_name -> generation` the node has acknowledged.
    acked: HashMap<String, u64>,
    drift_streak: u32,
}

pub struct Reconciler {
    store: SharedConfigStore,
    slices: RwLock<HashMap<String, SliceRecord>>,
}

impl Reconciler {
    pub fn new(store: SharedConfigStore) -> Self {
        Self {
            store,
            slices: RwLock::new(HashMap::new()),
        }
    }

    /// Structural validation (vni/bandwidth/latency ranges) is deliberately
    /// deferred to `step_pending`, not performed here: a structurally
    /// invalid slice must still exist in `Pending` so the phase machine can
    /// transition it to `Failed` with a `ValidationFailed` condition (spec
    /// §8 scenario 3), rather than being rejected before it ever exists.
    pub async fn create_slice(&self, mut spec: Slice) -> Result<(), ReconcilerError> {
        let mut slices = self.slices.write().await;
        if slices.contains_key(&spec.slice_id) {
            return Err(ReconcilerError::AlreadyExists(spec.slice_id));
        }
        spec.generation = 0;
        if let Some(profile) = spec.profile {
            spec.policy.apply_profile_defaults(profile);
        }
        let slice_id = spec.slice_id.clone();
        slices.insert(
            slice_id,
            SliceRecord {
                spec,
                status: SliceStatus::pending(),
                acked: HashMap::new(),
                drift_streak: 0,
            },
        );
        Ok(())
    }

    pub async fn update_slice(&self, slice_id: &str, mut spec: Slice) -> Result<(), ReconcilerError> {
        let mut slices = self.slices.write().await;
        let record = slices
            .get_mut(slice_id)
            .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))?;
        if record.status.phase == Phase::Deleting {
            return Err(ReconcilerError::Store(format!(
                "slice {slice_id:?} is being deleted, updates rejected"
            )));
        }
        if let Some(profile) = spec.profile {
            spec.policy.apply_profile_defaults(profile);
        }
        spec.slice_id = slice_id.to_string();
        spec.generation = record.spec.generation + 1;
        record.spec = spec;
        record.status.phase = Phase::Pending;
        record.acked.clear();
        record.drift_streak = 0;
        Ok(())
    }

    pub async fn delete_slice(&self, slice_id: &str) -> Result<(), ReconcilerError> {
        let mut slices = self.slices.write().await;
        let record = slices
            .get_mut(slice_id)
            .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))?;
        record.status.phase = Phase::Deleting;
        Ok(())
    }

    pub async fn get_spec(&self, slice_id: &str) -> Result<Slice, ReconcilerError> {
        self.slices
            .read()
            .await
            .get(slice_id)
            .map(|r| r.spec.clone())
            .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))
    }

    pub async fn get_status(&self, slice_id: &str) -> Result<SliceStatus, ReconcilerError> {
        self.slices
            .read()
            .await
            .get(slice_id)
            .map(|r| r.status.clone())
            .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))
    }

    pub async fn list(&self) -> Vec<(String, Phase)> {
        self.slices
            .read()
            .await
            .iter()
            .map(|(id, r)| (id.clone(), r.status.phase))
            .collect()
    }

    /// Consumed by the manager's agent-acknowledgement intake: an agent
    /// reporting it has applied `(slice_id, observed_generation)`.
    pub async fn record_ack(
        &self,
        slice_id: &str,
        node_name: &str,
        observed_generation: u64,
    ) -> Result<(), ReconcilerError> {
        let mut slices = self.slices.write().await;
        let record = slices
            .get_mut(slice_id)
            .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))?;
        record.acked.insert(node_name.to_string(), observed_generation);
        Ok(())
    }

    /// An agent-reported tunnel state change while `Active`, feeding drift
    /// detection (spec §4.8 "drift detection").
    pub async fn record_tunnel_observation(
        &self,
        slice_id: &str,
        tunnel_id: &str,
        state: TunnelState,
    ) -> Result<(), ReconcilerError> {
        let mut slices = self.slices.write().await;
        let record = slices
            .get_mut(slice_id)
            .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))?;
        if let Some(tunnel) = record.status.tunnels.iter_mut().find(|t| t.tunnel_id == tunnel_id) {
            tunnel.state = state;
        }
        if record.status.phase != Phase::Active {
            return Ok(());
        }
        if state == TunnelState::Down {
            record.drift_streak += 1;
            record.status.conditions.push(Condition {
                r#type: "Drift".into(),
                status: ConditionStatus::True,
                reason: "TunnelDown".into(),
                message: format!("tunnel {tunnel_id} reported down ({} consecutive)", record.drift_streak),
                last_transition_time: Utc::now(),
            });
            if record.drift_streak >= DRIFT_STREAK_THRESHOLD {
                record.status.phase = Phase::Pending;
                record.acked.clear();
                record.drift_streak = 0;
            }
        } else {
            record.drift_streak = 0;
        }
        Ok(())
    }

    /// One pass of the control loop over every slice (spec §4.8).
    pub async fn reconcile_tick(&self) -> Result<(), ReconcilerError> {
        let slice_ids: Vec<String> = self.slices.read().await.keys().cloned().collect();
        for slice_id in slice_ids {
            self.step_slice(&slice_id).await?;
        }
        Ok(())
    }

    async fn step_slice(&self, slice_id: &str) -> Result<(), ReconcilerError> {
        let phase = {
            let slices = self.slices.read().await;
            match slices.get(slice_id) {
                Some(r) => r.status.phase,
                None => return Ok(()),
            }
        };

        match phase {
            Phase::Pending => self.step_pending(slice_id).await,
            Phase::Configuring => self.step_configuring(slice_id).await,
            Phase::Active => self.step_active(slice_id).await,
            Phase::Failed => Ok(()),
            Phase::Deleting => self.step_deleting(slice_id).await,
        }
    }

    async fn step_pending(&self, slice_id: &str) -> Result<(), ReconcilerError> {
        let (spec, node_configs) = {
            let slices = self.slices.read().await;
            let record = slices
                .get(slice_id)
                .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))?;
            if let Err(e) = record.spec.validate_structure() {
                drop(slices);
                self.fail(slice_id, &e.to_string()).await;
                return Ok(());
            }
            match compute_node_configs(&record.spec) {
                Ok(configs) => (record.spec.clone(), configs),
                Err(e) => {
                    drop(slices);
                    self.fail(slice_id, &e.to_string()).await;
                    return Ok(());
                }
            }
        };

        for (node_name, config) in &node_configs {
            self.store
                .put(slice_id, node_name, config.clone())
                .await
                .map_err(|e| ReconcilerError::Store(e.to_string()))?;
        }

        let mut slices = self.slices.write().await;
        if let Some(record) = slices.get_mut(slice_id) {
            record.status.last_config_time = Some(Utc::now());
            record.status.phase = Phase::Configuring;
            record.acked.clear();
            let _ = spec;
        }
        Ok(())
    }

    async fn step_configuring(&self, slice_id: &str) -> Result<(), ReconcilerError> {
        let mut slices = self.slices.write().await;
        let record = slices
            .get_mut(slice_id)
            .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))?;

        let expected_generation = record.spec.generation;
        let mut acked_nodes: Vec<String> = record
            .acked
            .iter()
            .filter(|(_, gen)| **gen == expected_generation)
            .map(|(node, _)| node.clone())
            .collect();
        acked_nodes.sort();

        let targeted: Vec<String> = record.spec.endpoints.iter().map(|e| e.node_name.clone()).collect();
        let all_acked = targeted.iter().all(|n| acked_nodes.contains(n));
        if !all_acked {
            return Ok(());
        }

        record.status.tunnels = compute_tunnel_statuses(&record.spec);
        record.status.observed_generation = expected_generation;
        record.status.configured_nodes = acked_nodes;
        record.status.phase = Phase::Active;
        record.drift_streak = 0;
        Ok(())
    }

    async fn step_active(&self, slice_id: &str) -> Result<(), ReconcilerError> {
        let mut slices = self.slices.write().await;
        let record = slices
            .get_mut(slice_id)
            .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))?;
        if record.spec.generation != record.status.observed_generation {
            record.status.phase = Phase::Pending;
            record.acked.clear();
            record.drift_streak = 0;
        }
        Ok(())
    }

    async fn step_deleting(&self, slice_id: &str) -> Result<(), ReconcilerError> {
        let node_names: Vec<String> = {
            let slices = self.slices.read().await;
            let record = slices
                .get(slice_id)
                .ok_or_else(|| ReconcilerError::UnknownSlice(slice_id.to_string()))?;
            record.spec.endpoints.iter().map(|e| e.node_name.clone()).collect()
        };
        for node_name in &node_names {
            self.store
                .delete(slice_id, node_name)
                .await
                .map_err(|e| ReconcilerError::Store(e.to_string()))?;
        }
        let remaining = self
            .store
            .published_nodes(slice_id)
            .await
            .map_err(|e| ReconcilerError::Store(e.to_string()))?;
        if remaining.is_empty() {
            self.slices.write().await.remove(slice_id);
        }
        Ok(())
    }

    async fn fail(&self, slice_id: &str, reason: &str) {
        let mut slices = self.slices.write().await;
        if let Some(record) = slices.get_mut(slice_id) {
            record.status.phase = Phase::Failed;
            record.status.conditions.push(Condition {
                r#type: "Invalid".into(),
                status: ConditionStatus::True,
                reason: "ValidationFailed".into(),
                message: reason.to_string(),
                last_transition_time: Utc::now(),
            });
        }
    }
}

fn shaping_rule_from_policy(policy: &Policy) -> Result<tn_types::ShapingRule, ReconcilerError> {
    let downlink = policy.downlink_mbps.ok_or_else(missing_policy_field("downlink_mbps"))?;
    let uplink = policy.uplink_mbps.ok_or_else(missing_policy_field("uplink_mbps"))?;
    let latency = policy.latency_ms.ok_or_else(missing_policy_field("latency_ms"))?;
    let rate_mbps = downlink.max(uplink);
    let rate_kbps = (rate_mbps * 1000.0).round() as u64;
    // One second's worth of the class rate, matching this engine's
    // convention of a bounded-but-generous burst allowance.
    let burst_kb = (rate_kbps / 8).max(1);
    Ok(tn_types::ShapingRule {
        priority: policy.priority.unwrap_or(1),
        rate_kbps,
        burst_kb,
        latency_ms: latency,
        jitter_ms: policy.jitter_ms,
        loss_percent: policy.loss_percent,
    })
}

fn missing_policy_field(field: &'static str) -> impl FnOnce() -> ReconcilerError {
    move || {
        ReconcilerError::Validation(tn_types::error::ValidationError::Field {
            field: format!("policy.{field}"),
            reason: "must be set directly or filled in via a profile before a slice can be configured".into(),
        })
    }
}

fn compute_node_configs(spec: &Slice) -> Result<Vec<(String, AgentConfig)>, ReconcilerError> {
    let rule = shaping_rule_from_policy(&spec.policy)?;
    let mut out = Vec::with_capacity(spec.endpoints.len());
    for endpoint in &spec.endpoints {
        let remote_ips: Vec<String> = spec
            .endpoints
            .iter()
            .filter(|e| e.ip != endpoint.ip)
            .map(|e| e.ip.clone())
            .collect();
        let tunnel = TunnelConfig {
            device_name: format!("vxlan-{}", spec.slice_id),
            vni: spec.vni,
            local_ip: endpoint.ip.clone(),
            port: DEFAULT_VXLAN_PORT,
            mtu: DEFAULT_MTU,
            remote_ips,
            learning: false,
        };
        let config = AgentConfig {
            slice_id: spec.slice_id.clone(),
            generation: spec.generation,
            vni: spec.vni,
            tunnel_configs: vec![tunnel],
            shaping_rules: vec![rule.clone()],
            priority: rule.priority,
        };
        out.push((endpoint.node_name.clone(), config));
    }
    Ok(out)
}

fn compute_tunnel_statuses(spec: &Slice) -> Vec<TunnelStatus> {
    let eps: &[Endpoint] = &spec.endpoints;
    let mut out = Vec::new();
    for i in 0..eps.len() {
        for j in (i + 1)..eps.len() {
            out.push(TunnelStatus {
                tunnel_id: format!("{}-{}-{}", spec.slice_id, eps[i].node_name, eps[j].node_name),
                src_ip: eps[i].ip.clone(),
                dst_ip: eps[j].ip.clone(),
                state: TunnelState::Up,
            });
        }
    }
    out
}
