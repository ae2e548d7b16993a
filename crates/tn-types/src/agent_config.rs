//! Agent Config / TunnelConfig / Shaping Rule (spec §3), and the agent's
//! own on-wire configuration object (spec §6).

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::slice::{QosClass, VNI_MAX, VNI_RESERVED_START};

pub const MTU_MIN: u32 = 576;
pub const MTU_MAX: u32 = 9000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    pub device_name: String,
    pub vni: u32,
    pub local_ip: String,
    pub port: u16,
    pub mtu: u32,
    pub remote_ips: Vec<String>,
    #[serde(default)]
    pub learning: bool,
}

impl TunnelConfig {
    pub fn validate_structure(&self) -> Result<(), ValidationError> {
        if self.vni == 0 || self.vni > VNI_MAX || self.vni >= VNI_RESERVED_START {
            return Err(ValidationError::Vni {
                value: self.vni,
                reason: "vni must be a non-zero 24-bit value outside the reserved top 16".into(),
            });
        }
        if !(MTU_MIN..=MTU_MAX).contains(&self.mtu) {
            return Err(ValidationError::Field {
                field: "mtu".into(),
                reason: format!("{} outside [{MTU_MIN}, {MTU_MAX}]", self.mtu),
            });
        }
        if self.remote_ips.iter().any(|r| r == &self.local_ip) {
            return Err(ValidationError::Field {
                field: "remote_ips".into(),
                reason: "remote_ips must not contain local_ip".into(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for r in &self.remote_ips {
            if !seen.insert(r) {
                return Err(ValidationError::Field {
                    field: "remote_ips".into(),
                    reason: format!("duplicate remote ip {r:?}"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapingRule {
    pub priority: u16,
    pub rate_kbps: u64,
    pub burst_kb: u64,
    pub latency_ms: f64,
    pub jitter_ms: Option<f64>,
    pub loss_percent: Option<f64>,
}

impl ShapingRule {
    pub fn validate_structure(&self) -> Result<(), ValidationError> {
        if self.rate_kbps == 0 {
            return Err(ValidationError::Field {
                field: "rate_kbps".into(),
                reason: "rate must be positive".into(),
            });
        }
        if self.burst_kb == 0 {
            return Err(ValidationError::Field {
                field: "burst_kb".into(),
                reason: "burst must be positive".into(),
            });
        }
        if self.latency_ms < 0.0 {
            return Err(ValidationError::Field {
                field: "latency_ms".into(),
                reason: "latency must be non-negative".into(),
            });
        }
        if self.priority == 0 {
            return Err(ValidationError::Field {
                field: "priority".into(),
                reason: "priority must be in [1, 65535]".into(),
            });
        }
        Ok(())
    }
}

/// The unit of work pushed to a node for one (slice, generation) (spec §3).
/// Immutable once published — a change means a new `AgentConfig`, never a
/// mutation of a previously-published one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub slice_id: String,
    pub generation: u64,
    pub vni: u32,
    pub tunnel_configs: Vec<TunnelConfig>,
    pub shaping_rules: Vec<ShapingRule>,
    pub priority: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandwidthPolicyWire {
    pub downlink_mbps: f64,
    pub uplink_mbps: f64,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub loss_percent: f64,
    pub priority: u16,
    pub qos_class: QosClass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VxlanWire {
    pub vni: u32,
    pub remote_ips: Vec<String>,
    pub local_ip: String,
    pub port: u16,
    pub mtu: u32,
    pub device_name: String,
    #[serde(default)]
    pub learning: bool,
}

/// The agent's own on-wire configuration object (spec §6), read/replaced via
/// `GET`/`PUT /config`. Distinct from [`AgentConfig`]: this describes the
/// node itself, not one slice's per-node unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentNodeConfig {
    pub cluster_name: String,
    pub network_cidr: String,
    pub vxlan: Option<VxlanWire>,
    pub bandwidth_policy: Option<BandwidthPolicyWire>,
    pub monitoring_port: u16,
    pub qos_class: QosClass,
}
