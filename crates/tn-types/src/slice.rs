//! Slice / SliceStatus data model (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ValidationError;

/// 24-bit VNI space; the top 16 values are reserved.
pub const VNI_MAX: u32 = (1 << 24) - 1;
pub const VNI_RESERVED_START: u32 = VNI_MAX - 15;

pub const BANDWIDTH_MIN_MBPS: f64 = 0.1;
pub const BANDWIDTH_MAX_MBPS: f64 = 10.0;
pub const LATENCY_MIN_MS: f64 = 1.0;
pub const LATENCY_MAX_MS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[serde(rename = "eMBB")]
    Embb,
    #[serde(rename = "uRLLC")]
    Urllc,
    #[serde(rename = "mIoT")]
    Miot,
}

impl Profile {
    /// Defaults per spec §4.8: `(downlink/uplink_mbps, latency_ms)`.
    pub fn defaults(self) -> (f64, f64) {
        match self {
            Profile::Embb => (4.57, 16.1),
            Profile::Urllc => (0.93, 6.3),
            Profile::Miot => (2.77, 15.7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QosClass {
    #[default]
    BestEffort,
    Guaranteed,
    NonGuaranteed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub node_name: String,
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub downlink_mbps: Option<f64>,
    pub uplink_mbps: Option<f64>,
    pub latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub loss_percent: Option<f64>,
    pub priority: Option<u16>,
    #[serde(default)]
    pub qos_class: QosClass,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            downlink_mbps: None,
            uplink_mbps: None,
            latency_ms: None,
            jitter_ms: None,
            loss_percent: None,
            priority: None,
            qos_class: QosClass::default(),
        }
    }
}

impl Policy {
    /// Fill unset fields from the profile's defaults. Fields already set in
    /// the spec are preserved (spec §4.8, "Profile defaulting").
    pub fn apply_profile_defaults(&mut self, profile: Profile) {
        let (bw, lat) = profile.defaults();
        self.downlink_mbps.get_or_insert(bw);
        self.uplink_mbps.get_or_insert(bw);
        self.latency_ms.get_or_insert(lat);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slice {
    pub slice_id: String,
    pub endpoints: Vec<Endpoint>,
    pub vni: u32,
    pub policy: Policy,
    pub profile: Option<Profile>,
    /// Increments on every spec mutation (spec §3).
    #[serde(default)]
    pub generation: u64,
}

impl Slice {
    /// Structural invariants from spec §3: endpoint count, VNI range,
    /// bandwidth/latency range once profile defaults have been applied.
    pub fn validate_structure(&self) -> Result<(), ValidationError> {
        if self.endpoints.len() < 2 {
            return Err(ValidationError::Field {
                field: "endpoints".into(),
                reason: format!("at least two endpoints required, got {}", self.endpoints.len()),
            });
        }

        let mut seen = HashSet::new();
        for ep in &self.endpoints {
            if !seen.insert(&ep.ip) {
                return Err(ValidationError::Field {
                    field: "endpoints".into(),
                    reason: format!("duplicate endpoint ip {:?}", ep.ip),
                });
            }
        }

        if self.vni == 0 || self.vni > VNI_MAX || self.vni >= VNI_RESERVED_START {
            return Err(ValidationError::Vni {
                value: self.vni,
                reason: "vni must be a non-zero 24-bit value outside the reserved top 16".into(),
            });
        }

        if let Some(bw) = self.policy.downlink_mbps {
            check_bandwidth(bw)?;
        }
        if let Some(bw) = self.policy.uplink_mbps {
            check_bandwidth(bw)?;
        }
        if let Some(lat) = self.policy.latency_ms {
            check_latency(lat)?;
        }

        Ok(())
    }
}

fn check_bandwidth(mbps: f64) -> Result<(), ValidationError> {
    if !(BANDWIDTH_MIN_MBPS..=BANDWIDTH_MAX_MBPS).contains(&mbps) {
        return Err(ValidationError::Field {
            field: "policy.bandwidth_mbps".into(),
            reason: format!(
                "{mbps} Mbps out of range [{BANDWIDTH_MIN_MBPS}, {BANDWIDTH_MAX_MBPS}]"
            ),
        });
    }
    Ok(())
}

fn check_latency(ms: f64) -> Result<(), ValidationError> {
    if !(LATENCY_MIN_MS..=LATENCY_MAX_MS).contains(&ms) {
        return Err(ValidationError::Field {
            field: "policy.latency_ms".into(),
            reason: format!("{ms} ms out of range [{LATENCY_MIN_MS}, {LATENCY_MAX_MS}]"),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Configuring,
    Active,
    Failed,
    Deleting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelState {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelStatus {
    pub tunnel_id: String,
    pub src_ip: String,
    pub dst_ip: String,
    pub state: TunnelState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub r#type: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceStatus {
    pub phase: Phase,
    pub observed_generation: u64,
    pub last_config_time: Option<DateTime<Utc>>,
    pub tunnels: Vec<TunnelStatus>,
    pub configured_nodes: Vec<String>,
    pub conditions: Vec<Condition>,
}

impl SliceStatus {
    pub fn pending() -> Self {
        Self {
            phase: Phase::Pending,
            observed_generation: 0,
            last_config_time: None,
            tunnels: Vec::new(),
            configured_nodes: Vec::new(),
            conditions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint { node_name: "a".into(), ip: "10.0.0.1".into() },
            Endpoint { node_name: "b".into(), ip: "10.0.0.2".into() },
        ]
    }

    #[test]
    fn rejects_single_endpoint() {
        let s = Slice {
            slice_id: "s1".into(),
            endpoints: vec![Endpoint { node_name: "a".into(), ip: "10.0.0.1".into() }],
            vni: 100,
            policy: Policy { downlink_mbps: Some(1.0), latency_ms: Some(10.0), ..Default::default() },
            profile: None,
            generation: 0,
        };
        assert!(s.validate_structure().is_err());
    }

    #[test]
    fn rejects_zero_vni() {
        let s = Slice {
            slice_id: "s2".into(),
            endpoints: two_endpoints(),
            vni: 0,
            policy: Policy::default(),
            profile: None,
            generation: 0,
        };
        assert!(matches!(
            s.validate_structure(),
            Err(ValidationError::Vni { .. })
        ));
    }

    #[test]
    fn rejects_reserved_vni() {
        let s = Slice {
            slice_id: "s3".into(),
            endpoints: two_endpoints(),
            vni: VNI_RESERVED_START,
            policy: Policy::default(),
            profile: None,
            generation: 0,
        };
        assert!(s.validate_structure().is_err());
    }

    #[test]
    fn accepts_valid_slice() {
        let s = Slice {
            slice_id: "s4".into(),
            endpoints: two_endpoints(),
            vni: 100,
            policy: Policy { downlink_mbps: Some(1.0), latency_ms: Some(10.0), ..Default::default() },
            profile: None,
            generation: 0,
        };
        assert!(s.validate_structure().is_ok());
    }

    #[test]
    fn profile_defaults_preserve_set_fields() {
        let mut p = Policy { downlink_mbps: Some(5.0), ..Default::default() };
        p.apply_profile_defaults(Profile::Urllc);
        assert_eq!(p.downlink_mbps, Some(5.0));
        assert_eq!(p.uplink_mbps, Some(0.93));
        assert_eq!(p.latency_ms, Some(6.3));
    }
}
