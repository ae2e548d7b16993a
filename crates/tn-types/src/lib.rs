//! Shared data model and error taxonomy for the transport-network
//! agent/manager core. Every other crate in this workspace depends on this
//! one; it depends on nothing workspace-local.

pub mod agent_config;
pub mod counters;
pub mod error;
pub mod slice;

pub use agent_config::{AgentConfig, AgentNodeConfig, BandwidthPolicyWire, ShapingRule, TunnelConfig, VxlanWire};
pub use counters::CounterSample;
pub use error::{TnError, TnResult, ValidationError};
pub use slice::{
    Condition, ConditionStatus, Endpoint, Phase, Policy, Profile, QosClass, Slice, SliceStatus,
    TunnelState, TunnelStatus,
};
