//! Agent Core (spec §4.7) — composes the Overlay Manager, Shaping Engine,
//! Probe Engine and Bandwidth Monitor behind the agent's HTTP control API.

pub mod core;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use core::AgentCore;
pub use state::AgentState;
