//! Shared error taxonomy (spec §7).
//!
//! Every component-specific error type in this workspace eventually folds
//! into `TnError` at a crate boundary (Control API, reconciler) so handlers
//! have one place to map to HTTP status and one place to log.

use thiserror::Error;

/// Structural input validation failure. Never a plain boolean — each variant
/// names the rule that fired, per spec §4.2.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("interface name {name:?} invalid: {reason}")]
    InterfaceName { name: String, reason: String },

    #[error("ip address {value:?} invalid: {reason}")]
    IpAddress { value: String, reason: String },

    #[error("port {value} invalid: {reason}")]
    Port { value: i64, reason: String },

    #[error("vni {value} invalid: {reason}")]
    Vni { value: u32, reason: String },

    #[error("bandwidth string {value:?} invalid: {reason}")]
    Bandwidth { value: String, reason: String },

    #[error("path {value:?} invalid: {reason}")]
    Path { value: String, reason: String },

    #[error("kubernetes name {value:?} invalid: {reason}")]
    KubernetesName { value: String, reason: String },

    #[error("{field}: {reason}")]
    Field { field: String, reason: String },
}

/// Top-level error enum, §7's five categories plus `NotFound` (used pervasively
/// by the Control API's 404s, which spec.md's taxonomy otherwise leaves implicit).
#[derive(Debug, Error)]
pub enum TnError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error("illegal state: {0}")]
    State(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl TnError {
    /// Coarse category, used by handlers to pick an HTTP status family.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Command(_) => "command",
            Self::State(_) => "state",
            Self::Transient(_) => "transient",
            Self::Fatal(_) => "fatal",
            Self::NotFound(_) => "not_found",
        }
    }
}

pub type TnResult<T> = std::result::Result<T, TnError>;
