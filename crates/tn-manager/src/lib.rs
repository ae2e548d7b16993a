//! Manager process: composes the Slice Reconciler behind its control API.

pub mod error;
pub mod handlers;
pub mod router;
