//! Slice Reconciler (spec §4.8): drives each declarative `Slice` toward its
//! observed `SliceStatus` through the phase machine, and the config
//! distribution store port (spec §6) agents read their per-node config from.

pub mod error;
pub mod reconciler;
pub mod store;

pub use error::ReconcilerError;
pub use reconciler::Reconciler;
pub use store::{ConfigStore, InMemoryConfigStore, SharedConfigStore};
