//! Bandwidth Monitor (spec §4.6) — periodic interface-counter sampling
//! through Secure Exec, bounded per-interface rings, and rate derivation.

pub mod ring;

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tn_secure_exec::{execute, CommandError};
use tn_types::counters::CounterSample;
use tn_types::error::{TnError, ValidationError};
use tn_validators::validate_interface_name;
use tokio::sync::RwLock;

use ring::Ring;

const STATISTICS_BASE: &str = "/sys/class/net";
const DEFAULT_RING_CAPACITY: usize = 300;
const SAMPLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid interface name: {0}")]
    InvalidInterface(String),
    #[error("no samples recorded for interface {0:?}")]
    NoSamples(String),
    #[error("counter read failed: {0}")]
    Command(#[from] CommandError),
    #[error("counter file did not contain an integer: {0:?}")]
    UnparsableCounter(String),
}

fn stat_path(iface: &str, stat: &str) -> String {
    format!("{STATISTICS_BASE}/{iface}/statistics/{stat}")
}

async fn read_counters(iface: &str, prefix: &str) -> Result<(u64, u64, u64, u64), MonitorError> {
    let args: Vec<String> = [
        stat_path(iface, &format!("{prefix}_bytes")),
        stat_path(iface, &format!("{prefix}_packets")),
        stat_path(iface, &format!("{prefix}_dropped")),
        stat_path(iface, &format!("{prefix}_errors")),
    ]
    .to_vec();

    let out = execute("cat", &args, SAMPLE_TIMEOUT).await?;
    let mut values = Vec::with_capacity(4);
    for line in out.combined.lines().filter(|l| !l.trim().is_empty()) {
        let v: u64 = line
            .trim()
            .parse()
            .map_err(|_| MonitorError::UnparsableCounter(line.to_string()))?;
        values.push(v);
    }
    if values.len() != 4 {
        return Err(MonitorError::UnparsableCounter(out.combined));
    }
    Ok((values[0], values[1], values[2], values[3]))
}

/// Reads the full counter set for `iface` through Secure Exec and builds a
/// raw (rate-less) [`CounterSample`]. Exposed separately from the monitor's
/// own sampling loop so tests can exercise it without scheduling a timer.
pub async fn sample_interface(iface: &str) -> Result<CounterSample, MonitorError> {
    validate_interface_name(iface).map_err(|e| MonitorError::InvalidInterface(e.to_string()))?;

    let (rx_bytes, rx_pkts, rx_drop, rx_err) = read_counters(iface, "rx").await?;
    let (tx_bytes, tx_pkts, tx_drop, tx_err) = read_counters(iface, "tx").await?;

    Ok(CounterSample::raw(
        Utc::now(),
        iface,
        rx_bytes,
        tx_bytes,
        rx_pkts,
        tx_pkts,
        rx_drop,
        tx_drop,
        rx_err,
        tx_err,
    ))
}

impl From<MonitorError> for TnError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::Command(inner) => inner.into(),
            MonitorError::InvalidInterface(reason) => {
                TnError::Validation(ValidationError::Field { field: "iface".into(), reason })
            }
            MonitorError::NoSamples(iface) => TnError::NotFound(format!("no samples for interface {iface:?}")),
            MonitorError::UnparsableCounter(raw) => {
                TnError::Command(format!("unparsable counter output: {raw:?}"))
            }
        }
    }
}

pub struct BandwidthMonitor {
    rings: RwLock<HashMap<String, Ring>>,
    ring_capacity: usize,
    link_ceilings_bps: RwLock<HashMap<String, f64>>,
}

impl Default for BandwidthMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

impl BandwidthMonitor {
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            rings: RwLock::new(HashMap::new()),
            ring_capacity,
            link_ceilings_bps: RwLock::new(HashMap::new()),
        }
    }

    /// Set the link-rate ceiling used to derive `utilization_pct` for
    /// `iface`; omit to leave utilization unset.
    pub async fn set_ceiling(&self, iface: &str, ceiling_bps: f64) {
        self.link_ceilings_bps
            .write()
            .await
            .insert(iface.to_string(), ceiling_bps);
    }

    /// Take one sample of `iface` and push it into its ring.
    pub async fn tick(&self, iface: &str) -> Result<(), MonitorError> {
        let sample = sample_interface(iface).await?;
        let ceiling = self.link_ceilings_bps.read().await.get(iface).copied();
        let mut rings = self.rings.write().await;
        rings
            .entry(iface.to_string())
            .or_insert_with(|| Ring::new(self.ring_capacity))
            .push(sample, ceiling);
        Ok(())
    }

    pub async fn latest(&self, iface: &str) -> Result<CounterSample, MonitorError> {
        self.rings
            .read()
            .await
            .get(iface)
            .and_then(|r| r.latest().cloned())
            .ok_or_else(|| MonitorError::NoSamples(iface.to_string()))
    }

    pub async fn moving_average_bps(
        &self,
        iface: &str,
        window_secs: i64,
    ) -> Result<f64, MonitorError> {
        self.rings
            .read()
            .await
            .get(iface)
            .and_then(|r| r.moving_average_bps(window_secs))
            .ok_or_else(|| MonitorError::NoSamples(iface.to_string()))
    }

    pub async fn export(&self, iface: &str) -> Result<Vec<CounterSample>, MonitorError> {
        let rings = self.rings.read().await;
        let ring = rings
            .get(iface)
            .ok_or_else(|| MonitorError::NoSamples(iface.to_string()))?;
        Ok(ring.export())
    }

    pub async fn tracked_interfaces(&self) -> Vec<String> {
        self.rings.read().await.keys().cloned().collect()
    }

    /// Run the periodic sampling loop for `iface` at `interval` until the
    /// passed-in future `stop` completes. Spawned as a child scope by the
    /// Agent Core's startup sequence.
    pub async fn run(&self, iface: String, interval: Duration, mut stop: tokio::sync::oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(&iface).await {
                        tracing::warn!(iface = %iface, error = %e, "monitor: sample tick failed");
                    }
                }
                _ = &mut stop => {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_interface_name() {
        let validated = validate_interface_name("; rm -rf /");
        assert!(validated.is_err());
    }

    #[tokio::test]
    async fn latest_errors_before_any_sample() {
        let monitor = BandwidthMonitor::new(10);
        assert!(matches!(
            monitor.latest("eth0").await,
            Err(MonitorError::NoSamples(_))
        ));
    }

    #[tokio::test]
    async fn export_errors_for_untracked_interface() {
        let monitor = BandwidthMonitor::new(10);
        assert!(matches!(
            monitor.export("eth9").await,
            Err(MonitorError::NoSamples(_))
        ));
    }
}
