//! Per-interface counter samples (spec §3, §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterSample {
    pub t: DateTime<Utc>,
    pub iface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_pkts: u64,
    pub tx_pkts: u64,
    pub rx_drop: u64,
    pub tx_drop: u64,
    pub rx_err: u64,
    pub tx_err: u64,
    /// Derived fields — `None` until a previous sample for the same
    /// interface exists (spec §3, §4.6).
    pub rate_rx_bps: Option<f64>,
    pub rate_tx_bps: Option<f64>,
    pub utilization_pct: Option<f64>,
}

impl CounterSample {
    pub fn raw(
        t: DateTime<Utc>,
        iface: impl Into<String>,
        rx_bytes: u64,
        tx_bytes: u64,
        rx_pkts: u64,
        tx_pkts: u64,
        rx_drop: u64,
        tx_drop: u64,
        rx_err: u64,
        tx_err: u64,
    ) -> Self {
        Self {
            t,
            iface: iface.into(),
            rx_bytes,
            tx_bytes,
            rx_pkts,
            tx_pkts,
            rx_drop,
            tx_drop,
            rx_err,
            tx_err,
            rate_rx_bps: None,
            rate_tx_bps: None,
            utilization_pct: None,
        }
    }

    /// Derive rates against `prev`, the previous sample of the *same*
    /// interface. Returns `None` (wrap, discard the delta) if either counter
    /// went backwards — spec §4.6 / §8 "Monitor monotonicity".
    pub fn derive_rates(&mut self, prev: &CounterSample, ceiling_bps: Option<f64>) {
        let dt = (self.t - prev.t).num_milliseconds();
        if dt <= 0 {
            return;
        }
        if self.rx_bytes < prev.rx_bytes || self.tx_bytes < prev.tx_bytes {
            // Counter wrap: drop the delta, leave rates unset.
            return;
        }
        let dt_s = dt as f64 / 1000.0;
        let rx_bps = ((self.rx_bytes - prev.rx_bytes) as f64 * 8.0) / dt_s;
        let tx_bps = ((self.tx_bytes - prev.tx_bytes) as f64 * 8.0) / dt_s;
        self.rate_rx_bps = Some(rx_bps);
        self.rate_tx_bps = Some(tx_bps);
        if let Some(ceiling) = ceiling_bps {
            if ceiling > 0.0 {
                self.utilization_pct = Some(((rx_bps + tx_bps) / ceiling * 100.0).min(100.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn derives_nonnegative_rate() {
        let t0 = Utc::now();
        let prev = CounterSample::raw(t0, "eth0", 1000, 500, 10, 5, 0, 0, 0, 0);
        let mut cur = CounterSample::raw(t0 + Duration::seconds(1), "eth0", 2000, 1000, 20, 10, 0, 0, 0, 0);
        cur.derive_rates(&prev, None);
        assert_eq!(cur.rate_rx_bps, Some(8000.0));
        assert!(cur.rate_rx_bps.unwrap() >= 0.0);
    }

    #[test]
    fn wrap_drops_sample_rate() {
        let t0 = Utc::now();
        let prev = CounterSample::raw(t0, "eth0", 5000, 5000, 10, 5, 0, 0, 0, 0);
        let mut cur = CounterSample::raw(t0 + Duration::seconds(1), "eth0", 100, 100, 1, 1, 0, 0, 0, 0);
        cur.derive_rates(&prev, None);
        assert!(cur.rate_rx_bps.is_none());
    }
}
