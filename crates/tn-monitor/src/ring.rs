//! Bounded, per-interface sample ring (spec §4.6).

use std::collections::VecDeque;

use chrono::Duration;
use tn_types::counters::CounterSample;

/// Default retention age, chosen to match the default capacity at the
/// spec's default 1 s sample interval (spec §4.6 "retained up to a bounded
/// count or age, whichever is smaller").
pub const DEFAULT_MAX_AGE: Duration = Duration::seconds(300);

#[derive(Debug)]
pub struct Ring {
    capacity: usize,
    max_age: Duration,
    samples: VecDeque<CounterSample>,
}

impl Ring {
    pub fn new(capacity: usize) -> Self {
        Self::with_max_age(capacity, DEFAULT_MAX_AGE)
    }

    pub fn with_max_age(capacity: usize, max_age: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            max_age,
            samples: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Push `sample`, deriving its rates against the previous sample (if
    /// any). Samples are then bounded by count and by age, whichever
    /// evicts first: the oldest sample is dropped once the ring is full,
    /// and any sample older than `max_age` relative to `sample` is dropped
    /// regardless of how many samples remain (spec §4.6).
    pub fn push(&mut self, mut sample: CounterSample, ceiling_bps: Option<f64>) {
        if let Some(prev) = self.samples.back() {
            sample.derive_rates(prev, ceiling_bps);
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        let cutoff = sample.t - self.max_age;
        while self.samples.front().is_some_and(|s| s.t < cutoff) {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&CounterSample> {
        self.samples.back()
    }

    /// Average of `rate_rx_bps + rate_tx_bps` over the last `window_secs`,
    /// among samples that have a derived rate.
    pub fn moving_average_bps(&self, window_secs: i64) -> Option<f64> {
        let latest_t = self.samples.back()?.t;
        let cutoff = latest_t - chrono::Duration::seconds(window_secs);
        let mut sum = 0.0;
        let mut count = 0u64;
        for s in self.samples.iter().rev() {
            if s.t < cutoff {
                break;
            }
            if let (Some(rx), Some(tx)) = (s.rate_rx_bps, s.rate_tx_bps) {
                sum += rx + tx;
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// The current ring contents, oldest first.
    pub fn export(&self) -> Vec<CounterSample> {
        self.samples.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tn_types::counters::CounterSample;

    fn sample(t: chrono::DateTime<Utc>, iface: &str, rx: u64, tx: u64) -> CounterSample {
        CounterSample::raw(t, iface, rx, tx, 0, 0, 0, 0, 0, 0)
    }

    #[test]
    fn first_sample_yields_zero_rate_but_is_retained() {
        let mut ring = Ring::new(4);
        let t0 = Utc::now();
        ring.push(sample(t0, "eth0", 1000, 1000), None);
        assert_eq!(ring.export().len(), 1);
        assert!(ring.latest().unwrap().rate_rx_bps.is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut ring = Ring::new(2);
        let t0 = Utc::now();
        ring.push(sample(t0, "eth0", 0, 0), None);
        ring.push(sample(t0 + Duration::seconds(1), "eth0", 100, 100), None);
        ring.push(sample(t0 + Duration::seconds(2), "eth0", 200, 200), None);
        let exported = ring.export();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].rx_bytes, 100);
    }

    #[test]
    fn wrap_discards_delta_but_keeps_sample() {
        let mut ring = Ring::new(4);
        let t0 = Utc::now();
        ring.push(sample(t0, "eth0", 5000, 5000), None);
        ring.push(sample(t0 + Duration::seconds(1), "eth0", 100, 100), None);
        assert_eq!(ring.export().len(), 2);
        assert!(ring.latest().unwrap().rate_rx_bps.is_none());
    }

    #[test]
    fn age_eviction_drops_stale_samples_even_under_capacity() {
        let mut ring = Ring::with_max_age(100, Duration::seconds(10));
        let t0 = Utc::now();
        ring.push(sample(t0, "eth0", 0, 0), None);
        ring.push(sample(t0 + Duration::seconds(5), "eth0", 100, 100), None);
        ring.push(sample(t0 + Duration::seconds(20), "eth0", 200, 200), None);

        let exported = ring.export();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].rx_bytes, 200);
    }

    #[test]
    fn moving_average_ignores_window_outside_samples() {
        let mut ring = Ring::new(10);
        let t0 = Utc::now();
        ring.push(sample(t0, "eth0", 0, 0), None);
        ring.push(sample(t0 + Duration::seconds(1), "eth0", 1000, 1000), None);
        ring.push(sample(t0 + Duration::seconds(2), "eth0", 2000, 2000), None);
        let avg = ring.moving_average_bps(5).unwrap();
        assert!(avg > 0.0);
    }
}
