//! Shaping Engine (spec §4.4) — programs a hierarchical token-bucket
//! discipline on one interface so offered load per rule is capped at
//! `rate_kbps`, bursts don't exceed `burst_kb`, and per-class delay matches
//! `latency_ms` (optionally jitter and induced loss).

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tn_secure_exec::execute;
use tn_types::{error::TnError, ShapingRule};
use tokio::sync::RwLock;
use tracing::debug;

const DEFAULT_EXEC_DEADLINE: Duration = Duration::from_secs(5);
/// Root HTB handle; the default class catches unclassified traffic.
const ROOT_HANDLE: &str = "1:";
const DEFAULT_CLASS_ID: &str = "9999";

/// Nominal per-packet processing overhead the engine itself adds, reported
/// to the Bandwidth Monitor when reconciling observed throughput against
/// configured rate (spec §4.4 "Overhead").
pub const PROCESSING_OVERHEAD_PCT: f64 = 1.5;

#[derive(Debug, Error)]
pub enum ShapingError {
    #[error("rule at index {index} exceeds the interface ceiling")]
    CeilingExceeded { index: usize },
    #[error("failed to clear existing discipline: {0}")]
    ClearFailed(#[source] TnError),
    #[error("failed to install root discipline: {0}")]
    RootInstallFailed(#[source] TnError),
    #[error("failed to install rule at index {index}: {source}")]
    RuleInstallFailed { index: usize, source: TnError },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShapingSnapshot {
    pub interface: String,
    pub rules: Vec<ShapingRule>,
    pub degraded: bool,
    pub failing_rule_index: Option<usize>,
}

pub struct ShapingEngine {
    snapshot: RwLock<ShapingSnapshot>,
    rate_ceiling_kbps: Option<u64>,
}

impl ShapingEngine {
    pub fn new(interface: impl Into<String>, rate_ceiling_kbps: Option<u64>) -> Self {
        Self {
            snapshot: RwLock::new(ShapingSnapshot {
                interface: interface.into(),
                ..Default::default()
            }),
            rate_ceiling_kbps,
        }
    }

    pub async fn snapshot(&self) -> ShapingSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Validate interface and rules against the configured ceiling, if any
    /// (spec §4.4 step 1).
    pub fn validate(&self, rules: &[ShapingRule]) -> Result<(), ShapingError> {
        for (i, rule) in rules.iter().enumerate() {
            if rule.validate_structure().is_err() {
                return Err(ShapingError::CeilingExceeded { index: i });
            }
        }
        if let Some(ceiling) = self.rate_ceiling_kbps {
            let total: u64 = rules.iter().map(|r| r.rate_kbps).sum();
            if total > ceiling {
                return Err(ShapingError::CeilingExceeded { index: rules.len() });
            }
        }
        Ok(())
    }

    /// Idempotently clear the root and ingress disciplines on `interface`,
    /// ignoring "no such discipline" failures (spec §4.4 step 2). Shared by
    /// `clear()` and `install()` so neither can observe a stale qdisc from a
    /// prior install.
    async fn clear_disciplines(&self, interface: &str) {
        let _ = execute(
            "tc",
            &str_vec(&["qdisc", "del", "dev", interface, "root"]),
            DEFAULT_EXEC_DEADLINE,
        )
        .await;
        let _ = execute(
            "tc",
            &str_vec(&["qdisc", "del", "dev", interface, "ingress"]),
            DEFAULT_EXEC_DEADLINE,
        )
        .await;
    }

    /// Idempotently clear the root and ingress disciplines, ignoring "no
    /// such discipline" failures (spec §4.4 step 2).
    pub async fn clear(&self) -> Result<(), ShapingError> {
        let interface = self.snapshot.read().await.interface.clone();
        self.clear_disciplines(&interface).await;

        let mut snap = self.snapshot.write().await;
        snap.rules.clear();
        snap.degraded = false;
        snap.failing_rule_index = None;
        Ok(())
    }

    /// Install the root HTB qdisc and one child class (plus an optional
    /// netem leaf) per rule, in ascending priority order (spec §4.4 steps
    /// 3-5). Class-ids are derived from `priority`, never from user input.
    /// Idempotent: a stale root/ingress discipline from a previous
    /// `install()` is cleared first, so `install(r); install(r)` converges
    /// to the same snapshot as a single call rather than failing on the
    /// second `tc qdisc add`.
    pub async fn install(&self, rules: Vec<ShapingRule>) -> Result<(), ShapingError> {
        self.validate(&rules)?;

        let interface = self.snapshot.read().await.interface.clone();
        self.clear_disciplines(&interface).await;

        execute(
            "tc",
            &str_vec(&[
                "qdisc", "add", "dev", &interface, "root", "handle", ROOT_HANDLE, "htb",
                "default", DEFAULT_CLASS_ID,
            ]),
            DEFAULT_EXEC_DEADLINE,
        )
        .await
        .map_err(|e| ShapingError::RootInstallFailed(e.into()))?;

        let mut sorted = rules;
        sorted.sort_by_key(|r| r.priority);

        for (i, rule) in sorted.iter().enumerate() {
            if let Err(source) = self.install_one(&interface, rule).await {
                let mut snap = self.snapshot.write().await;
                snap.degraded = true;
                snap.failing_rule_index = Some(i);
                return Err(ShapingError::RuleInstallFailed { index: i, source });
            }
        }

        let mut snap = self.snapshot.write().await;
        snap.rules = sorted;
        snap.degraded = false;
        snap.failing_rule_index = None;
        Ok(())
    }

    async fn install_one(&self, interface: &str, rule: &ShapingRule) -> Result<(), TnError> {
        let classid = format!("1:{}", rule.priority);

        execute(
            "tc",
            &str_vec(&[
                "class", "add", "dev", interface, "parent", ROOT_HANDLE, "classid", &classid,
                "htb", "rate", &format!("{}kbit", rule.rate_kbps), "burst",
                &format!("{}k", rule.burst_kb),
            ]),
            DEFAULT_EXEC_DEADLINE,
        )
        .await
        .map_err(TnError::from)?;

        let needs_netem =
            rule.latency_ms > 0.0 || rule.jitter_ms.unwrap_or(0.0) > 0.0 || rule.loss_percent.unwrap_or(0.0) > 0.0;

        if needs_netem {
            let handle = format!("{}:", rule.priority);
            let mut args = vec![
                "qdisc".to_string(),
                "add".to_string(),
                "dev".to_string(),
                interface.to_string(),
                "parent".to_string(),
                classid.clone(),
                "handle".to_string(),
                handle,
                "netem".to_string(),
            ];
            if rule.latency_ms > 0.0 {
                args.push("delay".to_string());
                args.push(format!("{}ms", rule.latency_ms));
                if let Some(jitter) = rule.jitter_ms.filter(|j| *j > 0.0) {
                    args.push(format!("{jitter}ms"));
                }
            }
            if let Some(loss) = rule.loss_percent.filter(|l| *l > 0.0) {
                args.push("loss".to_string());
                args.push(format!("{loss}%"));
            }
            execute("tc", &args, DEFAULT_EXEC_DEADLINE)
                .await
                .map_err(TnError::from)?;
        }

        debug!(interface, classid, "shaping: installed rule");
        Ok(())
    }

    /// `update(new_rules)` is `clear(); install(new_rules)` — no
    /// partial-update path (spec §4.4 "Update semantics").
    pub async fn update(&self, new_rules: Vec<ShapingRule>) -> Result<(), ShapingError> {
        self.clear().await?;
        self.install(new_rules).await
    }

    pub fn overhead_pct(&self) -> f64 {
        PROCESSING_OVERHEAD_PCT
    }
}

fn str_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl From<ShapingError> for TnError {
    fn from(e: ShapingError) -> Self {
        match e {
            ShapingError::CeilingExceeded { index } => {
                TnError::Validation(tn_types::error::ValidationError::Field {
                    field: format!("rules[{index}]"),
                    reason: "exceeds the interface ceiling".into(),
                })
            }
            ShapingError::ClearFailed(inner) | ShapingError::RootInstallFailed(inner) => inner,
            ShapingError::RuleInstallFailed { index, source } => {
                TnError::Command(format!("rule at index {index} failed: {source}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(priority: u16, rate_kbps: u64) -> ShapingRule {
        ShapingRule {
            priority,
            rate_kbps,
            burst_kb: 32,
            latency_ms: 10.0,
            jitter_ms: None,
            loss_percent: None,
        }
    }

    #[test]
    fn validate_rejects_ceiling_exceeded() {
        let engine = ShapingEngine::new("eth0", Some(1000));
        let rules = vec![rule(1, 600), rule(2, 600)];
        assert!(engine.validate(&rules).is_err());
    }

    #[test]
    fn validate_accepts_within_ceiling() {
        let engine = ShapingEngine::new("eth0", Some(2000));
        let rules = vec![rule(1, 600), rule(2, 600)];
        assert!(engine.validate(&rules).is_ok());
    }

    #[test]
    fn validate_rejects_malformed_rule() {
        let engine = ShapingEngine::new("eth0", None);
        let bad = ShapingRule {
            priority: 0,
            rate_kbps: 100,
            burst_kb: 10,
            latency_ms: 0.0,
            jitter_ms: None,
            loss_percent: None,
        };
        assert!(engine.validate(&[bad]).is_err());
    }

    /// Spec.md §8's universal property "Idempotent shaping:
    /// `install(R); install(R)` yields the same observable snapshot as
    /// `install(R)`" — a second `install()` on an already-configured
    /// interface must converge, not fail on a pre-existing root qdisc.
    #[tokio::test]
    async fn install_twice_converges_to_the_same_snapshot() {
        let engine = ShapingEngine::new("lo", None);
        let rules = vec![rule(1, 500)];

        engine.install(rules.clone()).await.expect("first install");
        let first = engine.snapshot().await;

        engine
            .install(rules.clone())
            .await
            .expect("second install on an already-configured interface must converge, not fail");
        let second = engine.snapshot().await;

        assert_eq!(first.degraded, second.degraded);
        assert_eq!(first.rules.len(), second.rules.len());
        for (a, b) in first.rules.iter().zip(second.rules.iter()) {
            assert_eq!(a.priority, b.priority);
            assert_eq!(a.rate_kbps, b.rate_kbps);
        }

        let _ = engine.clear().await;
    }
}
