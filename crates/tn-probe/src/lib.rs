//! Probe Engine (spec §4.5) — active throughput and latency measurement,
//! plus the lifecycle of the probe-server set.

pub mod parse;
pub mod types;

pub use types::*;

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tn_secure_exec::{execute, spawn_background, CommandError};
use tn_types::error::{TnError, ValidationError};
use tn_validators::{validate_bandwidth_string, validate_port};
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

const MAX_THROUGHPUT_DURATION_SECS: u64 = 3600;
const MAX_LATENCY_DURATION_SECS: u64 = 600;
const MAX_PARALLEL_STREAMS: u32 = 128;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("duration {got}s exceeds max {max}s")]
    DurationExceeded { got: u64, max: u64 },
    #[error("parallel streams {got} exceeds max {max}")]
    StreamsExceeded { got: u32, max: u32 },
    #[error("invalid bandwidth cap: {0}")]
    InvalidBandwidth(String),
    #[error("server state error: {0}")]
    ServerState(String),
    #[error("command failed: {0}")]
    Command(#[from] CommandError),
}

impl From<ProbeError> for TnError {
    fn from(e: ProbeError) -> Self {
        match e {
            ProbeError::Command(inner) => inner.into(),
            ProbeError::InvalidPort(reason) => {
                TnError::Validation(ValidationError::Field { field: "port".into(), reason })
            }
            ProbeError::InvalidBandwidth(reason) => TnError::Validation(ValidationError::Field {
                field: "bandwidth_cap".into(),
                reason,
            }),
            ProbeError::DurationExceeded { got, max } => {
                TnError::Validation(ValidationError::Field {
                    field: "duration_secs".into(),
                    reason: format!("{got}s exceeds max {max}s"),
                })
            }
            ProbeError::StreamsExceeded { got, max } => {
                TnError::Validation(ValidationError::Field {
                    field: "parallel_streams".into(),
                    reason: format!("{got} exceeds max {max}"),
                })
            }
            ProbeError::ServerState(reason) => TnError::State(reason),
        }
    }
}

pub struct ProbeEngine {
    servers: Mutex<HashMap<u16, Child>>,
}

impl Default for ProbeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeEngine {
    pub fn new() -> Self {
        Self {
            servers: Mutex::new(HashMap::new()),
        }
    }

    /// Start a server on `port`. A no-op if the port is already active and
    /// still alive; a stale (dead) entry is reaped first (spec §4.5
    /// "Server-side").
    pub async fn start_server(&self, port: u16) -> Result<(), ProbeError> {
        validate_port(port as i64).map_err(|e| ProbeError::InvalidPort(e.to_string()))?;

        let mut servers = self.servers.lock().await;
        if let Some(child) = servers.get_mut(&port) {
            match child.try_wait() {
                Ok(None) => return Ok(()), // still listening
                _ => {
                    servers.remove(&port);
                }
            }
        }

        let child = spawn_background(
            "iperf3",
            &["-s".to_string(), "-p".to_string(), port.to_string()],
        )
        .await?;
        servers.insert(port, child);
        Ok(())
    }

    /// Stop the server on `port`, cancelling its scope and terminating the
    /// process.
    pub async fn stop_server(&self, port: u16) -> Result<(), ProbeError> {
        let mut servers = self.servers.lock().await;
        if let Some(mut child) = servers.remove(&port) {
            if let Err(e) = child.kill().await {
                warn!(port, error = %e, "probe: failed to kill server process");
            }
        }
        Ok(())
    }

    pub async fn active_ports(&self) -> Vec<u16> {
        let mut servers = self.servers.lock().await;
        let dead: Vec<u16> = servers
            .iter_mut()
            .filter_map(|(port, child)| match child.try_wait() {
                Ok(Some(_)) => Some(*port),
                _ => None,
            })
            .collect();
        for port in &dead {
            servers.remove(port);
        }
        servers.keys().copied().collect()
    }

    pub async fn run_throughput_test(
        &self,
        opts: ThroughputOptions,
    ) -> Result<ThroughputResult, ProbeError> {
        if opts.duration_secs > MAX_THROUGHPUT_DURATION_SECS {
            return Err(ProbeError::DurationExceeded {
                got: opts.duration_secs,
                max: MAX_THROUGHPUT_DURATION_SECS,
            });
        }
        if opts.parallel_streams > MAX_PARALLEL_STREAMS || opts.parallel_streams == 0 {
            return Err(ProbeError::StreamsExceeded {
                got: opts.parallel_streams,
                max: MAX_PARALLEL_STREAMS,
            });
        }
        if let Some(cap) = &opts.bandwidth_cap {
            validate_bandwidth_string(cap).map_err(|e| ProbeError::InvalidBandwidth(e.to_string()))?;
        }

        let mut args = vec![
            "-c".to_string(),
            opts.server_ip.clone(),
            "-p".to_string(),
            opts.server_port.to_string(),
            "-t".to_string(),
            opts.duration_secs.to_string(),
            "-P".to_string(),
            opts.parallel_streams.to_string(),
            "-J".to_string(),
        ];
        if opts.protocol == Protocol::Udp {
            args.push("-u".to_string());
            if let Some(cap) = &opts.bandwidth_cap {
                args.push("-b".to_string());
                args.push(cap.clone());
            }
        }
        match opts.direction {
            Direction::Download => args.push("-R".to_string()),
            Direction::Bidirectional => args.push("--bidir".to_string()),
            Direction::Upload => {}
        }
        if let Some(window) = opts.window_size_kb {
            args.push("-w".to_string());
            args.push(format!("{window}K"));
        }
        if let Some(interval) = opts.interval_secs {
            args.push("-i".to_string());
            args.push(interval.to_string());
        }

        let deadline = Duration::from_secs(opts.duration_secs + 30);
        let out = execute("iperf3", &args, deadline).await?;

        let test_id = Uuid::new_v4().to_string();
        Ok(parse::parse_iperf3_json(test_id, opts.server_ip, &out.combined))
    }

    pub async fn run_latency_test(&self, opts: LatencyOptions) -> Result<LatencyResult, ProbeError> {
        let total = opts.count as u64 * opts.timeout_secs.max(1);
        if total > MAX_LATENCY_DURATION_SECS {
            return Err(ProbeError::DurationExceeded {
                got: total,
                max: MAX_LATENCY_DURATION_SECS,
            });
        }

        let args = vec![
            "-c".to_string(),
            opts.count.to_string(),
            "-W".to_string(),
            opts.timeout_secs.to_string(),
            opts.target_ip.clone(),
        ];
        let deadline = Duration::from_secs(total + 10);
        let out = execute("ping", &args, deadline).await?;

        let test_id = Uuid::new_v4().to_string();
        Ok(parse::parse_ping_output(test_id, &out.combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn throughput_rejects_excess_duration() {
        let engine = ProbeEngine::new();
        let opts = ThroughputOptions {
            server_ip: "10.0.0.1".into(),
            server_port: 5201,
            protocol: Protocol::Tcp,
            direction: Direction::Upload,
            parallel_streams: 1,
            window_size_kb: None,
            duration_secs: MAX_THROUGHPUT_DURATION_SECS + 1,
            interval_secs: None,
            bandwidth_cap: None,
        };
        assert!(matches!(
            engine.run_throughput_test(opts).await,
            Err(ProbeError::DurationExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn throughput_rejects_excess_streams() {
        let engine = ProbeEngine::new();
        let opts = ThroughputOptions {
            server_ip: "10.0.0.1".into(),
            server_port: 5201,
            protocol: Protocol::Tcp,
            direction: Direction::Upload,
            parallel_streams: MAX_PARALLEL_STREAMS + 1,
            window_size_kb: None,
            duration_secs: 10,
            interval_secs: None,
            bandwidth_cap: None,
        };
        assert!(matches!(
            engine.run_throughput_test(opts).await,
            Err(ProbeError::StreamsExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn latency_rejects_excess_total_duration() {
        let engine = ProbeEngine::new();
        let opts = LatencyOptions {
            target_ip: "10.0.0.1".into(),
            count: 1000,
            timeout_secs: 10,
        };
        assert!(matches!(
            engine.run_latency_test(opts).await,
            Err(ProbeError::DurationExceeded { .. })
        ));
    }
}
