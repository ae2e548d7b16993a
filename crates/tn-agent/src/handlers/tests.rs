//! `POST /tests` / `GET /tests/{id}` — run a probe test, and retrieve a
//! previously stored result by its test id.

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde::Deserialize;
use tn_probe::{Direction, LatencyOptions, Protocol, ThroughputOptions};

use crate::error::AppError;
use crate::state::{AgentState, ProbeResultRecord};

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunTestRequest {
    Throughput {
        server_ip: String,
        server_port: u16,
        #[serde(default = "default_protocol")]
        protocol: Protocol,
        #[serde(default = "default_direction")]
        direction: Direction,
        #[serde(default = "default_streams")]
        parallel_streams: u32,
        window_size_kb: Option<u64>,
        #[serde(default = "default_duration")]
        duration_secs: u64,
        interval_secs: Option<u64>,
        bandwidth_cap: Option<String>,
    },
    Latency {
        target_ip: String,
        #[serde(default = "default_ping_count")]
        count: u32,
        #[serde(default = "default_ping_timeout")]
        timeout_secs: u64,
    },
}

fn default_protocol() -> Protocol {
    Protocol::Tcp
}
fn default_direction() -> Direction {
    Direction::Upload
}
fn default_streams() -> u32 {
    1
}
fn default_duration() -> u64 {
    10
}
fn default_ping_count() -> u32 {
    5
}
fn default_ping_timeout() -> u64 {
    2
}

pub async fn run_test(
    Extension(state): Extension<Arc<AgentState>>,
    Json(req): Json<RunTestRequest>,
) -> Result<Json<ProbeResultRecord>, AppError> {
    let record = match req {
        RunTestRequest::Throughput {
            server_ip,
            server_port,
            protocol,
            direction,
            parallel_streams,
            window_size_kb,
            duration_secs,
            interval_secs,
            bandwidth_cap,
        } => {
            let result = state
                .probe
                .run_throughput_test(ThroughputOptions {
                    server_ip,
                    server_port,
                    protocol,
                    direction,
                    parallel_streams,
                    window_size_kb,
                    duration_secs,
                    interval_secs,
                    bandwidth_cap,
                })
                .await
                .map_err(tn_types::error::TnError::from)?;
            ProbeResultRecord::Throughput(result)
        }
        RunTestRequest::Latency {
            target_ip,
            count,
            timeout_secs,
        } => {
            let result = state
                .probe
                .run_latency_test(LatencyOptions {
                    target_ip,
                    count,
                    timeout_secs,
                })
                .await
                .map_err(tn_types::error::TnError::from)?;
            ProbeResultRecord::Latency(result)
        }
    };

    let test_id = match &record {
        ProbeResultRecord::Throughput(r) => r.test_id.clone(),
        ProbeResultRecord::Latency(r) => r.test_id.clone(),
    };
    state
        .probe_results
        .write()
        .await
        .insert(test_id, record.clone());

    Ok(Json(record))
}

pub async fn get_test(
    Extension(state): Extension<Arc<AgentState>>,
    Path(test_id): Path<String>,
) -> Result<Json<ProbeResultRecord>, AppError> {
    state
        .probe_results
        .read()
        .await
        .get(&test_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| tn_types::error::TnError::NotFound(format!("test {test_id:?} not found")).into())
}
