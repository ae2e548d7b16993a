//! tn-agent — per-node transport network agent.
//!
//! Reads config from env vars:
//!   TN_AGENT_BIND_ADDR    — listen address (default: 0.0.0.0:7100)
//!   TN_AGENT_NODE_NAME    — this node's name, used in logs (required)
//!   TN_AGENT_CONFIG_PATH  — path to a JSON `AgentNodeConfig` document
//!   TN_AGENT_CONFIG_JSON  — inline JSON `AgentNodeConfig`, overrides the path
//!
//! Exactly one of `TN_AGENT_CONFIG_PATH` / `TN_AGENT_CONFIG_JSON` must
//! resolve to a document, or the agent starts with an empty node config
//! (no declared vxlan/bandwidth policy) and waits for slices via the
//! control API.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tn_agent::core::AgentCore;
use tn_agent::router::build_router;
use tn_agent::state::AgentState;
use tn_types::AgentNodeConfig;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};

const SELF_CHECK_INTERVAL: Duration = Duration::from_secs(30);

fn load_node_config() -> AgentNodeConfig {
    if let Ok(inline) = std::env::var("TN_AGENT_CONFIG_JSON") {
        return serde_json::from_str(&inline).expect("TN_AGENT_CONFIG_JSON must be valid JSON");
    }
    if let Ok(path) = std::env::var("TN_AGENT_CONFIG_PATH") {
        let raw = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read TN_AGENT_CONFIG_PATH {path:?}: {e}"));
        return serde_json::from_str(&raw).expect("TN_AGENT_CONFIG_PATH must contain valid JSON");
    }

    AgentNodeConfig {
        cluster_name: String::new(),
        network_cidr: String::new(),
        vxlan: None,
        bandwidth_policy: None,
        monitoring_port: 0,
        qos_class: tn_types::QosClass::default(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tn_agent=debug".into()),
        )
        .init();

    let node_name = std::env::var("TN_AGENT_NODE_NAME").expect("TN_AGENT_NODE_NAME must be set");
    let bind_addr = std::env::var("TN_AGENT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:7100".into());
    let node_config = load_node_config();

    let state = Arc::new(AgentState::new(node_config));
    let core = Arc::new(AgentCore::new(state.clone()));

    if let Err(e) = core.start(&[]).await {
        tracing::error!(node = %node_name, error = %e, "tn-agent: startup failed");
        return ExitCode::FAILURE;
    }
    tracing::info!(node = %node_name, "tn-agent: started");

    let self_check_core = core.clone();
    tokio::spawn(async move {
        self_check_core.run_self_check_loop(SELF_CHECK_INTERVAL).await;
    });

    let app = build_router(state.clone(), core.clone());

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(bind_addr = %bind_addr, error = %e, "tn-agent: failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(bind_addr = %bind_addr, "tn-agent: control API listening");

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "tn-agent: server error");
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("tn-agent: received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("tn-agent: received SIGTERM, shutting down");
        }
    }

    core.shutdown().await;
    tracing::info!("tn-agent: final metrics export complete, exiting");
    ExitCode::SUCCESS
}
