//! tn-manager — Slice Reconciler process.
//!
//! Reads config from env vars:
//!   TN_MANAGER_BIND_ADDR          — listen address (default: 0.0.0.0:7200)
//!   TN_MANAGER_TICK_INTERVAL_SECS — reconcile loop period (default: 5)

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tn_manager::router::build_router;
use tn_reconciler::{InMemoryConfigStore, Reconciler};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};

fn tick_interval() -> Duration {
    let secs = std::env::var("TN_MANAGER_TICK_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);
    Duration::from_secs(secs)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tn_manager=debug".into()),
        )
        .init();

    let bind_addr = std::env::var("TN_MANAGER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:7200".into());
    let reconciler = Arc::new(Reconciler::new(Arc::new(InMemoryConfigStore::new())));

    let tick_core = reconciler.clone();
    let interval = tick_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = tick_core.reconcile_tick().await {
                tracing::warn!(error = %e, "tn-manager: reconcile tick failed");
            }
        }
    });

    let app = build_router(reconciler);

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(bind_addr = %bind_addr, error = %e, "tn-manager: failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(bind_addr = %bind_addr, "tn-manager: control API listening");

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "tn-manager: server error");
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("tn-manager: received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("tn-manager: received SIGTERM, shutting down");
        }
    }

    ExitCode::SUCCESS
}
