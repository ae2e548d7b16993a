//! Router construction for the agent's control API (spec §4.9, §6).

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::AgentCore;
use crate::handlers;
use crate::state::AgentState;

pub fn build_router(state: Arc<AgentState>, core: Arc<AgentCore>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/status", get(handlers::status::status))
        .route(
            "/config",
            get(handlers::config::get_config).put(handlers::config::put_config),
        )
        .route(
            "/slices/:id",
            post(handlers::slices::apply_slice).delete(handlers::slices::retract_slice),
        )
        .route("/tests", post(handlers::tests::run_test))
        .route("/tests/:id", get(handlers::tests::get_test))
        .route("/vxlan/status", get(handlers::vxlan::vxlan_status))
        .route("/vxlan/peers", put(handlers::vxlan::put_peers))
        .route("/vxlan/connectivity", post(handlers::vxlan::connectivity))
        .route("/tc/status", get(handlers::tc::tc_status))
        .route(
            "/tc/rules",
            post(handlers::tc::install_rules).delete(handlers::tc::clear_rules),
        )
        .route("/bandwidth", get(handlers::bandwidth::latest))
        .route("/bandwidth/stream", get(handlers::bandwidth::stream_samples))
        .route(
            "/iperf/servers",
            get(handlers::iperf_servers::list_servers),
        )
        .route(
            "/iperf/servers/:port",
            post(handlers::iperf_servers::start_server).delete(handlers::iperf_servers::stop_server),
        )
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/metrics/export", get(handlers::metrics::metrics_export))
        .layer(Extension(state))
        .layer(Extension(core))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
