//! Router construction for the manager's control API (SPEC_FULL §6 addition).

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use tn_reconciler::Reconciler;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

pub fn build_router(reconciler: Arc<Reconciler>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/slices",
            get(handlers::slices::list_slices).post(handlers::slices::create_slice),
        )
        .route(
            "/slices/:id",
            get(handlers::slices::get_slice)
                .put(handlers::slices::update_slice)
                .delete(handlers::slices::delete_slice),
        )
        .route("/slices/:id/ack", post(handlers::slices::ack_slice))
        .layer(Extension(reconciler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
