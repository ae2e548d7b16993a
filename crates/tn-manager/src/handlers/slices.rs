//! `POST /slices`, `GET /slices`, `GET`/`PUT`/`DELETE /slices/{id}`, and the
//! agent acknowledgement intake `POST /slices/{id}/ack` (spec §4.8: "poll
//! agents (or consume their acknowledgements)" — modeled here as agents
//! self-reporting rather than the manager discovering agent addresses to
//! poll, since peer/agent discovery is explicitly out of scope per spec §1).

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde::{Deserialize, Serialize};
use tn_reconciler::Reconciler;
use tn_types::{Phase, Slice, SliceStatus};

use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct SliceView {
    pub spec: Slice,
    pub status: SliceStatus,
}

#[derive(Debug, Serialize)]
pub struct SliceSummary {
    pub slice_id: String,
    pub phase: Phase,
}

pub async fn create_slice(
    Extension(reconciler): Extension<Arc<Reconciler>>,
    Json(spec): Json<Slice>,
) -> Result<Json<SliceSummary>, AppError> {
    let slice_id = spec.slice_id.clone();
    reconciler.create_slice(spec).await?;
    Ok(Json(SliceSummary { slice_id, phase: Phase::Pending }))
}

pub async fn list_slices(
    Extension(reconciler): Extension<Arc<Reconciler>>,
) -> Json<Vec<SliceSummary>> {
    let slices = reconciler.list().await;
    Json(
        slices
            .into_iter()
            .map(|(slice_id, phase)| SliceSummary { slice_id, phase })
            .collect(),
    )
}

pub async fn get_slice(
    Extension(reconciler): Extension<Arc<Reconciler>>,
    Path(id): Path<String>,
) -> Result<Json<SliceView>, AppError> {
    let spec = reconciler.get_spec(&id).await?;
    let status = reconciler.get_status(&id).await?;
    Ok(Json(SliceView { spec, status }))
}

pub async fn update_slice(
    Extension(reconciler): Extension<Arc<Reconciler>>,
    Path(id): Path<String>,
    Json(spec): Json<Slice>,
) -> Result<Json<SliceSummary>, AppError> {
    reconciler.update_slice(&id, spec).await?;
    Ok(Json(SliceSummary { slice_id: id, phase: Phase::Pending }))
}

pub async fn delete_slice(
    Extension(reconciler): Extension<Arc<Reconciler>>,
    Path(id): Path<String>,
) -> Result<Json<SliceSummary>, AppError> {
    reconciler.delete_slice(&id).await?;
    Ok(Json(SliceSummary { slice_id: id, phase: Phase::Deleting }))
}

#[derive(Debug, Deserialize)]
pub struct AckRequest {
    pub node_name: String,
    pub observed_generation: u64,
}

pub async fn ack_slice(
    Extension(reconciler): Extension<Arc<Reconciler>>,
    Path(id): Path<String>,
    Json(req): Json<AckRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    reconciler.record_ack(&id, &req.node_name, req.observed_generation).await?;
    Ok(Json(serde_json::json!({ "acknowledged": true })))
}
