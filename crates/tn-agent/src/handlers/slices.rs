//! `POST`/`DELETE /slices/{id}` — apply or retract a slice's per-node config.

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::{json, Value};
use tn_types::AgentConfig;

use crate::core::AgentCore;
use crate::error::AppError;

pub async fn apply_slice(
    Extension(core): Extension<Arc<AgentCore>>,
    Path(slice_id): Path<String>,
    Json(config): Json<AgentConfig>,
) -> Result<Json<Value>, AppError> {
    if config.slice_id != slice_id {
        return Err(AppError::from(tn_types::error::TnError::Validation(
            tn_types::error::ValidationError::Field {
                field: "slice_id".into(),
                reason: "path slice id does not match body slice_id".into(),
            },
        )));
    }

    match core.configure_slice(&slice_id, config).await {
        Ok(()) => Ok(Json(json!({"slice_id": slice_id, "applied": true}))),
        Err(e) => Err(AppError::from(tn_types::error::TnError::State(e.to_string()))),
    }
}

pub async fn retract_slice(
    Extension(core): Extension<Arc<AgentCore>>,
    Path(slice_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    core.retract_slice(&slice_id).await?;
    Ok(Json(json!({"slice_id": slice_id, "retracted": true})))
}
