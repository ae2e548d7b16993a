//! `GET /tc/status`, `POST`/`DELETE /tc/rules`.

use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::Json;
use tn_types::ShapingRule;

use crate::error::AppError;
use crate::handlers::vxlan::SliceQuery;
use crate::state::AgentState;
use tn_shaping::ShapingSnapshot;

pub async fn tc_status(
    Extension(state): Extension<Arc<AgentState>>,
    Query(q): Query<SliceQuery>,
) -> Result<Json<ShapingSnapshot>, AppError> {
    let (_slice_id, _overlay, shaping) = state.resolve_slice(q.slice_id.as_deref()).await?;
    Ok(Json(shaping.snapshot().await))
}

pub async fn install_rules(
    Extension(state): Extension<Arc<AgentState>>,
    Query(q): Query<SliceQuery>,
    Json(rules): Json<Vec<ShapingRule>>,
) -> Result<Json<ShapingSnapshot>, AppError> {
    for (i, rule) in rules.iter().enumerate() {
        rule.validate_structure().map_err(|e| {
            tn_types::error::TnError::Validation(tn_types::error::ValidationError::Field {
                field: format!("rules[{i}]"),
                reason: e.to_string(),
            })
        })?;
    }

    let (_slice_id, _overlay, shaping) = state.resolve_slice(q.slice_id.as_deref()).await?;
    shaping.update(rules).await.map_err(tn_types::error::TnError::from)?;
    Ok(Json(shaping.snapshot().await))
}

pub async fn clear_rules(
    Extension(state): Extension<Arc<AgentState>>,
    Query(q): Query<SliceQuery>,
) -> Result<Json<ShapingSnapshot>, AppError> {
    let (_slice_id, _overlay, shaping) = state.resolve_slice(q.slice_id.as_deref()).await?;
    shaping.clear().await.map_err(tn_types::error::TnError::from)?;
    Ok(Json(shaping.snapshot().await))
}
