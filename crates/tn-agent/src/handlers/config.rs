//! `GET`/`PUT /config` — read or replace the agent's own on-wire node config.

use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use tn_types::AgentNodeConfig;

use crate::error::AppError;
use crate::state::AgentState;

pub async fn get_config(Extension(state): Extension<Arc<AgentState>>) -> Json<AgentNodeConfig> {
    Json(state.node_config.read().await.clone())
}

pub async fn put_config(
    Extension(state): Extension<Arc<AgentState>>,
    Json(new_config): Json<AgentNodeConfig>,
) -> Result<Json<AgentNodeConfig>, AppError> {
    *state.node_config.write().await = new_config.clone();
    Ok(Json(new_config))
}
