//! `AppError` — translates `TnError` into the manager control API's HTTP
//! responses, matching `tn-agent`'s convention (spec §4.9 error mapping).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tn_types::error::TnError;

pub struct AppError(TnError);

impl From<TnError> for AppError {
    fn from(e: TnError) -> Self {
        Self(e)
    }
}

impl From<tn_reconciler::ReconcilerError> for AppError {
    fn from(e: tn_reconciler::ReconcilerError) -> Self {
        Self(TnError::from(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TnError::Validation(_) => StatusCode::BAD_REQUEST,
            TnError::State(_) => StatusCode::CONFLICT,
            TnError::Command(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TnError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            TnError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TnError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = json!({
            "error": self.0.to_string(),
            "code": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
