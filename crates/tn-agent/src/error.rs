//! Error handling for the agent's axum server.
//! Maps `TnError` to HTTP status codes and JSON error bodies (spec §4.9).

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tn_types::error::TnError;

/// Wrapper to convert `TnError` into an axum response.
pub struct AppError(TnError);

impl From<TnError> for AppError {
    fn from(e: TnError) -> Self {
        Self(e)
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
