//! JSON error responses for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::types::AppError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. "busy", "ingestion_failed".
    pub error: String,
    pub message: String,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Ingestion(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ingestion_failed"),
            AppError::Analysis(_) => (StatusCode::BAD_GATEWAY, "analysis_failed"),
            AppError::LLMApi(_) => (StatusCode::BAD_GATEWAY, "llm_error"),
            AppError::Busy(_) => (StatusCode::CONFLICT, "busy"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Config(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: code.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Ingestion("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::Analysis("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::LLMApi("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Busy("x".into()), StatusCode::CONFLICT),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
