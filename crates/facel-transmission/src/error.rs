//! Error types for document transmission.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Transmission error variants.
#[derive(Debug, thiserror::Error)]
pub enum TransmissionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document not found")]
    DocumentNotFound,

    #[error("Document already transmitted")]
    AlreadyTransmitted,

    #[error("Reception API unreachable: {0}")]
    Remote(String),

    #[error("Reception API returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON error response returned by the transmission API.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl IntoResponse for TransmissionError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TransmissionError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
            }
            TransmissionError::DocumentNotFound => (StatusCode::NOT_FOUND, "document_not_found"),
            TransmissionError::AlreadyTransmitted => {
                (StatusCode::CONFLICT, "already_transmitted")
            }
            TransmissionError::Remote(_) => (StatusCode::BAD_GATEWAY, "remote_unreachable"),
            TransmissionError::InvalidResponse(_) => {
                (StatusCode::BAD_GATEWAY, "remote_invalid_response")
            }
            TransmissionError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, TransmissionError>;
