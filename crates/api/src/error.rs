//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use registry::RegistryError;
use saga::SagaError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Registry error.
    Registry(RegistryError),
    /// Saga orchestration error.
    Saga(SagaError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Registry(err) => registry_error_to_response(err),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn registry_error_to_response(err: RegistryError) -> (StatusCode, String) {
    match &err {
        RegistryError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        RegistryError::InvalidHealthStatus(_) => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    match &err {
        SagaError::SagaNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        SagaError::NoSteps(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        SagaError::UnknownStep { .. } | SagaError::OutOfOrder { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        SagaError::StepFailed { .. } => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Registry(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}
