//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use services::ServiceError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Service layer error.
    Service(ServiceError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Service(err) => service_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn service_error_to_response(err: ServiceError) -> (StatusCode, String) {
    match &err {
        ServiceError::TicketNotFound(_)
        | ServiceError::PaymentNotFound(_)
        | ServiceError::NotificationNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::InvalidInput(_) | ServiceError::Domain(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ServiceError::InvalidState(_) => (StatusCode::CONFLICT, err.to_string()),
        ServiceError::Downstream(_) => {
            tracing::error!(error = %err, "downstream failure");
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}
