//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Order(OrderError::ItemNotInOrder { .. }) => StatusCode::NOT_FOUND,
        DomainError::Order(_) | DomainError::Voucher(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Store(StoreError::ConcurrencyConflict { .. })
        | DomainError::Store(StoreError::ActiveOrderExists { .. }) => StatusCode::CONFLICT,
        DomainError::Store(StoreError::Unavailable(_)) | DomainError::StoreTimeout(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
        // Store internals stay out of the response body
        return (status, "The order store is unavailable, try again later".to_string());
    }

    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
