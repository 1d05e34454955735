//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain error. Internal failures are answered with `internal_message`.
    Domain {
        error: DomainError,
        internal_message: &'static str,
    },
}

impl ApiError {
    /// Wraps a placement failure: infrastructure errors surface as
    /// "Failed to create order".
    pub fn placement(error: DomainError) -> Self {
        ApiError::Domain {
            error,
            internal_message: "Failed to create order",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain {
                error,
                internal_message,
            } => domain_error_to_response(error, internal_message),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError, internal_message: &str) -> (StatusCode, String) {
    let status = match &err {
        DomainError::Unauthorized => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden => StatusCode::FORBIDDEN,
        DomainError::InvalidRequest(_)
        | DomainError::ProductNotFound { .. }
        | DomainError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
        DomainError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        DomainError::NotCancellable { .. } => StatusCode::BAD_REQUEST,
        DomainError::TransactionFailure(_) | DomainError::Store(_) => {
            tracing::error!(error = %err, "internal server error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                internal_message.to_string(),
            );
        }
    };

    let message = match &err {
        DomainError::OrderNotFound(_) => "Order not found".to_string(),
        DomainError::NotCancellable { .. } => "Only pending orders can be cancelled".to_string(),
        _ => err.to_string(),
    };
    (status, message)
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApiError::Domain {
            error,
            internal_message: INTERNAL_MESSAGE,
        }
    }
}
