use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::response::ApiResponse;

/// Standard error type for Catnip handlers and middleware.
///
/// Returning one of these from a handler stops the chain. The innermost
/// error boundary registered with [`App::handle_error`](crate::App::handle_error)
/// receives it; without one it becomes the default JSON error response.
#[derive(Debug, Error)]
pub enum CatnipError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// An error with an arbitrary status, like `ctx.throw(status, message)`.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatnipError {
    /// Create an error that responds with the given status and message.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        CatnipError::Http {
            status,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CatnipError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CatnipError::Forbidden(_) => StatusCode::FORBIDDEN,
            CatnipError::NotFound(_) => StatusCode::NOT_FOUND,
            CatnipError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            CatnipError::Http { status, .. } => *status,
            CatnipError::InvalidHeader(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CatnipError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CatnipError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CatnipError::Json(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            CatnipError::BadRequest(_) => "BAD_REQUEST",
            CatnipError::Forbidden(_) => "FORBIDDEN",
            CatnipError::NotFound(_) => "NOT_FOUND",
            CatnipError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            CatnipError::Http { .. } => "HTTP_ERROR",
            CatnipError::InvalidHeader(_) => "INVALID_HEADER",
            CatnipError::Internal(_) => "INTERNAL_ERROR",
            CatnipError::Io(_) => "IO_ERROR",
            CatnipError::Json(_) => "INVALID_JSON",
        }
    }

    /// Whether the message is safe to show to the client.
    ///
    /// Server errors only expose a generic reason phrase.
    pub fn is_exposed(&self) -> bool {
        !self.status_code().is_server_error()
    }
}

/// Error detail for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl axum::response::IntoResponse for CatnipError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = if self.is_exposed() {
            tracing::debug!(error = %self, status = status.as_u16(), "request failed");
            self.to_string()
        } else {
            tracing::error!(error = %self, status = status.as_u16(), "unhandled server error");
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        };

        let body: ApiResponse<()> = ApiResponse::error(self.error_code(), message);
        (status, axum::Json(body)).into_response()
    }
}
