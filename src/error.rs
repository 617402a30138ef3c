use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource owned by another user.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Missing, invalid or expired credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid input or format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Book parsed but yielded no readable text.
    #[error("Empty book: {0}")]
    EmptyBook(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AppError::EmptyBook(_) | AppError::Xml(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(error = %self, "Request error");

        (status, self.to_string()).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
