//! Standardized API error responses for all pizzeria endpoints.
//!
//! # Response Format
//!
//! Every error response carries this JSON structure:
//!
//! ```json
//! {
//!   "error": true,
//!   "message": "Product not found",
//!   "code": "NOT_FOUND"
//! }
//! ```
//!
//! `error` is always `true`, which lets frontends test a single flag. `code`
//! is stable and meant for programmatic handling; `message` is for humans.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::PizzeriaError;

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // === Validation Errors (400) ===
    /// Request body is not valid JSON or has the wrong shape
    InvalidRequest,
    /// A required field is missing
    MissingField,
    /// A field value is invalid
    InvalidField,

    // === Authentication Errors (401) ===
    /// No bearer token provided
    MissingToken,
    /// Token is malformed or its signature does not match
    InvalidToken,
    /// Token has expired
    TokenExpired,
    /// Username or password did not match
    InvalidCredentials,

    // === Authorization Errors (403) ===
    /// Authenticated user lacks the required role
    Forbidden,

    // === Resource Errors (404/405/409) ===
    /// Requested resource was not found
    NotFound,
    /// No route matches the request path
    RouteNotFound,
    /// The path exists but not for this method
    MethodNotAllowed,
    /// Operation conflicts with existing data (duplicate username, email...)
    Conflict,

    // === Server Errors (500) ===
    /// Database operation failed
    DatabaseError,
    /// Server configuration error
    ConfigError,
    /// Unexpected internal server error
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest | ErrorCode::MissingField | ErrorCode::InvalidField => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::MissingToken
            | ErrorCode::InvalidToken
            | ErrorCode::TokenExpired
            | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,

            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::NotFound | ErrorCode::RouteNotFound => StatusCode::NOT_FOUND,

            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,

            ErrorCode::Conflict => StatusCode::CONFLICT,

            ErrorCode::DatabaseError | ErrorCode::ConfigError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Invalid request body",
            ErrorCode::MissingField => "A required field is missing",
            ErrorCode::InvalidField => "A field value is invalid",
            ErrorCode::MissingToken => "Authentication token is required",
            ErrorCode::InvalidToken => "Authentication token is invalid",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::InvalidCredentials => "Invalid credentials",
            ErrorCode::Forbidden => "You do not have permission to perform this action",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::RouteNotFound => "Route not found",
            ErrorCode::MethodNotAllowed => "Method not allowed",
            ErrorCode::Conflict => "Operation conflicts with existing data",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ConfigError => "Server configuration error",
            ErrorCode::InternalError => "An unexpected error occurred",
        }
    }
}

/// Standardized API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Always `true`
    pub error: bool,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ErrorCode,
}

impl ApiError {
    /// Creates a new API error with the default message for `code`.
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Creates a new API error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            code,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // === Convenience constructors for common errors ===

    /// Missing required field error.
    pub fn missing_field(field: &str) -> Self {
        Self::with_message(
            ErrorCode::MissingField,
            format!("Required field '{field}' is missing"),
        )
    }

    /// Invalid field value error.
    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self::with_message(
            ErrorCode::InvalidField,
            format!("Invalid value for '{field}': {reason}"),
        )
    }

    /// Resource not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::with_message(ErrorCode::NotFound, format!("{resource} not found"))
    }

    /// Role check failed.
    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Conflict, message)
    }

    /// Database error (internal details hidden from client).
    pub fn database_error() -> Self {
        Self::new(ErrorCode::DatabaseError)
    }

    /// Internal server error.
    pub fn internal_error() -> Self {
        Self::new(ErrorCode::InternalError)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.default_message(), self.message)
    }
}

impl std::error::Error for ApiError {}

// === Conversions from crate errors ===

impl From<PizzeriaError> for ApiError {
    fn from(err: PizzeriaError) -> Self {
        match err {
            PizzeriaError::Conflict(_) => ApiError::new(ErrorCode::Conflict),
            PizzeriaError::ConfigError(msg) => {
                error!("Configuration error while handling request: {msg}");
                ApiError::new(ErrorCode::ConfigError)
            }
            // Already logged where the driver error was mapped.
            PizzeriaError::DatabaseError(_) => ApiError::database_error(),
            other => {
                error!("Internal error while handling request: {other}");
                ApiError::internal_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_status_mapping() {
        assert_eq!(
            ErrorCode::MissingField.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(ErrorCode::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn api_error_serialization() {
        let err = ApiError::not_found("Product");
        let json: serde_json::Value = serde_json::to_value(&err).unwrap();

        assert_eq!(json["error"], true);
        assert_eq!(json["message"], "Product not found");
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[test]
    fn database_errors_hide_details() {
        let err: ApiError =
            PizzeriaError::DatabaseError("no such table: secret_stuff".to_string()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn conflict_maps_to_409() {
        let err: ApiError = PizzeriaError::Conflict("UNIQUE constraint failed".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
