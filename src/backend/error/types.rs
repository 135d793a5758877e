/**
 * Backend Error Types
 *
 * This module defines error types specific to the backend server.
 * These errors are returned from HTTP handlers and converted to JSON responses.
 *
 * # Error Categories
 *
 * ## Handler Errors
 *
 * Request-level failures that carry their own status code:
 * - Missing or invalid credentials (401)
 * - Role or ownership checks (403)
 * - Unknown records (404)
 * - Database not configured (503)
 *
 * ## Domain Errors
 *
 * `SharedError` values raised by the lifecycle and classroom rules. Validation
 * and lifecycle violations map to 400, permission failures to 403.
 *
 * ## Infrastructure Errors
 *
 * Database and LLM failures. Database details are logged, never returned.
 */

use thiserror::Error;
use axum::http::StatusCode;
use crate::backend::ai::AiError;
use crate::shared::SharedError;

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use crosslearn::backend::error::BackendError;
///
/// let err = BackendError::not_found("Peer session not found");
/// let err = BackendError::forbidden("Only the teacher can end this session");
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error with an explicit status code
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Application state error (e.g. a missing service)
    #[error("State error: {message}")]
    StateError {
        message: String,
    },

    /// Database error from sqlx
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Shared error (from shared module)
    ///
    /// Wraps validation, lifecycle and permission errors raised by the
    /// domain rules in `shared`.
    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// LLM provider error that could not be degraded to a placeholder
    #[error("AI error: {0}")]
    AiError(#[from] AiError),
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    /// Create a new state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::StateError {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::NOT_FOUND, message)
    }

    /// Returned by every database-backed route when `DATABASE_URL` is unset.
    pub fn database_unavailable() -> Self {
        Self::handler(StatusCode::SERVICE_UNAVAILABLE, "Database not configured")
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `HandlerError` - Uses the status code from the error
    /// - `StateError` - 500 Internal Server Error
    /// - `DatabaseError` - 404 for missing rows, 400 for unique violations, otherwise 500
    /// - `SharedError` - 400 for validation/lifecycle, 403 for permission, 500 for serialization
    /// - `SerializationError` - 500 Internal Server Error
    /// - `AiError` - 502 Bad Gateway
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::StateError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DatabaseError(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            Self::DatabaseError(err) if is_unique_violation(err) => StatusCode::BAD_REQUEST,
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SharedError(err) => match err {
                SharedError::SerializationError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                SharedError::ValidationError { .. } => StatusCode::BAD_REQUEST,
                SharedError::LifecycleError { .. } => StatusCode::BAD_REQUEST,
                SharedError::PermissionError { .. } => StatusCode::FORBIDDEN,
            },
            Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AiError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Get the error message shown to clients
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            Self::StateError { message, .. } => message.clone(),
            Self::DatabaseError(sqlx::Error::RowNotFound) => "Not found".to_string(),
            Self::DatabaseError(err) if is_unique_violation(err) => "Record already exists".to_string(),
            Self::DatabaseError(_) => "Internal database error".to_string(),
            Self::SharedError(err) => err.to_string(),
            Self::SerializationError(err) => err.to_string(),
            Self::AiError(err) => format!("AI generation error: {}", err),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error() {
        let error = BackendError::handler(StatusCode::BAD_REQUEST, "Invalid request");
        match error {
            BackendError::HandlerError { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Invalid request");
            }
            _ => panic!("Expected HandlerError"),
        }
    }

    #[test]
    fn test_state_error() {
        let error = BackendError::state("Lock failed");
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message(), "Lock failed");
    }

    #[test]
    fn test_shortcut_constructors() {
        assert_eq!(BackendError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(BackendError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(BackendError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(BackendError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(BackendError::database_unavailable().status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_shared_error_mapping() {
        let lifecycle: BackendError = SharedError::lifecycle("Session is full").into();
        assert_eq!(lifecycle.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(lifecycle.message(), "Session is full");

        let permission: BackendError = SharedError::permission("Only the teacher can start this session").into();
        assert_eq!(permission.status_code(), StatusCode::FORBIDDEN);

        let validation: BackendError = SharedError::validation("rating", "Rating must be between 1 and 5").into();
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_database_error_hides_details() {
        let missing: BackendError = sqlx::Error::RowNotFound.into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let pool: BackendError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(pool.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(pool.message(), "Internal database error");
    }

    #[test]
    fn test_ai_error_is_bad_gateway() {
        let error: BackendError = AiError::NotConfigured.into();
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert!(error.message().starts_with("AI generation error"));
    }
}
