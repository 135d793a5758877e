//! Shared Error Types
//!
//! Errors that both the domain rules in `shared` and the server can produce.
//!
//! # Error Categories
//!
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `ValidationError` - a request field failed validation
//! - `LifecycleError` - an operation is not allowed in the current session state
//! - `PermissionError` - the caller is not allowed to perform the operation
//!
//! # Usage
//!
//! ```rust
//! use crosslearn::shared::error::SharedError;
//!
//! let error = SharedError::validation("max_students", "Max students must be between 1 and 10");
//! ```
use thiserror::Error;

/// Error type shared between the domain layer and the server
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Serialization error: {message}")]
    SerializationError {
        message: String,
    },

    #[error("{message}")]
    ValidationError {
        field: String,
        message: String,
    },

    /// The session (or record) is in a state that forbids the operation.
    #[error("{message}")]
    LifecycleError {
        message: String,
    },

    #[error("{message}")]
    PermissionError {
        message: String,
    },
}

impl SharedError {
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::LifecycleError {
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::PermissionError {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_displays_message_only() {
        let error = SharedError::validation("rating", "Rating must be between 1 and 5");
        assert_eq!(error.to_string(), "Rating must be between 1 and 5");
        match error {
            SharedError::ValidationError { field, .. } => assert_eq!(field, "rating"),
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_lifecycle_error() {
        let error = SharedError::lifecycle("Session is full");
        assert_eq!(error, SharedError::LifecycleError { message: "Session is full".to_string() });
    }

    #[test]
    fn test_serialization_error_display() {
        let error = SharedError::serialization("Test error");
        let display = format!("{}", error);
        assert!(display.contains("Serialization error"));
        assert!(display.contains("Test error"));
    }

    #[test]
    fn test_from_serde_error() {
        let serde_error = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let shared_error: SharedError = serde_error.into();
        assert!(matches!(shared_error, SharedError::SerializationError { .. }));
    }
}
