//! Error types for the complaint desk infrastructure

use thiserror::Error;

use crate::domain::TransitionError;

/// Errors that can occur in stores and services
#[derive(Error, Debug)]
pub enum DeskError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Entity not found
    #[error("{entity_type} not found: {entity_id}")]
    NotFound {
        entity_type: &'static str,
        entity_id: String,
    },

    /// Complaint lifecycle violation
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Request data failed validation
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with existing state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Payment gateway failure
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// Payment signature did not match
    #[error("payment signature mismatch")]
    SignatureMismatch,

    /// Upload could not be stored
    #[error("upload error: {0}")]
    Upload(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeskError {
    pub fn not_found(entity_type: &'static str, entity_id: impl ToString) -> Self {
        DeskError::NotFound {
            entity_type,
            entity_id: entity_id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DeskError::Validation(message.into())
    }
}

impl From<std::io::Error> for DeskError {
    fn from(err: std::io::Error) -> Self {
        DeskError::Upload(err.to_string())
    }
}

/// Result type for desk operations
pub type Result<T> = std::result::Result<T, DeskError>;
