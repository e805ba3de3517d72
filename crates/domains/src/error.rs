//! # AppError
//!
//! Centralized error handling for the sözlük data layer.
//! Adapters translate their own failures into these variants so services
//! never see driver-specific errors.

use thiserror::Error;

/// The primary error type for every port and service operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Resource not found (e.g., Author, Topic, Entry)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty body, self-follow)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Infrastructure failure (e.g., DB down, corrupt row)
    #[error("internal service error: {0}")]
    Internal(String),

    /// Unique constraint violated (e.g., duplicate topic title, memento pair)
    #[error("conflict: {0}")]
    Conflict(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        Self::NotFound(kind.to_string(), id.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// A specialized Result type for sözlük logic.
pub type Result<T> = std::result::Result<T, AppError>;
