//! Error types for the permission checker.
//!
//! Denials are never errors. These cover caller bugs only.

use thiserror::Error;

/// Errors raised when building a checker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckerError {
    /// The model is not in the schema registry.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// A model or component with this uid is already registered.
    #[error("Schema already registered: {0}")]
    DuplicateSchema(String),
}

/// Result type for checker operations.
pub type CheckerResult<T> = std::result::Result<T, CheckerError>;
