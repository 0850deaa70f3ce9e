//! Error types for conditions.

use thiserror::Error;
use warden_core::FilterError;

/// Errors related to condition registration, resolution and evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    /// A condition with this id is already registered.
    #[error("Condition already registered: {0}")]
    Duplicate(String),

    /// The registry no longer accepts registrations.
    #[error("Condition registry is frozen, cannot register: {0}")]
    Frozen(String),

    /// A condition tree references a condition that is not registered.
    #[error("Unknown condition: {0}")]
    UnknownCondition(String),

    /// A condition tree is malformed.
    #[error("Invalid condition tree: {0}")]
    InvalidTree(String),

    /// A handler returned something other than a boolean or a filter.
    #[error("Condition {condition} returned an invalid outcome: {message}")]
    InvalidOutcome {
        /// Condition id.
        condition: String,
        /// What was wrong.
        message: String,
    },

    /// A handler failed.
    #[error("Condition {condition} failed: {message}")]
    Evaluation {
        /// Condition id.
        condition: String,
        /// Failure message.
        message: String,
    },

    /// A filter could not be built or negated.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Result type for condition operations.
pub type ConditionResult<T> = std::result::Result<T, ConditionError>;
