//! Error types for the Warden façade.

use thiserror::Error;

use warden_action::ActionError;
use warden_checker::CheckerError;
use warden_condition::ConditionError;

/// Errors raised by a [`RuleStore`](crate::RuleStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("Rule store unavailable: {0}")]
    Unavailable(String),

    /// Stored rules for a role could not be decoded.
    #[error("Invalid rules stored for role {role}: {message}")]
    InvalidRules {
        /// Role id.
        role: String,
        /// Decoder message.
        message: String,
    },
}

/// Result type for rule store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors from the Warden façade.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Action registration failed.
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    /// Condition registration failed.
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// Checker creation failed.
    #[error("Checker error: {0}")]
    Checker(#[from] CheckerError),

    /// Loading or saving rules failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for façade operations.
pub type WardenResult<T> = std::result::Result<T, WardenError>;
