//! Error types for the action registry.

use thiserror::Error;

/// Errors related to action registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// An action with this id is already registered.
    #[error("Action already registered: {0}")]
    Duplicate(String),

    /// The registry no longer accepts registrations.
    #[error("Action registry is frozen, cannot register: {0}")]
    Frozen(String),

    /// The action is not registered.
    #[error("Action not registered: {0}")]
    NotFound(String),

    /// Re-registration was attempted outside override mode.
    #[error("Re-registering {0} requires override mode")]
    OverrideDisabled(String),

    /// The descriptor is malformed.
    #[error("Invalid action descriptor: {0}")]
    InvalidDescriptor(String),
}

/// Result type for action operations.
pub type ActionResult<T> = std::result::Result<T, ActionError>;
