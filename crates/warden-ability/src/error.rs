//! Why rules are left out of an ability.
//!
//! Compilation never fails as a whole. A rule that cannot be compiled safely
//! is dropped and reported with one of these reasons.

use serde::Serialize;
use thiserror::Error;

/// Reason a permission rule was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    /// The action is not registered.
    #[error("unknown action {action}")]
    UnknownAction {
        /// Action name.
        action: String,
    },

    /// The action does not apply to the rule's subject.
    #[error("action {action} does not apply to subject {subject}")]
    SubjectNotApplicable {
        /// Action name.
        action: String,
        /// Subject named by the rule.
        subject: String,
    },

    /// The condition tree is malformed.
    #[error("invalid condition: {message}")]
    InvalidCondition {
        /// Parse error.
        message: String,
    },

    /// The condition tree names an unregistered condition.
    #[error("unknown condition {condition}")]
    UnknownCondition {
        /// Condition name.
        condition: String,
    },

    /// A condition handler failed while binding to the actor.
    #[error("condition failed: {message}")]
    ConditionFailed {
        /// Handler error.
        message: String,
    },
}

impl DropReason {
    /// Short machine-readable code, used as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            DropReason::UnknownAction { .. } => "unknown_action",
            DropReason::SubjectNotApplicable { .. } => "subject_not_applicable",
            DropReason::InvalidCondition { .. } => "invalid_condition",
            DropReason::UnknownCondition { .. } => "unknown_condition",
            DropReason::ConditionFailed { .. } => "condition_failed",
        }
    }
}

/// A rule that did not make it into the ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRule {
    /// Position of the rule in its input list.
    pub index: usize,
    /// Canonical action of the rule.
    pub action: String,
    /// Subject of the rule.
    pub subject: Option<String>,
    /// Why it was dropped.
    pub reason: DropReason,
}
