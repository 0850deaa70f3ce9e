//! Core error types for Warden.
//!
//! Authorization denials are never errors. The types here describe malformed
//! input: filters that use operators outside the allow-list, filters that do
//! not have the expected shape, and filters that cannot be negated.

use thiserror::Error;

/// Errors produced while building, parsing or transforming a [`Filter`].
///
/// [`Filter`]: crate::filter::Filter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The filter used an operator that is not in the allow-list.
    #[error("Unsupported filter operator: {0}")]
    UnsupportedOperator(String),

    /// The filter is structurally invalid.
    #[error("Invalid filter: {0}")]
    Invalid(String),

    /// The filter cannot be expressed in negated form with allowed operators.
    #[error("Filter on '{path}' cannot be negated: {operator} has no complement")]
    NotNegatable {
        /// Field path the operator applies to.
        path: String,
        /// The operator without a complement.
        operator: String,
    },
}

/// Result type alias for filter operations.
pub type FilterResult<T> = std::result::Result<T, FilterError>;
