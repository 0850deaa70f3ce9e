//! Warden Permission Checker
//!
//! A [`PermissionChecker`] binds a compiled
//! [`Ability`](warden_ability::Ability) to one model for the duration of a
//! request. It offers:
//!
//! - boolean guards: `checker.can().read()`, `checker.cannot().on(&record).update()`
//! - output sanitization that strips unreadable fields, recursively through
//!   relations, components and dynamic zones
//! - query sanitization and a read-query builder that ANDs the permission
//!   filter into the caller's filters
//! - input sanitization for create and update payloads
//!
//! Creating a checker for an unknown model is an error. Everything else
//! reports denial as `false` or as removed keys.

pub mod checker;
pub mod config;
pub mod error;
pub mod query;
pub mod sanitize;
pub mod schema;

#[cfg(test)]
mod testing;

// Re-export main types
pub use checker::{Guard, PermissionChecker};
pub use config::{CheckerConfig, CrudActions, CrudOp};
pub use error::{CheckerError, CheckerResult};
pub use schema::{Attribute, COMPONENT_KEY, ModelSchema, SchemaRegistry};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::checker::PermissionChecker;
    pub use crate::config::{CheckerConfig, CrudActions, CrudOp};
    pub use crate::error::{CheckerError, CheckerResult};
    pub use crate::schema::{Attribute, ModelSchema, SchemaRegistry};
}
