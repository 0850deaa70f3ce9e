//! Warden Core - shared types for the authorization engine
//!
//! This crate provides the pieces every other Warden crate builds on:
//!
//! - [`RuntimeContext`]: the actor and request fields handed to conditions
//! - [`Filter`]: the allow-listed structural filter language shared by
//!   condition handlers, the ability compiler and the query layer
//! - [`EngineConfig`]: engine configuration
//!
//! # Filters
//!
//! Filters use a fixed operator vocabulary (see [`ALLOWED_OPERATORS`]).
//! They can be parsed from JSON, serialized back for a query engine,
//! negated, and evaluated against an in-memory record:
//!
//! ```
//! use serde_json::json;
//! use warden_core::Filter;
//!
//! let mine = Filter::from_json(&json!({ "createdBy": 1 })).unwrap();
//! let record = json!({ "id": 5, "createdBy": { "id": 9 } });
//!
//! assert!(!mine.matches(&record));
//! assert!(mine.negate().unwrap().matches(&record));
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod matcher;

// Re-export main types at crate root
pub use config::{EngineConfig, RegistrationMode, UnknownActionPolicy};
pub use context::{Actor, EntityId, Role, RuntimeContext};
pub use error::{FilterError, FilterResult};
pub use filter::{ALLOWED_OPERATORS, FieldOp, Filter, is_allowed_operator};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::context::{Actor, EntityId, Role, RuntimeContext};
    pub use crate::error::{FilterError, FilterResult};
    pub use crate::filter::{FieldOp, Filter};
}
