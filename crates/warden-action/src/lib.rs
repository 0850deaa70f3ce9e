//! Warden Action Registry
//!
//! Actions are the operations an actor may attempt: `read`,
//! `plugin::content-manager.explorer.update`, `admin::users.create`, ...
//! Plugins register them once at boot; the ability compiler then only
//! accepts permission rules whose actions are known.
//!
//! # Identifiers
//!
//! - [`ActionDescriptor::action_id`] computes the registry key from the uid
//!   and owning plugin.
//! - [`build_action_identifier`] folds an action and its parameters into one
//!   canonical string, so `read` with `{locale: "fr"}` and `read` with
//!   `{locale: "en"}` are distinct actions for matching purposes.
//!
//! # Usage
//!
//! ```ignore
//! use warden_action::{ActionDescriptor, ActionRegistry, Section};
//!
//! let registry = ActionRegistry::new();
//! registry.on_will_register(|action| {
//!     if action.section == Section::ContentTypes {
//!         action.options.apply_to_properties.push("locales".into());
//!     }
//! })?;
//! registry.register(
//!     ActionDescriptor::new("explorer.read", Section::ContentTypes, "Read")
//!         .with_plugin("content-manager")
//!         .with_subjects(["article"]),
//! )?;
//! registry.freeze();
//! ```

pub mod action;
pub mod error;
pub mod identifier;
pub mod registry;

// Re-export main types
pub use action::{
    ADMIN_PLUGIN, ActionDescriptor, ActionOptions, FIELDS_PROPERTY, LOCALES_PROPERTY, Section,
};
pub use error::{ActionError, ActionResult};
pub use identifier::{ActionRef, ParametrizedAction, build_action_identifier};
pub use registry::{ActionRegistry, RegisterHook, SharedAction};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::action::{ActionDescriptor, Section};
    pub use crate::error::{ActionError, ActionResult};
    pub use crate::identifier::{ActionRef, ParametrizedAction};
    pub use crate::registry::ActionRegistry;
}
