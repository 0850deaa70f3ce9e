//! Configuration types for the Warden engine.
//!
//! This module provides configuration structures for registry behaviour and
//! ability compilation.

use serde::{Deserialize, Serialize};

/// What the compiler does with a rule whose action is not registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownActionPolicy {
    /// Drop the rule and log a warning.
    #[default]
    Drop,
    /// Keep the rule as if the action were registered.
    Allow,
}

/// How registries treat a second registration of the same identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMode {
    /// Duplicates are an error.
    #[default]
    Strict,
    /// Duplicates replace the previous entry. Intended for development
    /// reloads only.
    Override,
}

/// Configuration for the Warden engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Handling of rules that name an unregistered action.
    pub unknown_actions: UnknownActionPolicy,

    /// Drop rules whose subject is not listed by the action's descriptor.
    ///
    /// Actions that declare no subjects accept any subject.
    pub enforce_action_subjects: bool,

    /// Duplicate handling for the action and condition registries.
    pub registration: RegistrationMode,

    /// Cache prepared rules per role.
    pub cache_prepared_rules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unknown_actions: UnknownActionPolicy::Drop,
            enforce_action_subjects: true,
            registration: RegistrationMode::Strict,
            cache_prepared_rules: true,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unknown-action policy.
    pub fn with_unknown_actions(mut self, policy: UnknownActionPolicy) -> Self {
        self.unknown_actions = policy;
        self
    }

    /// Enable or disable subject enforcement.
    pub fn with_subject_enforcement(mut self, enabled: bool) -> Self {
        self.enforce_action_subjects = enabled;
        self
    }

    /// Set the registration mode.
    pub fn with_registration(mut self, mode: RegistrationMode) -> Self {
        self.registration = mode;
        self
    }

    /// Enable or disable the prepared-rule cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_prepared_rules = enabled;
        self
    }

    /// Configuration for production use.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Configuration for development reloads.
    ///
    /// Registrations may be replaced and caching is off so edits to rules
    /// show up immediately.
    pub fn development() -> Self {
        Self {
            unknown_actions: UnknownActionPolicy::Drop,
            enforce_action_subjects: true,
            registration: RegistrationMode::Override,
            cache_prepared_rules: false,
        }
    }
}
