//! Checker configuration.

use serde::{Deserialize, Serialize};

/// Operations a checker guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudOp {
    /// Read records.
    Read,
    /// Create records.
    Create,
    /// Update records.
    Update,
    /// Delete records.
    Delete,
    /// Publish drafts.
    Publish,
}

/// Action ids used for each operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudActions {
    /// Read action.
    pub read: String,
    /// Create action.
    pub create: String,
    /// Update action.
    pub update: String,
    /// Delete action.
    pub delete: String,
    /// Publish action.
    pub publish: String,
}

impl CrudActions {
    /// Actions named `<prefix><op>`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            read: format!("{prefix}read"),
            create: format!("{prefix}create"),
            update: format!("{prefix}update"),
            delete: format!("{prefix}delete"),
            publish: format!("{prefix}publish"),
        }
    }

    /// Plain `read`, `create`, ... actions.
    pub fn bare() -> Self {
        Self::with_prefix("")
    }

    /// The action for `op`.
    pub fn action(&self, op: CrudOp) -> &str {
        match op {
            CrudOp::Read => &self.read,
            CrudOp::Create => &self.create,
            CrudOp::Update => &self.update,
            CrudOp::Delete => &self.delete,
            CrudOp::Publish => &self.publish,
        }
    }
}

impl Default for CrudActions {
    fn default() -> Self {
        Self::with_prefix("plugin::content-manager.explorer.")
    }
}

/// Configuration for [`PermissionChecker`](crate::PermissionChecker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Action naming.
    pub actions: CrudActions,
    /// Keys kept in sanitized output regardless of field grants.
    pub always_visible: Vec<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            actions: CrudActions::default(),
            always_visible: vec!["id".to_string()],
        }
    }
}

impl CheckerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the action naming.
    pub fn with_actions(mut self, actions: CrudActions) -> Self {
        self.actions = actions;
        self
    }

    /// Add a key kept in sanitized output.
    pub fn with_always_visible(mut self, key: impl Into<String>) -> Self {
        self.always_visible.push(key.into());
        self
    }

    /// Whether `key` is always kept in output.
    pub fn is_always_visible(&self, key: &str) -> bool {
        self.always_visible.iter().any(|k| k == key)
    }
}
