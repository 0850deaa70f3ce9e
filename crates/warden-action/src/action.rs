//! Action descriptors.
//!
//! An action descriptor is what a plugin registers at boot: the action's uid,
//! where it shows up in the permission matrix, which subjects it applies to,
//! and which rule properties (fields, locales, ...) constrain it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ActionError, ActionResult};

/// Plugin name whose actions live in the `admin::` namespace.
pub const ADMIN_PLUGIN: &str = "admin";

/// Property name for field-level restrictions.
pub const FIELDS_PROPERTY: &str = "fields";

/// Property name for locale restrictions.
pub const LOCALES_PROPERTY: &str = "locales";

/// Section of the permission matrix an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    /// Plugin-level actions.
    Plugins,
    /// Settings actions.
    Settings,
    /// Per content type actions.
    ContentTypes,
    /// Actions not shown in the admin matrix.
    Internal,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Plugins => "plugins",
            Section::Settings => "settings",
            Section::ContentTypes => "contentTypes",
            Section::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Optional behaviour flags of an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOptions {
    /// Rule properties that constrain this action.
    #[serde(default)]
    pub apply_to_properties: Vec<String>,
}

/// A registrable action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    /// Action uid, unique within its plugin.
    pub uid: String,
    /// Matrix section.
    pub section: Section,
    /// Human-readable name.
    pub display_name: String,
    /// Owning plugin, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    /// Matrix category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Matrix sub-category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    /// Subjects this action applies to. Empty means any subject.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    /// Behaviour flags.
    #[serde(default)]
    pub options: ActionOptions,
}

impl ActionDescriptor {
    /// Create a descriptor.
    pub fn new(uid: impl Into<String>, section: Section, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            section,
            display_name: display_name.into(),
            plugin_name: None,
            category: None,
            sub_category: None,
            subjects: Vec::new(),
            options: ActionOptions::default(),
        }
    }

    /// Set the owning plugin.
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin_name = Some(plugin.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the sub-category.
    pub fn with_sub_category(mut self, sub_category: impl Into<String>) -> Self {
        self.sub_category = Some(sub_category.into());
        self
    }

    /// Set the subjects.
    pub fn with_subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    /// Add a constrainable property.
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        let property = property.into();
        if !self.options.apply_to_properties.contains(&property) {
            self.options.apply_to_properties.push(property);
        }
        self
    }

    /// Canonical id: `admin::<uid>`, `plugin::<plugin>.<uid>` or the bare uid.
    pub fn action_id(&self) -> String {
        match self.plugin_name.as_deref() {
            Some(ADMIN_PLUGIN) => format!("admin::{}", self.uid),
            Some(plugin) => format!("plugin::{}.{}", plugin, self.uid),
            None => self.uid.clone(),
        }
    }

    /// Whether the action lists subjects.
    pub fn has_subjects(&self) -> bool {
        !self.subjects.is_empty()
    }

    /// Whether the action may be granted on `subject`.
    pub fn applies_to_subject(&self, subject: &str) -> bool {
        !self.has_subjects() || self.subjects.iter().any(|s| s == subject)
    }

    /// Whether rules for this action may be constrained by `property`.
    pub fn applies_to_property(&self, property: &str) -> bool {
        self.options
            .apply_to_properties
            .iter()
            .any(|p| p == property)
    }

    /// Check the descriptor is well-formed.
    pub fn validate(&self) -> ActionResult<()> {
        if !is_identifier(&self.uid) {
            return Err(ActionError::InvalidDescriptor(format!(
                "uid '{}' must match [A-Za-z0-9_.-]+",
                self.uid
            )));
        }
        if let Some(plugin) = &self.plugin_name {
            if !is_identifier(plugin) {
                return Err(ActionError::InvalidDescriptor(format!(
                    "plugin name '{plugin}' must match [A-Za-z0-9_.-]+"
                )));
            }
        }
        if self.display_name.trim().is_empty() {
            return Err(ActionError::InvalidDescriptor(format!(
                "action '{}' has no display name",
                self.uid
            )));
        }
        if self.has_subjects() && self.section != Section::ContentTypes {
            return Err(ActionError::InvalidDescriptor(format!(
                "action '{}' lists subjects but belongs to section {}",
                self.uid, self.section
            )));
        }
        Ok(())
    }
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
