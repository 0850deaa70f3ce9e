//! Permission rules as stored per role.
//!
//! ```json
//! {
//!   "action": "plugin::content-manager.explorer.read",
//!   "subject": "article",
//!   "properties": { "fields": ["title", "seo"], "locales": ["en"] },
//!   "condition": { "name": "is-creator" }
//! }
//! ```
//!
//! Unknown keys are ignored. `fields` is also accepted at the top level, and
//! the older `conditions: ["a", "b"]` list means "any of these".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_action::ActionRef;

/// Constrainable properties of a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleProperties {
    /// Granted fields. Absent means every field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Granted locales. Absent means every locale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locales: Option<Vec<String>>,
}

/// One stored permit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// The permitted action.
    pub action: ActionRef,
    /// The subject, or `None` for every subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Constrainable properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<RuleProperties>,
    /// Top-level field list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Condition tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    /// Condition names, any of which must hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}

impl PermissionRule {
    /// A rule granting `action` on every subject.
    pub fn new(action: impl Into<ActionRef>) -> Self {
        Self {
            action: action.into(),
            subject: None,
            properties: None,
            fields: None,
            condition: None,
            conditions: Vec::new(),
        }
    }

    /// Restrict to one subject.
    pub fn on(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Restrict to a set of fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.get_or_insert_with(Default::default).fields =
            Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to a set of locales.
    pub fn with_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.get_or_insert_with(Default::default).locales =
            Some(locales.into_iter().map(Into::into).collect());
        self
    }

    /// Attach a condition tree.
    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Attach a single named condition.
    pub fn when(self, name: &str) -> Self {
        self.with_condition(serde_json::json!({ "name": name }))
    }

    /// The requested field list, merging both accepted locations.
    pub fn requested_fields(&self) -> Option<Vec<&str>> {
        let nested = self.properties.as_ref().and_then(|p| p.fields.as_ref());
        match (nested, self.fields.as_ref()) {
            (None, None) => None,
            (a, b) => Some(
                a.into_iter()
                    .chain(b)
                    .flatten()
                    .map(String::as_str)
                    .collect(),
            ),
        }
    }

    /// The requested locales, if any.
    pub fn locales(&self) -> Option<&[String]> {
        self.properties
            .as_ref()
            .and_then(|p| p.locales.as_deref())
    }

    /// Whether the rule carries any condition.
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some() || !self.conditions.is_empty()
    }
}
