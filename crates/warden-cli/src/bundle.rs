//! Policy bundle files.
//!
//! A bundle describes a whole deployment in one file:
//!
//! ```toml
//! [[actions]]
//! uid = "read"
//! section = "contentTypes"
//! displayName = "Read"
//!
//! [[models]]
//! uid = "article"
//! attributes = { title = { type = "string" }, author = { type = "relation", target = "author" } }
//!
//! [[roles.editor]]
//! action = "read"
//! subject = "article"
//! fields = ["title"]
//! ```
//!
//! Files ending in `.toml` are read as TOML, everything else as JSON.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use warden::warden_action::ActionDescriptor;
use warden::{RegistryContext, Warden};
use warden_ability::PermissionRule;
use warden_checker::{ModelSchema, SchemaRegistry};
use warden_core::{Actor, EngineConfig, EntityId, Role, RuntimeContext};

/// Actions, schemas and role rules of one deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyBundle {
    /// Actions to register.
    #[serde(default)]
    pub actions: Vec<ActionDescriptor>,
    /// Content models.
    #[serde(default)]
    pub models: Vec<ModelSchema>,
    /// Components used by the models.
    #[serde(default)]
    pub components: Vec<ModelSchema>,
    /// Permission rules per role name.
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<PermissionRule>>,
}

impl PolicyBundle {
    /// Read a bundle file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bundle {}", path.display()))?;
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        Self::parse(&text, is_toml).with_context(|| format!("Invalid bundle {}", path.display()))
    }

    /// Parse bundle text.
    pub fn parse(text: &str, is_toml: bool) -> Result<Self> {
        if is_toml {
            Ok(toml::from_str(text)?)
        } else {
            Ok(serde_json::from_str(text)?)
        }
    }

    /// Register the bundle's actions with the built-in conditions.
    pub fn context(&self, config: EngineConfig) -> Result<RegistryContext> {
        Warden::builder()
            .with_config(config)
            .with_actions(self.actions.iter().cloned())
            .build()
            .context("Failed to register bundle actions")
    }

    /// Schema registry of the bundle's models and components.
    pub fn schema(&self) -> Result<SchemaRegistry> {
        let mut schema = SchemaRegistry::new();
        for model in &self.models {
            schema.register_model(model.clone())?;
        }
        for component in &self.components {
            schema.register_component(component.clone())?;
        }
        Ok(schema)
    }

    /// Rules of the named role.
    pub fn role(&self, name: &str) -> Result<&[PermissionRule]> {
        self.roles
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("Unknown role: {name}"))
    }

    /// Rules of several roles, concatenated.
    pub fn rules_for(&self, roles: &[String]) -> Result<Vec<PermissionRule>> {
        let mut rules = Vec::new();
        for role in roles {
            rules.extend_from_slice(self.role(role)?);
        }
        Ok(rules)
    }
}

/// Runtime context for an actor holding `roles`.
///
/// Numeric actor ids are passed as integers so they compare equal to
/// integer `createdBy` ids in records.
pub fn actor_context(actor_id: &str, roles: &[String]) -> RuntimeContext {
    let id = match actor_id.parse::<i64>() {
        Ok(id) => EntityId::Int(id),
        Err(_) => EntityId::from(actor_id),
    };
    let actor = roles.iter().fold(Actor::new(id), |actor, role| {
        actor.with_role(Role::new(role.as_str()).with_code(role.as_str()))
    });
    RuntimeContext::new(actor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"
[[actions]]
uid = "read"
section = "contentTypes"
displayName = "Read"

[[models]]
uid = "article"
attributes = { title = { type = "string" }, body = { type = "text" } }

[[roles.editor]]
action = "read"
subject = "article"
fields = ["title"]

[[roles.author]]
action = "read"
subject = "article"
condition = { name = "is-creator" }
"#;

    #[test]
    fn test_parse_toml_bundle() {
        let bundle = PolicyBundle::parse(BUNDLE, true).unwrap();
        assert_eq!(bundle.actions.len(), 1);
        assert_eq!(bundle.models.len(), 1);
        assert_eq!(bundle.role("editor").unwrap().len(), 1);
        assert!(bundle.role("ghost").is_err());

        let rules = bundle
            .rules_for(&["editor".to_string(), "author".to_string()])
            .unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules[1].is_conditional());
    }

    #[test]
    fn test_parse_json_bundle() {
        let bundle = PolicyBundle::parse(
            r#"{ "actions": [], "roles": { "admin": [{ "action": "delete", "subject": null }] } }"#,
            false,
        )
        .unwrap();
        assert_eq!(bundle.role("admin").unwrap()[0].subject, None);
    }

    #[test]
    fn test_bundle_context_and_schema() {
        let bundle = PolicyBundle::parse(BUNDLE, true).unwrap();
        let context = bundle.context(EngineConfig::default()).unwrap();
        assert!(context.actions().contains("read"));
        assert!(bundle.schema().unwrap().model("article").is_some());
    }

    #[test]
    fn test_actor_context() {
        let ctx = actor_context("1", &["editor".to_string()]);
        assert_eq!(ctx.actor().id, EntityId::Int(1));
        assert!(ctx.actor().has_role(&EntityId::from("editor")));
        assert_eq!(actor_context("abc", &[]).actor().id, EntityId::from("abc"));
    }
}
