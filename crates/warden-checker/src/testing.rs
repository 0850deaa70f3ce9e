//! Shared fixtures for the checker tests.

use std::sync::Arc;

use warden_ability::{Ability, AbilityCompiler, PermissionRule};
use warden_action::{ActionDescriptor, ActionRegistry, Section};
use warden_condition::{ConditionRegistry, register_builtins};
use warden_core::{Actor, Role, RuntimeContext};

use crate::schema::{Attribute, ModelSchema, SchemaRegistry};

/// Compile `rules` for actor 1 with role 3, using bare CRUD actions.
pub(crate) fn ability(rules: &[PermissionRule]) -> Ability {
    let actions = ActionRegistry::new();
    for uid in ["read", "create", "update", "delete", "publish"] {
        actions
            .register(ActionDescriptor::new(uid, Section::ContentTypes, uid))
            .unwrap();
    }
    let conditions = ConditionRegistry::new();
    register_builtins(&conditions).unwrap();

    let ctx = RuntimeContext::new(Actor::new(1).with_role(Role::new(3)));
    AbilityCompiler::new(Arc::new(actions), Arc::new(conditions)).compile(rules, &ctx)
}

pub(crate) fn schema() -> SchemaRegistry {
    let mut schema = SchemaRegistry::new();
    schema
        .register_model(
            ModelSchema::new("article")
                .with_scalars(["title", "body"])
                .with_attribute("author", Attribute::relation("author"))
                .with_attribute("tags", Attribute::relation("tag"))
                .with_attribute("seo", Attribute::component("shared.seo"))
                .with_attribute(
                    "blocks",
                    Attribute::dynamic_zone(["blocks.text", "blocks.quote"]),
                ),
        )
        .unwrap();
    schema
        .register_model(ModelSchema::new("author").with_scalars(["name", "email"]))
        .unwrap();
    schema
        .register_model(ModelSchema::new("tag").with_scalars(["label"]))
        .unwrap();
    schema
        .register_component(ModelSchema::new("shared.seo").with_scalars(["title", "description"]))
        .unwrap();
    schema
        .register_component(ModelSchema::new("blocks.text").with_scalars(["body"]))
        .unwrap();
    schema
        .register_component(ModelSchema::new("blocks.quote").with_scalars(["quote", "author"]))
        .unwrap();
    schema
}
