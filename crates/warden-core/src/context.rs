//! Runtime context passed to condition handlers.
//!
//! The context is built by the caller once per request. It carries the
//! authenticated actor and any request-scoped fields a condition may need;
//! conditions never fetch data themselves.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a persisted entity (actor, role, record).
///
/// Storage layers use either integer or string keys, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Integer key.
    Int(i64),
    /// String key (UUID, slug, document id).
    Str(String),
}

impl EntityId {
    /// JSON form used inside filters.
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Int(id) => Value::from(*id),
            EntityId::Str(id) => Value::from(id.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{}", id),
            EntityId::Str(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Int(id)
    }
}

impl From<i32> for EntityId {
    fn from(id: i32) -> Self {
        EntityId::Int(i64::from(id))
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        EntityId::Int(i64::from(id))
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Str(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId::Str(id)
    }
}

/// A role held by an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier.
    pub id: EntityId,
    /// Optional stable code (e.g. `editor`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Role {
    /// Create a role with the given id.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            code: None,
        }
    }

    /// Set the role code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// The authenticated actor performing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor identifier.
    pub id: EntityId,
    /// Roles held by the actor.
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Actor {
    /// Create an actor without roles.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    /// Add a role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Ids of all roles held by the actor.
    pub fn role_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.roles.iter().map(|r| &r.id)
    }

    /// Whether the actor holds the role.
    pub fn has_role(&self, id: &EntityId) -> bool {
        self.roles.iter().any(|r| &r.id == id)
    }
}

/// Context handed to condition handlers while an ability is bound.
///
/// Serialized as `{"actor": {...}, ...requestScopedFields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeContext {
    /// The acting user.
    pub actor: Actor,
    /// Request-scoped fields (params, locale, tenant, ...).
    #[serde(flatten)]
    pub request: Map<String, Value>,
}

impl RuntimeContext {
    /// Create a context for an actor with no request fields.
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            request: Map::new(),
        }
    }

    /// Attach a request-scoped field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.insert(key.into(), value.into());
        self
    }

    /// The acting user.
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Look up a request-scoped field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.request.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_id_forms() {
        let int: EntityId = serde_json::from_value(json!(7)).unwrap();
        let string: EntityId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(int, EntityId::Int(7));
        assert_eq!(string, EntityId::from("abc"));
        assert_eq!(int.to_value(), json!(7));
        assert_eq!(string.to_string(), "abc");
    }

    #[test]
    fn test_context_from_json() {
        let ctx: RuntimeContext = serde_json::from_value(json!({
            "actor": { "id": 1, "roles": [{ "id": 3, "code": "editor" }] },
            "locale": "fr",
        }))
        .unwrap();

        assert_eq!(ctx.actor().id, EntityId::Int(1));
        assert!(ctx.actor().has_role(&EntityId::Int(3)));
        assert_eq!(ctx.field("locale"), Some(&json!("fr")));
    }

    #[test]
    fn test_builder() {
        let ctx = RuntimeContext::new(Actor::new(1).with_role(Role::new(2)))
            .with_field("tenant", "acme");
        assert_eq!(ctx.actor().role_ids().count(), 1);
        assert_eq!(ctx.field("tenant"), Some(&json!("acme")));
    }
}
