//! Model schemas.
//!
//! The checker only needs to know which attributes of a model point
//! elsewhere: relations to other models, components, and dynamic zones.
//! Everything else is a scalar.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CheckerError, CheckerResult};

/// Key identifying the component of a dynamic zone entry.
pub const COMPONENT_KEY: &str = "__component";

/// Kind of a model attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attribute {
    /// A relation to records of another model.
    Relation {
        /// Target model uid.
        target: String,
    },
    /// An embedded component.
    Component {
        /// Component uid.
        component: String,
        /// Whether the attribute holds a list.
        #[serde(default)]
        repeatable: bool,
    },
    /// A list of components of mixed types.
    Dynamiczone {
        /// Allowed component uids.
        components: Vec<String>,
    },
    /// Any other attribute.
    #[serde(other)]
    Scalar,
}

impl Attribute {
    /// A relation to `target`.
    pub fn relation(target: impl Into<String>) -> Self {
        Attribute::Relation {
            target: target.into(),
        }
    }

    /// A single component.
    pub fn component(component: impl Into<String>) -> Self {
        Attribute::Component {
            component: component.into(),
            repeatable: false,
        }
    }

    /// A repeatable component.
    pub fn repeatable(component: impl Into<String>) -> Self {
        Attribute::Component {
            component: component.into(),
            repeatable: true,
        }
    }

    /// A dynamic zone.
    pub fn dynamic_zone<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Attribute::Dynamiczone {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the attribute can be populated.
    pub fn is_populatable(&self) -> bool {
        !matches!(self, Attribute::Scalar)
    }
}

/// Schema of one model or component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    /// Model uid, used as the subject name.
    pub uid: String,
    /// Attributes by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl ModelSchema {
    /// A schema with no attributes.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Add scalar attributes.
    pub fn with_scalars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.attributes.insert(name.into(), Attribute::Scalar);
        }
        self
    }

    /// Look up an attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// Models and components known to the application.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    models: HashMap<String, ModelSchema>,
    components: HashMap<String, ModelSchema>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model.
    pub fn register_model(&mut self, model: ModelSchema) -> CheckerResult<()> {
        insert_unique(&mut self.models, model)
    }

    /// Register a component.
    pub fn register_component(&mut self, component: ModelSchema) -> CheckerResult<()> {
        insert_unique(&mut self.components, component)
    }

    /// Look up a model.
    pub fn model(&self, uid: &str) -> Option<&ModelSchema> {
        self.models.get(uid)
    }

    /// Look up a component.
    pub fn component(&self, uid: &str) -> Option<&ModelSchema> {
        self.components.get(uid)
    }

    /// Registered model uids, sorted.
    pub fn model_uids(&self) -> Vec<&str> {
        let mut uids: Vec<&str> = self.models.keys().map(String::as_str).collect();
        uids.sort_unstable();
        uids
    }
}

fn insert_unique(map: &mut HashMap<String, ModelSchema>, schema: ModelSchema) -> CheckerResult<()> {
    if map.contains_key(&schema.uid) {
        return Err(CheckerError::DuplicateSchema(schema.uid));
    }
    map.insert(schema.uid.clone(), schema);
    Ok(())
}
