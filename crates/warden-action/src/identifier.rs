//! Action references and parametrized action identifiers.
//!
//! A rule may name an action either as a plain string or as a name plus a
//! parameter bag. Parametrized actions are folded into one opaque string,
//! `name?key=value&...`, with keys sorted at every nesting level so equal
//! parameter sets always produce equal identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An action together with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametrizedAction {
    /// Registered action id.
    pub name: String,
    /// Parameter bag.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ParametrizedAction {
    /// Create a parametrized action without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Canonical identifier.
    pub fn identifier(&self) -> String {
        build_action_identifier(&self.name, &self.params)
    }
}

/// How a permission rule names its action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionRef {
    /// A plain action id.
    Plain(String),
    /// An action id with parameters.
    Parametrized(ParametrizedAction),
}

impl ActionRef {
    /// The registered action id, without parameters.
    pub fn name(&self) -> &str {
        match self {
            ActionRef::Plain(name) => name,
            ActionRef::Parametrized(action) => &action.name,
        }
    }

    /// The comparison key used inside an ability.
    pub fn canonical(&self) -> String {
        match self {
            ActionRef::Plain(name) => name.clone(),
            ActionRef::Parametrized(action) => action.identifier(),
        }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for ActionRef {
    fn from(name: &str) -> Self {
        ActionRef::Plain(name.to_string())
    }
}

impl From<String> for ActionRef {
    fn from(name: String) -> Self {
        ActionRef::Plain(name)
    }
}

impl From<ParametrizedAction> for ActionRef {
    fn from(action: ParametrizedAction) -> Self {
        ActionRef::Parametrized(action)
    }
}

/// Build the canonical identifier for `name` with `params`.
///
/// Parameters are encoded as a query string: nested objects as `a[b]=c`,
/// arrays as `a[0]=x`, `null` as an empty value. Object keys are sorted at
/// every level. Without parameters the name is returned unchanged.
pub fn build_action_identifier(name: &str, params: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    encode_object(None, params, &mut pairs);
    if pairs.is_empty() {
        return name.to_string();
    }

    let query = pairs
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{name}?{query}")
}

fn encode_object(prefix: Option<&str>, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        let full = match prefix {
            Some(prefix) => format!("{prefix}[{key}]"),
            None => key.clone(),
        };
        encode_value(full, &map[key.as_str()], out);
    }
}

fn encode_value(key: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => encode_object(Some(&key), map, out),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                encode_value(format!("{key}[{index}]"), item, out);
            }
        }
        Value::String(s) => out.push((key, s.clone())),
        Value::Null => out.push((key, String::new())),
        other => out.push((key, other.to_string())),
    }
}

fn encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}
