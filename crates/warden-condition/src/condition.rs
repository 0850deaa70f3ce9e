//! Core condition trait and types.
//!
//! A condition is a named predicate over the runtime context. It either
//! decides on its own (`true`/`false`) or returns a structural filter that
//! the record or the query must satisfy.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use warden_core::{Filter, FilterError, FilterResult, RuntimeContext};

use crate::error::ConditionResult;

/// What a condition handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionOutcome {
    /// Immediate allow or deny.
    Bool(bool),
    /// A restriction on records.
    Filter(Filter),
}

impl ConditionOutcome {
    /// Interpret a JSON handler result.
    ///
    /// Accepts a boolean or a filter object using only allow-listed
    /// operators. Anything else is rejected.
    pub fn from_json(value: &Value) -> FilterResult<Self> {
        match value {
            Value::Bool(b) => Ok(ConditionOutcome::Bool(*b)),
            Value::Object(_) => Filter::from_json(value).map(ConditionOutcome::Filter),
            other => Err(FilterError::Invalid(format!(
                "condition must return a boolean or an object, found {other}"
            ))),
        }
    }

    /// The outcome as a filter: `true` matches everything, `false` nothing.
    pub fn into_filter(self) -> Filter {
        match self {
            ConditionOutcome::Bool(true) => Filter::all(),
            ConditionOutcome::Bool(false) => Filter::nothing(),
            ConditionOutcome::Filter(filter) => filter,
        }
    }
}

impl From<bool> for ConditionOutcome {
    fn from(value: bool) -> Self {
        ConditionOutcome::Bool(value)
    }
}

impl From<Filter> for ConditionOutcome {
    fn from(filter: Filter) -> Self {
        ConditionOutcome::Filter(filter)
    }
}

/// A registrable condition.
///
/// Handlers must be pure functions of the context: any data they need has
/// to be loaded onto the [`RuntimeContext`] before the ability is bound.
///
/// # Implementing a Condition
///
/// ```
/// use warden_condition::{Condition, ConditionOutcome, ConditionResult};
/// use warden_core::{Filter, RuntimeContext};
///
/// struct SameLocale;
///
/// impl Condition for SameLocale {
///     fn name(&self) -> &str {
///         "same-locale"
///     }
///
///     fn evaluate(&self, ctx: &RuntimeContext) -> ConditionResult<ConditionOutcome> {
///         Ok(match ctx.field("locale") {
///             Some(locale) => Filter::eq("locale", locale.clone()).into(),
///             None => false.into(),
///         })
///     }
/// }
/// ```
pub trait Condition: Send + Sync {
    /// Condition name, unique within its plugin.
    fn name(&self) -> &str;

    /// Human-readable name.
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Grouping shown in the admin UI.
    fn category(&self) -> Option<&str> {
        None
    }

    /// Owning plugin.
    fn plugin(&self) -> Option<&str> {
        None
    }

    /// Registry id: `admin::<name>`, `plugin::<plugin>.<name>` or the name.
    fn id(&self) -> String {
        match self.plugin() {
            Some("admin") => format!("admin::{}", self.name()),
            Some(plugin) => format!("plugin::{}.{}", plugin, self.name()),
            None => self.name().to_string(),
        }
    }

    /// Run the handler.
    fn evaluate(&self, ctx: &RuntimeContext) -> ConditionResult<ConditionOutcome>;
}

impl fmt::Debug for dyn Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").field("id", &self.id()).finish()
    }
}

type Handler = dyn Fn(&RuntimeContext) -> ConditionResult<ConditionOutcome> + Send + Sync;

/// A condition backed by a closure.
#[derive(Clone)]
pub struct FnCondition {
    name: String,
    display_name: Option<String>,
    category: Option<String>,
    plugin: Option<String>,
    handler: Arc<Handler>,
}

impl FnCondition {
    /// Create a condition from a handler.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&RuntimeContext) -> ConditionResult<ConditionOutcome> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            display_name: None,
            category: None,
            plugin: None,
            handler: Arc::new(handler),
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the owning plugin.
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }
}

impl Condition for FnCondition {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    fn plugin(&self) -> Option<&str> {
        self.plugin.as_deref()
    }

    fn evaluate(&self, ctx: &RuntimeContext) -> ConditionResult<ConditionOutcome> {
        (self.handler)(ctx)
    }
}

impl fmt::Debug for FnCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCondition")
            .field("id", &self.id())
            .field("category", &self.category)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_core::Actor;

    #[test]
    fn test_outcome_from_json() {
        assert_eq!(
            ConditionOutcome::from_json(&json!(true)).unwrap(),
            ConditionOutcome::Bool(true)
        );
        assert_eq!(
            ConditionOutcome::from_json(&json!({ "createdBy": 1 })).unwrap(),
            ConditionOutcome::Filter(Filter::eq("createdBy", 1))
        );
        assert!(ConditionOutcome::from_json(&json!("yes")).is_err());
        assert!(ConditionOutcome::from_json(&json!({ "$where": "1 == 1" })).is_err());
    }

    #[test]
    fn test_into_filter() {
        assert!(ConditionOutcome::Bool(true).into_filter().is_all());
        assert!(ConditionOutcome::Bool(false).into_filter().is_nothing());
    }

    #[test]
    fn test_fn_condition_ids() {
        let cond = FnCondition::new("is-owner", |_| Ok(true.into()));
        assert_eq!(cond.id(), "is-owner");
        assert_eq!(cond.display_name(), "is-owner");

        let admin = cond.clone().with_plugin("admin").with_display_name("Is owner");
        assert_eq!(admin.id(), "admin::is-owner");
        assert_eq!(admin.display_name(), "Is owner");

        let plugin = cond.with_plugin("reviews");
        assert_eq!(plugin.id(), "plugin::reviews.is-owner");
    }

    #[test]
    fn test_fn_condition_evaluate() {
        let cond = FnCondition::new("is-tenant", |ctx| {
            let tenant = ctx.field("tenant").cloned().unwrap_or(Value::Null);
            Ok(ConditionOutcome::from_json(&json!({ "tenant": tenant }))?)
        });

        let ctx = RuntimeContext::new(Actor::new(1)).with_field("tenant", "acme");
        assert_eq!(
            cond.evaluate(&ctx).unwrap(),
            ConditionOutcome::Filter(Filter::eq("tenant", "acme"))
        );
    }
}
