//! Condition registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{info, warn};

use warden_core::RegistrationMode;
use warden_observe::{AuthzEvent, EventDispatcher};

use crate::condition::Condition;
use crate::error::{ConditionError, ConditionResult};
use crate::tree::{ConditionTree, ResolvedCondition};

/// The set of named conditions rules may reference.
///
/// # Example
///
/// ```
/// use warden_condition::{ConditionRegistry, ConditionTree, FnCondition};
///
/// let registry = ConditionRegistry::new();
/// registry
///     .register(FnCondition::new("always", |_| Ok(true.into())))
///     .unwrap();
/// registry.freeze();
///
/// assert!(registry.resolve(&ConditionTree::leaf("always")).is_ok());
/// assert!(registry.resolve(&ConditionTree::leaf("missing")).is_err());
/// ```
pub struct ConditionRegistry {
    conditions: DashMap<String, Arc<dyn Condition>>,
    mode: RegistrationMode,
    frozen: AtomicBool,
    events: Option<Arc<EventDispatcher>>,
}

impl ConditionRegistry {
    /// Create an empty registry in strict mode.
    pub fn new() -> Self {
        Self::with_mode(RegistrationMode::Strict)
    }

    /// Create an empty registry with the given duplicate handling.
    pub fn with_mode(mode: RegistrationMode) -> Self {
        Self {
            conditions: DashMap::new(),
            mode,
            frozen: AtomicBool::new(false),
            events: None,
        }
    }

    /// Emit registration events to `events`.
    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Register a condition.
    pub fn register<C: Condition + 'static>(&self, condition: C) -> ConditionResult<()> {
        self.register_arc(Arc::new(condition))
    }

    /// Register a shared condition.
    ///
    /// # Errors
    ///
    /// Fails if the registry is frozen or, in strict mode, if the id is
    /// already taken.
    pub fn register_arc(&self, condition: Arc<dyn Condition>) -> ConditionResult<()> {
        let id = condition.id();
        if self.is_frozen() {
            return Err(ConditionError::Frozen(id));
        }
        if condition.name().is_empty() {
            return Err(ConditionError::InvalidTree(
                "condition name must not be empty".to_string(),
            ));
        }

        match self.conditions.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                if self.mode != RegistrationMode::Override {
                    return Err(ConditionError::Duplicate(id));
                }
                entry.insert(condition);
                warn!(condition = %id, "Condition registration replaced an existing condition");
            }
            Entry::Vacant(entry) => {
                info!(condition = %id, "Condition registered");
                entry.insert(condition);
            }
        }

        if let Some(events) = &self.events {
            events.emit(AuthzEvent::ConditionRegistered { id });
        }
        Ok(())
    }

    /// End the registration phase.
    pub fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::AcqRel) {
            info!(conditions = self.len(), "Condition registry frozen");
        }
    }

    /// Whether the registry has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Get a condition by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Condition>> {
        self.conditions.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Whether a condition is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.conditions.contains_key(id)
    }

    /// Number of registered conditions.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Whether no condition is registered.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// All registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conditions.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Bind every leaf of `tree` to its registered handler.
    ///
    /// Fails with [`ConditionError::UnknownCondition`] on the first name
    /// that is not registered.
    pub fn resolve(&self, tree: &ConditionTree) -> ConditionResult<ResolvedCondition> {
        Ok(match tree {
            ConditionTree::Leaf(name) => ResolvedCondition::Leaf(
                self.get(name)
                    .ok_or_else(|| ConditionError::UnknownCondition(name.clone()))?,
            ),
            ConditionTree::And(children) => ResolvedCondition::And(self.resolve_all(children)?),
            ConditionTree::Or(children) => ResolvedCondition::Or(self.resolve_all(children)?),
            ConditionTree::Not(child) => ResolvedCondition::Not(Box::new(self.resolve(child)?)),
        })
    }

    fn resolve_all(&self, trees: &[ConditionTree]) -> ConditionResult<Vec<ResolvedCondition>> {
        trees.iter().map(|t| self.resolve(t)).collect()
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("conditions", &self.ids())
            .field("mode", &self.mode)
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::FnCondition;
    use serde_json::json;
    use warden_core::{Actor, Filter, RuntimeContext};

    fn always(name: &str) -> FnCondition {
        FnCondition::new(name, |_| Ok(true.into()))
    }

    #[test]
    fn test_register_and_get() {
        let registry = ConditionRegistry::new();
        registry.register(always("a")).unwrap();
        registry.register(always("b").with_plugin("reviews")).unwrap();

        assert!(registry.get("a").is_some());
        assert!(registry.contains("plugin::reviews.b"));
        assert_eq!(registry.ids(), vec!["a", "plugin::reviews.b"]);
    }

    #[test]
    fn test_duplicate_is_error() {
        let registry = ConditionRegistry::new();
        registry.register(always("a")).unwrap();
        assert_eq!(
            registry.register(always("a")).unwrap_err(),
            ConditionError::Duplicate("a".to_string())
        );

        let dev = ConditionRegistry::with_mode(RegistrationMode::Override);
        dev.register(always("a")).unwrap();
        dev.register(always("a")).unwrap();
        assert_eq!(dev.len(), 1);
    }

    #[test]
    fn test_frozen() {
        let registry = ConditionRegistry::new();
        registry.freeze();
        assert!(matches!(
            registry.register(always("a")),
            Err(ConditionError::Frozen(_))
        ));
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = ConditionRegistry::new();
        registry.register(always("a")).unwrap();

        let tree = ConditionTree::parse(&json!({ "$or": [{ "name": "a" }, { "name": "b" }] }))
            .unwrap();
        assert_eq!(
            registry.resolve(&tree).unwrap_err(),
            ConditionError::UnknownCondition("b".to_string())
        );
    }

    #[test]
    fn test_resolve_and_evaluate() {
        let registry = ConditionRegistry::new();
        registry
            .register(FnCondition::new("mine", |ctx| {
                Ok(Filter::eq("createdBy", ctx.actor().id.to_value()).into())
            }))
            .unwrap();

        let resolved = registry.resolve(&ConditionTree::leaf("mine")).unwrap();
        assert_eq!(resolved.ids(), vec!["mine"]);

        let ctx = RuntimeContext::new(Actor::new(4));
        assert_eq!(resolved.evaluate(&ctx).unwrap(), Filter::eq("createdBy", 4));
    }
}
