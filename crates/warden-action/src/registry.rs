//! Action registry.
//!
//! The registry is populated by plugins during boot and frozen afterwards.
//! Once frozen it only serves reads, so request handlers can share it without
//! coordination.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use warden_core::RegistrationMode;
use warden_observe::{AuthzEvent, EventDispatcher};

use crate::action::{ActionDescriptor, Section};
use crate::error::{ActionError, ActionResult};
use crate::identifier::ActionRef;

/// A shared action descriptor.
pub type SharedAction = Arc<ActionDescriptor>;

/// Hook run on every descriptor before it is stored.
pub type RegisterHook = Arc<dyn Fn(&mut ActionDescriptor) + Send + Sync>;

/// The set of known actions.
///
/// # Example
///
/// ```
/// use warden_action::{ActionDescriptor, ActionRegistry, Section};
///
/// let registry = ActionRegistry::new();
/// registry
///     .register(ActionDescriptor::new("read", Section::ContentTypes, "Read"))
///     .unwrap();
/// registry.freeze();
///
/// assert!(registry.contains("read"));
/// assert!(registry
///     .register(ActionDescriptor::new("create", Section::ContentTypes, "Create"))
///     .is_err());
/// ```
pub struct ActionRegistry {
    /// Map of action id to descriptor.
    actions: DashMap<String, SharedAction>,
    /// Hooks applied to descriptors before registration.
    hooks: RwLock<Vec<RegisterHook>>,
    mode: RegistrationMode,
    frozen: AtomicBool,
    events: Option<Arc<EventDispatcher>>,
}

impl ActionRegistry {
    /// Create an empty registry in strict mode.
    pub fn new() -> Self {
        Self::with_mode(RegistrationMode::Strict)
    }

    /// Create an empty registry with the given duplicate handling.
    pub fn with_mode(mode: RegistrationMode) -> Self {
        Self {
            actions: DashMap::new(),
            hooks: RwLock::new(Vec::new()),
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

    /// Registration mode.
    pub fn mode(&self) -> RegistrationMode {
        self.mode
    }

    /// Register an action.
    ///
    /// Hooks added with [`on_will_register`](Self::on_will_register) run
    /// first. The stored descriptor is returned.
    ///
    /// # Errors
    ///
    /// Fails if the registry is frozen, the descriptor is invalid, or an
    /// action with the same id exists and the registry is in strict mode.
    pub fn register(&self, descriptor: ActionDescriptor) -> ActionResult<SharedAction> {
        if self.is_frozen() {
            return Err(ActionError::Frozen(descriptor.action_id()));
        }

        let shared = Arc::new(self.prepare(descriptor)?);
        let id = shared.action_id();

        let replaced = match self.actions.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                if self.mode != RegistrationMode::Override {
                    return Err(ActionError::Duplicate(id));
                }
                entry.insert(Arc::clone(&shared));
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&shared));
                false
            }
        };

        if replaced {
            warn!(action = %id, "Action registration replaced an existing action");
        } else {
            info!(action = %id, section = %shared.section, "Action registered");
        }
        self.emit(&id);
        Ok(shared)
    }

    /// Register several actions, stopping at the first error.
    pub fn register_many<I>(&self, descriptors: I) -> ActionResult<()>
    where
        I: IntoIterator<Item = ActionDescriptor>,
    {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Replace an already registered action.
    ///
    /// Only available in [`RegistrationMode::Override`], where it is also
    /// allowed after the registry has been frozen (development reload).
    pub fn reregister(&self, descriptor: ActionDescriptor) -> ActionResult<SharedAction> {
        let id = descriptor.action_id();
        if self.mode != RegistrationMode::Override {
            return Err(ActionError::OverrideDisabled(id));
        }

        let shared = Arc::new(self.prepare(descriptor)?);
        let id = shared.action_id();
        match self.actions.get_mut(&id) {
            Some(mut existing) => *existing = Arc::clone(&shared),
            None => return Err(ActionError::NotFound(id)),
        }

        info!(action = %id, "Action re-registered");
        self.emit(&id);
        Ok(shared)
    }

    fn prepare(&self, mut descriptor: ActionDescriptor) -> ActionResult<ActionDescriptor> {
        for hook in self.hooks.read().iter() {
            hook(&mut descriptor);
        }
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn emit(&self, id: &str) {
        if let Some(events) = &self.events {
            events.emit(AuthzEvent::ActionRegistered { id: id.to_string() });
        }
    }

    /// Add a hook run on every descriptor registered from now on.
    ///
    /// Subsystems use this to derive properties onto actions, for example
    /// marking content-type actions as constrainable by locale.
    pub fn on_will_register<F>(&self, hook: F) -> ActionResult<()>
    where
        F: Fn(&mut ActionDescriptor) + Send + Sync + 'static,
    {
        if self.is_frozen() {
            return Err(ActionError::Frozen("<register hook>".to_string()));
        }
        self.hooks.write().push(Arc::new(hook));
        debug!("Action register hook added");
        Ok(())
    }

    /// End the registration phase.
    pub fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::AcqRel) {
            info!(actions = self.len(), "Action registry frozen");
        }
    }

    /// Whether the registry has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Get an action by id.
    pub fn get(&self, id: &str) -> Option<SharedAction> {
        self.actions.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Get the action a rule refers to, ignoring parameters.
    pub fn resolve(&self, action: &ActionRef) -> Option<SharedAction> {
        self.get(action.name())
    }

    /// Whether an action is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no action is registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate over registered actions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = SharedAction> + '_ {
        self.actions.iter().map(|r| Arc::clone(r.value()))
    }

    /// All registered actions sorted by id, optionally limited to a section.
    pub fn get_all(&self, section: Option<Section>) -> Vec<SharedAction> {
        let mut actions: Vec<SharedAction> = self
            .iter()
            .filter(|a| section.is_none_or(|s| a.section == s))
            .collect();
        actions.sort_by_key(|a| a.action_id());
        actions
    }

    /// All registered action ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.actions.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.ids())
            .field("mode", &self.mode)
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::LOCALES_PROPERTY;
    use warden_observe::CollectingSubscriber;

    fn read() -> ActionDescriptor {
        ActionDescriptor::new("read", Section::ContentTypes, "Read")
    }

    #[test]
    fn test_register_and_get() {
        let registry = ActionRegistry::new();
        registry.register(read()).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("read").unwrap().display_name, "Read");
        assert!(registry.get("write").is_none());
    }

    #[test]
    fn test_register_duplicate() {
        let registry = ActionRegistry::new();
        registry.register(read()).unwrap();

        let err = registry.register(read()).unwrap_err();
        assert_eq!(err, ActionError::Duplicate("read".to_string()));
    }

    #[test]
    fn test_override_mode_replaces() {
        let registry = ActionRegistry::with_mode(RegistrationMode::Override);
        registry.register(read()).unwrap();

        let mut renamed = read();
        renamed.display_name = "Read entries".to_string();
        registry.register(renamed).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("read").unwrap().display_name, "Read entries");
    }

    #[test]
    fn test_frozen_rejects_registration() {
        let registry = ActionRegistry::new();
        registry.freeze();

        assert!(matches!(
            registry.register(read()),
            Err(ActionError::Frozen(_))
        ));
        assert!(registry.on_will_register(|_| {}).is_err());
    }

    #[test]
    fn test_reregister() {
        let strict = ActionRegistry::new();
        strict.register(read()).unwrap();
        assert!(matches!(
            strict.reregister(read()),
            Err(ActionError::OverrideDisabled(_))
        ));

        let dev = ActionRegistry::with_mode(RegistrationMode::Override);
        dev.register(read()).unwrap();
        dev.freeze();

        let mut updated = read();
        updated.category = Some("content".to_string());
        dev.reregister(updated).unwrap();
        assert_eq!(dev.get("read").unwrap().category.as_deref(), Some("content"));

        let missing = ActionDescriptor::new("missing", Section::Settings, "Missing");
        assert!(matches!(
            dev.reregister(missing),
            Err(ActionError::NotFound(_))
        ));
    }

    #[test]
    fn test_will_register_hook() {
        let registry = ActionRegistry::new();
        registry
            .on_will_register(|action| {
                if action.section == Section::ContentTypes {
                    action.options.apply_to_properties.push(LOCALES_PROPERTY.to_string());
                }
            })
            .unwrap();

        registry.register(read()).unwrap();
        registry
            .register(ActionDescriptor::new("settings.read", Section::Settings, "Settings"))
            .unwrap();

        assert!(registry.get("read").unwrap().applies_to_property(LOCALES_PROPERTY));
        assert!(
            !registry
                .get("settings.read")
                .unwrap()
                .applies_to_property(LOCALES_PROPERTY)
        );
    }

    #[test]
    fn test_get_all_filters_and_sorts() {
        let registry = ActionRegistry::new();
        registry
            .register_many([
                ActionDescriptor::new("update", Section::ContentTypes, "Update"),
                read(),
                ActionDescriptor::new("webhooks.read", Section::Settings, "Webhooks"),
            ])
            .unwrap();

        let ids: Vec<String> = registry
            .get_all(Some(Section::ContentTypes))
            .iter()
            .map(|a| a.action_id())
            .collect();
        assert_eq!(ids, vec!["read", "update"]);
        assert_eq!(registry.get_all(None).len(), 3);
    }

    #[test]
    fn test_resolve_ignores_params() {
        let registry = ActionRegistry::new();
        registry.register(read()).unwrap();

        let action = ActionRef::from(crate::ParametrizedAction::new("read").with_param("locale", "en"));
        assert!(registry.resolve(&action).is_some());
    }

    #[test]
    fn test_emits_events() {
        let events = Arc::new(EventDispatcher::new());
        let collector = Arc::new(CollectingSubscriber::new(10));
        events.subscribe(collector.clone());

        let registry = ActionRegistry::new().with_events(events);
        registry.register(read()).unwrap();

        assert_eq!(collector.of_type("action_registered").len(), 1);
    }
}
