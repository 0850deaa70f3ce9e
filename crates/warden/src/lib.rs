//! # Warden - Authorization Engine
//!
//! Warden decides, for every authenticated actor and every attempted
//! operation, whether the operation is allowed and which fields and rows it
//! may touch.
//!
//! ## Features
//!
//! - **Registries**: actions and named conditions registered at boot, frozen
//!   before the first request
//! - **Abilities**: permission rules compiled into an immutable decision
//!   object with `can`/`cannot` and query filters
//! - **Checkers**: per-model guards and sanitizers for request handlers
//! - **Caching**: prepared rules cached per role, invalidated with every write
//! - **Observability**: events and metrics for compiles, drops and decisions
//!
//! ## Quick Start
//!
//! ```ignore
//! use warden::prelude::*;
//!
//! let context = Warden::builder()
//!     .with_action(ActionDescriptor::new("read", Section::ContentTypes, "Read"))
//!     .build()?;
//!
//! let service = AuthorizationService::new(context, InMemoryRuleStore::new().with_role(
//!     3,
//!     vec![PermissionRule::new("read").on("article").with_fields(["title"])],
//! ));
//!
//! let ctx = RuntimeContext::new(Actor::new(1).with_role(Role::new(3)));
//! let ability = service.ability_for(&ctx).await?;
//!
//! let checker = PermissionChecker::create(&ability, &schema, "article")?;
//! assert!(checker.can().read());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Request handlers                       │
//! ├─────────────────────────────────────────────────────────┤
//! │                    warden (facade)                      │
//! │   RegistryContext · AuthorizationService · AbilityCache │
//! │                                                         │
//! │  ┌──────────────┬──────────────────┬────────────────┐   │
//! │  │ warden-action│ warden-condition │ warden-observe │   │
//! │  │ (registry)   │ (registry, trees)│ (events,       │   │
//! │  │              │                  │  metrics)      │   │
//! │  ├──────────────┴──────────────────┤                │   │
//! │  │ warden-ability (compiler)       │                │   │
//! │  ├─────────────────────────────────┤                │   │
//! │  │ warden-checker (guards, sanitize│                │   │
//! │  └─────────────────────────────────┴────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │   warden-core (context, filters, matcher, config)       │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod service;
pub mod store;

use std::sync::Arc;

use tracing::info;

use warden_ability::{Ability, AbilityCompiler, PermissionRule, PreparedRules};
use warden_action::{ActionDescriptor, ActionRegistry, RegisterHook};
use warden_condition::{Condition, ConditionRegistry, register_builtins};
use warden_core::{EngineConfig, RuntimeContext};
use warden_observe::{EventDispatcher, EventSubscriber};

// Re-export from sub-crates
pub use warden_ability;
pub use warden_action;
pub use warden_checker;
pub use warden_condition;
pub use warden_core;
pub use warden_observe;

pub use cache::{AbilityCache, CacheTicket, Lookup};
pub use error::{StoreError, StoreResult, WardenError, WardenResult};
pub use service::AuthorizationService;
pub use store::{InMemoryRuleStore, RuleStore};

/// Main entry point for Warden.
pub struct Warden;

impl Warden {
    /// Create a new registry context builder.
    pub fn builder() -> WardenBuilder {
        WardenBuilder::new()
    }

    /// Build a context with the built-in conditions and no actions.
    pub fn with_defaults() -> WardenResult<RegistryContext> {
        WardenBuilder::new().build()
    }
}

/// Builder collecting everything registered during boot.
///
/// [`build`](Self::build) registers hooks first, then actions, then
/// conditions, and freezes both registries.
pub struct WardenBuilder {
    config: EngineConfig,
    hooks: Vec<RegisterHook>,
    actions: Vec<ActionDescriptor>,
    conditions: Vec<Arc<dyn Condition>>,
    builtin_conditions: bool,
    event_subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl WardenBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            hooks: Vec::new(),
            actions: Vec::new(),
            conditions: Vec::new(),
            builtin_conditions: true,
            event_subscribers: Vec::new(),
        }
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a hook run on every action before it is stored.
    pub fn with_register_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ActionDescriptor) + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Register an action.
    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.actions.push(action);
        self
    }

    /// Register several actions.
    pub fn with_actions<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = ActionDescriptor>,
    {
        self.actions.extend(actions);
        self
    }

    /// Register a condition.
    pub fn with_condition<C: Condition + 'static>(mut self, condition: C) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Skip `is-creator` and `is-same-role-as-creator`.
    pub fn without_builtin_conditions(mut self) -> Self {
        self.builtin_conditions = false;
        self
    }

    /// Add an event subscriber.
    pub fn with_event_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.event_subscribers.push(subscriber);
        self
    }

    /// Register everything and freeze the registries.
    ///
    /// # Errors
    ///
    /// Fails on the first duplicate or invalid registration.
    pub fn build(self) -> WardenResult<RegistryContext> {
        let events = Arc::new(EventDispatcher::new());
        for subscriber in self.event_subscribers {
            events.subscribe(subscriber);
        }

        let actions =
            ActionRegistry::with_mode(self.config.registration).with_events(Arc::clone(&events));
        for hook in self.hooks {
            actions.on_will_register(move |action| hook(action))?;
        }
        actions.register_many(self.actions)?;

        let conditions =
            ConditionRegistry::with_mode(self.config.registration).with_events(Arc::clone(&events));
        if self.builtin_conditions {
            register_builtins(&conditions)?;
        }
        for condition in self.conditions {
            conditions.register_arc(condition)?;
        }

        actions.freeze();
        conditions.freeze();

        let actions = Arc::new(actions);
        let conditions = Arc::new(conditions);
        let compiler = AbilityCompiler::new(Arc::clone(&actions), Arc::clone(&conditions))
            .with_config(self.config.clone())
            .with_events(Arc::clone(&events));

        info!(
            actions = actions.len(),
            conditions = conditions.len(),
            "Registries frozen"
        );

        Ok(RegistryContext {
            actions,
            conditions,
            compiler: Arc::new(compiler),
            events,
            config: self.config,
        })
    }
}

impl Default for WardenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The frozen registries and the compiler built over them.
///
/// Constructed once at boot and passed by reference. Independent contexts
/// share nothing, so tests can build as many as they need.
#[derive(Clone)]
pub struct RegistryContext {
    actions: Arc<ActionRegistry>,
    conditions: Arc<ConditionRegistry>,
    compiler: Arc<AbilityCompiler>,
    events: Arc<EventDispatcher>,
    config: EngineConfig,
}

impl RegistryContext {
    /// The action registry.
    pub fn actions(&self) -> &Arc<ActionRegistry> {
        &self.actions
    }

    /// The condition registry.
    pub fn conditions(&self) -> &Arc<ConditionRegistry> {
        &self.conditions
    }

    /// The ability compiler.
    pub fn compiler(&self) -> &AbilityCompiler {
        &self.compiler
    }

    /// The event dispatcher shared by registries, compiler and cache.
    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a rule list without binding it to an actor.
    pub fn prepare(&self, rules: &[PermissionRule]) -> PreparedRules {
        self.compiler.prepare(rules)
    }

    /// Compile a rule list for the actor in `ctx`.
    pub fn compile(&self, rules: &[PermissionRule], ctx: &RuntimeContext) -> Ability {
        self.compiler.compile(rules, ctx)
    }
}

impl std::fmt::Debug for RegistryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryContext")
            .field("actions", &self.actions.len())
            .field("conditions", &self.conditions.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{
        AbilityCache, AuthorizationService, InMemoryRuleStore, RegistryContext, RuleStore,
        StoreError, Warden, WardenBuilder, WardenError, WardenResult,
    };

    // Core types
    pub use warden_core::{Actor, EngineConfig, EntityId, Filter, Role, RuntimeContext};

    // Registry types
    pub use warden_action::{ActionDescriptor, ActionRef, ParametrizedAction, Section};
    pub use warden_condition::{Condition, ConditionOutcome, FnCondition};

    // Ability types
    pub use warden_ability::{
        Ability, FieldSet, PermissionRule, QueryFilter, RuleMatch, Subject,
    };

    // Checker types
    pub use warden_checker::{
        Attribute, CheckerConfig, CrudActions, CrudOp, ModelSchema, PermissionChecker,
        SchemaRegistry,
    };

    // Observability types
    pub use warden_observe::{
        AuthzEvent, CollectingSubscriber, EventDispatcher, EventSubscriber, MetricsCollector,
        MetricsSubscriber,
    };

    pub use std::sync::Arc;
}
