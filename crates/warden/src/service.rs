//! Per-request ability construction.

use std::sync::Arc;

use tracing::{debug, info};

use warden_ability::{Ability, PermissionRule, PreparedRules};
use warden_core::{EntityId, RuntimeContext};

use crate::RegistryContext;
use crate::cache::{AbilityCache, Lookup};
use crate::error::WardenResult;
use crate::store::RuleStore;

/// Builds abilities for actors from the rules of their roles.
///
/// Each role's rules are fetched and prepared once, then reused until
/// [`update_role_rules`](Self::update_role_rules) or
/// [`invalidate_role`](Self::invalidate_role) touches the role. Binding to the
/// actor happens on every call, so conditions always see the current context.
pub struct AuthorizationService<S> {
    context: RegistryContext,
    store: S,
    cache: AbilityCache,
}

impl<S: RuleStore> AuthorizationService<S> {
    /// Create a service reading rules from `store`.
    pub fn new(context: RegistryContext, store: S) -> Self {
        let cache = AbilityCache::new().with_events(Arc::clone(context.events()));
        Self {
            context,
            store,
            cache,
        }
    }

    /// The registries and compiler in use.
    pub fn context(&self) -> &RegistryContext {
        &self.context
    }

    /// The rule store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The prepared-rule cache.
    pub fn cache(&self) -> &AbilityCache {
        &self.cache
    }

    /// Compile the ability of the actor in `ctx`.
    ///
    /// The actor is granted the union of the rules of all its roles. An actor
    /// without roles gets an empty ability.
    ///
    /// # Errors
    ///
    /// Fails only if the rule store fails.
    pub async fn ability_for(&self, ctx: &RuntimeContext) -> WardenResult<Ability> {
        let mut prepared = Vec::with_capacity(ctx.actor().roles.len());
        for role in ctx.actor().role_ids() {
            prepared.push(self.prepared_for(role).await?);
        }

        let merged = PreparedRules::merge(prepared.iter().map(Arc::as_ref));
        Ok(self.context.compiler().bind(&merged, ctx))
    }

    /// Replace the rules of `role` and drop its cached preparation.
    ///
    /// Once this returns, no later [`ability_for`](Self::ability_for) call
    /// sees the previous rules.
    pub async fn update_role_rules(
        &self,
        role: &EntityId,
        rules: Vec<PermissionRule>,
    ) -> WardenResult<()> {
        let count = rules.len();
        self.store.replace_role_rules(role, rules).await?;
        self.cache.invalidate(role);
        info!(role = %role, rules = count, "Role permissions updated");
        Ok(())
    }

    /// Drop the cached preparation of `role` after an out-of-band change.
    pub fn invalidate_role(&self, role: &EntityId) {
        self.cache.invalidate(role);
    }

    async fn prepared_for(&self, role: &EntityId) -> WardenResult<Arc<PreparedRules>> {
        if !self.context.config().cache_prepared_rules {
            let rules = self.store.rules_for_role(role).await?;
            return Ok(Arc::new(self.context.compiler().prepare(&rules)));
        }

        let ticket = match self.cache.lookup(role) {
            Lookup::Hit(prepared) => return Ok(prepared),
            Lookup::Miss(ticket) => ticket,
        };
        let rules = self.store.rules_for_role(role).await?;
        let prepared = self.context.compiler().prepare(&rules);
        debug!(
            role = %role,
            rules = prepared.len(),
            dropped = prepared.dropped().len(),
            "Prepared role rules"
        );
        Ok(self.cache.fill(ticket, prepared))
    }
}

impl<S> std::fmt::Debug for AuthorizationService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationService")
            .field("context", &self.context)
            .field("cache", &self.cache)
            .finish()
    }
}
