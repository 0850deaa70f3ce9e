//! Permission rule storage.
//!
//! The engine never owns persisted permissions. It reads a role's rules
//! through [`RuleStore`] and writes them back only through
//! [`AuthorizationService::update_role_rules`](crate::AuthorizationService::update_role_rules),
//! which keeps the prepared-rule cache in step with the store.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;
use tracing::debug;

use warden_ability::PermissionRule;
use warden_core::EntityId;

use crate::error::StoreResult;

/// Source of the permission rules attached to each role.
pub trait RuleStore: Send + Sync {
    /// Rules granted to `role`. A role without rules yields an empty list.
    fn rules_for_role(
        &self,
        role: &EntityId,
    ) -> impl Future<Output = StoreResult<Vec<PermissionRule>>> + Send;

    /// Replace every rule of `role`.
    fn replace_role_rules(
        &self,
        role: &EntityId,
        rules: Vec<PermissionRule>,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}

/// A [`RuleStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    roles: RwLock<HashMap<EntityId, Vec<PermissionRule>>>,
}

impl InMemoryRuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the rules of one role.
    pub fn with_role(mut self, role: impl Into<EntityId>, rules: Vec<PermissionRule>) -> Self {
        self.roles.get_mut().insert(role.into(), rules);
        self
    }

    /// Number of roles with stored rules.
    pub async fn role_count(&self) -> usize {
        self.roles.read().await.len()
    }
}

impl RuleStore for InMemoryRuleStore {
    async fn rules_for_role(&self, role: &EntityId) -> StoreResult<Vec<PermissionRule>> {
        let rules = self
            .roles
            .read()
            .await
            .get(role)
            .cloned()
            .unwrap_or_default();
        debug!(role = %role, rules = rules.len(), "Loaded role rules");
        Ok(rules)
    }

    async fn replace_role_rules(
        &self,
        role: &EntityId,
        rules: Vec<PermissionRule>,
    ) -> StoreResult<()> {
        self.roles.write().await.insert(role.clone(), rules);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryRuleStore::new().with_role(3, vec![PermissionRule::new("read")]);
        assert_eq!(store.role_count().await, 1);

        let role = EntityId::from(3);
        assert_eq!(store.rules_for_role(&role).await.unwrap().len(), 1);
        assert!(store
            .rules_for_role(&EntityId::from("ghost"))
            .await
            .unwrap()
            .is_empty());

        store
            .replace_role_rules(&role, vec![PermissionRule::new("read"), PermissionRule::new("delete")])
            .await
            .unwrap();
        assert_eq!(store.rules_for_role(&role).await.unwrap().len(), 2);
    }
}
