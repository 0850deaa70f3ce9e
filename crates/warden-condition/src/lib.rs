//! Warden Condition Registry
//!
//! Conditions are named predicates a permission rule can attach to narrow
//! who it applies to or which records it covers. A handler receives the
//! [`RuntimeContext`](warden_core::RuntimeContext) and returns either a
//! boolean or a structural [`Filter`](warden_core::Filter):
//!
//! | Outcome | Effect on the rule |
//! |---------|--------------------|
//! | `true` | applies unconditionally |
//! | `false` | does not apply to this actor |
//! | filter | applies to records matching the filter |
//!
//! Rules combine conditions with `$and`, `$or` and `$not` (see
//! [`ConditionTree`]). A tree that references an unregistered name fails to
//! resolve, and the compiler drops the rule.

pub mod builtin;
pub mod condition;
pub mod error;
pub mod registry;
pub mod tree;

// Re-export main types
pub use builtin::register_builtins;
pub use condition::{Condition, ConditionOutcome, FnCondition};
pub use error::{ConditionError, ConditionResult};
pub use registry::ConditionRegistry;
pub use tree::{ConditionTree, ResolvedCondition};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builtin::{IsCreator, IsSameRoleAsCreator};
    pub use crate::condition::{Condition, ConditionOutcome, FnCondition};
    pub use crate::error::{ConditionError, ConditionResult};
    pub use crate::registry::ConditionRegistry;
    pub use crate::tree::ConditionTree;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use serde_json::json;
    use warden_core::{Actor, Filter, Role, RuntimeContext};

    #[test]
    fn test_builtin_disjunction() {
        let registry = ConditionRegistry::new();
        crate::register_builtins(&registry).unwrap();

        let tree = ConditionTree::parse(&json!({
            "$or": [{ "name": "is-creator" }, { "name": "is-same-role-as-creator" }]
        }))
        .unwrap();
        let resolved = registry.resolve(&tree).unwrap();

        let ctx = RuntimeContext::new(Actor::new(1).with_role(Role::new(3)));
        let filter: Filter = resolved.evaluate(&ctx).unwrap();
        assert_eq!(
            filter.to_json(),
            json!({ "$or": [{ "createdBy": 1 }, { "createdBy.role": 3 }] })
        );
    }
}
