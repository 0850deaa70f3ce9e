//! Built-in conditions.
//!
//! - [`IsCreator`]: the record was created by the actor
//! - [`IsSameRoleAsCreator`]: the record's creator shares a role with the actor

mod is_creator;
mod same_role;

pub use is_creator::{CREATED_BY, IsCreator};
pub use same_role::IsSameRoleAsCreator;

use crate::error::ConditionResult;
use crate::registry::ConditionRegistry;

/// Register every built-in condition.
pub fn register_builtins(registry: &ConditionRegistry) -> ConditionResult<()> {
    registry.register(IsCreator)?;
    registry.register(IsSameRoleAsCreator)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtins() {
        let registry = ConditionRegistry::new();
        register_builtins(&registry).unwrap();

        assert!(registry.contains(IsCreator::NAME));
        assert!(registry.contains(IsSameRoleAsCreator::NAME));
        assert!(register_builtins(&registry).is_err());
    }
}
