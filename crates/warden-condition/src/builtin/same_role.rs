//! "Actor shares a role with the record's creator".

use serde_json::Value;
use warden_core::{EntityId, Filter, RuntimeContext};

use crate::builtin::is_creator::CREATED_BY;
use crate::condition::{Condition, ConditionOutcome};
use crate::error::ConditionResult;

/// Restricts records to those whose creator holds one of the actor's roles.
///
/// One role gives `{"createdBy.role": id}`, several give
/// `{"createdBy.role": {"$in": [...]}}`. An actor without roles matches
/// nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsSameRoleAsCreator;

impl IsSameRoleAsCreator {
    /// Registry name.
    pub const NAME: &'static str = "is-same-role-as-creator";
}

impl Condition for IsSameRoleAsCreator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn display_name(&self) -> &str {
        "Has same role as creator"
    }

    fn category(&self) -> Option<&str> {
        Some("default")
    }

    fn evaluate(&self, ctx: &RuntimeContext) -> ConditionResult<ConditionOutcome> {
        let path = format!("{CREATED_BY}.role");
        let mut roles: Vec<Value> = Vec::new();
        for role in ctx.actor().role_ids().map(EntityId::to_value) {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        Ok(match roles.len() {
            0 => ConditionOutcome::Bool(false),
            1 => Filter::eq(path, roles.remove(0)).into(),
            _ => Filter::is_in(path, roles).into(),
        })
    }
}
