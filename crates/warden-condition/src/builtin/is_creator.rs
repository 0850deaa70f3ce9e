//! "Actor is the creator of the record".

use warden_core::{Filter, RuntimeContext};

use crate::condition::{Condition, ConditionOutcome};
use crate::error::ConditionResult;

/// Field holding the creator relation on every record.
pub const CREATED_BY: &str = "createdBy";

/// Restricts records to those created by the actor: `{createdBy: actorId}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsCreator;

impl IsCreator {
    /// Registry name.
    pub const NAME: &'static str = "is-creator";
}

impl Condition for IsCreator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn display_name(&self) -> &str {
        "Is creator"
    }

    fn category(&self) -> Option<&str> {
        Some("default")
    }

    fn evaluate(&self, ctx: &RuntimeContext) -> ConditionResult<ConditionOutcome> {
        Ok(Filter::eq(CREATED_BY, ctx.actor().id.to_value()).into())
    }
}
