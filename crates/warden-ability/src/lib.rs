//! Warden Ability Compiler
//!
//! Turns the permission rules stored for a role into an [`Ability`]: a
//! lookup table that answers `can(action, subject, field?)` and produces the
//! row filter a listing query must apply.
//!
//! # Semantics
//!
//! - Rules are additive. There is no deny rule; no matching permit means
//!   deny.
//! - Rules for the same action and subject accumulate: their conditions are
//!   OR-ed and their fields are unioned.
//! - A rule with no subject covers every subject.
//! - A rule whose action or condition cannot be resolved is dropped, never
//!   widened.
//! - The result does not depend on rule order.
//!
//! # Example
//!
//! ```ignore
//! use warden_ability::{AbilityCompiler, PermissionRule};
//!
//! let compiler = AbilityCompiler::new(actions, conditions);
//! let ability = compiler.compile(
//!     &[PermissionRule::new("update").on("article").when("is-creator")],
//!     &ctx,
//! );
//!
//! let listing = ability.relevant_rule_for("update", "article");
//! assert_eq!(listing.filter.to_json(), serde_json::json!({ "createdBy": 1 }));
//! ```

pub mod ability;
pub mod compiler;
pub mod error;
pub mod fields;
pub mod rule;

// Re-export main types
pub use ability::{Ability, CompiledRule, QueryFilter, RuleMatch, Subject, SubjectScope};
pub use compiler::{AbilityCompiler, LOCALE_FIELD, PreparedRule, PreparedRules};
pub use error::{DropReason, DroppedRule};
pub use fields::{FieldSet, WILDCARD};
pub use rule::{PermissionRule, RuleProperties};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::ability::{Ability, QueryFilter, RuleMatch, Subject};
    pub use crate::compiler::{AbilityCompiler, PreparedRules};
    pub use crate::fields::FieldSet;
    pub use crate::rule::PermissionRule;
}
