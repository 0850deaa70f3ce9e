//! The ability compiler.
//!
//! Compilation runs in two stages:
//!
//! 1. [`AbilityCompiler::prepare`] checks a rule list against the registries.
//!    It does not look at the actor, so its output can be cached per role.
//! 2. [`AbilityCompiler::bind`] runs the condition handlers for one actor and
//!    produces the [`Ability`].
//!
//! Neither stage fails. A rule that cannot be compiled safely is dropped and
//! reported; the rest of the ability is unaffected.

use std::sync::Arc;

use tracing::{debug, warn};

use warden_action::{ActionRegistry, LOCALES_PROPERTY};
use warden_condition::{ConditionError, ConditionRegistry, ConditionTree, ResolvedCondition};
use warden_core::{EngineConfig, Filter, RuntimeContext, UnknownActionPolicy};
use warden_observe::{AuthzEvent, EventDispatcher};

use crate::ability::{Ability, CompiledRule, SubjectScope};
use crate::error::{DropReason, DroppedRule};
use crate::fields::FieldSet;
use crate::rule::PermissionRule;

/// Field holding a record's locale.
pub const LOCALE_FIELD: &str = "locale";

/// A rule that passed registry validation.
#[derive(Debug, Clone)]
pub struct PreparedRule {
    /// Position of the rule in its input list.
    pub index: usize,
    /// Canonical action.
    pub action: String,
    /// Covered subjects.
    pub subject: SubjectScope,
    /// Granted fields.
    pub fields: FieldSet,
    /// Condition to run at bind time.
    pub condition: Option<ResolvedCondition>,
    /// Actor-independent restriction (locales).
    pub restriction: Option<Filter>,
}

/// The actor-independent result of [`AbilityCompiler::prepare`].
#[derive(Debug, Clone, Default)]
pub struct PreparedRules {
    rules: Vec<PreparedRule>,
    dropped: Vec<DroppedRule>,
}

impl PreparedRules {
    /// Combine the prepared rules of several roles.
    pub fn merge<'a, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'a PreparedRules>,
    {
        let mut merged = PreparedRules::default();
        for set in sets {
            merged.rules.extend(set.rules.iter().cloned());
            merged.dropped.extend(set.dropped.iter().cloned());
        }
        merged
    }

    /// Rules that will be bound.
    pub fn rules(&self) -> &[PreparedRule] {
        &self.rules
    }

    /// Rules that were dropped.
    pub fn dropped(&self) -> &[DroppedRule] {
        &self.dropped
    }

    /// Number of rules that will be bound.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rule survived.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Compiles permission rules into abilities.
#[derive(Debug, Clone)]
pub struct AbilityCompiler {
    actions: Arc<ActionRegistry>,
    conditions: Arc<ConditionRegistry>,
    config: EngineConfig,
    events: Option<Arc<EventDispatcher>>,
}

impl AbilityCompiler {
    /// Create a compiler over the given registries.
    pub fn new(actions: Arc<ActionRegistry>, conditions: Arc<ConditionRegistry>) -> Self {
        Self {
            actions,
            conditions,
            config: EngineConfig::default(),
            events: None,
        }
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Emit compile and decision events to `events`.
    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Prepare and bind in one go.
    pub fn compile(&self, rules: &[PermissionRule], ctx: &RuntimeContext) -> Ability {
        self.bind(&self.prepare(rules), ctx)
    }

    /// Validate a rule list against the registries.
    pub fn prepare(&self, rules: &[PermissionRule]) -> PreparedRules {
        let mut prepared = PreparedRules::default();
        for (index, rule) in rules.iter().enumerate() {
            match self.prepare_rule(index, rule) {
                Ok(rule) => prepared.rules.push(rule),
                Err(reason) => {
                    let dropped = DroppedRule {
                        index,
                        action: rule.action.canonical(),
                        subject: rule.subject.clone(),
                        reason,
                    };
                    self.report(&dropped);
                    prepared.dropped.push(dropped);
                }
            }
        }

        debug!(
            rules = prepared.rules.len(),
            dropped = prepared.dropped.len(),
            "Permission rules prepared"
        );
        prepared
    }

    fn prepare_rule(
        &self,
        index: usize,
        rule: &PermissionRule,
    ) -> Result<PreparedRule, DropReason> {
        let action = rule.action.canonical();
        let descriptor = self.actions.resolve(&rule.action);

        if descriptor.is_none() && self.config.unknown_actions == UnknownActionPolicy::Drop {
            return Err(DropReason::UnknownAction { action });
        }

        if let (Some(descriptor), Some(subject)) = (&descriptor, &rule.subject) {
            if self.config.enforce_action_subjects && !descriptor.applies_to_subject(subject) {
                return Err(DropReason::SubjectNotApplicable {
                    action,
                    subject: subject.clone(),
                });
            }
        }

        let condition = match self.condition_tree(rule)? {
            Some(tree) => Some(self.conditions.resolve(&tree).map_err(|err| match err {
                ConditionError::UnknownCondition(condition) => {
                    DropReason::UnknownCondition { condition }
                }
                other => DropReason::InvalidCondition {
                    message: other.to_string(),
                },
            })?),
            None => None,
        };

        let restriction = match (rule.locales(), &descriptor) {
            (Some(locales), Some(d)) if d.applies_to_property(LOCALES_PROPERTY) => {
                Some(if locales.is_empty() {
                    Filter::nothing()
                } else {
                    Filter::is_in(LOCALE_FIELD, locales.iter().cloned().map(Into::into).collect())
                })
            }
            _ => None,
        };

        Ok(PreparedRule {
            index,
            action,
            subject: SubjectScope::from_option(rule.subject.as_deref()),
            fields: FieldSet::from_list(rule.requested_fields()),
            condition,
            restriction,
        })
    }

    /// The rule's condition tree, combining `condition` and `conditions`.
    fn condition_tree(&self, rule: &PermissionRule) -> Result<Option<ConditionTree>, DropReason> {
        let parsed = rule
            .condition
            .as_ref()
            .filter(|value| !value.is_null())
            .map(ConditionTree::parse)
            .transpose()
            .map_err(|err| DropReason::InvalidCondition {
                message: err.to_string(),
            })?;

        let legacy = (!rule.conditions.is_empty())
            .then(|| ConditionTree::any_of(rule.conditions.iter().cloned()));

        Ok(match (parsed, legacy) {
            (Some(tree), Some(list)) => Some(ConditionTree::And(vec![tree, list])),
            (tree, list) => tree.or(list),
        })
    }

    /// Bind prepared rules to an actor.
    ///
    /// Conditions that hold for every record make their rule unconditional;
    /// conditions that hold for none remove it. A failing handler drops its
    /// rule.
    pub fn bind(&self, prepared: &PreparedRules, ctx: &RuntimeContext) -> Ability {
        let mut compiled = Vec::with_capacity(prepared.rules.len());
        let mut skipped = 0;

        for rule in &prepared.rules {
            let condition = match &rule.condition {
                Some(condition) => match condition.evaluate(ctx) {
                    Ok(filter) => filter,
                    Err(err) => {
                        self.report(&DroppedRule {
                            index: rule.index,
                            action: rule.action.clone(),
                            subject: match &rule.subject {
                                SubjectScope::All => None,
                                SubjectScope::Only(s) => Some(s.clone()),
                            },
                            reason: DropReason::ConditionFailed {
                                message: err.to_string(),
                            },
                        });
                        skipped += 1;
                        continue;
                    }
                },
                None => Filter::all(),
            };

            let filter = Filter::and(rule.restriction.iter().cloned().chain([condition]));
            if filter.is_nothing() {
                skipped += 1;
                continue;
            }

            compiled.push(CompiledRule {
                action: rule.action.clone(),
                subject: rule.subject.clone(),
                fields: rule.fields.clone(),
                condition: (!filter.is_all()).then_some(filter),
            });
        }

        let ability = Ability::new(compiled, skipped, self.events.clone());
        debug!(
            ability = %ability.id(),
            actor = %ctx.actor().id,
            rules = ability.len(),
            skipped,
            "Ability compiled"
        );
        if let Some(events) = &self.events {
            events.emit(AuthzEvent::AbilityCompiled {
                ability: ability.id(),
                rules: ability.len(),
                skipped,
            });
        }
        ability
    }

    fn report(&self, dropped: &DroppedRule) {
        warn!(
            index = dropped.index,
            action = %dropped.action,
            subject = ?dropped.subject,
            reason = %dropped.reason,
            "Permission rule dropped"
        );
        if let Some(events) = &self.events {
            events.emit(AuthzEvent::RuleDropped {
                index: dropped.index,
                action: dropped.action.clone(),
                subject: dropped.subject.clone(),
                reason: dropped.reason.code().to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_action::{ActionDescriptor, Section};
    use warden_condition::{FnCondition, register_builtins};
    use warden_core::{Actor, Role};
    use warden_observe::CollectingSubscriber;

    use crate::ability::Subject;

    fn compiler() -> AbilityCompiler {
        let actions = ActionRegistry::new();
        actions
            .on_will_register(|action| {
                if action.section == Section::ContentTypes {
                    action.options.apply_to_properties.push(LOCALES_PROPERTY.to_string());
                }
            })
            .unwrap();
        actions
            .register_many([
                ActionDescriptor::new("read", Section::ContentTypes, "Read"),
                ActionDescriptor::new("update", Section::ContentTypes, "Update"),
                ActionDescriptor::new("delete", Section::ContentTypes, "Delete"),
                ActionDescriptor::new("publish", Section::ContentTypes, "Publish")
                    .with_subjects(["article"]),
                ActionDescriptor::new("settings.read", Section::Settings, "Settings"),
            ])
            .unwrap();
        actions.freeze();

        let conditions = ConditionRegistry::new();
        register_builtins(&conditions).unwrap();
        conditions
            .register(FnCondition::new("broken", |_| {
                Err(ConditionError::Evaluation {
                    condition: "broken".into(),
                    message: "lookup failed".into(),
                })
            }))
            .unwrap();
        conditions.freeze();

        AbilityCompiler::new(Arc::new(actions), Arc::new(conditions))
    }

    fn ctx() -> RuntimeContext {
        RuntimeContext::new(Actor::new(1).with_role(Role::new(3)))
    }

    #[test]
    fn test_unknown_action_dropped() {
        let compiler = compiler();
        let prepared = compiler.prepare(&[PermissionRule::new("fly")]);

        assert!(prepared.is_empty());
        assert_eq!(
            prepared.dropped()[0].reason,
            DropReason::UnknownAction { action: "fly".into() }
        );

        let lenient = compiler
            .clone()
            .with_config(EngineConfig::new().with_unknown_actions(UnknownActionPolicy::Allow));
        assert_eq!(lenient.prepare(&[PermissionRule::new("fly")]).len(), 1);
    }

    #[test]
    fn test_subject_enforcement() {
        let compiler = compiler();
        let rules = [PermissionRule::new("publish").on("page")];

        let prepared = compiler.prepare(&rules);
        assert!(matches!(
            prepared.dropped()[0].reason,
            DropReason::SubjectNotApplicable { .. }
        ));

        let relaxed = compiler
            .clone()
            .with_config(EngineConfig::new().with_subject_enforcement(false));
        assert_eq!(relaxed.prepare(&rules).len(), 1);
    }

    #[test]
    fn test_unknown_condition_drops_rule() {
        let compiler = compiler();
        let rules = [
            PermissionRule::new("update").on("article").when("is-owner"),
            PermissionRule::new("read").on("article"),
        ];
        let ability = compiler.compile(&rules, &ctx());

        assert!(ability.cannot("update", "article".into(), None));
        assert!(ability.can("read", "article".into(), None));
    }

    #[test]
    fn test_malformed_condition_drops_rule() {
        let compiler = compiler();
        let rule = PermissionRule::new("update")
            .on("article")
            .with_condition(json!({ "$regex": "x" }));
        let prepared = compiler.prepare(&[rule]);

        assert!(matches!(
            prepared.dropped()[0].reason,
            DropReason::InvalidCondition { .. }
        ));
    }

    #[test]
    fn test_failing_handler_drops_rule() {
        let compiler = compiler();
        let ability = compiler.compile(&[PermissionRule::new("read").when("broken")], &ctx());

        assert!(ability.is_empty());
        assert_eq!(ability.skipped(), 1);
    }

    #[test]
    fn test_false_condition_skips_rule() {
        let compiler = compiler();
        let rules = [PermissionRule::new("read").on("article").when("is-same-role-as-creator")];
        let roleless = RuntimeContext::new(Actor::new(1));

        let ability = compiler.compile(&rules, &roleless);
        assert!(ability.cannot("read", "article".into(), None));
        assert_eq!(ability.skipped(), 1);
    }

    #[test]
    fn test_legacy_conditions_list() {
        let compiler = compiler();
        let mut rule = PermissionRule::new("read").on("article");
        rule.conditions = vec!["is-creator".into(), "is-same-role-as-creator".into()];

        let matched = compiler
            .compile(&[rule], &ctx())
            .relevant_rule_for("read", "article");
        assert_eq!(
            matched.filter.to_json(),
            json!({ "$or": [{ "createdBy": 1 }, { "createdBy.role": 3 }] })
        );
    }

    #[test]
    fn test_not_condition() {
        let compiler = compiler();
        let rule = PermissionRule::new("read")
            .on("article")
            .with_condition(json!({ "$not": { "name": "is-creator" } }));
        let ability = compiler.compile(&[rule], &ctx());

        let mine = json!({ "createdBy": { "id": 1 } });
        let theirs = json!({ "createdBy": { "id": 2 } });
        assert!(!ability.can("read", Subject::record("article", &mine), None));
        assert!(ability.can("read", Subject::record("article", &theirs), None));
    }

    #[test]
    fn test_locales_restriction() {
        let compiler = compiler();
        let ability = compiler.compile(
            &[
                PermissionRule::new("read").on("article").with_locales(["en", "fr"]),
                PermissionRule::new("settings.read").with_locales(["en"]),
            ],
            &ctx(),
        );

        assert_eq!(
            ability.relevant_rule_for("read", "article").filter.to_json(),
            json!({ "locale": { "$in": ["en", "fr"] } })
        );
        assert!(
            ability
                .relevant_rule_for("settings.read", "anything")
                .filter
                .is_unrestricted()
        );
    }

    #[test]
    fn test_parametrized_actions_are_distinct() {
        let compiler = compiler();
        let rule: PermissionRule = serde_json::from_value(json!({
            "action": { "name": "read", "params": { "locale": "en" } },
            "subject": "article"
        }))
        .unwrap();
        let ability = compiler.compile(&[rule], &ctx());

        assert!(ability.can("read?locale=en", "article".into(), None));
        assert!(ability.cannot("read?locale=fr", "article".into(), None));
        assert!(ability.cannot("read", "article".into(), None));
    }

    #[test]
    fn test_merge_roles() {
        let compiler = compiler();
        let editors = compiler.prepare(&[PermissionRule::new("read").on("article")]);
        let authors = compiler.prepare(&[PermissionRule::new("update").on("article").when("is-creator")]);

        let ability = compiler.bind(&PreparedRules::merge([&editors, &authors]), &ctx());
        assert_eq!(ability.actions(), vec!["read", "update"]);
    }

    #[test]
    fn test_events() {
        let events = Arc::new(EventDispatcher::new());
        let collector = Arc::new(CollectingSubscriber::new(20));
        events.subscribe(collector.clone());

        let compiler = compiler().with_events(events);
        compiler.compile(
            &[PermissionRule::new("fly"), PermissionRule::new("read")],
            &ctx(),
        );

        assert_eq!(collector.of_type("rule_dropped").len(), 1);
        assert_eq!(collector.of_type("ability_compiled").len(), 1);
    }

    #[test]
    fn test_dropped_rules_keep_input_positions() {
        let events = Arc::new(EventDispatcher::new());
        let collector = Arc::new(CollectingSubscriber::new(20));
        events.subscribe(collector.clone());

        let compiler = compiler().with_events(events);
        let rules = [
            PermissionRule::new("fly"),
            PermissionRule::new("read").on("article").when("is-same-role-as-creator"),
            PermissionRule::new("read").on("article"),
            PermissionRule::new("read").on("tag").when("broken"),
        ];
        let prepared = compiler.prepare(&rules);
        let indexes: Vec<usize> = prepared.rules().iter().map(|rule| rule.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);

        let roleless = RuntimeContext::new(Actor::new(1));
        let ability = compiler.bind(&prepared, &roleless);
        assert_eq!(ability.len(), 1);

        let dropped: Vec<usize> = collector
            .of_type("rule_dropped")
            .into_iter()
            .filter_map(|event| match event {
                AuthzEvent::RuleDropped { index, .. } => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(dropped, vec![0, 3]);
    }
}
