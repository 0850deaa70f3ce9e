//! Compiled abilities.
//!
//! An [`Ability`] is a lookup table from canonical action to the rules that
//! permit it. It is immutable: when rules change, a new one is compiled.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use tracing::trace;

use warden_core::Filter;
use warden_observe::{AbilityId, AuthzEvent, EventDispatcher};

use crate::fields::FieldSet;

/// Which subjects a rule covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubjectScope {
    /// Every subject.
    All,
    /// One subject.
    Only(String),
}

impl SubjectScope {
    /// `None` means every subject.
    pub fn from_option(subject: Option<&str>) -> Self {
        match subject {
            Some(subject) => SubjectScope::Only(subject.to_string()),
            None => SubjectScope::All,
        }
    }

    /// Whether the scope covers `subject`.
    pub fn covers(&self, subject: &str) -> bool {
        match self {
            SubjectScope::All => true,
            SubjectScope::Only(only) => only == subject,
        }
    }
}

impl Serialize for SubjectScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SubjectScope::All => serializer.serialize_none(),
            SubjectScope::Only(subject) => serializer.serialize_some(subject),
        }
    }
}

/// One permit inside an ability, already bound to the actor.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    /// Canonical action.
    pub action: String,
    /// Covered subjects.
    pub subject: SubjectScope,
    /// Granted fields.
    pub fields: FieldSet,
    /// Records the rule covers. `None` means every record.
    pub condition: Option<Filter>,
}

impl CompiledRule {
    /// Whether the rule covers `record`.
    pub fn matches(&self, record: &Value) -> bool {
        self.condition.as_ref().is_none_or(|c| c.matches(record))
    }

    /// JSON view of the rule.
    pub fn to_json(&self) -> Value {
        json!({
            "action": self.action,
            "subject": self.subject,
            "fields": self.fields,
            "condition": self.condition.as_ref().map(Filter::to_json),
        })
    }
}

/// What an ability is asked about.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// A subject type, e.g. a collection listing. Conditions are deferred.
    Type(&'a str),
    /// One record of a subject type. Conditions are evaluated on it.
    Record {
        /// Subject type.
        model: &'a str,
        /// The record.
        record: &'a Value,
    },
}

impl<'a> Subject<'a> {
    /// A record of `model`.
    pub fn record(model: &'a str, record: &'a Value) -> Self {
        Subject::Record { model, record }
    }

    /// The subject type.
    pub fn model(&self) -> &'a str {
        match self {
            Subject::Type(model) | Subject::Record { model, .. } => model,
        }
    }

    /// The record, for record-level checks.
    pub fn as_record(&self) -> Option<&'a Value> {
        match self {
            Subject::Type(_) => None,
            Subject::Record { record, .. } => Some(record),
        }
    }
}

impl<'a> From<&'a str> for Subject<'a> {
    fn from(model: &'a str) -> Self {
        Subject::Type(model)
    }
}

/// Row restriction for a listing query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    /// Every row is visible.
    Unrestricted,
    /// Only rows matching the filter are visible.
    Restricted(Filter),
    /// No row is visible.
    Nothing,
}

impl QueryFilter {
    /// Classify a filter.
    pub fn from_filter(filter: Filter) -> Self {
        if filter.is_all() {
            QueryFilter::Unrestricted
        } else if filter.is_nothing() {
            QueryFilter::Nothing
        } else {
            QueryFilter::Restricted(filter)
        }
    }

    /// Whether every row is visible.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, QueryFilter::Unrestricted)
    }

    /// Whether no row is visible.
    pub fn is_nothing(&self) -> bool {
        matches!(self, QueryFilter::Nothing)
    }

    /// The restriction as a filter.
    pub fn to_filter(&self) -> Filter {
        match self {
            QueryFilter::Unrestricted => Filter::all(),
            QueryFilter::Restricted(filter) => filter.clone(),
            QueryFilter::Nothing => Filter::nothing(),
        }
    }

    /// AND the restriction into a caller-supplied filter.
    pub fn restrict(&self, filter: Option<Filter>) -> Filter {
        Filter::and([self.to_filter(), filter.unwrap_or_else(Filter::all)])
    }

    /// Wire form: `{}` for unrestricted, `{"$or": []}` for nothing.
    pub fn to_json(&self) -> Value {
        match self {
            QueryFilter::Unrestricted => Value::Object(Map::new()),
            QueryFilter::Restricted(filter) => filter.to_json(),
            QueryFilter::Nothing => Filter::nothing().to_json(),
        }
    }
}

impl Serialize for QueryFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Merged view of the rules relevant to one action on one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleMatch {
    /// Union of the fields granted by the relevant rules.
    pub fields: FieldSet,
    /// Rows the relevant rules cover.
    pub filter: QueryFilter,
}

impl RuleMatch {
    /// No relevant rule.
    pub fn none() -> Self {
        Self {
            fields: FieldSet::none(),
            filter: QueryFilter::Nothing,
        }
    }

    /// Whether any row may be touched at all.
    pub fn allows_any(&self) -> bool {
        !self.filter.is_nothing()
    }
}

/// A compiled, immutable set of permits for one actor.
///
/// # Example
///
/// ```ignore
/// let ability = compiler.compile(&rules, &ctx);
///
/// if ability.can("read", "article".into(), Some("title")) {
///     let listing = ability.relevant_rule_for("read", "article");
///     // AND listing.filter into the database query
/// }
/// ```
#[derive(Clone)]
pub struct Ability {
    id: AbilityId,
    rules: HashMap<String, Vec<CompiledRule>>,
    skipped: usize,
    events: Option<Arc<EventDispatcher>>,
}

impl Ability {
    pub(crate) fn new(
        rules: Vec<CompiledRule>,
        skipped: usize,
        events: Option<Arc<EventDispatcher>>,
    ) -> Self {
        let mut by_action: HashMap<String, Vec<CompiledRule>> = HashMap::new();
        for rule in rules {
            by_action.entry(rule.action.clone()).or_default().push(rule);
        }
        Self {
            id: AbilityId::new(),
            rules: by_action,
            skipped,
            events,
        }
    }

    /// An ability that permits nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, None)
    }

    /// Unique id of this ability.
    pub fn id(&self) -> AbilityId {
        self.id
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    /// Whether the ability permits nothing.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules that did not apply to the actor.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Actions with at least one rule, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    /// Every compiled rule.
    pub fn rules(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.values().flatten()
    }

    /// Rules for `action` that cover `subject`.
    pub fn rules_for(&self, action: &str, subject: &str) -> Vec<&CompiledRule> {
        self.rules
            .get(action)
            .into_iter()
            .flatten()
            .filter(|rule| rule.subject.covers(subject))
            .collect()
    }

    /// Whether `action` is permitted on `subject`, optionally on one field.
    ///
    /// For [`Subject::Type`] a conditional rule counts as a permit: the
    /// condition restricts which rows, see
    /// [`relevant_rule_for`](Self::relevant_rule_for). For
    /// [`Subject::Record`] the condition must match the record.
    pub fn can(&self, action: &str, subject: Subject<'_>, field: Option<&str>) -> bool {
        let allowed = self
            .rules_for(action, subject.model())
            .into_iter()
            .filter(|rule| field.is_none_or(|f| rule.fields.allows(f)))
            .any(|rule| subject.as_record().is_none_or(|record| rule.matches(record)));

        trace!(
            ability = %self.id,
            action,
            subject = subject.model(),
            field,
            allowed,
            "Access decided"
        );
        if let Some(events) = &self.events {
            events.emit(AuthzEvent::AccessDecided {
                ability: self.id,
                action: action.to_string(),
                subject: subject.model().to_string(),
                allowed,
            });
        }
        allowed
    }

    /// Negation of [`can`](Self::can).
    pub fn cannot(&self, action: &str, subject: Subject<'_>, field: Option<&str>) -> bool {
        !self.can(action, subject, field)
    }

    /// Merged fields and row filter for listing `subject` under `action`.
    ///
    /// Conditions of the relevant rules are OR-ed. An unconditional rule
    /// makes the listing unrestricted; no rule makes it empty.
    pub fn relevant_rule_for(&self, action: &str, subject: &str) -> RuleMatch {
        let rules = self.rules_for(action, subject);
        if rules.is_empty() {
            return RuleMatch::none();
        }

        let fields: FieldSet = rules.iter().map(|r| r.fields.clone()).collect();
        let filter = Filter::or(
            rules
                .iter()
                .map(|r| r.condition.clone().unwrap_or_else(Filter::all)),
        );
        RuleMatch {
            fields,
            filter: QueryFilter::from_filter(filter),
        }
    }

    /// Fields granted for `action` on `subject`.
    ///
    /// For a record, only rules whose condition matches it contribute.
    pub fn permitted_fields(&self, action: &str, subject: Subject<'_>) -> FieldSet {
        self.rules_for(action, subject.model())
            .into_iter()
            .filter(|rule| subject.as_record().is_none_or(|record| rule.matches(record)))
            .map(|rule| rule.fields.clone())
            .collect()
    }

    /// JSON view of all rules, grouped by action.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for action in self.actions() {
            let rules = self.rules[action].iter().map(CompiledRule::to_json).collect();
            out.insert(action.to_string(), Value::Array(rules));
        }
        Value::Object(out)
    }
}

impl fmt::Debug for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ability")
            .field("id", &self.id)
            .field("actions", &self.actions())
            .field("rules", &self.len())
            .field("skipped", &self.skipped)
            .finish()
    }
}
