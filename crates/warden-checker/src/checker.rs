//! The per-model permission checker.

use serde_json::Value;
use tracing::debug;

use warden_ability::{Ability, FieldSet, RuleMatch, Subject};

use crate::config::{CheckerConfig, CrudOp};
use crate::error::{CheckerError, CheckerResult};
use crate::schema::{ModelSchema, SchemaRegistry};

/// An ability bound to one model for the duration of a request.
///
/// # Example
///
/// ```ignore
/// let checker = PermissionChecker::create(&ability, &schema, "article")?;
///
/// if checker.cannot().read() {
///     return forbidden();
/// }
/// let query = checker.build_read_query(&request.query);
/// let records = db.find("article", &query)?;
/// Ok(checker.sanitize_output(&records))
/// ```
#[derive(Debug, Clone)]
pub struct PermissionChecker<'a> {
    pub(crate) ability: &'a Ability,
    pub(crate) schema: &'a SchemaRegistry,
    pub(crate) model: &'a ModelSchema,
    pub(crate) config: CheckerConfig,
}

impl<'a> PermissionChecker<'a> {
    /// Bind `ability` to `model`.
    ///
    /// # Errors
    ///
    /// Fails if `model` is not registered in `schema`.
    pub fn create(
        ability: &'a Ability,
        schema: &'a SchemaRegistry,
        model: &str,
    ) -> CheckerResult<Self> {
        let model = schema
            .model(model)
            .ok_or_else(|| CheckerError::UnknownModel(model.to_string()))?;
        debug!(ability = %ability.id(), model = %model.uid, "Permission checker created");
        Ok(Self {
            ability,
            schema,
            model,
            config: CheckerConfig::default(),
        })
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: CheckerConfig) -> Self {
        self.config = config;
        self
    }

    /// The bound model uid.
    pub fn model(&self) -> &str {
        &self.model.uid
    }

    /// The wrapped ability.
    pub fn ability(&self) -> &Ability {
        self.ability
    }

    /// Action id for `op`.
    pub fn action(&self, op: CrudOp) -> &str {
        self.config.actions.action(op)
    }

    /// Guards that are true when the operation is allowed.
    pub fn can(&self) -> Guard<'_> {
        Guard::new(self, false)
    }

    /// Guards that are true when the operation is denied.
    pub fn cannot(&self) -> Guard<'_> {
        Guard::new(self, true)
    }

    /// Whether `op` is allowed, optionally on one record and one field.
    pub fn allows(&self, op: CrudOp, record: Option<&Value>, field: Option<&str>) -> bool {
        let subject = match record {
            Some(record) => Subject::record(&self.model.uid, record),
            None => Subject::Type(&self.model.uid),
        };
        self.ability.can(self.action(op), subject, field)
    }

    /// Fields granted for `op`, on one record if given.
    pub fn permitted_fields(&self, op: CrudOp, record: Option<&Value>) -> FieldSet {
        let subject = match record {
            Some(record) => Subject::record(&self.model.uid, record),
            None => Subject::Type(&self.model.uid),
        };
        self.ability.permitted_fields(self.action(op), subject)
    }

    /// Merged fields and row filter for `op`.
    pub fn relevant_rule(&self, op: CrudOp) -> RuleMatch {
        self.ability.relevant_rule_for(self.action(op), &self.model.uid)
    }
}

/// Boolean guards for the CRUD operations of one checker.
///
/// Created by [`PermissionChecker::can`] or [`PermissionChecker::cannot`];
/// narrowed with [`on`](Guard::on) and [`field`](Guard::field).
#[derive(Debug, Clone, Copy)]
pub struct Guard<'c> {
    checker: &'c PermissionChecker<'c>,
    negate: bool,
    record: Option<&'c Value>,
    field: Option<&'c str>,
}

impl<'c> Guard<'c> {
    fn new(checker: &'c PermissionChecker<'c>, negate: bool) -> Self {
        Self {
            checker,
            negate,
            record: None,
            field: None,
        }
    }

    /// Check against one record, evaluating rule conditions on it.
    pub fn on(mut self, record: &'c Value) -> Self {
        self.record = Some(record);
        self
    }

    /// Check access to one field.
    pub fn field(mut self, field: &'c str) -> Self {
        self.field = Some(field);
        self
    }

    /// Check an operation.
    pub fn check(&self, op: CrudOp) -> bool {
        self.checker.allows(op, self.record, self.field) != self.negate
    }

    /// Read guard.
    pub fn read(&self) -> bool {
        self.check(CrudOp::Read)
    }

    /// Create guard.
    pub fn create(&self) -> bool {
        self.check(CrudOp::Create)
    }

    /// Update guard.
    pub fn update(&self) -> bool {
        self.check(CrudOp::Update)
    }

    /// Delete guard.
    pub fn delete(&self) -> bool {
        self.check(CrudOp::Delete)
    }

    /// Publish guard.
    pub fn publish(&self) -> bool {
        self.check(CrudOp::Publish)
    }
}
