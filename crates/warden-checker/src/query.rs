//! Query sanitization.
//!
//! A listing query has the shape
//!
//! ```json
//! { "fields": ["title"], "populate": { "author": true }, "filters": {...}, "sort": "title:asc" }
//! ```
//!
//! Selections, populates, filters and sort keys on fields the actor may not
//! read are removed so a client cannot observe a hidden field indirectly.

use serde_json::{Map, Value};
use tracing::warn;
use warden_ability::FieldSet;
use warden_core::Filter;

use crate::checker::PermissionChecker;
use crate::config::CrudOp;
use crate::schema::{Attribute, ModelSchema};

const FIELDS: &str = "fields";
const POPULATE: &str = "populate";
const FILTERS: &str = "filters";
const SORT: &str = "sort";

impl PermissionChecker<'_> {
    /// Restrict a listing query to readable fields.
    ///
    /// When the actor may only read some fields and the query selects none,
    /// the readable top-level fields are selected explicitly.
    pub fn sanitize_query(&self, query: &Value) -> Value {
        let fields = self.relevant_rule(CrudOp::Read).fields;
        self.sanitize_query_for(self.model, query, &fields)
    }

    /// [`sanitize_query`](Self::sanitize_query) plus the row filter of the
    /// read permission, AND-ed into `filters`.
    ///
    /// Caller filters that use operators outside the allow-list are dropped.
    pub fn build_read_query(&self, query: &Value) -> Value {
        let rule = self.relevant_rule(CrudOp::Read);
        let mut sanitized = match self.sanitize_query_for(self.model, query, &rule.fields) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let requested = sanitized.get(FILTERS).and_then(|filters| {
            Filter::from_json(filters)
                .inspect_err(|err| {
                    warn!(model = %self.model.uid, error = %err, "Dropping invalid query filters");
                })
                .ok()
        });

        let combined = rule.filter.restrict(requested);
        if combined.is_all() {
            sanitized.remove(FILTERS);
        } else {
            sanitized.insert(FILTERS.to_string(), combined.to_json());
        }
        Value::Object(sanitized)
    }

    fn sanitize_query_for(&self, model: &ModelSchema, query: &Value, fields: &FieldSet) -> Value {
        let Value::Object(map) = query else {
            return query.clone();
        };
        let mut out = map.clone();

        match map.get(FIELDS) {
            Some(selection) => {
                out.insert(FIELDS.to_string(), self.select_fields(model, selection, fields));
            }
            None => {
                if !fields.is_all() {
                    out.insert(FIELDS.to_string(), Value::Array(self.readable_scalars(model, fields)));
                }
            }
        }

        set_or_remove(
            &mut out,
            POPULATE,
            map.get(POPULATE)
                .and_then(|populate| self.sanitize_populate(model, populate, fields)),
        );
        set_or_remove(
            &mut out,
            FILTERS,
            map.get(FILTERS)
                .and_then(|filters| self.sanitize_filters(model, filters, fields)),
        );
        set_or_remove(
            &mut out,
            SORT,
            map.get(SORT).and_then(|sort| sanitize_sort(sort, fields)),
        );

        Value::Object(out)
    }

    fn select_fields(&self, model: &ModelSchema, selection: &Value, fields: &FieldSet) -> Value {
        let requested = names(selection);
        if requested.iter().any(|f| f == "*") {
            return if fields.is_all() {
                selection.clone()
            } else {
                Value::Array(self.readable_scalars(model, fields))
            };
        }

        Value::Array(
            requested
                .into_iter()
                .filter(|f| fields.allows(f) || self.config.is_always_visible(f))
                .map(Value::String)
                .collect(),
        )
    }

    /// Always-visible keys followed by the readable scalar attributes.
    fn readable_scalars(&self, model: &ModelSchema, fields: &FieldSet) -> Vec<Value> {
        let mut out: Vec<String> = self.config.always_visible.clone();
        for name in fields.top_level().unwrap_or_default() {
            let scalar = matches!(model.attribute(&name), None | Some(Attribute::Scalar));
            if scalar && fields.allows(&name) && !out.contains(&name) {
                out.push(name);
            }
        }
        out.into_iter().map(Value::String).collect()
    }

    fn sanitize_populate(
        &self,
        model: &ModelSchema,
        populate: &Value,
        fields: &FieldSet,
    ) -> Option<Value> {
        let visible = |name: &str| {
            model
                .attribute(name)
                .is_some_and(|attr| attr.is_populatable() && fields.touches(name))
        };

        let everything = || {
            let kept: Vec<Value> = model
                .attributes
                .keys()
                .filter(|name| visible(name.as_str()))
                .cloned()
                .map(Value::String)
                .collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        };

        match populate {
            Value::Bool(false) => None,
            Value::Bool(true) if fields.is_all() => Some(populate.clone()),
            Value::Bool(true) => everything(),
            Value::String(_) | Value::Array(_) => {
                let requested = names(populate);
                if requested.iter().any(|n| n == "*") {
                    return if fields.is_all() {
                        Some(populate.clone())
                    } else {
                        everything()
                    };
                }
                let kept: Vec<Value> = requested
                    .into_iter()
                    .filter(|name| visible(name.as_str()))
                    .map(Value::String)
                    .collect();
                (!kept.is_empty()).then_some(Value::Array(kept))
            }
            Value::Object(map) => {
                let mut out = Map::new();
                for (name, nested) in map {
                    if !visible(name.as_str()) {
                        continue;
                    }
                    let nested = match (model.attribute(name), nested) {
                        (Some(Attribute::Relation { target }), Value::Object(_)) => {
                            match self.schema.model(target) {
                                Some(target_model) => {
                                    let target_fields = self
                                        .ability
                                        .relevant_rule_for(self.action(CrudOp::Read), target)
                                        .fields;
                                    self.sanitize_query_for(target_model, nested, &target_fields)
                                }
                                None => nested.clone(),
                            }
                        }
                        (Some(Attribute::Component { component, .. }), Value::Object(_)) => {
                            match self.schema.component(component) {
                                Some(schema) => {
                                    self.sanitize_query_for(schema, nested, &fields.descend(name))
                                }
                                None => nested.clone(),
                            }
                        }
                        _ => nested.clone(),
                    };
                    out.insert(name.clone(), nested);
                }
                (!out.is_empty()).then_some(Value::Object(out))
            }
            _ => None,
        }
    }

    /// Filters on fields the actor may not read are removed.
    ///
    /// Branches of `$and` and `$or` that end up empty are removed rather
    /// than kept as `{}`, which would match every row. Returns `None` when
    /// nothing is left.
    fn sanitize_filters(
        &self,
        model: &ModelSchema,
        filters: &Value,
        fields: &FieldSet,
    ) -> Option<Value> {
        let Value::Object(map) = filters else {
            return None;
        };

        let mut out = Map::new();
        for (key, operand) in map {
            let kept = match key.as_str() {
                "$and" | "$or" => self.sanitize_branches(model, operand, fields),
                op if op.starts_with('$') => None,
                field => self.sanitize_field_filter(model, field, operand, fields),
            };
            if let Some(operand) = kept {
                out.insert(key.clone(), operand);
            }
        }
        (!out.is_empty()).then_some(Value::Object(out))
    }

    fn sanitize_branches(
        &self,
        model: &ModelSchema,
        branches: &Value,
        fields: &FieldSet,
    ) -> Option<Value> {
        let Value::Array(items) = branches else {
            return None;
        };
        let kept: Vec<Value> = items
            .iter()
            .filter_map(|item| self.sanitize_filters(model, item, fields))
            .collect();
        (!kept.is_empty()).then_some(Value::Array(kept))
    }

    /// Predicate on one attribute of `model`.
    ///
    /// Relations are checked against the target model's read fields and
    /// components against the granted sub-paths, so nested predicates
    /// cannot reach hidden attributes.
    fn sanitize_field_filter(
        &self,
        model: &ModelSchema,
        field: &str,
        operand: &Value,
        fields: &FieldSet,
    ) -> Option<Value> {
        if let Some((head, rest)) = field.split_once('.') {
            if matches!(
                model.attribute(head),
                Some(Attribute::Relation { .. } | Attribute::Component { .. })
            ) {
                let nested =
                    Value::Object(Map::from_iter([(rest.to_string(), operand.clone())]));
                return self
                    .sanitize_field_filter(model, head, &nested, fields)
                    .and_then(|pruned| pruned.get(rest).cloned());
            }
        }

        match model.attribute(field) {
            Some(Attribute::Relation { target }) => {
                if !fields.allows(field) {
                    return None;
                }
                let target_fields = self
                    .ability
                    .relevant_rule_for(self.action(CrudOp::Read), target)
                    .fields;
                match self.schema.model(target) {
                    Some(schema) => self.sanitize_nested(schema, operand, &target_fields),
                    None => {
                        let anonymous = ModelSchema::new(target.as_str());
                        self.sanitize_nested(&anonymous, operand, &target_fields)
                    }
                }
            }
            Some(Attribute::Component { component, .. }) => {
                if !fields.touches(field) {
                    return None;
                }
                let component_fields = fields.descend(field);
                match self.schema.component(component) {
                    Some(schema) => self.sanitize_nested(schema, operand, &component_fields),
                    None => {
                        let anonymous = ModelSchema::new(component.as_str());
                        self.sanitize_nested(&anonymous, operand, &component_fields)
                    }
                }
            }
            _ => (fields.allows(field) || self.config.is_always_visible(field))
                .then(|| operand.clone()),
        }
    }

    /// Operand of a relation or component predicate.
    ///
    /// Operators apply to the attribute itself and are kept; plain keys
    /// name attributes of `model` and are checked like top-level ones.
    fn sanitize_nested(
        &self,
        model: &ModelSchema,
        operand: &Value,
        fields: &FieldSet,
    ) -> Option<Value> {
        let Value::Object(map) = operand else {
            return Some(operand.clone());
        };

        let mut out = Map::new();
        for (key, value) in map {
            let kept = match key.as_str() {
                "$and" | "$or" => match value {
                    Value::Array(items) => {
                        let kept: Vec<Value> = items
                            .iter()
                            .filter_map(|item| self.sanitize_nested(model, item, fields))
                            .collect();
                        (!kept.is_empty()).then_some(Value::Array(kept))
                    }
                    _ => None,
                },
                "$not" | "$elemMatch" => self.sanitize_nested(model, value, fields),
                op if op.starts_with('$') => Some(value.clone()),
                field => self.sanitize_field_filter(model, field, value, fields),
            };
            if let Some(value) = kept {
                out.insert(key.clone(), value);
            }
        }
        (!out.is_empty()).then_some(Value::Object(out))
    }
}

/// Split a `"a,b"` string or a string array into names.
fn names(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn sanitize_sort(sort: &Value, fields: &FieldSet) -> Option<Value> {
    let sortable = |entry: &str| {
        let field = entry.split(':').next().unwrap_or(entry).trim();
        !field.is_empty() && fields.allows(field)
    };

    match sort {
        Value::String(s) => {
            let entries: Vec<&str> = s.split(',').map(str::trim).filter(|e| sortable(*e)).collect();
            (!entries.is_empty()).then(|| Value::String(entries.join(",")))
        }
        Value::Object(map) => {
            let out: Map<String, Value> = map
                .iter()
                .filter(|(field, _)| fields.allows(field))
                .map(|(field, order)| (field.clone(), order.clone()))
                .collect();
            (!out.is_empty()).then_some(Value::Object(out))
        }
        Value::Array(items) => {
            let out: Vec<Value> = items.iter().filter_map(|item| sanitize_sort(item, fields)).collect();
            (!out.is_empty()).then_some(Value::Array(out))
        }
        _ => None,
    }
}

fn set_or_remove(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    match value {
        Some(value) => {
            map.insert(key.to_string(), value);
        }
        None => {
            map.remove(key);
        }
    }
}
