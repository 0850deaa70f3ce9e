//! Output and input sanitization.
//!
//! Sanitizers never fail and never modify their argument. Keys the actor may
//! not see or write are dropped silently.

use serde_json::{Map, Value, json};
use warden_ability::{FieldSet, Subject};

use crate::checker::PermissionChecker;
use crate::config::CrudOp;
use crate::schema::{Attribute, COMPONENT_KEY, ModelSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Output,
    Input,
}

impl PermissionChecker<'_> {
    /// Remove every attribute the actor may not read.
    ///
    /// Accepts one record or an array of records. Fields are computed per
    /// record, so conditional field grants apply to the records they match.
    /// Populated relations are checked against the target model's own read
    /// permission and collapse to `{id}` when it is missing.
    pub fn sanitize_output(&self, data: &Value) -> Value {
        self.output_records(self.model, data)
    }

    /// Keep only the attributes the actor may set when creating.
    pub fn sanitize_creation_input(&self, input: &Value) -> Value {
        let fields = self.permitted_fields(CrudOp::Create, None);
        self.project(self.model, input, &fields, Direction::Input)
    }

    /// Keep only the attributes the actor may change on `existing`.
    pub fn sanitize_update_input(&self, existing: &Value, input: &Value) -> Value {
        let fields = self.permitted_fields(CrudOp::Update, Some(existing));
        self.project(self.model, input, &fields, Direction::Input)
    }

    fn output_records(&self, model: &ModelSchema, data: &Value) -> Value {
        match data {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.output_records(model, item))
                    .collect(),
            ),
            Value::Object(_) => {
                let fields = self.ability.permitted_fields(
                    self.action(CrudOp::Read),
                    Subject::record(&model.uid, data),
                );
                self.project(model, data, &fields, Direction::Output)
            }
            other => other.clone(),
        }
    }

    fn project(
        &self,
        model: &ModelSchema,
        record: &Value,
        fields: &FieldSet,
        direction: Direction,
    ) -> Value {
        let Value::Object(map) = record else {
            return record.clone();
        };

        let mut out = Map::new();
        for (key, value) in map {
            if direction == Direction::Output && self.config.is_always_visible(key) {
                out.insert(key.clone(), value.clone());
                continue;
            }

            let kept = match model.attribute(key) {
                None | Some(Attribute::Scalar) => fields.allows(key).then(|| value.clone()),
                Some(Attribute::Relation { target }) => {
                    fields.allows(key).then(|| match direction {
                        Direction::Output => self.output_relation(target, value),
                        Direction::Input => value.clone(),
                    })
                }
                Some(Attribute::Component { component, .. }) => fields
                    .touches(key)
                    .then(|| self.project_component(component, value, &fields.descend(key), direction)),
                Some(Attribute::Dynamiczone { .. }) if fields.touches(key) => {
                    self.project_zone(value, &fields.descend(key), direction)
                }
                Some(Attribute::Dynamiczone { .. }) => None,
            };

            if let Some(value) = kept {
                out.insert(key.clone(), value);
            }
        }
        Value::Object(out)
    }

    fn output_relation(&self, target: &str, value: &Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.output_relation(target, item))
                    .collect(),
            ),
            Value::Object(map) => {
                let readable = self.ability.can(
                    self.action(CrudOp::Read),
                    Subject::record(target, value),
                    None,
                );
                match self.schema.model(target) {
                    Some(schema) if readable => self.output_records(schema, value),
                    _ => match map.get("id") {
                        Some(id) => json!({ "id": id }),
                        None => Value::Object(Map::new()),
                    },
                }
            }
            other => other.clone(),
        }
    }

    fn project_component(
        &self,
        uid: &str,
        value: &Value,
        fields: &FieldSet,
        direction: Direction,
    ) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.project_component(uid, item, fields, direction))
                    .collect(),
            ),
            Value::Object(_) => match self.schema.component(uid) {
                Some(schema) => self.project(schema, value, fields, direction),
                None => self.project(&ModelSchema::new(uid), value, fields, direction),
            },
            other => other.clone(),
        }
    }

    /// Entries without a component uid cannot be checked and are dropped.
    fn project_zone(
        &self,
        value: &Value,
        fields: &FieldSet,
        direction: Direction,
    ) -> Option<Value> {
        let items = match value {
            Value::Array(items) => items,
            Value::Null => return Some(Value::Null),
            _ => return None,
        };

        let entries = items
            .iter()
            .filter_map(|item| {
                let uid = item.get(COMPONENT_KEY).and_then(Value::as_str)?;
                let mut entry = self.project_component(uid, item, fields, direction);
                if let Value::Object(map) = &mut entry {
                    map.insert(COMPONENT_KEY.to_string(), Value::String(uid.to_string()));
                }
                Some(entry)
            })
            .collect();
        Some(Value::Array(entries))
    }
}
