//! Structural query filters.
//!
//! A [`Filter`] is the only shape a condition may hand back to the engine and
//! the only shape the engine hands on to the query layer. Its operator
//! vocabulary is fixed by [`ALLOWED_OPERATORS`]; anything else is rejected
//! while parsing, so a condition handler cannot smuggle arbitrary operators
//! into a `where` clause.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use warden_core::Filter;
//!
//! let filter = Filter::from_json(&json!({ "createdBy": 1 })).unwrap();
//! assert!(filter.matches(&json!({ "createdBy": { "id": 1 } })));
//!
//! assert!(Filter::from_json(&json!({ "$where": "1 == 1" })).is_err());
//! ```

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{FilterError, FilterResult};

/// Operators a filter may contain.
pub const ALLOWED_OPERATORS: &[&str] = &[
    "$or",
    "$and",
    "$eq",
    "$ne",
    "$in",
    "$nin",
    "$lt",
    "$lte",
    "$gt",
    "$gte",
    "$exists",
    "$elemMatch",
];

/// Returns `true` if `operator` is part of the filter allow-list.
pub fn is_allowed_operator(operator: &str) -> bool {
    ALLOWED_OPERATORS.contains(&operator)
}

/// A structural filter over records.
///
/// `And(vec![])` matches every record and `Or(vec![])` matches none.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every child must match.
    And(Vec<Filter>),
    /// At least one child must match.
    Or(Vec<Filter>),
    /// A predicate on the value(s) found at a dotted path.
    Field {
        /// Dotted attribute path, e.g. `createdBy.role`.
        path: String,
        /// Predicate applied to the value(s) at `path`.
        op: FieldOp,
    },
}

/// A field-level predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to the value.
    Eq(Value),
    /// Not equal to the value.
    Ne(Value),
    /// Equal to one of the values.
    In(Vec<Value>),
    /// Equal to none of the values.
    Nin(Vec<Value>),
    /// Less than.
    Lt(Value),
    /// Less than or equal.
    Lte(Value),
    /// Greater than.
    Gt(Value),
    /// Greater than or equal.
    Gte(Value),
    /// Field presence.
    Exists(bool),
    /// Some element of an array field matches the nested filter.
    ElemMatch(Box<Filter>),
}

impl FieldOp {
    /// The wire name of this operator.
    pub fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq(_) => "$eq",
            FieldOp::Ne(_) => "$ne",
            FieldOp::In(_) => "$in",
            FieldOp::Nin(_) => "$nin",
            FieldOp::Lt(_) => "$lt",
            FieldOp::Lte(_) => "$lte",
            FieldOp::Gt(_) => "$gt",
            FieldOp::Gte(_) => "$gte",
            FieldOp::Exists(_) => "$exists",
            FieldOp::ElemMatch(_) => "$elemMatch",
        }
    }

    /// The operand as it appears on the wire.
    fn operand(&self) -> Value {
        match self {
            FieldOp::Eq(v)
            | FieldOp::Ne(v)
            | FieldOp::Lt(v)
            | FieldOp::Lte(v)
            | FieldOp::Gt(v)
            | FieldOp::Gte(v) => v.clone(),
            FieldOp::In(vs) | FieldOp::Nin(vs) => Value::Array(vs.clone()),
            FieldOp::Exists(b) => Value::Bool(*b),
            FieldOp::ElemMatch(inner) => inner.to_json(),
        }
    }

    /// Complement of this predicate.
    ///
    /// Ordering complements treat a missing field as not matching either
    /// side, so the negation is never wider than the exact complement.
    fn negate(&self, path: &str) -> FilterResult<FieldOp> {
        Ok(match self {
            FieldOp::Eq(v) => FieldOp::Ne(v.clone()),
            FieldOp::Ne(v) => FieldOp::Eq(v.clone()),
            FieldOp::In(vs) => FieldOp::Nin(vs.clone()),
            FieldOp::Nin(vs) => FieldOp::In(vs.clone()),
            FieldOp::Lt(v) => FieldOp::Gte(v.clone()),
            FieldOp::Lte(v) => FieldOp::Gt(v.clone()),
            FieldOp::Gt(v) => FieldOp::Lte(v.clone()),
            FieldOp::Gte(v) => FieldOp::Lt(v.clone()),
            FieldOp::Exists(b) => FieldOp::Exists(!b),
            FieldOp::ElemMatch(_) => {
                return Err(FilterError::NotNegatable {
                    path: path.to_string(),
                    operator: self.operator().to_string(),
                });
            }
        })
    }
}

impl Filter {
    /// A predicate on a single field.
    pub fn field(path: impl Into<String>, op: FieldOp) -> Self {
        Filter::Field {
            path: path.into(),
            op,
        }
    }

    /// Shorthand for `{path: value}`.
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(path, FieldOp::Eq(value.into()))
    }

    /// Shorthand for `{path: {$in: values}}`.
    pub fn is_in(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self::field(path, FieldOp::In(values))
    }

    /// The filter matching every record.
    pub fn all() -> Self {
        Filter::And(Vec::new())
    }

    /// The filter matching no record.
    pub fn nothing() -> Self {
        Filter::Or(Vec::new())
    }

    /// Whether this is the match-everything filter.
    pub fn is_all(&self) -> bool {
        matches!(self, Filter::And(children) if children.is_empty())
    }

    /// Whether this is the match-nothing filter.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Filter::Or(children) if children.is_empty())
    }

    /// Conjunction in canonical form.
    ///
    /// Nested conjunctions are flattened, duplicates removed and the
    /// remaining children sorted, so the result does not depend on input
    /// order. A single child is returned unwrapped.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut children = Vec::new();
        for filter in filters {
            match filter {
                Filter::And(nested) => children.extend(nested),
                other if other.is_nothing() => return Filter::nothing(),
                other => children.push(other),
            }
        }
        Self::canonical(children, Filter::And)
    }

    /// Disjunction in canonical form. See [`Filter::and`].
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut children = Vec::new();
        for filter in filters {
            match filter {
                Filter::Or(nested) => children.extend(nested),
                other if other.is_all() => return Filter::all(),
                other => children.push(other),
            }
        }
        Self::canonical(children, Filter::Or)
    }

    fn canonical(mut children: Vec<Filter>, wrap: fn(Vec<Filter>) -> Filter) -> Self {
        children.sort_by_cached_key(Filter::canonical_key);
        children.dedup();
        if children.len() == 1 {
            children.remove(0)
        } else {
            wrap(children)
        }
    }

    /// Stable string form used for ordering and deduplication.
    pub fn canonical_key(&self) -> String {
        self.to_json().to_string()
    }

    /// Logical negation, pushed down to the leaves.
    ///
    /// The result only uses allow-listed operators. Fails for filters that
    /// contain `$elemMatch`, which has no complement in the allow-list.
    pub fn negate(&self) -> FilterResult<Filter> {
        match self {
            Filter::And(children) => Ok(Filter::or(
                children
                    .iter()
                    .map(Filter::negate)
                    .collect::<FilterResult<Vec<_>>>()?,
            )),
            Filter::Or(children) => Ok(Filter::and(
                children
                    .iter()
                    .map(Filter::negate)
                    .collect::<FilterResult<Vec<_>>>()?,
            )),
            Filter::Field { path, op } => Ok(Filter::field(path.clone(), op.negate(path)?)),
        }
    }

    /// All field paths referenced by this filter, outermost first.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_paths(out);
                }
            }
            Filter::Field { path, .. } => out.push(path),
        }
    }

    /// Parse a filter from its JSON form, enforcing the operator allow-list.
    pub fn from_json(value: &Value) -> FilterResult<Filter> {
        let Value::Object(map) = value else {
            return Err(FilterError::Invalid(format!(
                "expected an object, found {}",
                kind(value)
            )));
        };

        let mut parts = Vec::with_capacity(map.len());
        for (key, operand) in map {
            match key.as_str() {
                "$and" => parts.push(Filter::and(parse_list(key, operand)?)),
                "$or" => parts.push(Filter::or(parse_list(key, operand)?)),
                op if op.starts_with('$') => {
                    return Err(FilterError::UnsupportedOperator(op.to_string()));
                }
                path => parts.push(parse_field(path, operand)?),
            }
        }
        Ok(Filter::and(parts))
    }

    /// Serialize to the JSON form understood by the query layer.
    pub fn to_json(&self) -> Value {
        match self {
            Filter::And(children) => single("$and", list(children)),
            Filter::Or(children) => single("$or", list(children)),
            Filter::Field { path, op } => match op {
                FieldOp::Eq(v) if !v.is_object() => single(path, v.clone()),
                op => single(path, single(op.operator(), op.operand())),
            },
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn list(children: &[Filter]) -> Value {
    Value::Array(children.iter().map(Filter::to_json).collect())
}

fn parse_list(key: &str, operand: &Value) -> FilterResult<Vec<Filter>> {
    let Value::Array(items) = operand else {
        return Err(FilterError::Invalid(format!(
            "{key} expects an array, found {}",
            kind(operand)
        )));
    };
    items.iter().map(Filter::from_json).collect()
}

fn parse_field(path: &str, operand: &Value) -> FilterResult<Filter> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(FilterError::Invalid(format!("invalid field path '{path}'")));
    }

    let ops = match operand {
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => map,
        other => return Ok(Filter::eq(path, other.clone())),
    };

    if ops.keys().any(|k| !k.starts_with('$')) {
        return Err(FilterError::Invalid(format!(
            "'{path}' mixes operators and plain keys"
        )));
    }

    let mut parts = Vec::with_capacity(ops.len());
    for (op, value) in ops {
        let parsed = match op.as_str() {
            "$eq" => FieldOp::Eq(value.clone()),
            "$ne" => FieldOp::Ne(value.clone()),
            "$lt" => FieldOp::Lt(value.clone()),
            "$lte" => FieldOp::Lte(value.clone()),
            "$gt" => FieldOp::Gt(value.clone()),
            "$gte" => FieldOp::Gte(value.clone()),
            "$in" => FieldOp::In(array_operand(path, op, value)?),
            "$nin" => FieldOp::Nin(array_operand(path, op, value)?),
            "$exists" => match value {
                Value::Bool(b) => FieldOp::Exists(*b),
                other => {
                    return Err(FilterError::Invalid(format!(
                        "$exists on '{path}' expects a boolean, found {}",
                        kind(other)
                    )));
                }
            },
            "$elemMatch" => FieldOp::ElemMatch(Box::new(Filter::from_json(value)?)),
            "$and" | "$or" => {
                return Err(FilterError::Invalid(format!(
                    "{op} is not valid on field '{path}'"
                )));
            }
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        };
        parts.push(Filter::field(path, parsed));
    }
    Ok(Filter::and(parts))
}

fn array_operand(path: &str, op: &str, value: &Value) -> FilterResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        other => Err(FilterError::Invalid(format!(
            "{op} on '{path}' expects an array, found {}",
            kind(other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_implicit_equality() {
        let filter = Filter::from_json(&json!({ "createdBy": 1 })).unwrap();
        assert_eq!(filter, Filter::eq("createdBy", 1));
    }

    #[test]
    fn test_parse_operators() {
        let filter =
            Filter::from_json(&json!({ "age": { "$gte": 18, "$lt": 65 } })).unwrap();
        match filter {
            Filter::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected a conjunction, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_operator() {
        let err = Filter::from_json(&json!({ "$where": "sleep(1000)" })).unwrap_err();
        assert_eq!(err, FilterError::UnsupportedOperator("$where".into()));

        let err = Filter::from_json(&json!({ "name": { "$regex": ".*" } })).unwrap_err();
        assert_eq!(err, FilterError::UnsupportedOperator("$regex".into()));

        let err = Filter::from_json(&json!({ "$not": { "a": 1 } })).unwrap_err();
        assert_eq!(err, FilterError::UnsupportedOperator("$not".into()));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Filter::from_json(&json!([1, 2])).is_err());
        assert!(Filter::from_json(&json!({ "a": { "$in": 3 } })).is_err());
        assert!(Filter::from_json(&json!({ "a": { "$exists": "yes" } })).is_err());
        assert!(Filter::from_json(&json!({ "a": { "$eq": 1, "b": 2 } })).is_err());
        assert!(Filter::from_json(&json!({ "a..b": 1 })).is_err());
    }

    #[test]
    fn test_or_is_canonical() {
        let a = Filter::eq("createdBy", 1);
        let b = Filter::eq("createdBy.role", 3);

        let left = Filter::or([a.clone(), b.clone()]);
        let right = Filter::or([b, a.clone(), a]);
        assert_eq!(left, right);
        assert_eq!(
            left.to_json(),
            json!({ "$or": [{ "createdBy": 1 }, { "createdBy.role": 3 }] })
        );
    }

    #[test]
    fn test_identity_elements() {
        let a = Filter::eq("a", 1);
        assert_eq!(Filter::and([Filter::all(), a.clone()]), a);
        assert_eq!(Filter::or([Filter::nothing(), a.clone()]), a);
        assert!(Filter::and([Filter::nothing(), a.clone()]).is_nothing());
        assert!(Filter::or([Filter::all(), a]).is_all());
    }

    #[test]
    fn test_negate_pushes_down() {
        let filter = Filter::or([Filter::eq("a", 1), Filter::is_in("b", vec![json!(2)])]);
        let negated = filter.negate().unwrap();
        assert_eq!(
            negated.to_json(),
            json!({ "$and": [{ "a": { "$ne": 1 } }, { "b": { "$nin": [2] } }] })
        );
        assert_eq!(negated.negate().unwrap(), filter);
    }

    #[test]
    fn test_negate_elem_match_fails() {
        let filter =
            Filter::from_json(&json!({ "roles": { "$elemMatch": { "id": 1 } } })).unwrap();
        assert!(matches!(
            filter.negate(),
            Err(FilterError::NotNegatable { .. })
        ));
    }

    #[test]
    fn test_round_trip_preserves_meaning() {
        let source = json!({
            "$or": [
                { "createdBy": 1 },
                { "roles": { "$elemMatch": { "id": { "$in": [1, 2] } } } }
            ]
        });
        let filter = Filter::from_json(&source).unwrap();
        assert_eq!(Filter::from_json(&filter.to_json()).unwrap(), filter);
    }

    #[test]
    fn test_paths() {
        let filter = Filter::and([Filter::eq("a", 1), Filter::eq("b.c", 2)]);
        assert_eq!(filter.paths(), vec!["a", "b.c"]);
    }
}
