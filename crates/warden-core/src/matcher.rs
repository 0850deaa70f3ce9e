//! In-memory evaluation of [`Filter`]s against JSON records.
//!
//! Used for record-level checks (`can(update, article)` on one record). The
//! query layer evaluates the same filters in its own `where` clause; both must
//! agree, so the semantics here stay close to the document-store convention:
//!
//! - dotted paths descend through objects and fan out over arrays;
//! - equality against an array field matches if any element is equal;
//! - equality of a populated relation (an object with an `id`) against a
//!   scalar compares the relation's `id`;
//! - ordering operators only compare numbers with numbers and strings with
//!   strings.

use std::cmp::Ordering;

use serde_json::Value;

use crate::filter::{FieldOp, Filter};

impl Filter {
    /// Evaluate this filter against a record.
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Filter::And(children) => children.iter().all(|f| f.matches(record)),
            Filter::Or(children) => children.iter().any(|f| f.matches(record)),
            Filter::Field { path, op } => op.matches(&resolve(record, path)),
        }
    }
}

impl FieldOp {
    fn matches(&self, candidates: &[&Value]) -> bool {
        match self {
            FieldOp::Eq(expected) => candidates.iter().any(|c| loosely_equal(c, expected)),
            FieldOp::Ne(expected) => !candidates.iter().any(|c| loosely_equal(c, expected)),
            FieldOp::In(values) => any_in(candidates, values),
            FieldOp::Nin(values) => !any_in(candidates, values),
            FieldOp::Lt(bound) => any_ordered(candidates, bound, |o| o == Ordering::Less),
            FieldOp::Lte(bound) => any_ordered(candidates, bound, |o| o != Ordering::Greater),
            FieldOp::Gt(bound) => any_ordered(candidates, bound, |o| o == Ordering::Greater),
            FieldOp::Gte(bound) => any_ordered(candidates, bound, |o| o != Ordering::Less),
            FieldOp::Exists(present) => !candidates.is_empty() == *present,
            FieldOp::ElemMatch(inner) => candidates.iter().any(|c| match c {
                Value::Array(items) => items.iter().any(|item| inner.matches(item)),
                _ => false,
            }),
        }
    }
}

/// Collect every value reachable at `path`.
fn resolve<'v>(record: &'v Value, path: &str) -> Vec<&'v Value> {
    let mut current = vec![record];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            step(value, segment, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

fn step<'v>(value: &'v Value, segment: &str, out: &mut Vec<&'v Value>) {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(segment) {
                out.push(found);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = segment.parse::<usize>() {
                if let Some(found) = items.get(index) {
                    out.push(found);
                    return;
                }
            }
            for item in items {
                if let Value::Object(map) = item {
                    if let Some(found) = map.get(segment) {
                        out.push(found);
                    }
                }
            }
        }
        _ => {}
    }
}

fn any_in(candidates: &[&Value], values: &[Value]) -> bool {
    candidates
        .iter()
        .any(|c| values.iter().any(|v| loosely_equal(c, v)))
}

fn any_ordered(candidates: &[&Value], bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    candidates.iter().any(|c| match c {
        Value::Array(items) => items
            .iter()
            .any(|item| compare(item, bound).is_some_and(&accept)),
        other => compare(other, bound).is_some_and(&accept),
    })
}

fn loosely_equal(candidate: &Value, expected: &Value) -> bool {
    if strictly_equal(candidate, expected) {
        return true;
    }
    match candidate {
        Value::Array(items) if !expected.is_array() => {
            items.iter().any(|item| loosely_equal(item, expected))
        }
        Value::Object(map) if !expected.is_object() => map
            .get("id")
            .is_some_and(|id| strictly_equal(id, expected)),
        _ => false,
    }
}

fn strictly_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(value: Value) -> Filter {
        Filter::from_json(&value).unwrap()
    }

    #[test]
    fn test_relation_shorthand() {
        let f = filter(json!({ "createdBy": 1 }));
        assert!(f.matches(&json!({ "createdBy": { "id": 1 } })));
        assert!(f.matches(&json!({ "createdBy": 1 })));
        assert!(!f.matches(&json!({ "createdBy": { "id": 9 } })));
        assert!(!f.matches(&json!({ "title": "x" })));
    }

    #[test]
    fn test_nested_path() {
        let f = filter(json!({ "createdBy.role": 3 }));
        assert!(f.matches(&json!({ "createdBy": { "id": 9, "role": { "id": 3 } } })));
        assert!(f.matches(&json!({ "createdBy": { "id": 9, "role": 3 } })));
        assert!(!f.matches(&json!({ "createdBy": { "id": 9, "role": 4 } })));
    }

    #[test]
    fn test_array_fan_out() {
        let f = filter(json!({ "tags.name": "rust" }));
        assert!(f.matches(&json!({ "tags": [{ "name": "go" }, { "name": "rust" }] })));
        assert!(!f.matches(&json!({ "tags": [] })));

        let f = filter(json!({ "labels": "a" }));
        assert!(f.matches(&json!({ "labels": ["b", "a"] })));
    }

    #[test]
    fn test_comparisons() {
        let f = filter(json!({ "age": { "$gte": 18, "$lt": 65 } }));
        assert!(f.matches(&json!({ "age": 18 })));
        assert!(f.matches(&json!({ "age": 30.5 })));
        assert!(!f.matches(&json!({ "age": 65 })));
        assert!(!f.matches(&json!({ "age": "30" })));
        assert!(!f.matches(&json!({})));
    }

    #[test]
    fn test_in_and_nin() {
        let f = filter(json!({ "status": { "$in": ["draft", "review"] } }));
        assert!(f.matches(&json!({ "status": "draft" })));
        assert!(!f.matches(&json!({ "status": "published" })));

        let f = filter(json!({ "status": { "$nin": ["draft"] } }));
        assert!(f.matches(&json!({ "status": "published" })));
        assert!(f.matches(&json!({})));
    }

    #[test]
    fn test_exists() {
        let f = filter(json!({ "publishedAt": { "$exists": true } }));
        assert!(f.matches(&json!({ "publishedAt": null })));
        assert!(!f.matches(&json!({})));
        assert!(f.negate().unwrap().matches(&json!({})));
    }

    #[test]
    fn test_elem_match() {
        let f = filter(json!({ "createdBy.roles": { "$elemMatch": { "id": { "$in": [1, 2] } } } }));
        assert!(f.matches(&json!({ "createdBy": { "roles": [{ "id": 5 }, { "id": 2 }] } })));
        assert!(!f.matches(&json!({ "createdBy": { "roles": [{ "id": 5 }] } })));
    }

    #[test]
    fn test_boolean_combinators() {
        let f = filter(json!({ "$or": [{ "a": 1 }, { "$and": [{ "b": 2 }, { "c": 3 }] }] }));
        assert!(f.matches(&json!({ "a": 1 })));
        assert!(f.matches(&json!({ "b": 2, "c": 3 })));
        assert!(!f.matches(&json!({ "b": 2 })));

        assert!(Filter::all().matches(&json!({})));
        assert!(!Filter::nothing().matches(&json!({})));
    }

    #[test]
    fn test_negation_never_widens() {
        let f = filter(json!({ "age": { "$lt": 18 } }));
        let negated = f.negate().unwrap();
        for record in [json!({ "age": 10 }), json!({ "age": 20 }), json!({})] {
            assert!(!(f.matches(&record) && negated.matches(&record)));
        }
    }
}
