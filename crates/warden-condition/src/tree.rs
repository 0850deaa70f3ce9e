//! Condition trees.
//!
//! A permission rule's `condition` combines named conditions:
//!
//! ```json
//! { "$or": [ { "name": "is-creator" }, { "$not": { "name": "is-archived" } } ] }
//! ```
//!
//! A [`ConditionTree`] is the parsed, unresolved form. Resolving it against
//! a registry yields a [`ResolvedCondition`], whose evaluation produces a
//! single [`Filter`] for the bound actor.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use warden_core::{Filter, RuntimeContext};

use crate::condition::Condition;
use crate::error::{ConditionError, ConditionResult};

/// A parsed condition tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionTree {
    /// A reference to a registered condition.
    Leaf(String),
    /// All children must hold.
    And(Vec<ConditionTree>),
    /// At least one child must hold.
    Or(Vec<ConditionTree>),
    /// The child must not hold.
    Not(Box<ConditionTree>),
}

impl ConditionTree {
    /// Reference a single condition.
    pub fn leaf(name: impl Into<String>) -> Self {
        ConditionTree::Leaf(name.into())
    }

    /// Disjunction of named conditions, the meaning of a legacy
    /// `conditions: [...]` list.
    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut leaves: Vec<ConditionTree> = names.into_iter().map(Self::leaf).collect();
        if leaves.len() == 1 {
            leaves.remove(0)
        } else {
            ConditionTree::Or(leaves)
        }
    }

    /// Parse the JSON form.
    ///
    /// An object with several keys is the conjunction of its parts.
    pub fn parse(value: &Value) -> ConditionResult<Self> {
        let Value::Object(map) = value else {
            return Err(ConditionError::InvalidTree(format!(
                "expected an object, found {value}"
            )));
        };
        if map.is_empty() {
            return Err(ConditionError::InvalidTree("empty condition".to_string()));
        }

        let mut parts = Vec::with_capacity(map.len());
        for (key, operand) in map {
            let part = match key.as_str() {
                "name" => match operand {
                    Value::String(name) if !name.is_empty() => ConditionTree::leaf(name),
                    other => {
                        return Err(ConditionError::InvalidTree(format!(
                            "condition name must be a non-empty string, found {other}"
                        )));
                    }
                },
                "$and" => ConditionTree::And(parse_list(key, operand)?),
                "$or" => ConditionTree::Or(parse_list(key, operand)?),
                "$not" => ConditionTree::Not(Box::new(Self::parse(operand)?)),
                other => {
                    return Err(ConditionError::InvalidTree(format!(
                        "unexpected key '{other}'"
                    )));
                }
            };
            parts.push(part);
        }

        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            ConditionTree::And(parts)
        })
    }

    /// Names of every referenced condition, in tree order.
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ConditionTree::Leaf(name) => out.push(name),
            ConditionTree::And(children) | ConditionTree::Or(children) => {
                for child in children {
                    child.collect_names(out);
                }
            }
            ConditionTree::Not(child) => child.collect_names(out),
        }
    }

    /// Serialize back to the JSON form.
    pub fn to_json(&self) -> Value {
        match self {
            ConditionTree::Leaf(name) => json!({ "name": name }),
            ConditionTree::And(children) => {
                json!({ "$and": children.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            ConditionTree::Or(children) => {
                json!({ "$or": children.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            ConditionTree::Not(child) => {
                let mut map = Map::new();
                map.insert("$not".to_string(), child.to_json());
                Value::Object(map)
            }
        }
    }
}

fn parse_list(key: &str, operand: &Value) -> ConditionResult<Vec<ConditionTree>> {
    match operand {
        Value::Array(items) => items.iter().map(ConditionTree::parse).collect(),
        other => Err(ConditionError::InvalidTree(format!(
            "{key} expects an array, found {other}"
        ))),
    }
}

/// A condition tree whose leaves are bound to registered handlers.
#[derive(Debug, Clone)]
pub enum ResolvedCondition {
    /// A registered condition.
    Leaf(Arc<dyn Condition>),
    /// Conjunction.
    And(Vec<ResolvedCondition>),
    /// Disjunction.
    Or(Vec<ResolvedCondition>),
    /// Negation.
    Not(Box<ResolvedCondition>),
}

impl ResolvedCondition {
    /// Evaluate against the context.
    ///
    /// The result is [`Filter::all`] when the condition holds for every
    /// record, [`Filter::nothing`] when it holds for none, and a restriction
    /// otherwise. Negations are pushed into the filter, so the result never
    /// contains operators outside the allow-list.
    pub fn evaluate(&self, ctx: &RuntimeContext) -> ConditionResult<Filter> {
        match self {
            ResolvedCondition::Leaf(condition) => {
                Ok(condition.evaluate(ctx)?.into_filter())
            }
            ResolvedCondition::And(children) => Ok(Filter::and(
                children
                    .iter()
                    .map(|c| c.evaluate(ctx))
                    .collect::<ConditionResult<Vec<_>>>()?,
            )),
            ResolvedCondition::Or(children) => Ok(Filter::or(
                children
                    .iter()
                    .map(|c| c.evaluate(ctx))
                    .collect::<ConditionResult<Vec<_>>>()?,
            )),
            ResolvedCondition::Not(child) => Ok(child.evaluate(ctx)?.negate()?),
        }
    }

    /// Ids of the resolved conditions, in tree order.
    pub fn ids(&self) -> Vec<String> {
        match self {
            ResolvedCondition::Leaf(condition) => vec![condition.id()],
            ResolvedCondition::And(children) | ResolvedCondition::Or(children) => {
                children.iter().flat_map(ResolvedCondition::ids).collect()
            }
            ResolvedCondition::Not(child) => child.ids(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionOutcome, FnCondition};
    use warden_core::Actor;

    fn fixed(name: &str, outcome: ConditionOutcome) -> ResolvedCondition {
        ResolvedCondition::Leaf(Arc::new(FnCondition::new(name, move |_| Ok(outcome.clone()))))
    }

    fn ctx() -> RuntimeContext {
        RuntimeContext::new(Actor::new(1))
    }

    #[test]
    fn test_parse_leaf_and_combinators() {
        let tree = ConditionTree::parse(&json!({
            "$or": [
                { "name": "is-creator" },
                { "$not": { "name": "is-archived" } }
            ]
        }))
        .unwrap();

        assert_eq!(
            tree,
            ConditionTree::Or(vec![
                ConditionTree::leaf("is-creator"),
                ConditionTree::Not(Box::new(ConditionTree::leaf("is-archived"))),
            ])
        );
        assert_eq!(tree.names(), vec!["is-creator", "is-archived"]);
        assert_eq!(ConditionTree::parse(&tree.to_json()).unwrap(), tree);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ConditionTree::parse(&json!("is-creator")).is_err());
        assert!(ConditionTree::parse(&json!({})).is_err());
        assert!(ConditionTree::parse(&json!({ "name": 3 })).is_err());
        assert!(ConditionTree::parse(&json!({ "$or": { "name": "a" } })).is_err());
        assert!(ConditionTree::parse(&json!({ "$where": "x" })).is_err());
    }

    #[test]
    fn test_any_of() {
        assert_eq!(ConditionTree::any_of(["a"]), ConditionTree::leaf("a"));
        assert_eq!(
            ConditionTree::any_of(["a", "b"]),
            ConditionTree::Or(vec![ConditionTree::leaf("a"), ConditionTree::leaf("b")])
        );
    }

    #[test]
    fn test_evaluate_combinators() {
        let mine = fixed("mine", Filter::eq("createdBy", 1).into());
        let never = fixed("never", false.into());
        let always = fixed("always", true.into());

        let or = ResolvedCondition::Or(vec![mine.clone(), never.clone()]);
        assert_eq!(or.evaluate(&ctx()).unwrap(), Filter::eq("createdBy", 1));

        let and = ResolvedCondition::And(vec![mine.clone(), never]);
        assert!(and.evaluate(&ctx()).unwrap().is_nothing());

        let and = ResolvedCondition::And(vec![mine, always]);
        assert_eq!(and.evaluate(&ctx()).unwrap(), Filter::eq("createdBy", 1));
    }

    #[test]
    fn test_evaluate_not_pushes_down() {
        let mine = fixed("mine", Filter::eq("createdBy", 1).into());
        let not = ResolvedCondition::Not(Box::new(mine));

        let filter = not.evaluate(&ctx()).unwrap();
        assert_eq!(filter.to_json(), json!({ "createdBy": { "$ne": 1 } }));

        let not_false = ResolvedCondition::Not(Box::new(fixed("never", false.into())));
        assert!(not_false.evaluate(&ctx()).unwrap().is_all());
    }

    #[test]
    fn test_evaluate_not_elem_match_fails() {
        let tags = Filter::field(
            "tags",
            warden_core::FieldOp::ElemMatch(Box::new(Filter::eq("name", "x"))),
        );
        let not = ResolvedCondition::Not(Box::new(fixed("tagged", tags.into())));
        assert!(matches!(
            not.evaluate(&ctx()),
            Err(ConditionError::Filter(_))
        ));
    }
}
