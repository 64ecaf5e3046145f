//! `when` predicates deciding whether a choreography fires for a signal.
//!
//! Comparisons never coerce: a string never equals a number, ordering only
//! applies to numbers, and a missing field fails every operator except
//! `exists: false`.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::WhenPolicy;
use crate::resolver::{lookup_path, SIGNAL_PREFIX};
use crate::signal::PerformanceSignal;

/// Comparison operator of a single condition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    #[serde(rename = "eq", alias = "==")]
    Eq,
    #[serde(rename = "neq", alias = "!=")]
    Neq,
    #[serde(rename = "gt", alias = ">")]
    Gt,
    #[serde(rename = "gte", alias = ">=")]
    Gte,
    #[serde(rename = "lt", alias = "<")]
    Lt,
    #[serde(rename = "lte", alias = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "notIn")]
    NotIn,
    #[serde(rename = "exists")]
    Exists,
}

/// `field <op> value`. `field` is a payload dot path, or `type` for the envelope type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(default)]
    pub op: Operator,
    #[serde(default)]
    pub value: JsonValue,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// One condition or a list of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhenClause {
    One(Condition),
    Many(Vec<Condition>),
}

impl WhenClause {
    pub fn conditions(&self) -> &[Condition] {
        match self {
            WhenClause::One(c) => std::slice::from_ref(c),
            WhenClause::Many(list) => list,
        }
    }
}

fn field_value<'a>(field: &str, signal: &'a PerformanceSignal) -> Option<Cow<'a, JsonValue>> {
    let path = field.strip_prefix(SIGNAL_PREFIX).unwrap_or(field);
    if path == "type" {
        return Some(Cow::Owned(JsonValue::String(signal.kind.clone())));
    }
    lookup_path(&signal.payload, path).map(Cow::Borrowed)
}

fn same_kind(a: &JsonValue, b: &JsonValue) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn strict_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => same_kind(a, b) && a == b,
    }
}

fn numeric(a: &JsonValue, b: &JsonValue, cmp: fn(f64, f64) -> bool) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => cmp(x, y),
        _ => false,
    }
}

/// Evaluate a single condition against a signal.
pub fn evaluate_condition(cond: &Condition, signal: &PerformanceSignal) -> bool {
    let actual = field_value(&cond.field, signal);
    if cond.op == Operator::Exists {
        let want = cond.value.as_bool().unwrap_or(true);
        return actual.is_some() == want;
    }
    let Some(actual) = actual else {
        return false;
    };
    let actual = actual.as_ref();
    let expected = &cond.value;
    match cond.op {
        Operator::Eq => strict_eq(actual, expected),
        Operator::Neq => same_kind(actual, expected) && !strict_eq(actual, expected),
        Operator::Gt => numeric(actual, expected, |x, y| x > y),
        Operator::Gte => numeric(actual, expected, |x, y| x >= y),
        Operator::Lt => numeric(actual, expected, |x, y| x < y),
        Operator::Lte => numeric(actual, expected, |x, y| x <= y),
        Operator::In => expected
            .as_array()
            .map_or(false, |set| set.iter().any(|v| strict_eq(actual, v))),
        Operator::NotIn => expected
            .as_array()
            .map_or(false, |set| !set.iter().any(|v| strict_eq(actual, v))),
        Operator::Exists => unreachable!("handled above"),
    }
}

/// `true` when there is no clause, otherwise combine per `policy`.
/// A clause with zero conditions always matches.
pub fn matches_when_with(
    when: Option<&WhenClause>,
    signal: &PerformanceSignal,
    policy: WhenPolicy,
) -> bool {
    let Some(clause) = when else {
        return true;
    };
    let conditions = clause.conditions();
    if conditions.is_empty() {
        return true;
    }
    match policy {
        WhenPolicy::All => conditions.iter().all(|c| evaluate_condition(c, signal)),
        WhenPolicy::Any => conditions.iter().any(|c| evaluate_condition(c, signal)),
    }
}

/// AND semantics across all listed conditions.
pub fn matches_when(when: Option<&WhenClause>, signal: &PerformanceSignal) -> bool {
    matches_when_with(when, signal, WhenPolicy::All)
}
