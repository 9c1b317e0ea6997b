//! Rule evaluation.
//!
//! Evaluation resolves every variable the rule references first. If any path
//! is absent the outcome is [`RuleStatus::NotEnoughData`] and the comparison is
//! never attempted; otherwise the expression is reduced to TRUE or FALSE.
//!
//! Comparison semantics are loose in the JSON-logic sense:
//! - numbers compare numerically, and a numeric string is coerced when the
//!   other side is a number;
//! - strings compare lexicographically (ISO dates order correctly);
//! - booleans and null only support (in)equality;
//! - any other pairing compares as FALSE.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{Comparison, Expr, FactTable, Operand, ParsedRule};

/// Three-valued outcome of evaluating one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    True,
    False,
    /// A referenced fact is missing, or the rule is malformed.
    NotEnoughData,
}

/// Full, auditable result of evaluating a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub status: RuleStatus,
    /// Variable path → value it resolved to.
    pub resolved_data: BTreeMap<String, Value>,
    /// Paths that could not be resolved.
    pub missing_variables: Vec<String>,
}

impl Evaluation {
    /// Outcome for a branch without any condition.
    pub fn unconditional() -> Self {
        Self {
            status: RuleStatus::True,
            resolved_data: BTreeMap::new(),
            missing_variables: Vec::new(),
        }
    }

    fn not_enough_data(missing_variables: Vec<String>) -> Self {
        Self {
            status: RuleStatus::NotEnoughData,
            resolved_data: BTreeMap::new(),
            missing_variables,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == RuleStatus::True
    }
}

/// Parse and evaluate a serialized rule. Parse failures become
/// `NOT_ENOUGH_DATA` instead of an error.
pub fn evaluate_serialized(serialized: &str, facts: &FactTable) -> Evaluation {
    match ParsedRule::parse(serialized) {
        Ok(rule) => rule.evaluate(facts),
        Err(e) => {
            debug!("rule failed to parse, treating as not enough data: {e}");
            Evaluation::not_enough_data(Vec::new())
        }
    }
}

impl ParsedRule {
    pub fn evaluate(&self, facts: &FactTable) -> Evaluation {
        self.expr.evaluate(facts)
    }
}

impl Expr {
    pub fn evaluate(&self, facts: &FactTable) -> Evaluation {
        let mut resolved_data = BTreeMap::new();
        let mut missing_variables = Vec::new();

        for path in self.variables() {
            match facts.lookup(&path) {
                Some(value) => {
                    resolved_data.insert(path, value.clone());
                }
                None => missing_variables.push(path),
            }
        }

        if !missing_variables.is_empty() {
            debug!(missing = ?missing_variables, "rule references absent facts");
            return Evaluation {
                status: RuleStatus::NotEnoughData,
                resolved_data,
                missing_variables,
            };
        }

        let status = if self.holds(&resolved_data) {
            RuleStatus::True
        } else {
            RuleStatus::False
        };
        debug!(?status, "rule evaluated");

        Evaluation {
            status,
            resolved_data,
            missing_variables,
        }
    }

    /// Every variable in `resolved` must already be present.
    fn holds(&self, resolved: &BTreeMap<String, Value>) -> bool {
        match self {
            Expr::Compare { op, left, right } => {
                match (resolve(left, resolved), resolve(right, resolved)) {
                    (Some(l), Some(r)) => compare(*op, l, r),
                    _ => false,
                }
            }
            Expr::And(children) => children.iter().all(|c| c.holds(resolved)),
            Expr::Or(children) => children.iter().any(|c| c.holds(resolved)),
            Expr::Not(inner) => !inner.holds(resolved),
        }
    }
}

fn resolve<'a>(operand: &'a Operand, resolved: &'a BTreeMap<String, Value>) -> Option<&'a Value> {
    match operand {
        Operand::Literal(v) => Some(v),
        Operand::Variable(path) => resolved.get(path),
    }
}

// ---------------------------------------------------------------------------
// Loose comparison
// ---------------------------------------------------------------------------

fn compare(op: Comparison, left: &Value, right: &Value) -> bool {
    match op {
        Comparison::Equal => loose_eq(left, right),
        Comparison::NotEqual => !loose_eq(left, right),
        Comparison::LessThan => loose_cmp(left, right) == Some(Ordering::Less),
        Comparison::GreaterThan => loose_cmp(left, right) == Some(Ordering::Greater),
        Comparison::LessOrEqual => {
            matches!(loose_cmp(left, right), Some(Ordering::Less | Ordering::Equal))
        }
        Comparison::GreaterOrEqual => {
            matches!(loose_cmp(left, right), Some(Ordering::Greater | Ordering::Equal))
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        // `parse` also accepts "inf" and "NaN"; those are not numbers here.
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn loose_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => {
            as_number(left)?.partial_cmp(&as_number(right)?)
        }
        _ => None,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => {
            matches!((as_number(left), as_number(right)), (Some(l), Some(r)) if l == r)
        }
        _ => left == right,
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MINOR: &str = r#"{"<": [{"var": "patient.age"}, 18]}"#;

    #[test]
    fn minor_rule_is_true_for_child() {
        let facts = FactTable::new(json!({ "patient": { "age": 10 } }));
        let eval = evaluate_serialized(MINOR, &facts);
        assert_eq!(eval.status, RuleStatus::True);
        assert_eq!(eval.resolved_data["patient.age"], json!(10));
        assert!(eval.missing_variables.is_empty());
    }

    #[test]
    fn minor_rule_is_false_for_adult() {
        let facts = FactTable::new(json!({ "patient": { "age": 20 } }));
        assert_eq!(evaluate_serialized(MINOR, &facts).status, RuleStatus::False);
    }

    #[test]
    fn minor_rule_lacks_data_without_age() {
        let facts = FactTable::new(json!({ "patient": {} }));
        let eval = evaluate_serialized(MINOR, &facts);
        assert_eq!(eval.status, RuleStatus::NotEnoughData);
        assert_eq!(eval.missing_variables, vec!["patient.age"]);
    }

    #[test]
    fn malformed_rule_lacks_data_instead_of_failing() {
        let facts = FactTable::new(json!({}));
        let eval = evaluate_serialized("{\"<\": ", &facts);
        assert_eq!(eval.status, RuleStatus::NotEnoughData);
        assert!(eval.missing_variables.is_empty());
    }

    #[test]
    fn boundary_operators() {
        let facts = FactTable::new(json!({ "score": 5 }));
        let check = |rule: &str| evaluate_serialized(rule, &facts).status;
        assert_eq!(check(r#"{"<=": [{"var": "score"}, 5]}"#), RuleStatus::True);
        assert_eq!(check(r#"{">=": [{"var": "score"}, 5]}"#), RuleStatus::True);
        assert_eq!(check(r#"{">": [{"var": "score"}, 5]}"#), RuleStatus::False);
        assert_eq!(check(r#"{"==": [{"var": "score"}, 5.0]}"#), RuleStatus::True);
        assert_eq!(check(r#"{"!=": [{"var": "score"}, 5]}"#), RuleStatus::False);
    }

    #[test]
    fn numeric_strings_are_coerced_against_numbers() {
        let facts = FactTable::new(json!({ "reading": "12.5" }));
        let eval = evaluate_serialized(r#"{">": [{"var": "reading"}, 12]}"#, &facts);
        assert_eq!(eval.status, RuleStatus::True);
    }

    #[test]
    fn incomparable_values_are_false() {
        let facts = FactTable::new(json!({ "flag": true, "tags": ["a"] }));
        assert_eq!(
            evaluate_serialized(r#"{"<": [{"var": "flag"}, 1]}"#, &facts).status,
            RuleStatus::False
        );
        assert_eq!(
            evaluate_serialized(r#"{">": [{"var": "tags"}, "a"]}"#, &facts).status,
            RuleStatus::False
        );
    }

    #[test]
    fn string_comparison_orders_iso_dates() {
        let facts = FactTable::new(json!({ "lastVisit": "2024-03-01" }));
        let eval = evaluate_serialized(r#"{"<": [{"var": "lastVisit"}, "2024-06-01"]}"#, &facts);
        assert_eq!(eval.status, RuleStatus::True);
    }

    #[test]
    fn any_missing_variable_in_compound_rule_lacks_data() {
        let facts = FactTable::new(json!({ "a": 1 }));
        let eval = evaluate_serialized(
            r#"{"or": [{"==": [{"var": "a"}, 1]}, {"==": [{"var": "b"}, 2]}]}"#,
            &facts,
        );
        assert_eq!(eval.status, RuleStatus::NotEnoughData);
        assert_eq!(eval.resolved_data["a"], json!(1));
        assert_eq!(eval.missing_variables, vec!["b"]);
    }

    #[test]
    fn non_numeric_spellings_are_not_coerced() {
        let check = |reading: Value| {
            let facts = FactTable::new(json!({ "reading": reading }));
            [">", "<", "=="]
                .map(|op| {
                    let rule = json!({ op: [{ "var": "reading" }, 1000] }).to_string();
                    evaluate_serialized(&rule, &facts).status
                })
        };
        for reading in ["inf", "-infinity", "NaN", ""] {
            assert_eq!(
                check(json!(reading)),
                [RuleStatus::False; 3],
                "reading {reading:?}"
            );
        }
        assert_eq!(
            check(json!(" 1500 ")),
            [RuleStatus::True, RuleStatus::False, RuleStatus::False]
        );
    }

    #[test]
    fn logic_operators_combine() {
        let facts = FactTable::new(json!({ "a": 1, "b": 2 }));
        let check = |rule: &str| evaluate_serialized(rule, &facts).status;
        assert_eq!(
            check(r#"{"and": [{"==": [{"var": "a"}, 1]}, {"==": [{"var": "b"}, 3]}]}"#),
            RuleStatus::False
        );
        assert_eq!(
            check(r#"{"or": [{"==": [{"var": "a"}, 1]}, {"==": [{"var": "b"}, 3]}]}"#),
            RuleStatus::True
        );
        assert_eq!(check(r#"{"!": {"==": [{"var": "a"}, 2]}}"#), RuleStatus::True);
    }

    #[test]
    fn status_serializes_in_screaming_case() {
        assert_eq!(
            serde_json::to_value(RuleStatus::NotEnoughData).unwrap(),
            json!("NOT_ENOUGH_DATA")
        );
        let eval = Evaluation::unconditional();
        let value = serde_json::to_value(&eval).unwrap();
        assert_eq!(value["status"], json!("TRUE"));
        assert!(value.get("resolvedData").is_some());
        assert!(value.get("missingVariables").is_some());
    }
}
