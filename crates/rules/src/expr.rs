//! Tagged rule representation and its wire format.
//!
//! Wire shape: a JSON object with exactly one operator key whose value is the
//! operand list, plus an optional `name` label:
//!
//! ```json
//! { ">=": [{ "var": "patient.vitals.systolic" }, 140], "name": "Hypertensive" }
//! ```
//!
//! Comparison operators take exactly two operands. `and` / `or` take a list of
//! nested rules and `!` takes a single nested rule.

use serde_json::{Map, Value};

use crate::RuleError;

const VAR_KEY: &str = "var";
const NAME_KEY: &str = "name";

// ---------------------------------------------------------------------------
// Operand
// ---------------------------------------------------------------------------

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A JSON literal used as-is.
    Literal(Value),
    /// A `{"var": "dotted.path"}` reference into the fact table.
    Variable(String),
}

impl Operand {
    fn from_value(value: &Value) -> Result<Self, RuleError> {
        if let Value::Object(map) = value {
            if let Some(path) = map.get(VAR_KEY) {
                if map.len() != 1 {
                    return Err(RuleError::InvalidVariable);
                }
                return match path {
                    Value::String(p) => Ok(Operand::Variable(p.clone())),
                    _ => Err(RuleError::InvalidVariable),
                };
            }
        }
        Ok(Operand::Literal(value.clone()))
    }

    fn to_value(&self) -> Value {
        match self {
            Operand::Literal(v) => v.clone(),
            Operand::Variable(path) => {
                let mut map = Map::new();
                map.insert(VAR_KEY.to_owned(), Value::String(path.clone()));
                Value::Object(map)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
}

impl Comparison {
    /// Wire symbol for this operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            "<" => Some(Self::LessThan),
            ">" => Some(Self::GreaterThan),
            "<=" => Some(Self::LessOrEqual),
            ">=" => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Expr
// ---------------------------------------------------------------------------

/// A parsed boolean expression over named facts.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        op: Comparison,
        left: Operand,
        right: Operand,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Parse a rule object. A `name` key at this level is skipped; nested
    /// labels are not kept by [`Expr::to_value`].
    pub fn from_value(value: &Value) -> Result<Self, RuleError> {
        let map = value.as_object().ok_or(RuleError::NotAnObject)?;
        if map.contains_key(NAME_KEY) {
            let mut operators = map.clone();
            operators.remove(NAME_KEY);
            return Self::from_operator_map(&operators);
        }
        Self::from_operator_map(map)
    }

    fn from_operator_map(map: &Map<String, Value>) -> Result<Self, RuleError> {
        if map.len() != 1 {
            return Err(RuleError::OperatorCount(map.len()));
        }
        // len() == 1 was checked above.
        let Some((operator, args)) = map.iter().next() else {
            return Err(RuleError::OperatorCount(0));
        };

        if let Some(op) = Comparison::from_symbol(operator) {
            let operands = args.as_array().ok_or_else(|| RuleError::Arity {
                operator: operator.clone(),
                expected: "a 2-element list",
                found: 1,
            })?;
            if operands.len() != 2 {
                return Err(RuleError::Arity {
                    operator: operator.clone(),
                    expected: "a 2-element list",
                    found: operands.len(),
                });
            }
            return Ok(Expr::Compare {
                op,
                left: Operand::from_value(&operands[0])?,
                right: Operand::from_value(&operands[1])?,
            });
        }

        match operator.as_str() {
            "and" | "or" => {
                let items = args.as_array().ok_or_else(|| RuleError::Arity {
                    operator: operator.clone(),
                    expected: "a non-empty list of rules",
                    found: 1,
                })?;
                if items.is_empty() {
                    return Err(RuleError::Arity {
                        operator: operator.clone(),
                        expected: "a non-empty list of rules",
                        found: 0,
                    });
                }
                let children = items
                    .iter()
                    .map(Expr::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if operator == "and" {
                    Expr::And(children)
                } else {
                    Expr::Or(children)
                })
            }
            "!" => {
                let inner = match args {
                    Value::Array(items) if items.len() == 1 => &items[0],
                    Value::Array(items) => {
                        return Err(RuleError::Arity {
                            operator: operator.clone(),
                            expected: "exactly one rule",
                            found: items.len(),
                        })
                    }
                    other => other,
                };
                Ok(Expr::Not(Box::new(Expr::from_value(inner)?)))
            }
            other => Err(RuleError::UnsupportedOperator(other.to_owned())),
        }
    }

    /// Wire representation (without a `name`).
    pub fn to_value(&self) -> Value {
        let (key, args) = match self {
            Expr::Compare { op, left, right } => (
                op.symbol(),
                Value::Array(vec![left.to_value(), right.to_value()]),
            ),
            Expr::And(children) => ("and", children.iter().map(Expr::to_value).collect()),
            Expr::Or(children) => ("or", children.iter().map(Expr::to_value).collect()),
            Expr::Not(inner) => ("!", Value::Array(vec![inner.to_value()])),
        };
        let mut map = Map::new();
        map.insert(key.to_owned(), args);
        Value::Object(map)
    }

    /// Every variable path referenced anywhere in the expression, in first-seen
    /// order, without duplicates.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Expr::Compare { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Variable(path) = operand {
                        if !out.contains(path) {
                            out.push(path.clone());
                        }
                    }
                }
            }
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.collect_variables(out);
                }
            }
            Expr::Not(inner) => inner.collect_variables(out),
        }
    }
}

// ---------------------------------------------------------------------------
// ParsedRule
// ---------------------------------------------------------------------------

/// A top-level rule: the expression plus its optional human label.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRule {
    pub expr: Expr,
    /// Carried alongside the operator key; never interpreted by evaluation.
    pub name: Option<String>,
}

impl ParsedRule {
    /// Parse the serialized wire form.
    ///
    /// # Errors
    /// Any [`RuleError`] describing why the string is not a supported rule.
    pub fn parse(serialized: &str) -> Result<Self, RuleError> {
        let value: Value = serde_json::from_str(serialized)
            .map_err(|e| RuleError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// A `name` that is not a string is ignored rather than rejected.
    pub fn from_value(value: &Value) -> Result<Self, RuleError> {
        let expr = Expr::from_value(value)?;
        let name = value
            .get(NAME_KEY)
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(Self { expr, name })
    }

    /// Re-serialize, keeping `name` next to the operator key.
    pub fn to_wire(&self) -> String {
        let mut value = self.expr.to_value();
        if let (Some(name), Value::Object(map)) = (&self.name, &mut value) {
            map.insert(NAME_KEY.to_owned(), Value::String(name.clone()));
        }
        value.to_string()
    }

    pub fn variables(&self) -> Vec<String> {
        self.expr.variables()
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_comparison_with_variable_and_literal() {
        let rule = ParsedRule::parse(r#"{"<": [{"var": "patient.age"}, 18]}"#).unwrap();
        assert_eq!(
            rule.expr,
            Expr::Compare {
                op: Comparison::LessThan,
                left: Operand::Variable("patient.age".into()),
                right: Operand::Literal(json!(18)),
            }
        );
        assert_eq!(rule.name, None);
    }

    #[test]
    fn name_is_kept_apart_from_operator() {
        let rule =
            ParsedRule::parse(r#"{"==": [{"var": "sex"}, "F"], "name": "Female patient"}"#)
                .unwrap();
        assert_eq!(rule.name.as_deref(), Some("Female patient"));
        assert!(matches!(rule.expr, Expr::Compare { op: Comparison::Equal, .. }));
    }

    #[test]
    fn to_wire_preserves_name_verbatim() {
        let source = json!({ ">=": [{ "var": "bp.systolic" }, 140], "name": "High  BP ✓" });
        let rule = ParsedRule::from_value(&source).unwrap();
        let reparsed: Value = serde_json::from_str(&rule.to_wire()).unwrap();
        assert_eq!(reparsed, source);
    }

    #[test]
    fn nested_logic_operators_parse() {
        let rule = ParsedRule::parse(
            r#"{"and": [{">": [{"var": "a"}, 1]}, {"!": [{"==": [{"var": "b"}, true]}]}]}"#,
        )
        .unwrap();
        match rule.expr {
            Expr::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], Expr::Not(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn variables_are_deduplicated_in_order() {
        let rule = ParsedRule::parse(
            r#"{"or": [{"<": [{"var": "x"}, {"var": "y"}]}, {"==": [{"var": "x"}, 0]}]}"#,
        )
        .unwrap();
        assert_eq!(rule.variables(), vec!["x", "y"]);
    }

    #[test]
    fn malformed_rules_are_rejected() {
        assert!(matches!(ParsedRule::parse("{not json"), Err(RuleError::InvalidJson(_))));
        assert!(matches!(ParsedRule::parse("[1, 2]"), Err(RuleError::NotAnObject)));
        assert!(matches!(
            ParsedRule::parse(r#"{"<": [1, 2], ">": [1, 2]}"#),
            Err(RuleError::OperatorCount(2))
        ));
        assert!(matches!(
            ParsedRule::parse(r#"{"in": [1, [1]]}"#),
            Err(RuleError::UnsupportedOperator(op)) if op == "in"
        ));
        assert!(matches!(
            ParsedRule::parse(r#"{"<": [1]}"#),
            Err(RuleError::Arity { found: 1, .. })
        ));
        assert!(matches!(
            ParsedRule::parse(r#"{"<": [{"var": 3}, 1]}"#),
            Err(RuleError::InvalidVariable)
        ));
    }

    #[test]
    fn non_string_name_is_ignored() {
        let rule = ParsedRule::parse(r#"{"<": [{"var": "patient.age"}, 18], "name": null}"#)
            .unwrap();
        assert_eq!(rule.name, None);
        assert_eq!(rule.variables(), vec!["patient.age"]);
        assert!(ParsedRule::parse(r#"{"<": [1, 2], "name": 7}"#).is_ok());
    }

    #[test]
    fn nested_rules_may_carry_names() {
        let rule = ParsedRule::parse(
            r#"{"and": [{">": [{"var": "a"}, 1], "name": "A high"}, {"!": [{"==": [{"var": "b"}, 2], "name": "B two"}]}], "name": "Both"}"#,
        )
        .unwrap();
        assert_eq!(rule.name.as_deref(), Some("Both"));
        assert_eq!(rule.variables(), vec!["a", "b"]);
        assert!(matches!(rule.expr, Expr::And(ref children) if children.len() == 2));
    }
}
