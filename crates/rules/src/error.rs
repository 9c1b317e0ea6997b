//! Rule parsing error type.

use thiserror::Error;

/// Reasons a serialized rule could not be turned into an [`crate::Expr`].
///
/// The evaluator never returns these directly; a rule that fails to parse
/// evaluates to `NOT_ENOUGH_DATA`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The serialized form is not JSON at all.
    #[error("rule is not valid JSON: {0}")]
    InvalidJson(String),

    /// The rule (or a nested rule) is not a JSON object.
    #[error("rule must be a JSON object")]
    NotAnObject,

    /// A rule object must name exactly one operator.
    #[error("rule must contain exactly one operator key, found {0}")]
    OperatorCount(usize),

    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),

    /// Operand list has the wrong shape for the operator.
    #[error("operator '{operator}' expects {expected}, got {found} operand(s)")]
    Arity {
        operator: String,
        expected: &'static str,
        found: usize,
    },

    /// `{"var": ...}` whose path is not a string.
    #[error("variable reference must be a dotted string path")]
    InvalidVariable,
}
