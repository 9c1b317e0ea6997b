//! `rules` crate — branch-condition rules for workflow templates.
//!
//! A rule travels as a serialized JSON string such as
//! `{"<": [{"var": "patient.age"}, 18], "name": "Minor"}`.  This crate parses
//! it once into the tagged [`Expr`] tree and evaluates that tree against a
//! [`FactTable`], producing TRUE, FALSE or NOT_ENOUGH_DATA.

pub mod error;
pub mod expr;
pub mod facts;
pub mod eval;

pub use error::RuleError;
pub use expr::{Comparison, Expr, Operand, ParsedRule};
pub use facts::FactTable;
pub use eval::{evaluate_serialized, Evaluation, RuleStatus};
