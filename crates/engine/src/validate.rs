//! Structural checks over a workflow template: fatal violations and advisory findings.
//!
//! Checks:
//! 1. The starting step is set (once there are steps) and exists.
//! 2. Step ids are unique.
//! 3. Every branch targets an existing step.
//! 4. At most one unconditioned branch per step (advisory).
//! 5. Every step is reachable from the start (advisory).
//!
//! Cycles are legal. Validation never fails; it returns every violation
//! it finds, and [`Violation::is_fatal`] separates broken invariants from
//! advisory findings.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::{ordering::step_order, WorkflowTemplate};

/// One problem found in a template.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Violation {
    /// The template has steps but no starting step.
    #[error("template has steps but no starting step")]
    MissingStartingStep,

    #[error("starting step '{step_id}' does not exist")]
    UnknownStartingStep { step_id: String },

    #[error("duplicate step id '{step_id}'")]
    DuplicateStepId { step_id: String },

    #[error("branch {branch_index} of step '{step_id}' targets unknown step '{target_step_id}'")]
    DanglingBranch {
        step_id: String,
        branch_index: usize,
        target_step_id: String,
    },

    /// Only the first one can ever be selected.
    #[error("step '{step_id}' has {count} unconditioned branches")]
    MultipleDefaultBranches { step_id: String, count: usize },

    #[error("step '{step_id}' is not reachable from the starting step")]
    UnreachableStep { step_id: String },
}

impl Violation {
    /// True for violations of the template invariants; false for advisory
    /// findings the editor tolerates.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Violation::MultipleDefaultBranches { .. } | Violation::UnreachableStep { .. }
        )
    }
}

/// Validate `template` and return every violation found (empty when clean).
pub fn validate(template: &WorkflowTemplate) -> Vec<Violation> {
    let mut violations = Vec::new();

    // -----------------------------------------------------------------------
    // 1. Starting step
    // -----------------------------------------------------------------------
    let ids = template.step_ids();
    let mut start_ok = false;
    match template.starting_step_id.as_deref() {
        None if !template.steps.is_empty() => violations.push(Violation::MissingStartingStep),
        None => {}
        Some(start) if !ids.contains(start) => {
            if !template.steps.is_empty() {
                violations.push(Violation::UnknownStartingStep {
                    step_id: start.to_owned(),
                });
            }
        }
        Some(_) => start_ok = true,
    }

    // -----------------------------------------------------------------------
    // 2. Unique step ids
    // -----------------------------------------------------------------------
    let mut seen: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();
    for step in &template.steps {
        if !seen.insert(step.id.as_str()) && reported.insert(step.id.as_str()) {
            violations.push(Violation::DuplicateStepId {
                step_id: step.id.clone(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3 + 4. Branch targets and default branches
    // -----------------------------------------------------------------------
    for step in &template.steps {
        for (branch_index, branch) in step.branches.iter().enumerate() {
            if !ids.contains(branch.target_step_id.as_str()) {
                violations.push(Violation::DanglingBranch {
                    step_id: step.id.clone(),
                    branch_index,
                    target_step_id: branch.target_step_id.clone(),
                });
            }
        }

        let defaults = step.branches.iter().filter(|b| b.is_default()).count();
        if defaults > 1 {
            violations.push(Violation::MultipleDefaultBranches {
                step_id: step.id.clone(),
                count: defaults,
            });
        }
    }

    // -----------------------------------------------------------------------
    // 5. Reachability (only meaningful with a valid start)
    // -----------------------------------------------------------------------
    if start_ok {
        for step_id in step_order(template).unreachable {
            violations.push(Violation::UnreachableStep { step_id });
        }
    }

    violations
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemplateStep;

    fn fatal(violations: &[Violation]) -> Vec<&Violation> {
        violations.iter().filter(|v| v.is_fatal()).collect()
    }

    #[test]
    fn clean_template_has_no_violations() {
        let template = WorkflowTemplate::new("t").with_steps(
            "a",
            vec![
                TemplateStep::new("a", "A").to("b"),
                TemplateStep::new("b", "B").to("a"),
            ],
        );
        assert!(validate(&template).is_empty());
    }

    #[test]
    fn empty_template_is_valid_without_start() {
        assert!(validate(&WorkflowTemplate::new("t")).is_empty());
    }

    #[test]
    fn missing_start_is_reported() {
        let mut template =
            WorkflowTemplate::new("t").with_steps("a", vec![TemplateStep::new("a", "A")]);
        template.starting_step_id = None;
        assert_eq!(validate(&template), vec![Violation::MissingStartingStep]);
    }

    #[test]
    fn unknown_start_is_reported() {
        let template =
            WorkflowTemplate::new("t").with_steps("zzz", vec![TemplateStep::new("a", "A")]);
        assert_eq!(
            validate(&template),
            vec![Violation::UnknownStartingStep { step_id: "zzz".into() }]
        );
    }

    #[test]
    fn duplicate_ids_are_reported_once() {
        let template = WorkflowTemplate::new("t").with_steps(
            "a",
            vec![
                TemplateStep::new("a", "A"),
                TemplateStep::new("a", "A again"),
                TemplateStep::new("a", "A thrice"),
            ],
        );
        assert_eq!(
            validate(&template),
            vec![Violation::DuplicateStepId { step_id: "a".into() }]
        );
    }

    #[test]
    fn dangling_branch_is_reported() {
        let template = WorkflowTemplate::new("t")
            .with_steps("a", vec![TemplateStep::new("a", "A").to("ghost")]);
        let violations = validate(&template);
        assert!(matches!(
            violations.as_slice(),
            [Violation::DanglingBranch { step_id, branch_index: 0, target_step_id }]
                if step_id == "a" && target_step_id == "ghost"
        ));
    }

    #[test]
    fn advisory_findings_are_not_fatal() {
        let template = WorkflowTemplate::new("t").with_steps(
            "a",
            vec![
                TemplateStep::new("a", "A").to("b").to("b"),
                TemplateStep::new("b", "B"),
                TemplateStep::new("island", "I"),
            ],
        );
        let violations = validate(&template);
        assert_eq!(violations.len(), 2);
        assert!(violations.contains(&Violation::MultipleDefaultBranches {
            step_id: "a".into(),
            count: 2
        }));
        assert!(violations.contains(&Violation::UnreachableStep {
            step_id: "island".into()
        }));
        assert!(fatal(&violations).is_empty());
    }

    #[test]
    fn violations_render_readable_messages() {
        let v = Violation::DanglingBranch {
            step_id: "a".into(),
            branch_index: 2,
            target_step_id: "ghost".into(),
        };
        assert_eq!(v.to_string(), "branch 2 of step 'a' targets unknown step 'ghost'");
    }
}
