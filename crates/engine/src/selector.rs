//! Branch selection — choose where a workflow goes next.
//!
//! Branches are evaluated strictly in stored order and the first one whose
//! condition is TRUE wins. A branch without a condition is an implicit
//! default and always evaluates TRUE. When every branch is FALSE or
//! NOT_ENOUGH_DATA the step has no selection and cannot advance on its own.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use rules::{evaluate_serialized, Evaluation, FactTable};

use crate::{Branch, EngineError, TemplateStep, WorkflowTemplate};

/// Evaluate one branch's condition against `facts`.
pub fn evaluate_branch(branch: &Branch, facts: &FactTable) -> Evaluation {
    match &branch.condition {
        None => Evaluation::unconditional(),
        Some(condition) => evaluate_serialized(&condition.rule, facts),
    }
}

/// The branch picked by [`select_branch`].
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    pub index: usize,
    pub branch: &'a Branch,
    pub evaluation: Evaluation,
}

/// Return the first branch whose condition is TRUE, stopping there.
pub fn select_branch<'a>(branches: &'a [Branch], facts: &FactTable) -> Option<Selection<'a>> {
    branches.iter().enumerate().find_map(|(index, branch)| {
        let evaluation = evaluate_branch(branch, facts);
        debug!(index, target = %branch.target_step_id, status = ?evaluation.status, "branch evaluated");
        evaluation.is_true().then_some(Selection { index, branch, evaluation })
    })
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Evaluation of one branch, as shown by the preview surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchReport {
    /// The branch id, or `<stepId>#<index>` when the branch has none.
    pub branch_id: String,
    pub target_step_id: String,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

/// Diagnostic view of every branch on one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub step_id: String,
    /// Index of the branch [`select_branch`] would pick.
    pub selected_index: Option<usize>,
    pub branches: Vec<BranchReport>,
}

impl PreviewReport {
    pub fn selected(&self) -> Option<&BranchReport> {
        self.selected_index.and_then(|i| self.branches.get(i))
    }

    /// The per-branch table keyed by branch id.
    pub fn by_branch_id(&self) -> BTreeMap<&str, &BranchReport> {
        self.branches
            .iter()
            .map(|r| (r.branch_id.as_str(), r))
            .collect()
    }
}

/// Evaluate every branch of `step` (not just up to the first TRUE) so the
/// caller can see why each one was or was not taken.
pub fn preview(step: &TemplateStep, facts: &FactTable) -> PreviewReport {
    let branches: Vec<BranchReport> = step
        .branches
        .iter()
        .enumerate()
        .map(|(index, branch)| BranchReport {
            branch_id: branch
                .id
                .clone()
                .unwrap_or_else(|| format!("{}#{}", step.id, index)),
            target_step_id: branch.target_step_id.clone(),
            evaluation: evaluate_branch(branch, facts),
        })
        .collect();

    let selected_index = branches.iter().position(|r| r.evaluation.is_true());

    PreviewReport {
        step_id: step.id.clone(),
        selected_index,
        branches,
    }
}

// ---------------------------------------------------------------------------
// Advancing
// ---------------------------------------------------------------------------

/// Where a workflow instance sitting on a step would go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    To {
        branch_index: usize,
        target_step_id: String,
        /// False when the branch points at a step the template lacks.
        /// Whether that is an error is up to the caller.
        target_exists: bool,
    },
    /// No branch evaluated TRUE.
    NoBranchSelected,
}

/// Resolve the next step for `step_id` given `facts`.
///
/// # Errors
/// [`EngineError::UnknownStep`] when `step_id` is not in the template.
pub fn next_step(
    template: &WorkflowTemplate,
    step_id: &str,
    facts: &FactTable,
) -> Result<Advance, EngineError> {
    let step = template
        .step(step_id)
        .ok_or_else(|| EngineError::UnknownStep(step_id.to_owned()))?;

    let Some(selection) = select_branch(&step.branches, facts) else {
        debug!(step_id, "no branch selected");
        return Ok(Advance::NoBranchSelected);
    };

    let target = &selection.branch.target_step_id;
    let target_exists = template.contains_step(target);
    if !target_exists {
        warn!(step_id, target = %target, "selected branch targets a missing step");
    }

    Ok(Advance::To {
        branch_index: selection.index,
        target_step_id: target.clone(),
        target_exists,
    })
}
