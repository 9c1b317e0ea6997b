//! Structural editor for workflow templates.
//!
//! Every operation takes the current template by reference and returns a new
//! one; the input is never mutated, so history snapshots stay valid.
//! Rejections come back as [`EngineError`] and leave nothing changed.
//!
//! Invariant kept by every accepted operation: no branch is left pointing at
//! a step id that does not exist, except dangling branches the template
//! already had before the call.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::graph::incoming_edges;
use crate::{Branch, BranchCondition, EngineError, TemplateStep, WorkflowTemplate};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Name given to steps created by insert / add-branch.
    pub placeholder_name: String,
    /// Title given to steps created by insert / add-branch.
    pub placeholder_title: String,
    /// Stamped into `lastEditedBy` on every accepted edit.
    pub editor: Option<String>,
    /// Maximum number of snapshots kept by the history; `None` is unbounded.
    pub history_limit: Option<usize>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            placeholder_name: "New step".to_owned(),
            placeholder_title: "New step".to_owned(),
            editor: None,
            history_limit: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// New condition for a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionInput {
    /// Serialized rule JSON.
    pub rule: String,
    /// Human label merged into the serialized rule as `name`.
    #[serde(default)]
    pub name: Option<String>,
}

/// Step fields editable in place; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StepDetails {
    pub name: Option<String>,
    pub title: Option<String>,
    pub form_id: Option<String>,
    pub expected_completion: Option<String>,
}

// ---------------------------------------------------------------------------
// StructuralEditor
// ---------------------------------------------------------------------------

/// Applies graph mutations to templates.
#[derive(Debug, Clone, Default)]
pub struct StructuralEditor {
    config: EditorConfig,
}

impl StructuralEditor {
    pub fn new(config: EditorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Create a placeholder step and a branch to it from `source_step_id`.
    ///
    /// The new step is appended last to `steps`.
    #[instrument(skip(self, template), fields(template_id = %template.id))]
    pub fn insert_step(
        &self,
        template: &WorkflowTemplate,
        source_step_id: &str,
    ) -> Result<WorkflowTemplate, EngineError> {
        let next = self.append_new_step(template, source_step_id)?;
        info!("inserted step after '{}'", source_step_id);
        Ok(next)
    }

    /// Same graph effect as [`Self::insert_step`]; offered where the caller
    /// is adding an outgoing branch rather than a step in sequence.
    #[instrument(skip(self, template), fields(template_id = %template.id))]
    pub fn add_branch(
        &self,
        template: &WorkflowTemplate,
        source_step_id: &str,
    ) -> Result<WorkflowTemplate, EngineError> {
        let next = self.append_new_step(template, source_step_id)?;
        info!("added branch to new step from '{}'", source_step_id);
        Ok(next)
    }

    /// Append a branch between two existing steps.
    pub fn connect_steps(
        &self,
        template: &WorkflowTemplate,
        source_step_id: &str,
        target_step_id: &str,
    ) -> Result<WorkflowTemplate, EngineError> {
        require_step(template, source_step_id)?;
        require_step(template, target_step_id)?;

        let mut next = template.clone();
        let branch = new_branch(&next, source_step_id, target_step_id);
        self.source_mut(&mut next, source_step_id)?.branches.push(branch);
        self.touch(&mut next, &[source_step_id]);

        info!("connected '{}' -> '{}'", source_step_id, target_step_id);
        Ok(next)
    }

    /// Point an existing branch at a different existing step.
    pub fn retarget_branch(
        &self,
        template: &WorkflowTemplate,
        source_step_id: &str,
        branch_index: usize,
        new_target_step_id: &str,
    ) -> Result<WorkflowTemplate, EngineError> {
        require_step(template, new_target_step_id)?;

        let mut next = template.clone();
        let branch = branch_mut(&mut next, source_step_id, branch_index)?;
        branch.target_step_id = new_target_step_id.to_owned();
        self.touch(&mut next, &[source_step_id]);

        info!(
            "branch {} of '{}' now targets '{}'",
            branch_index, source_step_id, new_target_step_id
        );
        Ok(next)
    }

    /// Set, replace or (with `None`) clear a branch's condition.
    ///
    /// When the input carries a `name` it is merged into the serialized rule.
    /// Otherwise a `name` already inside the new rule is kept, and only a rule
    /// without one inherits the label of the condition being replaced.
    pub fn set_branch_condition(
        &self,
        template: &WorkflowTemplate,
        source_step_id: &str,
        branch_index: usize,
        condition: Option<ConditionInput>,
    ) -> Result<WorkflowTemplate, EngineError> {
        let mut next = template.clone();
        let branch = branch_mut(&mut next, source_step_id, branch_index)?;

        branch.condition = condition.map(|input| {
            let previous = branch.condition.as_ref();
            let name = input
                .name
                .or_else(|| BranchCondition::new(input.rule.as_str()).name())
                .or_else(|| previous.and_then(BranchCondition::name));
            BranchCondition {
                id: previous.and_then(|c| c.id.clone()),
                rule: merge_name(&input.rule, name.as_deref()),
            }
        });
        self.touch(&mut next, &[source_step_id]);

        info!("updated condition of branch {} on '{}'", branch_index, source_step_id);
        Ok(next)
    }

    /// Remove one branch. The target step is left in place.
    pub fn remove_branch(
        &self,
        template: &WorkflowTemplate,
        source_step_id: &str,
        branch_index: usize,
    ) -> Result<WorkflowTemplate, EngineError> {
        let mut next = template.clone();
        branch_mut(&mut next, source_step_id, branch_index)?;
        self.source_mut(&mut next, source_step_id)?
            .branches
            .remove(branch_index);
        self.touch(&mut next, &[source_step_id]);

        info!("removed branch {} from '{}'", branch_index, source_step_id);
        Ok(next)
    }

    /// Edit a step's descriptive fields.
    pub fn update_step(
        &self,
        template: &WorkflowTemplate,
        step_id: &str,
        details: StepDetails,
    ) -> Result<WorkflowTemplate, EngineError> {
        let mut next = template.clone();
        let step = self.source_mut(&mut next, step_id)?;
        if let Some(name) = details.name {
            step.name = name;
        }
        if let Some(title) = details.title {
            step.title = title;
        }
        if let Some(form_id) = details.form_id {
            step.form_id = Some(form_id);
        }
        if let Some(expected) = details.expected_completion {
            step.expected_completion = Some(expected);
        }
        self.touch(&mut next, &[step_id]);
        Ok(next)
    }

    /// Make another existing step the entry point.
    pub fn set_starting_step(
        &self,
        template: &WorkflowTemplate,
        step_id: &str,
    ) -> Result<WorkflowTemplate, EngineError> {
        require_step(template, step_id)?;
        let mut next = template.clone();
        next.starting_step_id = Some(step_id.to_owned());
        self.touch(&mut next, &[]);

        info!("starting step is now '{}'", step_id);
        Ok(next)
    }

    /// Delete `step_id` together with every descendant left without a
    /// surviving parent, and strip branches into the deleted steps.
    ///
    /// # Errors
    /// - [`EngineError::StartingStepProtected`] for the starting step.
    /// - [`EngineError::UnknownStep`] if `step_id` is not in the template.
    #[instrument(skip(self, template), fields(template_id = %template.id))]
    pub fn delete_step(
        &self,
        template: &WorkflowTemplate,
        step_id: &str,
    ) -> Result<WorkflowTemplate, EngineError> {
        if template.is_starting_step(step_id) {
            warn!("refusing to delete starting step '{}'", step_id);
            return Err(EngineError::StartingStepProtected(step_id.to_owned()));
        }
        require_step(template, step_id)?;

        let doomed = deletion_set(template, step_id);

        let mut next = template.clone();
        next.steps.retain(|s| !doomed.contains(&s.id));

        let mut touched = Vec::new();
        for step in &mut next.steps {
            let before = step.branches.len();
            step.branches
                .retain(|b| !doomed.contains(&b.target_step_id));
            if step.branches.len() != before {
                touched.push(step.id.clone());
            }
        }
        let touched: Vec<&str> = touched.iter().map(String::as_str).collect();
        self.touch(&mut next, &touched);

        info!(
            "deleted {} step(s) starting from '{}': {:?}",
            doomed.len(),
            step_id,
            doomed
        );
        Ok(next)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn append_new_step(
        &self,
        template: &WorkflowTemplate,
        source_step_id: &str,
    ) -> Result<WorkflowTemplate, EngineError> {
        require_step(template, source_step_id)?;

        let mut next = template.clone();
        let step_id = fresh_id(&next.step_ids());
        let mut step = TemplateStep::new(step_id.clone(), self.config.placeholder_name.clone());
        step.title = self.config.placeholder_title.clone();

        let branch = new_branch(&next, source_step_id, &step_id);
        self.source_mut(&mut next, source_step_id)?.branches.push(branch);
        next.steps.push(step);
        self.touch(&mut next, &[source_step_id, step_id.as_str()]);
        Ok(next)
    }

    fn source_mut<'a>(
        &self,
        template: &'a mut WorkflowTemplate,
        step_id: &str,
    ) -> Result<&'a mut TemplateStep, EngineError> {
        template
            .step_mut(step_id)
            .ok_or_else(|| EngineError::UnknownStep(step_id.to_owned()))
    }

    /// Stamp edit metadata on the template and the given steps.
    fn touch(&self, template: &mut WorkflowTemplate, step_ids: &[&str]) {
        let now = Utc::now();
        template.last_edited = Some(now);
        if let Some(editor) = &self.config.editor {
            template.last_edited_by = Some(editor.clone());
        }
        for step in template
            .steps
            .iter_mut()
            .filter(|s| step_ids.contains(&s.id.as_str()))
        {
            step.last_edited = Some(now);
            if let Some(editor) = &self.config.editor {
                step.last_edited_by = Some(editor.clone());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cascading deletion
// ---------------------------------------------------------------------------

/// Ids removed by deleting `step_id`: the step itself plus every step
/// reachable from it whose parents are all being removed too.
///
/// Self-loops do not keep a step alive. The starting step is never included,
/// except when it is `step_id` itself.
pub fn deletion_set(template: &WorkflowTemplate, step_id: &str) -> HashSet<String> {
    let incoming = incoming_edges(template);
    let mut doomed: HashSet<String> = HashSet::from([step_id.to_owned()]);
    let mut stack = vec![step_id.to_owned()];

    // Each doomed step is expanded exactly once, which also bounds cycles.
    // A target that still has a live parent is re-checked when that parent
    // is doomed and expanded later.
    while let Some(current) = stack.pop() {
        let Some(step) = template.step(&current) else {
            continue;
        };
        for branch in &step.branches {
            let target = branch.target_step_id.as_str();
            if doomed.contains(target)
                || template.is_starting_step(target)
                || !template.contains_step(target)
            {
                continue;
            }
            let orphaned = incoming
                .get(target)
                .map_or(true, |parents| {
                    parents.iter().all(|p| p == target || doomed.contains(p))
                });
            if orphaned {
                doomed.insert(target.to_owned());
                stack.push(target.to_owned());
            }
        }
    }

    doomed
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

fn require_step(template: &WorkflowTemplate, step_id: &str) -> Result<(), EngineError> {
    if template.contains_step(step_id) {
        Ok(())
    } else {
        warn!("operation references unknown step '{}'", step_id);
        Err(EngineError::UnknownStep(step_id.to_owned()))
    }
}

fn branch_mut<'a>(
    template: &'a mut WorkflowTemplate,
    step_id: &str,
    index: usize,
) -> Result<&'a mut Branch, EngineError> {
    let step = template
        .step_mut(step_id)
        .ok_or_else(|| EngineError::UnknownStep(step_id.to_owned()))?;
    step.branches
        .get_mut(index)
        .ok_or_else(|| EngineError::UnknownBranch {
            step_id: step_id.to_owned(),
            index,
        })
}

fn new_branch(template: &WorkflowTemplate, source: &str, target: &str) -> Branch {
    let taken: HashSet<&str> = template
        .steps
        .iter()
        .flat_map(|s| s.branches.iter())
        .filter_map(|b| b.id.as_deref())
        .collect();
    Branch {
        id: Some(fresh_id(&taken)),
        ..Branch::new(source, target)
    }
}

/// A UUID v4 string not already in `taken`.
fn fresh_id(taken: &HashSet<&str>) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !taken.contains(id.as_str()) {
            return id;
        }
    }
}

/// Put `name` into the serialized rule object. Rules that are not JSON
/// objects are stored unchanged.
fn merge_name(rule: &str, name: Option<&str>) -> String {
    let Some(name) = name else {
        return rule.to_owned();
    };
    match serde_json::from_str::<Value>(rule) {
        Ok(Value::Object(mut map)) => {
            map.insert("name".to_owned(), Value::String(name.to_owned()));
            Value::Object(map).to_string()
        }
        _ => {
            warn!("condition rule is not a JSON object; name '{}' not stored", name);
            rule.to_owned()
        }
    }
}
