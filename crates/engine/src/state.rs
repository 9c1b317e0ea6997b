//! Editor state container.
//!
//! `EditorState` holds everything an editing session needs: the current
//! template, the selection, the undo history and any pending notice.
//! [`EditorState::reduce`] consumes the state and returns the next one, so
//! the template and the history cursor always move together:
//! - an accepted edit applies the new template and captures it;
//! - undo/redo move the cursor and apply that snapshot;
//! - a rejected edit changes neither and only sets a notice.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::editor::{ConditionInput, EditorConfig, StepDetails, StructuralEditor};
use crate::history::{History, Snapshot};
use crate::{EngineError, WorkflowTemplate};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Everything a caller can ask of the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EditorAction {
    InsertStep {
        source_step_id: String,
    },
    AddBranch {
        source_step_id: String,
    },
    ConnectSteps {
        source_step_id: String,
        target_step_id: String,
    },
    RetargetBranch {
        source_step_id: String,
        branch_index: usize,
        target_step_id: String,
    },
    SetBranchCondition {
        source_step_id: String,
        branch_index: usize,
        #[serde(default)]
        condition: Option<ConditionInput>,
    },
    RemoveBranch {
        source_step_id: String,
        branch_index: usize,
    },
    UpdateStep {
        step_id: String,
        details: StepDetails,
    },
    SetStartingStep {
        step_id: String,
    },
    DeleteStep {
        step_id: String,
    },
    SelectStep {
        step_id: String,
    },
    SelectBranch {
        step_id: String,
        branch_index: usize,
    },
    ClearSelection,
    Undo,
    Redo,
    /// The caller persisted the template successfully.
    MarkSaved,
    DismissNotice,
}

/// What a reduction did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected(EngineError),
    /// Nothing to do (undo at the oldest snapshot, redo at the newest).
    Unchanged,
}

/// A dismissable message shown after a rejected edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
}

impl From<&EngineError> for Notice {
    fn from(err: &EngineError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// EditorState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EditorState {
    template: WorkflowTemplate,
    selected_step_id: Option<String>,
    selected_branch_index: Option<usize>,
    history: History,
    notice: Option<Notice>,
    /// Last persisted state, for the dirty check.
    baseline: Snapshot,
    editor: StructuralEditor,
}

impl EditorState {
    /// Start a session on a freshly loaded template.
    pub fn new(template: WorkflowTemplate, config: EditorConfig) -> Self {
        let history = History::with_limit(&template, config.history_limit);
        Self {
            baseline: Snapshot::capture(&template),
            template,
            selected_step_id: None,
            selected_branch_index: None,
            history,
            notice: None,
            editor: StructuralEditor::new(config),
        }
    }

    pub fn template(&self) -> &WorkflowTemplate {
        &self.template
    }

    pub fn selected_step_id(&self) -> Option<&str> {
        self.selected_step_id.as_deref()
    }

    pub fn selected_branch_index(&self) -> Option<usize> {
        self.selected_branch_index
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// True when the template differs from the last saved one.
    pub fn is_dirty(&self) -> bool {
        &self.template != self.baseline.template()
    }

    /// Apply one action and return the next state.
    #[instrument(skip(self), fields(template_id = %self.template.id))]
    pub fn reduce(mut self, action: EditorAction) -> (Self, Outcome) {
        let edited = match action {
            EditorAction::InsertStep { source_step_id } => {
                self.editor.insert_step(&self.template, &source_step_id)
            }
            EditorAction::AddBranch { source_step_id } => {
                self.editor.add_branch(&self.template, &source_step_id)
            }
            EditorAction::ConnectSteps {
                source_step_id,
                target_step_id,
            } => self
                .editor
                .connect_steps(&self.template, &source_step_id, &target_step_id),
            EditorAction::RetargetBranch {
                source_step_id,
                branch_index,
                target_step_id,
            } => self.editor.retarget_branch(
                &self.template,
                &source_step_id,
                branch_index,
                &target_step_id,
            ),
            EditorAction::SetBranchCondition {
                source_step_id,
                branch_index,
                condition,
            } => self.editor.set_branch_condition(
                &self.template,
                &source_step_id,
                branch_index,
                condition,
            ),
            EditorAction::RemoveBranch {
                source_step_id,
                branch_index,
            } => self
                .editor
                .remove_branch(&self.template, &source_step_id, branch_index),
            EditorAction::UpdateStep { step_id, details } => {
                self.editor.update_step(&self.template, &step_id, details)
            }
            EditorAction::SetStartingStep { step_id } => {
                self.editor.set_starting_step(&self.template, &step_id)
            }
            EditorAction::DeleteStep { step_id } => {
                self.editor.delete_step(&self.template, &step_id)
            }

            EditorAction::SelectStep { step_id } => return self.select(step_id, None),
            EditorAction::SelectBranch {
                step_id,
                branch_index,
            } => return self.select(step_id, Some(branch_index)),
            EditorAction::ClearSelection => {
                self.selected_step_id = None;
                self.selected_branch_index = None;
                return (self, Outcome::Accepted);
            }
            EditorAction::Undo => return self.travel(true),
            EditorAction::Redo => return self.travel(false),
            EditorAction::MarkSaved => {
                self.history.clear(&self.template);
                self.baseline = Snapshot::capture(&self.template);
                info!("history cleared after save");
                return (self, Outcome::Accepted);
            }
            EditorAction::DismissNotice => {
                self.notice = None;
                return (self, Outcome::Accepted);
            }
        };

        self.commit(edited)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn commit(mut self, edited: Result<WorkflowTemplate, EngineError>) -> (Self, Outcome) {
        match edited {
            Ok(template) => {
                self.history.capture(&template);
                self.template = template;
                self.notice = None;
                self.reconcile_selection();
                (self, Outcome::Accepted)
            }
            Err(err) => {
                warn!("edit rejected: {}", err);
                self.notice = Some(Notice::from(&err));
                (self, Outcome::Rejected(err))
            }
        }
    }

    fn travel(mut self, back: bool) -> (Self, Outcome) {
        let restored = if back {
            self.history.undo().cloned()
        } else {
            self.history.redo().cloned()
        };
        match restored {
            Some(template) => {
                self.template = template;
                self.reconcile_selection();
                (self, Outcome::Accepted)
            }
            None => (self, Outcome::Unchanged),
        }
    }

    fn select(mut self, step_id: String, branch_index: Option<usize>) -> (Self, Outcome) {
        let err = match (self.template.step(&step_id), branch_index) {
            (None, _) => Some(EngineError::UnknownStep(step_id.clone())),
            (Some(step), Some(index)) if index >= step.branches.len() => {
                Some(EngineError::UnknownBranch {
                    step_id: step_id.clone(),
                    index,
                })
            }
            _ => None,
        };
        if let Some(err) = err {
            self.notice = Some(Notice::from(&err));
            return (self, Outcome::Rejected(err));
        }

        self.selected_step_id = Some(step_id);
        self.selected_branch_index = branch_index;
        (self, Outcome::Accepted)
    }

    /// Drop selection that no longer points at anything.
    fn reconcile_selection(&mut self) {
        let Some(step_id) = self.selected_step_id.as_deref() else {
            self.selected_branch_index = None;
            return;
        };
        match self.template.step(step_id) {
            None => {
                self.selected_step_id = None;
                self.selected_branch_index = None;
            }
            Some(step) => {
                if matches!(self.selected_branch_index, Some(i) if i >= step.branches.len()) {
                    self.selected_branch_index = None;
                }
            }
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemplateStep;
    use serde_json::json;

    fn session() -> EditorState {
        let template = WorkflowTemplate::new("Hypertension pathway").with_steps(
            "screen",
            vec![
                TemplateStep::new("screen", "Screen").to("refer"),
                TemplateStep::new("refer", "Refer").to("follow"),
                TemplateStep::new("follow", "Follow up"),
            ],
        );
        EditorState::new(template, EditorConfig::default())
    }

    #[test]
    fn accepted_edit_moves_template_and_history_together() {
        let (state, outcome) = session().reduce(EditorAction::InsertStep {
            source_step_id: "follow".into(),
        });
        assert_eq!(outcome, Outcome::Accepted);
        assert_eq!(state.template().steps.len(), 4);
        assert_eq!(state.history().current(), state.template());
        assert!(state.can_undo());
        assert!(state.is_dirty());
    }

    #[test]
    fn rejected_edit_sets_notice_only() {
        let start = session();
        let before = start.template().clone();
        let (state, outcome) = start.reduce(EditorAction::DeleteStep {
            step_id: "screen".into(),
        });
        assert_eq!(
            outcome,
            Outcome::Rejected(EngineError::StartingStepProtected("screen".into()))
        );
        assert_eq!(state.template(), &before);
        assert_eq!(state.history().len(), 1);
        assert!(state.notice().unwrap().message.contains("starting step"));

        let (state, _) = state.reduce(EditorAction::DismissNotice);
        assert!(state.notice().is_none());
    }

    #[test]
    fn deleting_selected_step_clears_selection() {
        let (state, _) = session().reduce(EditorAction::SelectBranch {
            step_id: "refer".into(),
            branch_index: 0,
        });
        assert_eq!(state.selected_step_id(), Some("refer"));
        assert_eq!(state.selected_branch_index(), Some(0));

        let (state, outcome) = state.reduce(EditorAction::DeleteStep {
            step_id: "refer".into(),
        });
        assert_eq!(outcome, Outcome::Accepted);
        assert_eq!(state.selected_step_id(), None);
        assert_eq!(state.selected_branch_index(), None);
        // `follow` lost its only parent.
        assert_eq!(state.template().steps.len(), 1);
    }

    #[test]
    fn undo_restores_and_reconciles_selection() {
        let (state, _) = session().reduce(EditorAction::InsertStep {
            source_step_id: "follow".into(),
        });
        let created = state.template().steps.last().unwrap().id.clone();
        let (state, _) = state.reduce(EditorAction::SelectStep { step_id: created });

        let (state, outcome) = state.reduce(EditorAction::Undo);
        assert_eq!(outcome, Outcome::Accepted);
        assert_eq!(state.template().steps.len(), 3);
        assert_eq!(state.selected_step_id(), None);
        assert!(!state.is_dirty());

        let (state, outcome) = state.reduce(EditorAction::Undo);
        assert_eq!(outcome, Outcome::Unchanged);
        let (state, outcome) = state.reduce(EditorAction::Redo);
        assert_eq!(outcome, Outcome::Accepted);
        assert_eq!(state.template().steps.len(), 4);
    }

    #[test]
    fn selecting_unknown_targets_is_rejected() {
        let (state, outcome) = session().reduce(EditorAction::SelectStep {
            step_id: "nope".into(),
        });
        assert!(matches!(outcome, Outcome::Rejected(EngineError::UnknownStep(_))));
        let (_, outcome) = state.reduce(EditorAction::SelectBranch {
            step_id: "follow".into(),
            branch_index: 0,
        });
        assert!(matches!(outcome, Outcome::Rejected(EngineError::UnknownBranch { .. })));
    }

    #[test]
    fn mark_saved_blocks_undo_and_resets_dirty() {
        let (state, _) = session().reduce(EditorAction::ConnectSteps {
            source_step_id: "follow".into(),
            target_step_id: "screen".into(),
        });
        let (state, _) = state.reduce(EditorAction::MarkSaved);
        assert!(!state.can_undo());
        assert!(!state.is_dirty());
        let (state, outcome) = state.reduce(EditorAction::Undo);
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(state.template().step("follow").unwrap().branches.len(), 1);
    }

    #[test]
    fn actions_deserialize_from_script_json() {
        let actions: Vec<EditorAction> = serde_json::from_value(json!([
            { "action": "insert_step", "sourceStepId": "a" },
            { "action": "set_branch_condition", "sourceStepId": "a", "branchIndex": 0,
              "condition": { "rule": "{\"<\":[{\"var\":\"age\"},18]}", "name": "Minor" } },
            { "action": "update_step", "stepId": "a", "details": { "title": "Intake" } },
            { "action": "undo" }
        ]))
        .unwrap();
        assert_eq!(
            actions[0],
            EditorAction::InsertStep { source_step_id: "a".into() }
        );
        assert!(matches!(
            &actions[1],
            EditorAction::SetBranchCondition { condition: Some(c), .. } if c.name.as_deref() == Some("Minor")
        ));
        assert_eq!(actions[3], EditorAction::Undo);
    }
}
