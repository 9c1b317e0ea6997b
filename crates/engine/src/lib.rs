//! `engine` crate — workflow template graph: models, validation, display
//! ordering, branch selection, the structural editor and undo/redo history.

pub mod models;
pub mod error;
pub mod graph;
pub mod validate;
pub mod ordering;
pub mod selector;
pub mod editor;
pub mod history;
pub mod state;

pub use models::{Branch, BranchCondition, TemplateStep, WorkflowTemplate};
pub use error::EngineError;
pub use graph::incoming_edges;
pub use validate::{validate, Violation};
pub use ordering::{step_order, OrderedStep, StepOrder};
pub use selector::{next_step, preview, select_branch, Advance, BranchReport, PreviewReport};
pub use editor::{deletion_set, ConditionInput, EditorConfig, StepDetails, StructuralEditor};
pub use history::{History, Snapshot};
pub use state::{EditorAction, EditorState, Notice, Outcome};
