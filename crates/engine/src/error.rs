//! Engine-level error types.

use thiserror::Error;

/// A structural edit (or lookup) the engine refused.
///
/// These are non-fatal rejections: the template is left untouched and no
/// history entry is created. `Display` gives the reason shown to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The entry step of a template can never be deleted.
    #[error("step '{0}' is the starting step and cannot be deleted")]
    StartingStepProtected(String),

    /// An operation referenced a step id that is not in the template.
    #[error("unknown step '{0}'")]
    UnknownStep(String),

    /// A branch index past the end of the step's branch list.
    #[error("step '{step_id}' has no branch at index {index}")]
    UnknownBranch {
        step_id: String,
        index: usize,
    },
}
