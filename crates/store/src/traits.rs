//! `TemplateStore`: load, save and list templates by id.

use async_trait::async_trait;
use engine::WorkflowTemplate;

use crate::StoreError;

/// Loads and saves template documents by id.
///
/// A successful `save` is the only signal that lets a caller clear its undo
/// history; a failed one must leave the editing session untouched.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch a template by id.
    async fn load(&self, id: &str) -> Result<WorkflowTemplate, StoreError>;

    /// Insert or replace the template stored under `template.id`.
    async fn save(&self, template: &WorkflowTemplate) -> Result<(), StoreError>;

    /// Ids of all stored templates, sorted.
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}
