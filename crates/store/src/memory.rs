//! `MemoryStore` — in-process store, handy for tests and previews.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use engine::WorkflowTemplate;

use crate::{StoreError, TemplateStore};

/// Keeps deep copies of saved templates in a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    templates: RwLock<HashMap<String, WorkflowTemplate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store.
    pub fn with_templates(templates: impl IntoIterator<Item = WorkflowTemplate>) -> Self {
        let map = templates.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            templates: RwLock::new(map),
        }
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<WorkflowTemplate, StoreError> {
        self.templates
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    async fn save(&self, template: &WorkflowTemplate) -> Result<(), StoreError> {
        debug!("saving template '{}' in memory", template.id);
        self.templates
            .write()
            .await
            .insert(template.id.clone(), template.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.templates.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
