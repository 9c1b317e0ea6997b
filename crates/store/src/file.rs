//! `FileStore` — one pretty-printed `<id>.json` document per template.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{info, instrument};

use engine::WorkflowTemplate;

use crate::{StoreError, TemplateStore};

/// Directory-backed store.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let usable = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(['/', '\\']);
        if !usable {
            return Err(StoreError::InvalidId(id.to_owned()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

#[async_trait]
impl TemplateStore for FileStore {
    #[instrument(skip(self))]
    async fn load(&self, id: &str) -> Result<WorkflowTemplate, StoreError> {
        let path = self.path_for(id)?;
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_owned()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    #[instrument(skip(self, template), fields(template_id = %template.id))]
    async fn save(&self, template: &WorkflowTemplate) -> Result<(), StoreError> {
        let path = self.path_for(&template.id)?;
        fs::create_dir_all(&self.root).await?;

        // Write beside the target and rename so a failed write never leaves
        // a truncated document behind.
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(template)?;
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;

        info!("saved template to {}", path.display());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
