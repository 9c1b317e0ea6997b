//! Typed error type for the store crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("template '{0}' not found")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed template document: {0}")]
    Serde(#[from] serde_json::Error),

    /// Ids become file names, so path separators are refused.
    #[error("invalid template id '{0}'")]
    InvalidId(String),
}
