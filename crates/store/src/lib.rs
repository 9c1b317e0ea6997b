//! `store` crate — the persistence collaborator for workflow templates.
//!
//! Load-by-id and save of whole `WorkflowTemplate` documents. No business
//! logic lives here; the editor never calls it on its own.

pub mod error;
pub mod traits;
pub mod memory;
pub mod file;

pub use error::StoreError;
pub use traits::TemplateStore;
pub use memory::MemoryStore;
pub use file::FileStore;
