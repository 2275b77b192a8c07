//! Template Store: a directory of `.tex` templates addressed by file name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

const TEMPLATE_EXTENSION: &str = "tex";

#[derive(Debug, Error)]
pub enum TemplateStoreError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid template identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Template I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Identifiers of all available templates, sorted.
    async fn list(&self) -> Result<Vec<String>, TemplateStoreError>;

    /// Raw text of one template.
    async fn load(&self, identifier: &str) -> Result<String, TemplateStoreError>;
}

pub struct DirTemplateStore {
    root: PathBuf,
}

impl DirTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, identifier: &str) -> Result<PathBuf, TemplateStoreError> {
        let is_plain_name = !identifier.is_empty()
            && !identifier.contains(['/', '\\'])
            && !identifier.starts_with('.');
        if !is_plain_name {
            return Err(TemplateStoreError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(self.root.join(identifier))
    }
}

fn is_template_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXTENSION)
}

#[async_trait]
impl TemplateStore for DirTemplateStore {
    async fn list(&self) -> Result<Vec<String>, TemplateStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Template directory {} does not exist", self.root.display());
                return Ok(vec![]);
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_template_file(&path) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn load(&self, identifier: &str) -> Result<String, TemplateStoreError> {
        let path = self.resolve(identifier)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TemplateStoreError::NotFound(identifier.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
