//! On-disk storage for case attachments.
//!
//! Files live under `<upload_dir>/<county>/<case id>/<uuid>`; the relative
//! key is what the attachment record stores as `storage_path`.

use std::path::{Component, Path, PathBuf};

use bson::oid::ObjectId;
use thiserror::Error;
use tracing::warn;

use bailbook_db::models::County;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid storage path")]
    InvalidPath,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes `bytes` and returns the relative storage key.
    pub async fn save(
        &self,
        county: County,
        case_id: ObjectId,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        let key = format!("{}/{}/{}", county.name(), case_id.to_hex(), uuid::Uuid::new_v4());
        let path = self.resolve(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(key)
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>, UploadError> {
        Ok(tokio::fs::read(self.resolve(key)?).await?)
    }

    /// Best effort: a file already gone is not an error.
    pub async fn remove(&self, key: &str) {
        let path = match self.resolve(key) {
            Ok(path) => path,
            Err(_) => return,
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove attachment file");
            }
        }
    }

    /// Joins a stored key onto the root, refusing anything that would
    /// escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, UploadError> {
        let relative = Path::new(key);
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !clean || key.is_empty() {
            return Err(UploadError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }
}
