//! JSON file storage adapter.
//!
//! Each record lives in its own file, `<dir>/<id>.json`. Writes go to a
//! sibling temporary file first and are renamed into place, so a reader never
//! observes a half-written snapshot.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::traits::StorageAdapter;

/// A [`StorageAdapter`] backed by one JSON file.
#[derive(Clone, Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage for record `id` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, id: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{id}.json")),
        }
    }

    /// Storage at an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl StorageAdapter for FileStorage {
    async fn load(&self) -> Option<Value> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "state file unreadable");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring malformed state file");
                None
            }
        }
    }

    async fn store(&self, state: Value) -> StorageResult<()> {
        let data =
            serde_json::to_vec(&state).map_err(|e| StorageError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &data).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = data.len(), "state stored");
        Ok(())
    }
}
