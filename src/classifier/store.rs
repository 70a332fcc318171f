// Model blob storage.
//
// A deployment has exactly one model blob. A missing blob means "not trained
// yet" and is reported as `None`, not as an error.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Read the blob. `Ok(None)` when nothing has been stored yet.
    async fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the blob. Either the old or the new blob is visible afterwards,
    /// never a partial write.
    async fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Human-readable location for logs and status output.
    fn location(&self) -> String;
}

/// Stores the blob as a single file, replaced atomically via rename.
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read model file {}", self.path.display())),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create model directory {}", parent.display())
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to move model into {}", self.path.display()))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Model written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store for tests and embedding.
#[derive(Default)]
pub struct MemoryModelStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelStore for MemoryModelStore {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.lock().await.clone())
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        *self.blob.lock().await = Some(bytes.to_vec());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
