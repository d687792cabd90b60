//! Durable key-value slot for the signed-in resource.
//!
//! # Design
//! The session persists exactly one value under one namespaced key, so the
//! slot API is a single optional string: load, save, clear. Writes are
//! last-writer-wins with no locking; the session only writes in response to
//! one user action at a time.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

/// Namespaced key of the authenticated-user slot.
pub const SESSION_KEY: &str = "@followrivers.auth";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait KeyValueSlot: Send + Sync {
    async fn load(&self) -> Result<Option<String>, StorageError>;
    async fn save(&self, value: &str) -> Result<(), StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Slot stored as one file inside a directory.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    /// Slot for `key` under `dir`. The key is reduced to a safe file name.
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(file_name_for(key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn file_name_for(key: &str) -> String {
    let stem: String = key
        .trim_start_matches('@')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("{stem}.json")
}

#[async_trait]
impl KeyValueSlot for FileSlot {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, value: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await.map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "session slot written");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// In-memory slot.
#[derive(Debug, Default)]
pub struct MemorySlot {
    value: Mutex<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: &str) -> Self {
        Self {
            value: Mutex::new(Some(value.to_string())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueSlot for MemorySlot {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.lock().clone())
    }

    async fn save(&self, value: &str) -> Result<(), StorageError> {
        *self.lock() = Some(value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.lock() = None;
        Ok(())
    }
}
