//! Storage backend abstraction.
//!
//! Both storage media expose the same five operations over physical
//! identifiers (see [`crate::naming`]). Which one is active is decided by the
//! [`StorageHandle`]: no handle means the key-value store, a directory handle
//! means note files in that directory.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// Which storage medium a backend writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    KeyValue,
    Directory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::KeyValue => write!(f, "key-value store"),
            BackendKind::Directory => write!(f, "directory"),
        }
    }
}

/// Reference to the active storage medium, persisted across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageHandle {
    pub dir: Option<PathBuf>,
}

impl StorageHandle {
    pub fn key_value() -> Self {
        Self { dir: None }
    }

    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    pub fn kind(&self) -> BackendKind {
        if self.dir.is_some() {
            BackendKind::Directory
        } else {
            BackendKind::KeyValue
        }
    }
}

/// Uniform byte-level access to one storage medium.
///
/// Implementations do no caching: `list` hits the medium on every call.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Handle that re-opens this backend
    fn handle(&self) -> StorageHandle;

    /// Read the bytes stored under `id`; [`crate::VaultError::NotFound`] if absent.
    async fn read(&self, id: &str) -> Result<Vec<u8>>;

    /// Create or overwrite `id`.
    async fn write(&self, id: &str, data: &[u8]) -> Result<()>;

    /// Remove `id`. Removing a missing entry succeeds.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Physical identifiers of every note entry on the medium.
    async fn list(&self) -> Result<Vec<String>>;

    /// Move `old_id` to `new_id`. Not atomic: copy, then delete.
    async fn rename(&self, old_id: &str, new_id: &str) -> Result<()> {
        let data = self.read(old_id).await?;
        self.write(new_id, &data).await?;
        self.delete(old_id).await
    }

    /// Read returning `None` instead of a not-found error.
    async fn read_if_exists(&self, id: &str) -> Result<Option<Vec<u8>>> {
        match self.read(id).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Note text from stored bytes. Invalid UTF-8 is replaced rather than
/// rejected, so a stray legacy file never blocks reads or migration.
pub fn note_text(id: &str, data: Vec<u8>) -> String {
    match String::from_utf8(data) {
        Ok(text) => text,
        Err(e) => {
            warn!(id, "note is not valid UTF-8, invalid bytes replaced");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}
