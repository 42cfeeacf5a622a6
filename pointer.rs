//! Durable record of which backend is active.
//!
//! Holds a single [`StorageHandle`] so the same directory is re-opened on the
//! next start. A missing record means the key-value store is active.

use crate::backend::StorageHandle;
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;
use tracing::{debug, info};

#[async_trait]
pub trait PointerStore: Send + Sync {
    async fn get(&self) -> Result<StorageHandle>;
    async fn set(&self, handle: &StorageHandle) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Pointer persisted as a small JSON file.
pub struct FilePointerStore {
    path: PathBuf,
}

impl FilePointerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PointerStore for FilePointerStore {
    async fn get(&self) -> Result<StorageHandle> {
        if !fs::try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "no storage pointer, using key-value store");
            return Ok(StorageHandle::key_value());
        }
        let s = fs::read_to_string(&self.path).await?;
        let handle: StorageHandle = serde_json::from_str(&s)?;
        Ok(handle)
    }

    async fn set(&self, handle: &StorageHandle) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(handle)?;
        fs::write(&self.path, json).await?;
        info!(path = %self.path.display(), backend = %handle.kind(), "storage pointer saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if fs::try_exists(&self.path).await? {
            fs::remove_file(&self.path).await?;
            info!(path = %self.path.display(), "storage pointer cleared");
        }
        Ok(())
    }
}

/// Pointer that lives only as long as the process.
#[derive(Default)]
pub struct MemoryPointerStore {
    handle: Mutex<StorageHandle>,
}

impl MemoryPointerStore {
    pub fn new(handle: StorageHandle) -> Self {
        Self {
            handle: Mutex::new(handle),
        }
    }
}

#[async_trait]
impl PointerStore for MemoryPointerStore {
    async fn get(&self) -> Result<StorageHandle> {
        Ok(self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    async fn set(&self, handle: &StorageHandle) -> Result<()> {
        *self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = handle.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.set(&StorageHandle::key_value()).await
    }
}
