//! Durable string key-value medium.
//!
//! The whole map lives in memory and is written back to a single JSON file
//! after every mutation. Without a path the store is memory-only, which is
//! what tests use.

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct KvStore {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, String>>,
}

impl KvStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open the store backed by `path`, loading existing entries if the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if fs::try_exists(&path).await? {
            let s = fs::read_to_string(&path).await?;
            let map: BTreeMap<String, String> = serde_json::from_str(&s)?;
            info!(path = %path.display(), entries = map.len(), "loaded key-value store");
            map
        } else {
            debug!(path = %path.display(), "key-value store file missing, starting empty");
            BTreeMap::new()
        };

        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.into());
        self.persist(&entries).await
    }

    /// Remove `key`; returns whether it was present.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let existed = entries.remove(key).is_some();
        if existed {
            self.persist(&entries).await?;
        }
        Ok(existed)
    }

    /// Snapshot of all keys in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string(entries)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), entries = entries.len(), "key-value store persisted");
        Ok(())
    }
}
