use crate::backend::{note_text, BackendKind, StorageBackend, StorageHandle};
use crate::error::{Result, VaultError};
use crate::kv_store::KvStore;
use crate::naming;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use tracing::debug;

/// Notes stored as string values in the key-value store.
///
/// Plain notes are stored as their UTF-8 text. Encrypted blobs are binary and
/// are stored base64-encoded.
pub struct KeyValueBackend {
    store: Arc<KvStore>,
}

impl KeyValueBackend {
    pub fn new(store: Arc<KvStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StorageBackend for KeyValueBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    fn handle(&self) -> StorageHandle {
        StorageHandle::key_value()
    }

    async fn read(&self, id: &str) -> Result<Vec<u8>> {
        let value = self
            .store
            .get(id)
            .await
            .ok_or_else(|| VaultError::not_found(id))?;
        if naming::is_encrypted_id(BackendKind::KeyValue, id) {
            STANDARD
                .decode(value.as_bytes())
                .map_err(|e| VaultError::storage(format!("corrupt value under {}: {}", id, e)))
        } else {
            Ok(value.into_bytes())
        }
    }

    async fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        let value = if naming::is_encrypted_id(BackendKind::KeyValue, id) {
            STANDARD.encode(data)
        } else {
            note_text(id, data.to_vec())
        };
        debug!(key = id, size = data.len(), "writing key-value note");
        self.store.set(id, value).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.store.remove(id).await? {
            debug!(key = id, "deleted key-value note");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys()
            .await
            .into_iter()
            .filter(|k| naming::is_note_key(k))
            .collect())
    }
}
