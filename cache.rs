//! In-memory list of known note names.
//!
//! A [`NameCache`] is an immutable snapshot built from one `list()` of the
//! active backend. It is never patched: after every create, delete, rename or
//! migration the store builds a new one and swaps it in.

use crate::backend::{BackendKind, StorageBackend};
use crate::error::Result;
use crate::naming;
use crate::system_notes;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct NameCache {
    names: Vec<String>,
    encrypted: BTreeMap<String, bool>,
}

impl NameCache {
    /// Build from physical identifiers as returned by `list()`.
    ///
    /// Identifiers that do not decode are skipped. When a plain and an
    /// encrypted entry decode to the same name, the name appears once and the
    /// entry listed last decides its encryption flag.
    pub fn from_ids<I>(kind: BackendKind, ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut cache = NameCache::default();
        for id in ids {
            let decoded = match naming::from_physical_name(kind, &id) {
                Ok(decoded) => decoded,
                Err(e) => {
                    debug!(id = %id, error = %e, "skipping entry");
                    continue;
                }
            };
            if system_notes::is_system_note_name(&decoded.name) {
                debug!(id = %id, "skipping entry shadowing a system note");
                continue;
            }
            match cache.encrypted.insert(decoded.name.clone(), decoded.encrypted) {
                Some(_) => warn!(note = %decoded.name, "note stored both plain and encrypted"),
                None => cache.names.push(decoded.name),
            }
        }
        cache
    }

    /// List `backend` and build a fresh cache.
    pub async fn load(backend: &dyn StorageBackend) -> Result<Self> {
        let ids = backend.list().await?;
        let cache = Self::from_ids(backend.kind(), ids);
        debug!(
            backend = %backend.kind(),
            notes = cache.len(),
            encrypted = cache.encrypted_names().len(),
            "note names loaded"
        );
        Ok(cache)
    }

    /// All note names, in backend listing order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Names of encrypted notes; always a subset of [`NameCache::names`].
    pub fn encrypted_names(&self) -> Vec<&str> {
        self.names
            .iter()
            .filter(|n| self.is_encrypted(n))
            .map(String::as_str)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.encrypted.contains_key(name)
    }

    pub fn is_encrypted(&self, name: &str) -> bool {
        self.encrypted.get(name).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
