//! The note store session.
//!
//! [`NoteStore`] owns the active backend, the name cache, the encryption gate
//! and the current-note selection. Every note operation goes
//! name -> physical identifier -> active backend -> (gate, for encrypted
//! notes), and every create, delete, rename or migration reloads the name
//! cache before returning.
//!
//! Each operation takes one snapshot of the active backend when it starts, so
//! it never reads through one backend and writes through the other. Only
//! [`NoteStore::migrate_to`] and [`NoteStore::use_directory`] replace the
//! backend, with a single assignment under the write lock.

use crate::backend::{note_text, BackendKind, StorageBackend, StorageHandle};
use crate::cache::NameCache;
use crate::dir_backend::DirectoryBackend;
use crate::error::{Result, VaultError};
use crate::gate::{EncryptionGate, PasswordSource};
use crate::kv_backend::KeyValueBackend;
use crate::kv_store::KvStore;
use crate::migration::{MigrationEngine, MigrationReport};
use crate::naming::{self, to_physical_name};
use crate::pointer::{FilePointerStore, PointerStore};
use crate::system_notes::{self, SystemNote, DAILY_JOURNAL_NOTE_NAME, INBOX_NOTE_NAME, SCRATCH_NOTE_NAME};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Counts of note events since the store was opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NoteStats {
    pub created: u64,
    pub deleted: u64,
    pub renamed: u64,
    pub saved: u64,
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    deleted: AtomicU64,
    renamed: AtomicU64,
    saved: AtomicU64,
}

pub struct NoteStore {
    kv: Arc<KvStore>,
    pointer: Arc<dyn PointerStore>,
    backend: RwLock<Arc<dyn StorageBackend>>,
    names: StdRwLock<Arc<NameCache>>,
    gate: Mutex<EncryptionGate>,
    current: StdRwLock<String>,
    counters: Counters,
}

/// False for the scratch note and system notes.
pub fn can_delete_note(name: &str) -> bool {
    name != SCRATCH_NOTE_NAME && !system_notes::is_system_note_name(name)
}

pub fn sanitize_note_name(name: &str) -> String {
    name.trim().to_string()
}

/// `base`, or `base-1`, `base-2`, ... whichever is first not in `existing`.
pub fn pick_unique_name(base: &str, existing: &[String]) -> String {
    let mut name = base.to_string();
    let mut i = 1;
    while existing.iter().any(|n| *n == name) {
        name = format!("{}-{}", base, i);
        i += 1;
    }
    name
}

async fn open_backend(handle: &StorageHandle, kv: &Arc<KvStore>) -> Result<Arc<dyn StorageBackend>> {
    Ok(match &handle.dir {
        Some(dir) => Arc::new(DirectoryBackend::open(dir.clone()).await?),
        None => Arc::new(KeyValueBackend::new(kv.clone())),
    })
}

impl NoteStore {
    /// Open the store persisted at `kv_path` / `state_path`, re-opening the
    /// directory from the previous session if there was one.
    pub async fn open(
        kv_path: impl Into<PathBuf>,
        state_path: impl Into<PathBuf>,
        prompt: Arc<dyn PasswordSource>,
    ) -> Result<Self> {
        let kv = Arc::new(KvStore::open(kv_path).await?);
        let pointer: Arc<dyn PointerStore> = Arc::new(FilePointerStore::new(state_path));
        Self::with_stores(kv, pointer, prompt).await
    }

    /// Open over explicit key-value and pointer stores.
    ///
    /// A directory that can no longer be opened is reported as
    /// [`VaultError::BackendUnavailable`]; there is no fallback to the
    /// key-value store.
    pub async fn with_stores(
        kv: Arc<KvStore>,
        pointer: Arc<dyn PointerStore>,
        prompt: Arc<dyn PasswordSource>,
    ) -> Result<Self> {
        let handle = pointer.get().await?;
        let backend = open_backend(&handle, &kv).await?;
        info!(backend = %backend.kind(), "note store opening");

        let store = Self {
            gate: Mutex::new(EncryptionGate::new(kv.clone(), prompt)),
            kv,
            pointer,
            backend: RwLock::new(backend),
            names: StdRwLock::new(Arc::new(NameCache::default())),
            current: StdRwLock::new(SCRATCH_NOTE_NAME.to_string()),
            counters: Counters::default(),
        };

        store.repair_file_names().await?;
        store.reload().await?;
        store.create_default_notes().await?;
        Ok(store)
    }

    async fn active(&self) -> Arc<dyn StorageBackend> {
        self.backend.read().await.clone()
    }

    pub async fn backend_kind(&self) -> BackendKind {
        self.active().await.kind()
    }

    pub async fn handle(&self) -> StorageHandle {
        self.active().await.handle()
    }

    /// The key-value medium, which also holds the remembered password.
    pub fn kv_store(&self) -> &Arc<KvStore> {
        &self.kv
    }

    fn cache(&self) -> Arc<NameCache> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuild the name cache from the active backend.
    pub async fn reload(&self) -> Result<Vec<String>> {
        let backend = self.active().await;
        self.reload_from(backend.as_ref()).await
    }

    async fn reload_from(&self, backend: &dyn StorageBackend) -> Result<Vec<String>> {
        let cache = Arc::new(NameCache::load(backend).await?);
        let names = cache.names().to_vec();
        *self.names.write().unwrap_or_else(PoisonError::into_inner) = cache;
        Ok(names)
    }

    /// Names of all user notes as of the last reload.
    pub fn names(&self) -> Vec<String> {
        self.cache().names().to_vec()
    }

    pub fn encrypted_names(&self) -> Vec<String> {
        self.cache()
            .encrypted_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn note_count(&self) -> usize {
        self.cache().len()
    }

    pub fn is_encrypted(&self, name: &str) -> bool {
        self.cache().is_encrypted(name)
    }

    pub fn note_exists(&self, name: &str) -> bool {
        self.cache().contains(name) || system_notes::is_system_note_name(name)
    }

    pub fn can_delete(&self, name: &str) -> bool {
        can_delete_note(name)
    }

    pub fn current_note(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_current_note(&self, name: &str) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = name.to_string();
    }

    fn redirect_current_if_missing(&self) {
        let current = self.current_note();
        if !self.note_exists(&current) {
            debug!(note = %current, "current note gone, switching to scratch");
            self.set_current_note(SCRATCH_NOTE_NAME);
        }
    }

    pub fn stats(&self) -> NoteStats {
        NoteStats {
            created: self.counters.created.load(Ordering::Relaxed),
            deleted: self.counters.deleted.load(Ordering::Relaxed),
            renamed: self.counters.renamed.load(Ordering::Relaxed),
            saved: self.counters.saved.load(Ordering::Relaxed),
        }
    }

    /// True when a password is remembered or some note is already encrypted.
    /// New notes are created encrypted in that case.
    pub async fn is_using_encryption(&self) -> bool {
        if self.gate.lock().await.has_remembered_password().await {
            return true;
        }
        !self.cache().encrypted_names().is_empty()
    }

    async fn write_note(
        &self,
        backend: &dyn StorageBackend,
        name: &str,
        content: &str,
        encrypted: bool,
    ) -> Result<()> {
        let id = to_physical_name(backend.kind(), name, encrypted);
        if encrypted {
            let blob = self.gate.lock().await.encrypt(content).await?;
            backend.write(&id, &blob).await
        } else {
            backend.write(&id, content.as_bytes()).await
        }
    }

    async fn read_note(
        &self,
        backend: &dyn StorageBackend,
        name: &str,
        encrypted: bool,
    ) -> Result<String> {
        let id = to_physical_name(backend.kind(), name, encrypted);
        let data = backend.read(&id).await?;
        if encrypted {
            self.gate.lock().await.decrypt(&data).await
        } else {
            Ok(note_text(&id, data))
        }
    }

    fn check_new_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(VaultError::invalid_name("note name cannot be empty"));
        }
        if system_notes::is_system_note_name(name) {
            return Err(VaultError::protected(name));
        }
        Ok(())
    }

    /// Create a new note. Fails with [`VaultError::NameTaken`] if it exists.
    pub async fn create_note(&self, name: &str, content: &str) -> Result<()> {
        self.check_new_name(name)?;
        if self.cache().contains(name) {
            return Err(VaultError::NameTaken(name.to_string()));
        }
        let backend = self.active().await;
        let encrypted = self.is_using_encryption().await;
        self.write_note(backend.as_ref(), name, content, encrypted).await?;
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        info!(note = %name, encrypted, "note created");
        self.reload_from(backend.as_ref()).await?;
        Ok(())
    }

    /// Create `name` unless it exists; returns how many notes were created.
    pub async fn create_if_not_exists(&self, name: &str, content: &str) -> Result<usize> {
        if self.cache().contains(name) {
            debug!(note = %name, "note already exists");
            return Ok(0);
        }
        self.create_note(name, content).await?;
        Ok(1)
    }

    /// Make sure the scratch note exists. On an empty backend also create the
    /// inbox and daily journal notes.
    pub async fn create_default_notes(&self) -> Result<usize> {
        let first_run = self.cache().is_empty();
        let mut created = self
            .create_if_not_exists(SCRATCH_NOTE_NAME, &system_notes::welcome_note())
            .await?;
        if first_run {
            created += self
                .create_if_not_exists(INBOX_NOTE_NAME, &system_notes::inbox_note())
                .await?;
            created += self
                .create_if_not_exists(DAILY_JOURNAL_NOTE_NAME, &system_notes::journal_note())
                .await?;
        }
        if created > 0 {
            info!(created, first_run, "default notes created");
        }
        Ok(created)
    }

    /// Create an empty `scratch-N` note and return its name.
    pub async fn create_new_scratch_note(&self) -> Result<String> {
        let names = self.reload().await?;
        let name = pick_unique_name(SCRATCH_NOTE_NAME, &names);
        self.create_note(&name, "").await?;
        Ok(name)
    }

    /// Content of `name`; system notes are produced, encrypted notes are
    /// decrypted (asking for the password if needed).
    pub async fn load_note(&self, name: &str) -> Result<String> {
        self.load_note_if_exists(name)
            .await?
            .ok_or_else(|| VaultError::not_found(name))
    }

    pub async fn load_note_if_exists(&self, name: &str) -> Result<Option<String>> {
        if let Some(note) = SystemNote::from_name(name) {
            return Ok(Some(note.content()));
        }
        let cache = self.cache();
        if !cache.contains(name) {
            return Ok(None);
        }
        let backend = self.active().await;
        match self.read_note(backend.as_ref(), name, cache.is_encrypted(name)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.is_not_found() => {
                warn!(note = %name, "note listed but missing from storage");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrite `name`, keeping its encryption flag. System notes are
    /// read-only and saving them does nothing.
    pub async fn save_note(&self, name: &str, content: &str) -> Result<()> {
        if system_notes::is_system_note_name(name) {
            debug!(note = %name, "skipped saving system note");
            return Ok(());
        }
        if name.is_empty() {
            return Err(VaultError::invalid_name("note name cannot be empty"));
        }
        let cache = self.cache();
        let known = cache.contains(name);
        let encrypted = if known {
            cache.is_encrypted(name)
        } else {
            self.is_using_encryption().await
        };

        let backend = self.active().await;
        self.write_note(backend.as_ref(), name, content, encrypted).await?;
        self.counters.saved.fetch_add(1, Ordering::Relaxed);
        debug!(note = %name, size = content.len(), encrypted, "note saved");
        if !known {
            self.counters.created.fetch_add(1, Ordering::Relaxed);
            info!(note = %name, encrypted, "note created");
            self.reload_from(backend.as_ref()).await?;
        }
        Ok(())
    }

    /// Delete `name`. The scratch note and system notes are refused before
    /// storage is touched.
    pub async fn delete_note(&self, name: &str) -> Result<()> {
        if !can_delete_note(name) {
            return Err(VaultError::protected(name));
        }
        let backend = self.active().await;
        let existed = self.cache().contains(name);
        let id = to_physical_name(backend.kind(), name, self.is_encrypted(name));
        backend.delete(&id).await?;
        if existed {
            self.counters.deleted.fetch_add(1, Ordering::Relaxed);
            info!(note = %name, "note deleted");
        } else {
            debug!(note = %name, "deleted note was not listed");
        }

        self.reload_from(backend.as_ref()).await?;
        self.redirect_current_if_missing();
        Ok(())
    }

    /// Rename `old` to `new`, keeping content bytes and encryption flag.
    pub async fn rename_note(&self, old: &str, new: &str) -> Result<()> {
        if !can_delete_note(old) {
            return Err(VaultError::protected(old));
        }
        self.check_new_name(new)?;
        let cache = self.cache();
        if !cache.contains(old) {
            return Err(VaultError::not_found(old));
        }
        if cache.contains(new) {
            return Err(VaultError::NameTaken(new.to_string()));
        }

        let backend = self.active().await;
        let encrypted = cache.is_encrypted(old);
        let old_id = to_physical_name(backend.kind(), old, encrypted);
        let new_id = to_physical_name(backend.kind(), new, encrypted);
        backend.rename(&old_id, &new_id).await?;
        self.counters.renamed.fetch_add(1, Ordering::Relaxed);
        info!(from = %old, to = %new, "note renamed");

        if self.current_note() == old {
            self.set_current_note(new);
        }
        self.reload_from(backend.as_ref()).await?;
        Ok(())
    }

    /// Encrypt every plain note with `password`, which is also remembered.
    /// Returns how many notes were converted.
    pub async fn encrypt_all_notes(&self, password: &str) -> Result<usize> {
        let backend = self.active().await;
        let cache = NameCache::load(backend.as_ref()).await?;
        let mut gate = self.gate.lock().await;
        gate.remember_password(password).await?;

        let mut converted = 0;
        for name in cache.names() {
            if cache.is_encrypted(name) {
                continue;
            }
            let plain_id = to_physical_name(backend.kind(), name, false);
            let Some(data) = backend.read_if_exists(&plain_id).await? else {
                continue;
            };
            let text = note_text(&plain_id, data);
            let blob = gate.encrypt(&text).await?;
            backend
                .write(&to_physical_name(backend.kind(), name, true), &blob)
                .await?;
            backend.delete(&plain_id).await?;
            debug!(note = %name, "note encrypted");
            converted += 1;
        }
        drop(gate);

        info!(converted, "notes encrypted");
        self.reload_from(backend.as_ref()).await?;
        Ok(converted)
    }

    /// Decrypt every encrypted note and forget the password. Returns how many
    /// notes were converted.
    pub async fn decrypt_all_notes(&self) -> Result<usize> {
        let backend = self.active().await;
        let cache = NameCache::load(backend.as_ref()).await?;
        let mut gate = self.gate.lock().await;

        let mut converted = 0;
        for name in cache.names() {
            if !cache.is_encrypted(name) {
                continue;
            }
            let encrypted_id = to_physical_name(backend.kind(), name, true);
            let Some(blob) = backend.read_if_exists(&encrypted_id).await? else {
                continue;
            };
            let text = gate.decrypt(&blob).await?;
            backend
                .write(&to_physical_name(backend.kind(), name, false), text.as_bytes())
                .await?;
            backend.delete(&encrypted_id).await?;
            debug!(note = %name, "note decrypted");
            converted += 1;
        }
        gate.forget_password().await?;
        drop(gate);

        info!(converted, "notes decrypted");
        self.reload_from(backend.as_ref()).await?;
        Ok(converted)
    }

    /// Start reading every note file in the background so files on
    /// synced network drives get downloaded ahead of use.
    ///
    /// Best effort: the reads are not awaited and their errors are dropped.
    /// Returns how many reads were started.
    pub async fn preload_all_notes(&self) -> Result<usize> {
        let backend = self.active().await;
        if backend.kind() != BackendKind::Directory {
            return Ok(0);
        }
        let ids = backend.list().await?;
        let mut started = 0;
        for id in ids {
            if naming::from_physical_name(BackendKind::Directory, &id).is_err() {
                continue;
            }
            let backend = backend.clone();
            tokio::spawn(async move {
                let _ = backend.read(&id).await;
            });
            started += 1;
        }
        debug!(started, "note preload started");
        Ok(started)
    }

    /// Rename note files whose names are not in canonical escaped form.
    /// An existing file with the canonical name is overwritten.
    pub async fn repair_file_names(&self) -> Result<usize> {
        let backend = self.active().await;
        if backend.kind() != BackendKind::Directory {
            return Ok(0);
        }
        let mut repaired = 0;
        for id in backend.list().await? {
            if let Some(fixed) = naming::canonical_file_name(&id) {
                backend.rename(&id, &fixed).await?;
                info!(from = %id, to = %fixed, "note file renamed to canonical name");
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    /// Move every note to the backend behind `target` and make it active.
    ///
    /// Notes are copied first, then removed from the old backend, then the
    /// pointer is persisted and the active backend replaced. Operations that
    /// start meanwhile wait for the switch.
    pub async fn migrate_to(&self, target: StorageHandle) -> Result<MigrationReport> {
        let mut active = self.backend.write().await;
        let source = active.clone();
        let target_backend = open_backend(&target, &self.kv).await?;
        let target = target_backend.handle();
        if source.handle() == target {
            return Err(VaultError::storage(format!(
                "notes are already stored in the {}",
                target.kind()
            )));
        }

        let engine = MigrationEngine::new(source.clone(), target_backend.clone());
        let report = engine.run().await?;

        match target.dir {
            Some(_) => self.pointer.set(&target).await?,
            None => self.pointer.clear().await?,
        }
        *active = target_backend.clone();
        drop(active);
        info!(from = %source.kind(), to = %target_backend.kind(), "storage switched");

        self.reload_from(target_backend.as_ref()).await?;
        self.create_default_notes().await?;
        self.redirect_current_if_missing();
        Ok(report)
    }

    /// Make `dir` the active backend without moving any notes.
    pub async fn use_directory(&self, dir: impl Into<PathBuf>) -> Result<Vec<String>> {
        let backend = open_backend(&StorageHandle::directory(dir), &self.kv).await?;
        self.pointer.set(&backend.handle()).await?;
        *self.backend.write().await = backend;

        self.repair_file_names().await?;
        self.reload().await?;
        self.create_default_notes().await?;
        self.redirect_current_if_missing();
        Ok(self.names())
    }
}
