use crate::backend::{BackendKind, StorageBackend, StorageHandle};
use crate::error::{Result, VaultError};
use crate::naming;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Notes stored as one file each in a user-chosen directory.
pub struct DirectoryBackend {
    root: PathBuf,
}

impl DirectoryBackend {
    /// Open an existing directory. The directory is never created here: a
    /// missing directory means the handle was revoked.
    ///
    /// The root is kept in canonical form, so two spellings of the same
    /// directory yield equal handles.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {
                let root = fs::canonicalize(&root).await.map_err(|e| {
                    VaultError::unavailable(format!("{}: {}", root.display(), e))
                })?;
                info!(dir = %root.display(), "opened note directory");
                Ok(Self { root })
            }
            Ok(_) => Err(VaultError::unavailable(format!(
                "{} is not a directory",
                root.display()
            ))),
            Err(e) => Err(VaultError::unavailable(format!("{}: {}", root.display(), e))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(VaultError::invalid_name(id));
        }
        Ok(self.root.join(id))
    }

    async fn map_io(&self, err: std::io::Error, id: &str) -> VaultError {
        match err.kind() {
            ErrorKind::PermissionDenied => {
                VaultError::unavailable(format!("{}: {}", self.root.display(), err))
            }
            ErrorKind::NotFound => {
                if fs::try_exists(&self.root).await.unwrap_or(false) {
                    VaultError::not_found(id)
                } else {
                    VaultError::unavailable(format!("{} no longer exists", self.root.display()))
                }
            }
            _ => VaultError::storage(format!("{}: {}", id, err)),
        }
    }
}

#[async_trait]
impl StorageBackend for DirectoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Directory
    }

    fn handle(&self) -> StorageHandle {
        StorageHandle::directory(self.root.clone())
    }

    async fn read(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.path_for(id)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) => Err(self.map_io(e, id).await),
        }
    }

    async fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(id)?;
        debug!(file = id, size = data.len(), "writing note file");
        match fs::write(&path, data).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.map_io(e, id).await),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(file = id, "note file deleted");
                Ok(())
            }
            Err(e) => match self.map_io(e, id).await {
                VaultError::NotFound(_) => {
                    warn!(file = id, "file not found during delete");
                    Ok(())
                }
                other => Err(other),
            },
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) => {
                return Err(VaultError::unavailable(format!(
                    "{}: {}",
                    self.root.display(),
                    e
                )))
            }
        };

        let mut ids = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if !naming::is_note_file(&file_name) {
                continue;
            }
            ids.push(file_name);
        }

        ids.sort();
        Ok(ids)
    }
}
