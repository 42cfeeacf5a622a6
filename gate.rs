//! Password lifecycle for encrypted notes.
//!
//! [`EncryptionGate`] is a small state machine:
//!
//! ```text
//! NoSession --remembered password--> Cached
//! NoSession --nothing remembered---> NeedsPrompt("Please enter password to
//!                                    decrypt/encrypt files")
//! NeedsPrompt --password entered---> Cached          (password is remembered)
//! Cached --decrypt ok--------------> Cached
//! Cached --decrypt failed----------> NeedsPrompt("Password is not correct ...")
//!                                    (remembered password is forgotten)
//! ```
//!
//! A failed decrypt is retried with the newly entered password. There is no
//! retry limit: the loop ends when decryption succeeds or when the
//! [`PasswordSource`] gives up and returns an error.

use crate::encryptor;
use crate::error::{Result, VaultError};
use crate::key_manager::KeyManager;
use crate::kv_store::KvStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key under which the plaintext password is remembered
pub const REMEMBERED_PASSWORD_KEY: &str = "edna-password";

pub const PROMPT_ENTER_PASSWORD: &str = "Please enter password to decrypt files";
pub const PROMPT_ENTER_PASSWORD_ENCRYPT: &str = "Please enter password to encrypt files";
pub const PROMPT_WRONG_PASSWORD: &str = "Password is not correct. Please enter valid password.";

/// Interactive source of passwords (a dialog, a terminal prompt).
#[async_trait]
pub trait PasswordSource: Send + Sync {
    /// Ask the user for a password, showing `message`. May take arbitrarily
    /// long. Returning an error abandons the operation waiting on it.
    async fn get_password(&self, message: &str) -> Result<String>;
}

pub enum GateState {
    NoSession,
    Cached(KeyManager),
    NeedsPrompt { message: String },
}

/// Observable summary of [`GateState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    NoSession,
    Cached,
    NeedsPrompt,
}

pub struct EncryptionGate {
    state: GateState,
    kv: Arc<KvStore>,
    prompt: Arc<dyn PasswordSource>,
}

impl EncryptionGate {
    pub fn new(kv: Arc<KvStore>, prompt: Arc<dyn PasswordSource>) -> Self {
        Self {
            state: GateState::NoSession,
            kv,
            prompt,
        }
    }

    pub fn status(&self) -> GateStatus {
        match self.state {
            GateState::NoSession => GateStatus::NoSession,
            GateState::Cached(_) => GateStatus::Cached,
            GateState::NeedsPrompt { .. } => GateStatus::NeedsPrompt,
        }
    }

    pub async fn has_remembered_password(&self) -> bool {
        self.kv
            .get(REMEMBERED_PASSWORD_KEY)
            .await
            .is_some_and(|p| !p.is_empty())
    }

    /// Remember `password` and make its key the cached one.
    pub async fn remember_password(&mut self, password: &str) -> Result<()> {
        let key = KeyManager::derive_async(password.to_string()).await?;
        self.kv.set(REMEMBERED_PASSWORD_KEY, password).await?;
        self.state = GateState::Cached(key);
        info!("password remembered");
        Ok(())
    }

    /// Drop the remembered password and any cached key.
    pub async fn forget_password(&mut self) -> Result<()> {
        self.kv.remove(REMEMBERED_PASSWORD_KEY).await?;
        self.state = GateState::NoSession;
        info!("password forgotten");
        Ok(())
    }

    pub async fn encrypt(&mut self, plaintext: &str) -> Result<Vec<u8>> {
        self.ensure_key(PROMPT_ENTER_PASSWORD_ENCRYPT).await?;
        encryptor::encrypt(self.cached_key()?, plaintext)
    }

    pub async fn decrypt(&mut self, blob: &[u8]) -> Result<String> {
        loop {
            self.ensure_key(PROMPT_ENTER_PASSWORD).await?;
            match encryptor::decrypt(self.cached_key()?, blob) {
                Ok(plaintext) => return Ok(plaintext),
                Err(VaultError::DecryptFailure) => {
                    warn!("decryption failed, password will be requested again");
                    self.kv.remove(REMEMBERED_PASSWORD_KEY).await?;
                    self.state = GateState::NeedsPrompt {
                        message: PROMPT_WRONG_PASSWORD.to_string(),
                    };
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn cached_key(&self) -> Result<&KeyManager> {
        match &self.state {
            GateState::Cached(key) => Ok(key),
            _ => Err(VaultError::encryption("no encryption key available")),
        }
    }

    /// Get a key into the cache, asking with `first_prompt` when nothing is
    /// remembered.
    async fn ensure_key(&mut self, first_prompt: &str) -> Result<()> {
        loop {
            match &self.state {
                GateState::Cached(_) => return Ok(()),
                GateState::NoSession => match self.kv.get(REMEMBERED_PASSWORD_KEY).await {
                    Some(password) if !password.is_empty() => {
                        debug!("deriving key from remembered password");
                        let key = KeyManager::derive_async(password).await?;
                        self.state = GateState::Cached(key);
                    }
                    _ => {
                        self.state = GateState::NeedsPrompt {
                            message: first_prompt.to_string(),
                        };
                    }
                },
                GateState::NeedsPrompt { message } => {
                    let message = message.clone();
                    debug!(message = %message, "requesting password");
                    let password = self.prompt.get_password(&message).await?;
                    if password.is_empty() {
                        continue;
                    }
                    self.kv.set(REMEMBERED_PASSWORD_KEY, password.clone()).await?;
                    let key = KeyManager::derive_async(password).await?;
                    self.state = GateState::Cached(key);
                }
            }
        }
    }
}
