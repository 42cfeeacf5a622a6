//! Password-derived encryption keys.
//!
//! This module provides [`KeyManager`], a 256-bit key derived from the user's
//! password with Argon2id and zeroized on drop.
//!
//! ## Salt
//!
//! Every installation uses the same fixed salt, [`PASSWORD_SALT`]. There is
//! nowhere to keep a per-note salt that survives moving notes between
//! backends, and the threat model is a single user's local notes. Identical
//! passwords therefore derive identical keys everywhere.

use crate::error::{Result, VaultError};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305};
use tracing::debug;
use zeroize::Zeroize;

/// Shared salt for password hashing
pub const PASSWORD_SALT: &str = "dbd71826401a4fca6c360f065a281063";

const KEY_LENGTH: usize = 32;
const ARGON2_MEMORY_KB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

pub struct KeyManager {
    key_bytes: [u8; KEY_LENGTH],
}

impl Drop for KeyManager {
    fn drop(&mut self) {
        self.key_bytes.zeroize();
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl KeyManager {
    /// Derive the key for `password`: `saltedHash(password, PASSWORD_SALT)`.
    pub fn derive(password: &str) -> Result<Self> {
        if password.is_empty() {
            return Err(VaultError::encryption("password cannot be empty"));
        }

        let params = Params::new(
            ARGON2_MEMORY_KB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(KEY_LENGTH),
        )
        .map_err(|e| VaultError::encryption(format!("argon2 params: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key_bytes = [0u8; KEY_LENGTH];
        argon2
            .hash_password_into(password.as_bytes(), PASSWORD_SALT.as_bytes(), &mut key_bytes)
            .map_err(|e| VaultError::encryption(format!("key derivation failed: {}", e)))?;

        debug!("derived note encryption key");
        Ok(Self { key_bytes })
    }

    /// [`KeyManager::derive`] on the blocking pool; Argon2 is deliberately slow.
    pub async fn derive_async(password: String) -> Result<Self> {
        tokio::task::spawn_blocking(move || {
            let mut password = password;
            let key = Self::derive(&password);
            password.zeroize();
            key
        })
        .await
        .map_err(|e| VaultError::encryption(format!("key derivation task failed: {}", e)))?
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(key_bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key_bytes }
    }

    pub fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(&self.key_bytes.into())
    }

    /// True if both keys hold the same bytes.
    pub fn same_key(&self, other: &KeyManager) -> bool {
        self.key_bytes == other.key_bytes
    }
}
