//! Note encryption primitive.
//!
//! ## Blob Format
//!
//! ```text
//! [nonce:24][ciphertext + tag]
//! ```
//!
//! No associated data is bound, so an encrypted note can be renamed or moved
//! to another backend by copying its bytes.

use crate::error::{Result, VaultError};
use crate::key_manager::KeyManager;
use chacha20poly1305::aead::{Aead, AeadCore, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};

const NONCE_LEN: usize = 24;

pub struct Encryptor {
    cipher: XChaCha20Poly1305,
}

impl Encryptor {
    pub fn new(cipher: XChaCha20Poly1305) -> Self {
        Self { cipher }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| VaultError::encryption(format!("encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Any authentication failure, including a truncated blob, is a
    /// [`VaultError::DecryptFailure`].
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < NONCE_LEN {
            return Err(VaultError::DecryptFailure);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        #[allow(deprecated)]
        let nonce = XNonce::from_slice(nonce);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::DecryptFailure)
    }
}

/// Encrypt note text with `key`.
pub fn encrypt(key: &KeyManager, plaintext: &str) -> Result<Vec<u8>> {
    Encryptor::new(key.cipher()).encrypt(plaintext.as_bytes())
}

/// Decrypt a note blob with `key` back into text.
pub fn decrypt(key: &KeyManager, blob: &[u8]) -> Result<String> {
    let plaintext = Encryptor::new(key.cipher()).decrypt(blob)?;
    String::from_utf8(plaintext).map_err(|_| VaultError::DecryptFailure)
}
