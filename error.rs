use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

/// Error types for note storage operations
#[derive(Debug, Error)]
pub enum VaultError {
    /// A note (or physical entry) that was expected to exist is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// A physical identifier does not decode to a valid logical name
    #[error("Invalid note name: {0}")]
    InvalidName(String),

    /// Wrong password or corrupted encrypted blob
    #[error("Decryption failed: wrong password or corrupted data")]
    DecryptFailure,

    /// The storage medium went away (directory removed, permission revoked)
    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The operation is refused for scratch or system notes
    #[error("Note is protected: {0}")]
    Protected(String),

    /// Target name of a rename is already in use
    #[error("Note already exists: {0}")]
    NameTaken(String),

    /// The password collaborator gave up without providing a password
    #[error("Password unavailable: {0}")]
    PasswordUnavailable(String),

    /// Encryption or key derivation failures
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// File storage and I/O errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl VaultError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::InvalidName(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn protected(msg: impl Into<String>) -> Self {
        Self::Protected(msg.into())
    }

    pub fn encryption(msg: impl Into<String>) -> Self {
        Self::Encryption(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors a caller should treat as "note is absent"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("serialization: {}", err))
    }
}
