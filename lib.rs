//! # NoteVault - Personal Note Storage Library
//!
//! NoteVault keeps a set of named text notes in one of two interchangeable
//! places, a durable key-value store or a directory of plain files, and can
//! move the whole set from one to the other without losing content.
//! Individual notes can be encrypted with a password.
//!
//! ## Features
//!
//! - **Two backends**: key-value store and directory, one [`backend::StorageBackend`] contract
//! - **Safe file names**: reversible escaping of any note name ([`naming`])
//! - **Encryption**: Argon2id-derived key, XChaCha20-Poly1305 blobs, password
//!   retry state machine ([`gate`])
//! - **Migration**: content-aware moves with `name-1`, `name-2` collision
//!   handling ([`migration`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use notevault::{config::Config, store::NoteStore, gate::PasswordSource};
//! use std::sync::Arc;
//!
//! struct NoPassword;
//!
//! #[async_trait::async_trait]
//! impl PasswordSource for NoPassword {
//!     async fn get_password(&self, _message: &str) -> notevault::Result<String> {
//!         Err(notevault::VaultError::PasswordUnavailable("no terminal".into()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = Config::load_with_env(None)?;
//!     let store = NoteStore::open(&cfg.kv_path, &cfg.state_path, Arc::new(NoPassword)).await?;
//!
//!     store.create_note("todo", "- buy milk").await?;
//!     assert_eq!(store.load_note("todo").await?, "- buy milk");
//!
//!     // move everything into a directory
//!     store.migrate_to(notevault::backend::StorageHandle::directory("./notes")).await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod dir_backend;
pub mod encryptor;
pub mod error;
pub mod gate;
pub mod key_manager;
pub mod kv_backend;
pub mod kv_store;
pub mod migration;
pub mod naming;
pub mod pointer;
pub mod store;
pub mod system_notes;

// Re-export common types for convenience
pub use error::{Result, VaultError};
pub use store::NoteStore;
