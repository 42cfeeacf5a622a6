//! Configuration management with environment variable support.
//!
//! This module provides [`Config`] for locating the two small files the note
//! store persists: the key-value store and the storage pointer.
//!
//! ## Environment Variables
//!
//! - `NOTEVAULT_KV_PATH`: Override key-value store file path
//! - `NOTEVAULT_STATE_PATH`: Override storage pointer file path
//! - `NOTEVAULT_CONFIG`: Override config file path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variable names for configuration overrides
pub const ENV_KV_PATH: &str = "NOTEVAULT_KV_PATH";
pub const ENV_STATE_PATH: &str = "NOTEVAULT_STATE_PATH";
pub const ENV_CONFIG_PATH: &str = "NOTEVAULT_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// JSON file holding key-value notes and the remembered password
    pub kv_path: String,
    /// JSON file recording which directory, if any, holds the notes
    pub state_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kv_path: "./notevault.kv.json".to_string(),
            state_path: "./notevault.state.json".to_string(),
        }
    }
}

impl Config {
    /// Load config from file path
    pub fn load(path: &str) -> Result<Self> {
        let s =
            fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
        let mut config: Config =
            serde_json::from_str(&s).with_context(|| format!("parsing config file {}", path))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config with environment variable overrides
    /// Priority: ENV vars > config file > defaults
    pub fn load_with_env(path: Option<&str>) -> Result<Self> {
        let config_path = path
            .map(String::from)
            .or_else(|| env::var(ENV_CONFIG_PATH).ok());

        let mut config = match config_path {
            Some(ref p) if Path::new(p).exists() => {
                info!(path = p, "loading config from file");
                let s = fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p))?;
                serde_json::from_str(&s).with_context(|| format!("parsing config file {}", p))?
            }
            _ => {
                debug!("using default configuration");
                Config::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(kv_path) = env::var(ENV_KV_PATH) {
            debug!(kv_path = %kv_path, "overriding kv_path from environment");
            self.kv_path = kv_path;
        }

        if let Ok(state_path) = env::var(ENV_STATE_PATH) {
            debug!(state_path = %state_path, "overriding state_path from environment");
            self.state_path = state_path;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.kv_path.trim().is_empty() {
            anyhow::bail!("kv_path cannot be empty");
        }

        if self.state_path.trim().is_empty() {
            anyhow::bail!("state_path cannot be empty");
        }

        if self.kv_path == self.state_path {
            anyhow::bail!("kv_path and state_path must be different files");
        }

        // the key-value file may hold a remembered password
        let kv_path = Path::new(&self.kv_path);
        if let Some(parent) = kv_path.parent() {
            let parent_str = parent.to_string_lossy().to_lowercase();
            if parent_str.contains("public")
                || parent_str.contains("www")
                || parent_str.contains("htdocs")
            {
                warn!(
                    path = %self.kv_path,
                    "key-value file appears to be in a public directory"
                );
            }
        }

        Ok(())
    }

    /// Create a new config with explicit values
    pub fn new(kv_path: impl Into<String>, state_path: impl Into<String>) -> Self {
        Self {
            kv_path: kv_path.into(),
            state_path: state_path.into(),
        }
    }
}
