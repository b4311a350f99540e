//! Configuration: built-in defaults, optionally overridden by a TOML file.
//!
//! Precedence is command line (and environment) over file over defaults. The
//! file lives at `<config dir>/blocksync/config.toml` unless `--config` names
//! another one.
//!
//! ```toml
//! block_size = 4194304
//! hash = "sha1"
//! ssh_program = "ssh"
//! ssh_args = ["-o", "Compression=no"]
//! remote_program = "/usr/local/bin/blocksync"
//! ```

use crate::digest::HashAlgorithm;
use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BLOCK_SIZE: u64 = 1024 * 1024;

/// Effective settings for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub block_size: u64,
    pub hash: HashAlgorithm,
    pub ssh_program: String,
    /// Extra arguments passed to ssh before the host.
    pub ssh_args: Vec<String>,
    /// blocksync executable on the destination side.
    pub remote_program: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            hash: HashAlgorithm::default(),
            ssh_program: "ssh".to_string(),
            ssh_args: Vec::new(),
            remote_program: "blocksync".to_string(),
        }
    }
}

/// On-disk form; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    block_size: Option<u64>,
    hash: Option<HashAlgorithm>,
    ssh_program: Option<String>,
    ssh_args: Option<Vec<String>>,
    remote_program: Option<String>,
}

impl SyncConfig {
    /// Default config file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("blocksync").join("config.toml"))
    }

    /// Load settings. An explicit path must exist; the default one is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let text = fs::read_to_string(&path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&text)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse TOML text on top of the defaults.
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        let file: FileConfig = toml::from_str(text)?;
        let mut config = Self::default();
        if let Some(block_size) = file.block_size {
            config.block_size = block_size;
        }
        if let Some(hash) = file.hash {
            config.hash = hash;
        }
        if let Some(ssh_program) = file.ssh_program {
            config.ssh_program = ssh_program;
        }
        if let Some(ssh_args) = file.ssh_args {
            config.ssh_args = ssh_args;
        }
        if let Some(remote_program) = file.remote_program {
            config.remote_program = remote_program;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(SyncError::Config("block size must be greater than 0".to_string()));
        }
        if self.remote_program.trim().is_empty() {
            return Err(SyncError::Config("remote program must not be empty".to_string()));
        }
        Ok(())
    }
}
