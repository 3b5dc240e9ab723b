//! Global configuration for labrec
//!
//! Located at `~/.config/labrec/config.toml`

use crate::{ArgsError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global labrec configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub defaults: DefaultsConfig,
}

/// Default settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Root directory used when `--experiments-directory` is not given
    pub experiments_directory: Option<String>,
    /// Description used when neither the host nor the command line supplies one
    pub description: Option<String>,
    /// Skip the dirty-working-tree check on experiment creation
    pub allow_dirty: bool,
}

impl GlobalConfig {
    /// Load the global config from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load the global config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no global config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ArgsError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ArgsError::TomlParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "labrec").ok_or(ArgsError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}
