//! Error types for the argument surface and global configuration

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArgsError {
    /// Parse failures from the host's parser, surfaced unchanged.
    #[error(transparent)]
    Parse(#[from] clap::Error),

    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config at {path}: {source}")]
    TomlParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to determine config directory")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, ArgsError>;
