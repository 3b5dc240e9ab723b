//! Error types for the VCS adapter

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("No repository found at or above {0}")]
    NoRepository(PathBuf),

    #[error("Repository has no commits yet")]
    UnbornHead,

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

pub type Result<T> = std::result::Result<T, VcsError>;
