//! Error types for labrec-core

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Argument error: {0}")]
    Args(#[from] labrec_args::ArgsError),

    #[error("VCS error: {0}")]
    Vcs(#[from] labrec_vcs::VcsError),

    #[error("Working tree is dirty; commit or stash before recording an experiment")]
    DirtyRepo,

    #[error("Arguments do not match those stored in {0}")]
    MismatchedArgs(PathBuf),

    #[error("Head commit does not match the one stored in {0}")]
    MismatchedCommit(PathBuf),

    #[error("Experiment directory corrupted at {path}: {reason}")]
    CorruptedExperiment { path: PathBuf, reason: String },

    #[error("Summary update must be a JSON object")]
    SummaryNotObject,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
