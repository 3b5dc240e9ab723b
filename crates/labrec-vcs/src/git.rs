//! Git adapter backed by libgit2

use std::path::Path;

use git2::{Repository, StatusOptions};
use tracing::debug;

use crate::{Result, VcsAdapter, VcsError};

/// VCS adapter over a git working tree.
pub struct GitVcs {
    repo: Repository,
}

impl GitVcs {
    /// Discover the repository at or above `path`.
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|_| VcsError::NoRepository(path.to_path_buf()))?;
        debug!(workdir = ?repo.workdir(), "discovered repository");
        Ok(Self { repo })
    }

    /// Open the repository enclosing the current working directory.
    pub fn from_cwd() -> Result<Self> {
        Self::discover(Path::new("."))
    }

    fn head_commit(&self) -> Result<git2::Commit<'_>> {
        let head = self.repo.head().map_err(|_| VcsError::UnbornHead)?;
        Ok(head.peel_to_commit()?)
    }
}

impl VcsAdapter for GitVcs {
    fn head_sha(&self) -> Result<String> {
        Ok(self.head_commit()?.id().to_string())
    }

    fn head_message(&self) -> Result<String> {
        Ok(self.head_commit()?.message().unwrap_or_default().to_string())
    }

    /// Any change to a tracked file counts; untracked files do not.
    fn is_dirty(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }
}
