//! Mock VCS adapter for unit testing the lifecycle controller without a
//! real repository.

use crate::{Result, VcsAdapter};

/// A [`VcsAdapter`] with canned answers.
#[derive(Debug, Clone)]
pub struct MockVcs {
    sha: String,
    message: String,
    dirty: bool,
}

impl MockVcs {
    pub fn new(sha: &str) -> Self {
        Self {
            sha: sha.to_string(),
            message: "mock commit\n".to_string(),
            dirty: false,
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }
}

impl VcsAdapter for MockVcs {
    fn head_sha(&self) -> Result<String> {
        Ok(self.sha.clone())
    }

    fn head_message(&self) -> Result<String> {
        Ok(self.message.clone())
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(self.dirty)
    }
}
