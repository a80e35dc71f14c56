//! Staging repo safety checks.
//!
//! Before the transport touches the staging clone, make sure no other git
//! process is working in it (lock files, interrupted merges from a pull).

use std::path::Path;

use genc_core::{GencError, GencResult};

/// Result of inspecting a staging repo's `.git` directory.
#[derive(Debug, Clone, Default)]
pub struct RepoSafetyCheck {
    /// Issues that block any transport operation
    pub blocking: Vec<String>,
}

impl RepoSafetyCheck {
    pub fn is_safe(&self) -> bool {
        self.blocking.is_empty()
    }

    /// Turn blocking issues into a transport error.
    pub fn into_result(self) -> GencResult<()> {
        if self.is_safe() {
            return Ok(());
        }
        Err(GencError::Transport(format!(
            "staging repo busy: {}",
            self.blocking.join("; ")
        )))
    }
}

/// Inspect `<repo_dir>/.git` for lock files and in-progress operations.
pub fn check_repo(repo_dir: &Path) -> RepoSafetyCheck {
    let git_dir = repo_dir.join(".git");
    let mut check = RepoSafetyCheck::default();

    for lock in ["index.lock", "HEAD.lock", "packed-refs.lock", "shallow.lock"] {
        if git_dir.join(lock).exists() {
            check.blocking.push(format!("lock file exists: {lock}"));
        }
    }

    let in_progress = [
        ("MERGE_HEAD", "merge in progress"),
        ("rebase-merge", "rebase in progress"),
        ("rebase-apply", "rebase in progress"),
    ];
    for (file, desc) in in_progress {
        if git_dir.join(file).exists() {
            check.blocking.push(format!("{desc}: {file} exists"));
        }
    }

    check
}
