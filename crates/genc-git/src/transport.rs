//! Moving the encrypted staging repo around as an opaque git repo

use std::path::Path;

use async_trait::async_trait;
use genc_core::config::TransportConfig;
use genc_core::{GencError, GencResult};

use crate::cmd::git_checked;
use crate::safety::check_repo;

/// Clone/pull/commit/push of the staging repo. Failures are
/// `GencError::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn clone_repo(&self, dir: &Path, url: &str) -> GencResult<()>;

    /// Whether `dir` holds a finished clone (not just a leftover directory).
    async fn is_clone(&self, dir: &Path) -> GencResult<bool>;

    async fn pull(&self, dir: &Path) -> GencResult<()>;

    /// Stage everything and commit. Returns false when there was nothing to commit.
    async fn commit(&self, dir: &Path, message: &str) -> GencResult<bool>;

    async fn push(&self, dir: &Path) -> GencResult<()>;
}

/// Shells out to the git binary.
#[derive(Debug, Clone)]
pub struct GitTransport {
    git_binary: String,
    author_name: String,
    author_email: String,
}

impl GitTransport {
    pub fn new(cfg: &TransportConfig) -> Self {
        Self {
            git_binary: cfg.git_binary.clone(),
            author_name: cfg.author_name.clone(),
            author_email: cfg.author_email.clone(),
        }
    }

    async fn git_in(&self, dir: &Path, args: &[&str]) -> GencResult<std::process::Output> {
        git_checked(&self.git_binary, Some(dir), args).await
    }
}

#[async_trait]
impl Transport for GitTransport {
    async fn clone_repo(&self, dir: &Path, url: &str) -> GencResult<()> {
        let dir_str = dir.to_string_lossy();
        git_checked(
            &self.git_binary,
            None,
            &["clone", "--single-branch", "--no-tags", url, dir_str.as_ref()],
        )
        .await?;
        tracing::info!(url = %url, dir = %dir.display(), "cloned encrypted repo");
        Ok(())
    }

    async fn is_clone(&self, dir: &Path) -> GencResult<bool> {
        Ok(tokio::fs::try_exists(dir.join(".git")).await?)
    }

    async fn pull(&self, dir: &Path) -> GencResult<()> {
        check_repo(dir).into_result()?;

        // A freshly created remote has no branch to pull from yet
        let heads = self.git_in(dir, &["ls-remote", "--heads", "origin"]).await?;
        if heads.stdout.iter().all(u8::is_ascii_whitespace) {
            tracing::debug!(dir = %dir.display(), "encrypted remote is empty, nothing to pull");
            return Ok(());
        }

        self.git_in(dir, &["pull", "--no-rebase", "--no-edit"]).await?;
        tracing::debug!(dir = %dir.display(), "pulled encrypted repo");
        Ok(())
    }

    async fn commit(&self, dir: &Path, message: &str) -> GencResult<bool> {
        check_repo(dir).into_result()?;
        self.git_in(dir, &["add", "--all"]).await?;

        let status = self.git_in(dir, &["status", "--porcelain"]).await?;
        if status.stdout.is_empty() {
            return Ok(false);
        }

        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        self.git_in(
            dir,
            &[
                "-c",
                name.as_str(),
                "-c",
                email.as_str(),
                "commit",
                "--quiet",
                "-m",
                message,
            ],
        )
        .await?;
        tracing::debug!(dir = %dir.display(), "committed encrypted repo");
        Ok(true)
    }

    async fn push(&self, dir: &Path) -> GencResult<()> {
        self.git_in(dir, &["push", "origin", "HEAD"])
            .await
            .map_err(|e| GencError::Transport(format!("pushing encrypted repo: {e}")))?;
        tracing::info!(dir = %dir.display(), "pushed encrypted repo");
        Ok(())
    }
}
