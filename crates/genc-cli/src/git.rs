//! Plain git plumbing for the working repository

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use genc_core::{GencError, RefPair};
use genc_git::{git_checked, git_output};
use tracing::debug;

/// The `git` binary plus the working directory commands run in.
pub struct Git<'a> {
    pub binary: &'a str,
    pub cwd: &'a Path,
}

impl Git<'_> {
    async fn stdout(&self, args: &[&str]) -> Result<String> {
        let output = git_checked(self.binary, Some(self.cwd), args).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run git with the terminal attached, failing on a non-zero exit.
    pub async fn passthrough(&self, args: &[&str]) -> Result<()> {
        debug!(?args, cwd = %self.cwd.display(), "passing through to git");
        let status = tokio::process::Command::new(self.binary)
            .args(args)
            .current_dir(self.cwd)
            .status()
            .await
            .with_context(|| format!("running {}", self.binary))?;
        if !status.success() {
            bail!("git {} exited with {status}", args.join(" "));
        }
        Ok(())
    }

    pub async fn init(&self) -> Result<()> {
        self.stdout(&["init", "--quiet"]).await.map(|_| ())
    }

    pub async fn git_dir(&self) -> Result<PathBuf> {
        let dir = self
            .stdout(&["rev-parse", "--absolute-git-dir"])
            .await
            .context("not inside a git repository")?;
        Ok(PathBuf::from(dir))
    }

    /// The configured URL of `remote`.
    pub async fn remote_url(&self, remote: &str) -> Result<String> {
        self.stdout(&["remote", "get-url", remote])
            .await
            .with_context(|| format!("looking up remote {remote}"))
    }

    pub async fn add_remote(&self, remote: &str, url: &str) -> Result<()> {
        self.stdout(&["remote", "add", remote, url]).await.map(|_| ())
    }

    /// Short name of the checked-out branch; `MissingRef` on a detached HEAD.
    pub async fn current_branch(&self) -> Result<String> {
        let args = ["symbolic-ref", "--quiet", "--short", "HEAD"];
        let output = git_output(self.binary, Some(self.cwd), &args).await?;
        if !output.status.success() {
            return Err(GencError::MissingRef("HEAD is not on a branch".into()).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Point `refs/remotes/<remote>/*` at the fetched encrypted refs.
    pub async fn update_tracking_refs(&self, remote: &str, pairs: &[RefPair]) -> Result<()> {
        for pair in pairs {
            let Some(tracking) = tracking_ref(remote, &pair.name) else {
                continue;
            };
            self.stdout(&["update-ref", tracking.as_str(), pair.target.as_str()])
                .await
                .with_context(|| format!("updating {tracking}"))?;
        }
        Ok(())
    }

    pub async fn checkout_tracking(&self, remote: &str, branch: &str) -> Result<()> {
        let upstream = format!("{remote}/{branch}");
        self.stdout(&["checkout", "--quiet", "-B", branch, "--track", upstream.as_str()])
            .await
            .with_context(|| format!("checking out {upstream}"))
            .map(|_| ())
    }
}

/// `refs/heads/x` on the remote maps to `refs/remotes/<remote>/x`.
/// Non-branch refs (tags, notes) keep their own name.
pub fn tracking_ref(remote: &str, name: &str) -> Option<String> {
    if let Some(branch) = name.strip_prefix("refs/heads/") {
        return Some(format!("refs/remotes/{remote}/{branch}"));
    }
    name.starts_with("refs/").then(|| name.to_string())
}

/// Branch to check out after a clone: `main`, then `master`, then the first branch.
pub fn default_branch(pairs: &[RefPair]) -> Option<&str> {
    let branches: Vec<&str> = pairs
        .iter()
        .filter_map(|p| p.name.strip_prefix("refs/heads/"))
        .collect();
    ["main", "master"]
        .into_iter()
        .find(|preferred| branches.contains(preferred))
        .or_else(|| branches.first().copied())
}
