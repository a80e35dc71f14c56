//! Running the git binary

use std::path::Path;
use std::process::Output;

use genc_core::{GencError, GencResult};
use tokio::process::Command;

/// Run `git <args>` and return its raw output, success or not.
///
/// Only a failure to spawn is an error here; callers decide what a non-zero
/// exit means for them.
pub async fn git_output(
    git_binary: &str,
    cwd: Option<&Path>,
    args: &[&str],
) -> GencResult<Output> {
    let mut cmd = Command::new(git_binary);
    cmd.args(args).kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    tracing::trace!(?args, cwd = ?cwd, "running git");
    cmd.output()
        .await
        .map_err(|e| GencError::Transport(format!("running {git_binary}: {e}")))
}

/// Run `git <args>`, mapping a non-zero exit to `GencError::Transport`.
pub async fn git_checked(
    git_binary: &str,
    cwd: Option<&Path>,
    args: &[&str],
) -> GencResult<Output> {
    let output = git_output(git_binary, cwd, args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let verb = args.first().copied().unwrap_or("");
        return Err(GencError::Transport(format!(
            "git {verb} failed: {}",
            stderr.trim()
        )));
    }
    Ok(output)
}
