//! git remote-helper protocol (stdin/stdout line protocol)
//!
//! ```text
//! capabilities          → fetch\npush\noption\n\n
//! option <k> <v>        → unsupported\n
//! list [for-push]       → "<id> <ref>" lines + blank line, or a lone \n
//! fetch <id> <ref>...   → (batch, ends with a blank line) \n
//! push <refspec>...     → (batch) "ok <dst>" / "error <dst> <msg>" lines + blank line
//! <blank line>          → exit
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use genc_core::{PushOutcome, PushStatus, RefPair, RefUpdate};
use genc_sync::refs_to_git_string;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

pub const CAPABILITIES: &str = "fetch\npush\noption\n\n";

/// What the protocol loop needs from the encrypted remote.
#[async_trait]
pub trait RemoteHandler {
    async fn list(&mut self, for_push: bool) -> Result<Vec<RefPair>>;

    async fn fetch(&mut self) -> Result<()>;

    async fn push(&mut self, updates: Vec<RefUpdate>) -> Result<Vec<PushOutcome>>;
}

/// Parse `[+]src:dst`. An empty `src` is a deletion request.
pub fn parse_refspec(spec: &str) -> Result<RefUpdate> {
    let (force, spec) = match spec.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, spec),
    };
    let Some((src, dst)) = spec.split_once(':') else {
        bail!("malformed refspec {spec:?}: expected src:dst");
    };
    if dst.is_empty() {
        bail!("malformed refspec {spec:?}: empty destination");
    }
    Ok(RefUpdate {
        src: src.to_string(),
        dst: dst.to_string(),
        force,
    })
}

pub fn format_list(pairs: &[RefPair]) -> String {
    if pairs.is_empty() {
        return "\n".into();
    }
    format!("{}\n\n", refs_to_git_string(pairs))
}

pub fn format_push_results(outcomes: &[PushOutcome]) -> String {
    if outcomes.is_empty() {
        return "\n".into();
    }
    let lines: Vec<String> = outcomes
        .iter()
        .map(|outcome| match outcome.status {
            PushStatus::Ok => format!("ok {}", outcome.dst),
            PushStatus::Error => format!(
                "error {} {}",
                outcome.dst,
                single_line(outcome.message.as_deref().unwrap_or("encrypted push failed"))
            ),
        })
        .collect();
    format!("{}\n\n", lines.join("\n"))
}

/// Protocol lines cannot carry newlines.
fn single_line(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drive the protocol until git closes stdin or sends a blank line.
pub async fn serve<H, R, W>(handler: &mut H, reader: R, mut writer: W) -> Result<()>
where
    H: RemoteHandler + Send,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("reading from git")? {
        debug!(command = %line, "remote helper command");
        let response = if line == "capabilities" {
            CAPABILITIES.to_string()
        } else if line.starts_with("option ") {
            "unsupported\n".to_string()
        } else if line == "list" || line == "list for-push" {
            let pairs = handler.list(line == "list for-push").await?;
            format_list(&pairs)
        } else if line.starts_with("fetch ") {
            // Every object is imported at once; the requested ids don't matter
            while let Some(next) = lines.next_line().await? {
                if next.is_empty() {
                    break;
                }
            }
            handler.fetch().await?;
            "\n".to_string()
        } else if let Some(first) = line.strip_prefix("push ") {
            let mut updates = vec![parse_refspec(first)?];
            while let Some(next) = lines.next_line().await? {
                if next.is_empty() {
                    break;
                }
                let spec = next
                    .strip_prefix("push ")
                    .with_context(|| format!("unexpected line in push batch: {next:?}"))?;
                updates.push(parse_refspec(spec)?);
            }
            let outcomes = handler.push(updates).await?;
            format_push_results(&outcomes)
        } else if line.is_empty() {
            break;
        } else {
            bail!("unknown remote helper command: {line:?}");
        };

        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
