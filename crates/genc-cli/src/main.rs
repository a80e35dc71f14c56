//! genc: clone, push and pull git repositories with encrypted:: remotes
//!
//! Commands:
//!   clone <url> <dir>          - clone; encrypted::<url> goes through the encrypted store
//!   push [<remote>] [<branch>] - export a branch to the remote
//!   pull [<remote>] [<branch>] - fetch and merge a branch
//!   refs [<remote>]            - list the refs stored on an encrypted remote
//!
//! Remotes without the `encrypted::` prefix are handed to plain git.

mod git;
mod session;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use genc_core::config::GencConfig;
use genc_core::{GencError, RefUpdate, RemoteUrl};
use genc_sync::refs_to_git_string;
use tracing::{debug, info};

use crate::git::{default_branch, tracking_ref, Git};
use crate::session::EncryptedSession;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "genc",
    version,
    about = "git with encrypted remotes",
    long_about = "genc: clone, push and pull repositories whose remote is encrypted::<url>"
)]
struct Cli {
    /// Path to config.toml
    #[arg(long, short = 'c', global = true, env = "GIT_ENCRYPTED_CONFIG")]
    config: Option<PathBuf>,

    /// Run as if started in this directory
    #[arg(short = 'C', global = true, default_value = ".")]
    dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "GIT_ENCRYPTED_LOG")]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone a repository into a new directory
    Clone {
        /// Repository URL (encrypted::<url> for an encrypted remote)
        url: String,

        /// Destination directory
        dir: PathBuf,

        /// Name for the remote
        #[arg(long, short = 'o', default_value = "origin")]
        origin: String,
    },

    /// Push a branch to a remote
    Push {
        #[arg(default_value = "origin")]
        remote: String,

        /// Branch to push (default: the current branch)
        branch: Option<String>,

        /// Overwrite the remote ref even if it is not an ancestor
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Fetch from a remote and merge a branch
    Pull {
        #[arg(default_value = "origin")]
        remote: String,

        /// Branch to merge (default: the current branch)
        branch: Option<String>,
    },

    /// List the refs stored on an encrypted remote
    Refs {
        #[arg(default_value = "origin")]
        remote: String,

        /// Show the staging clone's refs without pulling or importing
        #[arg(long)]
        offline: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = GencConfig::load(&GencConfig::resolve_path(cli.config.as_deref()))
        .context("loading config")?;
    init_logging(cli.log.as_deref(), &config);

    let result = match &cli.command {
        Commands::Clone { url, dir, origin } => {
            cmd_clone(&config, &cli.dir, url, dir, origin).await
        }
        Commands::Push {
            remote,
            branch,
            force,
        } => cmd_push(&config, &cli.dir, remote, branch.as_deref(), *force).await,
        Commands::Pull { remote, branch } => {
            cmd_pull(&config, &cli.dir, remote, branch.as_deref()).await
        }
        Commands::Refs { remote, offline } => {
            cmd_refs(&config, &cli.dir, remote, *offline).await
        }
    };

    if let Err(e) = &result {
        debug!(command = ?cli.command, dir = %cli.dir.display(), error = ?e, "genc failed");
    }
    result
}

/// Level: `--log` / `GIT_ENCRYPTED_LOG`, then `debug` if `DEBUG` is set,
/// then the config file.
fn init_logging(level: Option<&str>, config: &GencConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = match (level, std::env::var_os("DEBUG")) {
        (Some(level), _) => level.to_string(),
        (None, Some(_)) => "debug".to_string(),
        (None, None) => config.log.level.clone(),
    };
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));

    if config.log.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn repo_at<'a>(config: &'a GencConfig, cwd: &'a Path) -> Git<'a> {
    Git {
        binary: &config.transport.git_binary,
        cwd,
    }
}

/// The remote's URL plus an open session when it is encrypted.
async fn open_remote(
    config: &GencConfig,
    git: &Git<'_>,
    remote: &str,
) -> Result<(RemoteUrl, Option<EncryptedSession>)> {
    let url = RemoteUrl::parse(&git.remote_url(remote).await?);
    if !url.is_encrypted() {
        return Ok((url, None));
    }
    let gitdir = git.git_dir().await?;
    let session = EncryptedSession::open(config, &gitdir, url.inner()).await?;
    Ok((url, Some(session)))
}

// ── clone ─────────────────────────────────────────────────────────────────────

async fn cmd_clone(
    config: &GencConfig,
    cwd: &Path,
    url: &str,
    dir: &Path,
    origin: &str,
) -> Result<()> {
    let parsed = RemoteUrl::parse(url);
    if !parsed.is_encrypted() {
        let dir = dir.to_string_lossy();
        return repo_at(config, cwd)
            .passthrough(&["clone", "--origin", origin, url, dir.as_ref()])
            .await;
    }

    let target = cwd.join(dir);
    if tokio::fs::try_exists(&target).await? {
        let mut entries = tokio::fs::read_dir(&target).await?;
        if entries.next_entry().await?.is_some() {
            bail!("destination {} already exists and is not empty", target.display());
        }
    }
    tokio::fs::create_dir_all(&target)
        .await
        .with_context(|| format!("creating {}", target.display()))?;

    let repo = repo_at(config, &target);
    repo.init().await?;
    repo.add_remote(origin, url).await?;

    let gitdir = repo.git_dir().await?;
    let session = EncryptedSession::open(config, &gitdir, parsed.inner()).await?;
    let pairs = session.fetch().await?;
    repo.update_tracking_refs(origin, &pairs).await?;

    match default_branch(&pairs) {
        Some(branch) => {
            repo.checkout_tracking(origin, branch).await?;
            info!(url = %url, branch, "cloned encrypted repository");
        }
        None => info!(url = %url, "cloned an empty encrypted repository"),
    }
    println!("Cloned {url} into {}", target.display());
    Ok(())
}

// ── push ──────────────────────────────────────────────────────────────────────

async fn cmd_push(
    config: &GencConfig,
    cwd: &Path,
    remote: &str,
    branch: Option<&str>,
    force: bool,
) -> Result<()> {
    let repo = repo_at(config, cwd);
    let (url, session) = open_remote(config, &repo, remote).await?;
    let Some(session) = session else {
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        args.push(remote);
        args.extend(branch);
        return repo.passthrough(&args).await;
    };

    let branch = match branch {
        Some(b) => b.to_string(),
        None => repo.current_branch().await?,
    };
    let name = format!("refs/heads/{branch}");
    let update = RefUpdate {
        src: name.clone(),
        dst: name,
        force,
    };

    let outcomes = session.push(std::slice::from_ref(&update)).await?;
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.message {
            None => println!("{} -> {} ({})", update.src, outcome.dst, url.inner()),
            Some(message) => {
                failed += 1;
                eprintln!("! [rejected] {} ({message})", outcome.dst);
            }
        }
    }
    if failed > 0 {
        bail!("failed to push {failed} ref(s) to {}", url.inner());
    }

    let pushed = session.cached_refs().await?;
    repo.update_tracking_refs(remote, &pushed).await?;
    Ok(())
}

// ── pull ──────────────────────────────────────────────────────────────────────

async fn cmd_pull(
    config: &GencConfig,
    cwd: &Path,
    remote: &str,
    branch: Option<&str>,
) -> Result<()> {
    let repo = repo_at(config, cwd);
    let (url, session) = open_remote(config, &repo, remote).await?;
    let Some(session) = session else {
        let mut args = vec!["pull", remote];
        args.extend(branch);
        return repo.passthrough(&args).await;
    };

    let pairs = session.fetch().await?;
    repo.update_tracking_refs(remote, &pairs).await?;

    let branch = match branch {
        Some(b) => b.to_string(),
        None => repo.current_branch().await?,
    };
    let name = format!("refs/heads/{branch}");
    if !pairs.iter().any(|p| p.name == name) {
        return Err(GencError::MissingRef(format!("{name} on {}", url.inner())).into());
    }
    let Some(upstream) = tracking_ref(remote, &name) else {
        bail!("cannot track {name}");
    };
    repo.passthrough(&["merge", "--no-edit", upstream.as_str()]).await
}

// ── refs ──────────────────────────────────────────────────────────────────────

async fn cmd_refs(config: &GencConfig, cwd: &Path, remote: &str, offline: bool) -> Result<()> {
    let repo = repo_at(config, cwd);
    let (url, session) = open_remote(config, &repo, remote).await?;
    let Some(session) = session else {
        bail!("remote {remote} ({}) is not an encrypted:: remote", url.inner());
    };

    let pairs = if offline {
        session.cached_refs().await?
    } else {
        session.fetch().await?
    };
    if !pairs.is_empty() {
        println!("{}", refs_to_git_string(&pairs));
    }
    Ok(())
}
