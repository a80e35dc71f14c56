//! git-remote-encrypted: git remote helper for `encrypted::<url>` remotes
//!
//! git runs it as:
//!   git-remote-encrypted <remote-name> <url>
//! with `GIT_DIR` set, and talks the remote-helper protocol over
//! stdin/stdout. All logging goes to stderr.

mod protocol;
mod remote;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use genc_core::config::GencConfig;
use genc_crypto::KdfParams;
use genc_git::{GitDir, GitTransport};
use genc_storage::build_local_operator;
use genc_sync::engine::{init, InitParams, KeyMaterial, SyncContext, SyncOptions};
use tracing::{debug, info};

use crate::remote::EncryptedRemote;

#[derive(Parser, Debug)]
#[command(
    name = "git-remote-encrypted",
    version,
    about = "git remote helper for encrypted:: remotes"
)]
struct Cli {
    /// Remote name (or the URL itself for anonymous remotes)
    remote_name: String,

    /// URL of the encrypted repository (without the encrypted:: prefix)
    url: Option<String>,

    /// Path to config.toml
    #[arg(long, short = 'c', env = "GIT_ENCRYPTED_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GIT_ENCRYPTED_LOG")]
    log: Option<String>,

    /// Log format (json, text)
    #[arg(long, env = "GIT_ENCRYPTED_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = GencConfig::load(&GencConfig::resolve_path(cli.config.as_deref()))
        .context("loading config")?;

    init_logging(&cli, &config);

    let url = cli.url.clone().unwrap_or_else(|| cli.remote_name.clone());
    let gitdir = PathBuf::from(std::env::var_os("GIT_DIR").unwrap_or_else(|| ".git".into()));
    info!(
        version = env!("CARGO_PKG_VERSION"),
        remote = %cli.remote_name,
        url = %url,
        gitdir = %gitdir.display(),
        "git-remote-encrypted starting"
    );

    if let Err(e) = run(&config, &gitdir, &url).await {
        debug!(url = %url, gitdir = %gitdir.display(), error = ?e, "remote helper failed");
        return Err(e);
    }
    Ok(())
}

async fn run(config: &GencConfig, gitdir: &Path, url: &str) -> Result<()> {
    let staging_dir = config.staging_dir(gitdir);
    let keys_path = config.keys_path(gitdir);
    let transport = GitTransport::new(&config.transport);
    let odb = GitDir::new(gitdir, config.transport.git_binary.clone());

    let keys = init(InitParams {
        transport: &transport,
        staging_dir: &staging_dir,
        remote_url: url,
        keys_path: &keys_path,
        material: KeyMaterial::from_env(&keys_path),
        kdf: KdfParams::from(&config.crypto),
        throw_on_error: config.sync.throw_on_transport_error,
    })
    .await
    .with_context(|| format!("initialising encrypted remote {url}"))?;

    let ctx = SyncContext {
        op: build_local_operator(&staging_dir)?,
        odb: &odb,
        transport: &transport,
        staging_dir,
        options: SyncOptions::from_config(config),
    };
    let mut remote = EncryptedRemote { ctx, keys };

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    protocol::serve(&mut remote, stdin, tokio::io::stdout()).await
}

/// Level: `--log` / `GIT_ENCRYPTED_LOG`, then `debug` if `DEBUG` is set,
/// then the config file. Always on stderr: stdout belongs to git.
fn init_logging(cli: &Cli, config: &GencConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = match (&cli.log, std::env::var_os("DEBUG")) {
        (Some(level), _) => level.clone(),
        (None, Some(_)) => "debug".to_string(),
        (None, None) => config.log.level.clone(),
    };
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));

    let json = match &cli.log_format {
        Some(format) => matches!(format, LogFormat::Json),
        None => config.log.format == "json",
    };

    if json {
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
