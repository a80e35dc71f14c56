use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GencError, GencResult};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "GIT_ENCRYPTED_CONFIG";

/// Default config location (tilde-expanded at load time).
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/git-encrypted/config.toml";

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GencConfig {
    pub log: LogConfig,
    pub sync: SyncConfig,
    pub transport: TransportConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn; the helper's stdout belongs to git)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Staging clone directory name inside the git dir
    pub staging_dir: String,
    /// Max in-flight object imports/exports
    pub concurrency: usize,
    /// Propagate transport failures instead of reporting per-ref errors
    pub throw_on_transport_error: bool,
    /// Pull the staging repo before exporting on push
    pub pull_before_push: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// git executable used to move the encrypted repo around
    pub git_binary: String,
    /// Commit message for staging repo commits
    pub commit_message: String,
    pub author_name: String,
    pub author_email: String,
}

/// Key derivation and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Key file name, relative to the git dir
    pub keys_file: String,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            staging_dir: "encrypted".into(),
            concurrency: 8,
            throw_on_transport_error: false,
            pull_before_push: true,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            git_binary: "git".into(),
            commit_message: "Encrypted push".into(),
            author_name: "Encryption".into(),
            author_email: "encryption@localhost".into(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            keys_file: "encrypted-keys.json".into(),
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl GencConfig {
    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> GencResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| GencError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Config path: explicit override > `GIT_ENCRYPTED_CONFIG` > default.
    pub fn resolve_path(override_path: Option<&Path>) -> PathBuf {
        if let Some(p) = override_path {
            return p.to_path_buf();
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(p) => PathBuf::from(p),
            None => expand_tilde(Path::new(DEFAULT_CONFIG_PATH)),
        }
    }

    /// Staging clone location for a given git dir.
    pub fn staging_dir(&self, gitdir: &Path) -> PathBuf {
        gitdir.join(&self.sync.staging_dir)
    }

    /// Key file location for a given git dir.
    pub fn keys_path(&self, gitdir: &Path) -> PathBuf {
        gitdir.join(&self.crypto.keys_file)
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}
