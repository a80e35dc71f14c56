//! An initialised encrypted remote for one working repository

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use genc_core::config::GencConfig;
use genc_core::{PushOutcome, RefPair, RefUpdate};
use genc_crypto::{KdfParams, Keys};
use genc_git::{GitDir, GitTransport};
use genc_storage::build_local_operator;
use genc_sync::engine::{self, InitParams, KeyMaterial, SyncContext, SyncOptions};
use genc_sync::refs;
use opendal::Operator;

pub struct EncryptedSession {
    odb: GitDir,
    transport: GitTransport,
    op: Operator,
    staging_dir: PathBuf,
    options: SyncOptions,
    keys: Keys,
}

impl EncryptedSession {
    /// Clone or reuse the staging repo under `gitdir` and resolve keys.
    pub async fn open(config: &GencConfig, gitdir: &Path, url: &str) -> Result<Self> {
        let staging_dir = config.staging_dir(gitdir);
        let keys_path = config.keys_path(gitdir);
        let transport = GitTransport::new(&config.transport);

        let keys = engine::init(InitParams {
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

        Ok(Self {
            odb: GitDir::new(gitdir, config.transport.git_binary.clone()),
            transport,
            op: build_local_operator(&staging_dir)?,
            staging_dir,
            options: SyncOptions::from_config(config),
            keys,
        })
    }

    fn ctx(&self) -> SyncContext<'_> {
        SyncContext {
            op: self.op.clone(),
            odb: &self.odb,
            transport: &self.transport,
            staging_dir: self.staging_dir.clone(),
            options: self.options.clone(),
        }
    }

    pub async fn fetch(&self) -> Result<Vec<RefPair>> {
        Ok(engine::fetch(&self.ctx(), &self.keys).await?)
    }

    pub async fn push(&self, updates: &[RefUpdate]) -> Result<Vec<PushOutcome>> {
        Ok(engine::push(&self.ctx(), &self.keys, updates).await?)
    }

    /// Refs currently in the staging clone, without pulling.
    pub async fn cached_refs(&self) -> Result<Vec<RefPair>> {
        Ok(refs::list_all(&self.op, &self.keys).await?)
    }
}
