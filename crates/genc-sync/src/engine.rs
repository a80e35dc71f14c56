//! Sync engine: init, fetch and push against the encrypted staging repo
//!
//! Every capability is injected through [`SyncContext`]:
//!   - `op`: OpenDAL operator rooted at the staging clone
//!   - `odb`: the plaintext local object database
//!   - `transport`: clone/pull/commit/push of the staging clone
//!
//! Fetch only fills the local object database and reports refs; updating
//! local refs and the working tree is left to the host VCS. Push exports the
//! missing objects of each ref before writing that ref, so an interrupted push
//! never leaves an encrypted ref pointing at objects the store lacks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use genc_core::config::GencConfig;
use genc_core::{GencError, GencResult, ObjectId, PushOutcome, RefPair, RefUpdate};
use genc_crypto::{
    derive_master_key, generate_salt, load_keys, save_keys, KdfParams, Keys, SALT_SIZE,
};
use genc_git::{is_ancestor, objects_to_push, ObjectDatabase, Transport};
use genc_storage::layout::{OBJECTS_DIR, REFS_DIR};
use opendal::Operator;
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::objects::{export_object, has_object, import_all_objects};
use crate::refs;

/// Plaintext Argon2id salt at the root of the staging clone.
pub const SALT_FILE: &str = "salt";

/// Passphrase used to derive keys when no key file exists yet.
pub const PASSPHRASE_ENV: &str = "GIT_ENCRYPTED_PASSPHRASE";

/// Behaviour knobs, usually taken from `[sync]` and `[transport]` config.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Max in-flight object imports/exports (and refs pushed at once)
    pub concurrency: usize,
    /// Propagate transport failures instead of downgrading them
    pub throw_on_error: bool,
    pub pull_before_push: bool,
    pub commit_message: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&GencConfig::default())
    }
}

impl SyncOptions {
    pub fn from_config(cfg: &GencConfig) -> Self {
        Self {
            concurrency: cfg.sync.concurrency.max(1),
            throw_on_error: cfg.sync.throw_on_transport_error,
            pull_before_push: cfg.sync.pull_before_push,
            commit_message: cfg.transport.commit_message.clone(),
        }
    }

    /// Fan-out limit; never zero, which would stall the stream.
    pub fn limit(&self) -> usize {
        self.concurrency.max(1)
    }
}

pub struct SyncContext<'a> {
    pub op: Operator,
    pub odb: &'a dyn ObjectDatabase,
    pub transport: &'a dyn Transport,
    pub staging_dir: PathBuf,
    pub options: SyncOptions,
}

/// Where the key bundle comes from.
pub enum KeyMaterial {
    /// Ready-made keys (tests, migrations)
    Keys(Keys),
    /// Derive from a passphrase and the staging repo's salt
    Passphrase(SecretString),
    /// Previously persisted key file
    Persisted,
}

impl KeyMaterial {
    /// A persisted key file wins; otherwise `GIT_ENCRYPTED_PASSPHRASE`.
    ///
    /// With neither, `Persisted` is returned and `init` reports the missing keys.
    pub fn from_env(keys_path: &Path) -> Self {
        if keys_path.exists() {
            return KeyMaterial::Persisted;
        }
        match std::env::var(PASSPHRASE_ENV) {
            Ok(passphrase) if !passphrase.is_empty() => {
                KeyMaterial::Passphrase(SecretString::from(passphrase))
            }
            _ => KeyMaterial::Persisted,
        }
    }
}

pub struct InitParams<'a> {
    pub transport: &'a dyn Transport,
    pub staging_dir: &'a Path,
    pub remote_url: &'a str,
    pub keys_path: &'a Path,
    pub material: KeyMaterial,
    pub kdf: KdfParams,
    pub throw_on_error: bool,
}

/// Prepare the staging clone and resolve keys. Idempotent.
///
/// A tolerated clone failure still lays out an empty store so the session
/// can run; the next `init` notices the staging dir is not a clone and
/// clones again.
pub async fn init(params: InitParams<'_>) -> GencResult<Keys> {
    let staging = params.staging_dir;

    if params.transport.is_clone(staging).await? {
        debug!(dir = %staging.display(), "reusing staging repo");
    } else {
        // Left behind by an earlier clone that failed; start over
        if tokio::fs::try_exists(staging).await? {
            warn!(dir = %staging.display(), "staging dir is not a clone, cloning again");
            tokio::fs::remove_dir_all(staging).await?;
        }
        if let Some(parent) = staging.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let cloned = params.transport.clone_repo(staging, params.remote_url).await;
        tolerate(params.throw_on_error, cloned, "clone")?;
    }
    for dir in [OBJECTS_DIR, REFS_DIR] {
        tokio::fs::create_dir_all(staging.join(dir)).await?;
    }

    let keys = match params.material {
        KeyMaterial::Keys(keys) => keys,
        KeyMaterial::Passphrase(passphrase) => {
            let salt = read_or_create_salt(staging).await?;
            let kdf = params.kdf;
            let master = tokio::task::spawn_blocking(move || {
                derive_master_key(&passphrase, &salt, &kdf)
            })
            .await
            .map_err(|e| GencError::Keys(format!("key derivation task failed: {e}")))??;
            Keys::from_master(&master)?
        }
        KeyMaterial::Persisted => {
            return load_keys(params.keys_path)?.ok_or_else(|| {
                GencError::Keys(format!(
                    "no key file at {} and no passphrase given",
                    params.keys_path.display()
                ))
            });
        }
    };

    save_keys(params.keys_path, &keys)?;
    info!(dir = %staging.display(), url = %params.remote_url, "initialised encrypted remote");
    Ok(keys)
}

async fn read_or_create_salt(staging: &Path) -> GencResult<[u8; SALT_SIZE]> {
    let path = staging.join(SALT_FILE);
    match tokio::fs::read(&path).await {
        Ok(bytes) => bytes.as_slice().try_into().map_err(|_| {
            GencError::CorruptStore(format!(
                "salt file is {} bytes, expected {SALT_SIZE}",
                bytes.len()
            ))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let salt = generate_salt();
            tokio::fs::write(&path, salt).await?;
            debug!(path = %path.display(), "created new key derivation salt");
            Ok(salt)
        }
        Err(e) => Err(e.into()),
    }
}

/// Pull, import every object, and report the encrypted refs.
///
/// Fails with `CorruptStore` if a ref names an object that did not arrive.
pub async fn fetch(ctx: &SyncContext<'_>, keys: &Keys) -> GencResult<Vec<RefPair>> {
    let pulled = ctx.transport.pull(&ctx.staging_dir).await;
    tolerate(ctx.options.throw_on_error, pulled, "pull")?;

    let imported = import_all_objects(&ctx.op, ctx.odb, keys, ctx.options.limit()).await?;
    let pairs = refs::list_all(&ctx.op, keys).await?;

    for pair in &pairs {
        if ctx.odb.has_object(&pair.target).await? {
            continue;
        }
        let detail = if has_object(&ctx.op, &pair.target, keys).await? {
            "which is in the encrypted store but did not import"
        } else {
            "which is not in the encrypted store"
        };
        return Err(GencError::CorruptStore(format!(
            "ref {} points at {} {detail}",
            pair.name, pair.target
        )));
    }

    info!(objects = imported.len(), refs = pairs.len(), "fetched encrypted remote");
    Ok(pairs)
}

/// Export and publish each update. Outcomes come back in input order.
///
/// Only `Authentication`, `CorruptStore`, and `UnsupportedObjectFormat`
/// errors abort the whole push; anything else fails just that ref.
pub async fn push(
    ctx: &SyncContext<'_>,
    keys: &Keys,
    updates: &[RefUpdate],
) -> GencResult<Vec<PushOutcome>> {
    if ctx.options.pull_before_push {
        if let Err(e) = ctx.transport.pull(&ctx.staging_dir).await {
            warn!(error = %e, "pull before push failed, continuing");
        }
    }

    let remote = refs::list_all(&ctx.op, keys).await?;
    let haves: Vec<ObjectId> = remote.iter().map(|p| p.target.clone()).collect();
    let current: HashMap<&str, &ObjectId> =
        remote.iter().map(|p| (p.name.as_str(), &p.target)).collect();

    let pushes: Vec<_> = updates
        .iter()
        .map(|update| {
            let current = current.get(update.dst.as_str()).copied();
            push_ref(ctx, keys, update, &haves, current).boxed()
        })
        .collect();
    let mut outcomes: Vec<PushOutcome> = stream::iter(pushes)
        .buffered(ctx.options.limit())
        .try_collect()
        .await?;

    if !outcomes.iter().any(PushOutcome::is_ok) {
        return Ok(outcomes);
    }

    if let Err(e) = publish(ctx).await {
        if ctx.options.throw_on_error || !e.is_transport() {
            return Err(e);
        }
        warn!(error = %e, "encrypted push failed, reporting refs as failed");
        for outcome in outcomes.iter_mut().filter(|o| o.is_ok()) {
            let message = format!("encrypted push failed: {e}");
            *outcome = PushOutcome::error(outcome.dst.clone(), message);
        }
    }
    Ok(outcomes)
}

async fn publish(ctx: &SyncContext<'_>) -> GencResult<()> {
    let committed = ctx
        .transport
        .commit(&ctx.staging_dir, &ctx.options.commit_message)
        .await?;
    debug!(committed, "committed staging repo");
    ctx.transport.push(&ctx.staging_dir).await
}

/// One ref: fatal errors propagate, everything else becomes an `error` outcome.
async fn push_ref(
    ctx: &SyncContext<'_>,
    keys: &Keys,
    update: &RefUpdate,
    haves: &[ObjectId],
    current: Option<&ObjectId>,
) -> GencResult<PushOutcome> {
    match try_push_ref(ctx, keys, update, haves, current).await {
        Ok(None) => {
            info!(ref_name = %update.dst, "pushed ref");
            Ok(PushOutcome::ok(&update.dst))
        }
        Ok(Some(rejection)) => {
            warn!(ref_name = %update.dst, reason = %rejection, "ref rejected");
            Ok(PushOutcome::error(&update.dst, rejection))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(ref_name = %update.dst, error = %e, "ref push failed");
            Ok(PushOutcome::error(&update.dst, e.to_string()))
        }
    }
}

/// `Ok(Some(reason))` rejects the ref without an error.
async fn try_push_ref(
    ctx: &SyncContext<'_>,
    keys: &Keys,
    update: &RefUpdate,
    haves: &[ObjectId],
    current: Option<&ObjectId>,
) -> GencResult<Option<String>> {
    if update.src.is_empty() {
        return Ok(Some("deleting remote refs is not supported".into()));
    }
    let Some(tip) = ctx.odb.resolve_ref(&update.src).await? else {
        return Ok(Some(format!("src refspec {} does not match any", update.src)));
    };

    if let Some(current) = current {
        if !update.force && !is_ancestor(ctx.odb, current, &tip).await? {
            return Ok(Some("non-fast-forward".into()));
        }
    }

    let objects = objects_to_push(ctx.odb, &tip, haves).await?;
    debug!(ref_name = %update.dst, count = objects.len(), "exporting objects");

    let exports: Vec<_> = objects
        .iter()
        .map(|id| export_object(&ctx.op, ctx.odb, id, keys).boxed())
        .collect();
    stream::iter(exports)
        .buffer_unordered(ctx.options.limit())
        .try_collect::<Vec<()>>()
        .await?;

    refs::write(&ctx.op, &update.dst, &tip, keys).await?;
    Ok(None)
}

/// Downgrade transport failures to warnings unless `throw_on_error`.
fn tolerate(throw_on_error: bool, result: GencResult<()>, what: &str) -> GencResult<()> {
    match result {
        Err(e) if e.is_transport() && !throw_on_error => {
            warn!(error = %e, "{what} of encrypted repo failed, continuing");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerate_only_transport() {
        let transport = Err(GencError::Transport("offline".into()));
        assert!(tolerate(false, transport, "pull").is_ok());

        let transport = Err(GencError::Transport("offline".into()));
        assert!(tolerate(true, transport, "pull").is_err());

        let auth = Err(GencError::Authentication("bad tag".into()));
        assert!(tolerate(false, auth, "pull").is_err());
    }

    #[test]
    fn test_existing_key_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(KeyMaterial::from_env(&path), KeyMaterial::Persisted));
    }

    #[test]
    fn test_options_from_config() {
        let mut cfg = GencConfig::default();
        cfg.sync.concurrency = 0;
        let opts = SyncOptions::from_config(&cfg);
        assert_eq!(opts.concurrency, 1);

        let zero = SyncOptions {
            concurrency: 0,
            ..SyncOptions::default()
        };
        assert_eq!(zero.limit(), 1);
        assert!(!opts.throw_on_error);
        assert_eq!(opts.commit_message, "Encrypted push");
    }
}
