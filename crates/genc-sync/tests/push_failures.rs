//! Integration test: per-ref failure containment during push

mod common;

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use common::{commit_file, DirTransport};
use genc_core::{GencError, PushStatus, RefUpdate, RefValue};
use genc_crypto::{KdfParams, Keys};
use genc_git::MemoryOdb;
use genc_storage::build_local_operator;
use genc_sync::engine::{init, push, InitParams, KeyMaterial, SyncContext, SyncOptions};
use genc_sync::refs;
use tempfile::TempDir;

struct Fixture {
    _remote: TempDir,
    _local: TempDir,
    staging: PathBuf,
    transport: DirTransport,
    odb: MemoryOdb,
    keys: Keys,
}

impl Fixture {
    async fn new() -> Self {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let transport = DirTransport::new(remote.path());
        let staging = local.path().join(".git/encrypted");
        let keys = Keys::generate();

        init(InitParams {
            transport: &transport,
            staging_dir: &staging,
            remote_url: &transport.url(),
            keys_path: &local.path().join(".git/encrypted-keys.json"),
            material: KeyMaterial::Keys(keys.clone()),
            kdf: KdfParams::default(),
            throw_on_error: true,
        })
        .await
        .unwrap();

        Self {
            _remote: remote,
            _local: local,
            staging,
            transport,
            odb: MemoryOdb::new(),
            keys,
        }
    }

    fn ctx(&self) -> SyncContext<'_> {
        SyncContext {
            op: build_local_operator(&self.staging).unwrap(),
            odb: &self.odb,
            transport: &self.transport,
            staging_dir: self.staging.clone(),
            options: SyncOptions::default(),
        }
    }
}

fn update(src: &str, dst: &str, force: bool) -> RefUpdate {
    RefUpdate {
        src: src.into(),
        dst: dst.into(),
        force,
    }
}

#[tokio::test]
async fn failed_export_leaves_only_that_ref_untouched() {
    let fx = Fixture::new().await;
    let good = commit_file(&fx.odb, "good.txt", b"good\n", &[]);
    let bad = commit_file(&fx.odb, "bad.txt", b"bad\n", &[]);
    fx.odb.set_ref("refs/heads/main", good.commit.clone());
    fx.odb.set_ref("refs/heads/feature", bad.commit.clone());
    fx.odb.fail_reads_for(&bad.blob);

    let ctx = fx.ctx();
    let outcomes = push(
        &ctx,
        &fx.keys,
        &[
            update("refs/heads/main", "refs/heads/main", false),
            update("refs/heads/feature", "refs/heads/feature", false),
        ],
    )
    .await
    .unwrap();

    assert_eq!(outcomes[0].dst, "refs/heads/main");
    assert_eq!(outcomes[0].status, PushStatus::Ok);
    assert_eq!(outcomes[1].dst, "refs/heads/feature");
    assert_eq!(outcomes[1].status, PushStatus::Error);

    assert_eq!(
        refs::read(&ctx.op, "refs/heads/main", &fx.keys).await.unwrap(),
        RefValue::Known(good.commit)
    );
    assert_eq!(
        refs::read(&ctx.op, "refs/heads/feature", &fx.keys).await.unwrap(),
        RefValue::Unknown
    );
}

#[tokio::test]
async fn failed_export_keeps_previous_ref_value() {
    let fx = Fixture::new().await;
    let ctx = fx.ctx();

    let first = commit_file(&fx.odb, "a.txt", b"first\n", &[]);
    fx.odb.set_ref("refs/heads/main", first.commit.clone());
    let outcomes = push(&ctx, &fx.keys, &[update("refs/heads/main", "refs/heads/main", false)])
        .await
        .unwrap();
    assert!(outcomes[0].is_ok());

    let second = commit_file(&fx.odb, "a.txt", b"second\n", &[&first.commit]);
    fx.odb.set_ref("refs/heads/main", second.commit.clone());
    fx.odb.fail_reads_for(&second.tree);

    let outcomes = push(&ctx, &fx.keys, &[update("refs/heads/main", "refs/heads/main", false)])
        .await
        .unwrap();
    assert_eq!(outcomes[0].status, PushStatus::Error);
    assert_eq!(
        refs::read(&ctx.op, "refs/heads/main", &fx.keys).await.unwrap(),
        RefValue::Known(first.commit)
    );
}

#[tokio::test]
async fn zero_concurrency_still_pushes() {
    let fx = Fixture::new().await;
    let mut ctx = fx.ctx();
    ctx.options.concurrency = 0;

    let c = commit_file(&fx.odb, "a.txt", b"a\n", &[]);
    fx.odb.set_ref("refs/heads/main", c.commit.clone());
    let pushed = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        push(&ctx, &fx.keys, &[update("refs/heads/main", "refs/heads/main", false)]),
    )
    .await
    .expect("push with concurrency 0 must not stall")
    .unwrap();
    assert!(pushed[0].is_ok());
}

#[tokio::test]
async fn deletion_is_rejected() {
    let fx = Fixture::new().await;
    let outcomes = push(&fx.ctx(), &fx.keys, &[update("", "refs/heads/main", false)])
        .await
        .unwrap();

    assert_eq!(outcomes[0].status, PushStatus::Error);
    assert_eq!(fx.transport.commits.load(Ordering::SeqCst), 0, "nothing to publish");
}

#[tokio::test]
async fn unknown_src_is_rejected() {
    let fx = Fixture::new().await;
    let outcomes = push(&fx.ctx(), &fx.keys, &[update("refs/heads/nope", "refs/heads/nope", false)])
        .await
        .unwrap();

    assert_eq!(outcomes[0].status, PushStatus::Error);
    assert!(outcomes[0].message.as_deref().unwrap().contains("refs/heads/nope"));
}

#[tokio::test]
async fn non_fast_forward_requires_force() {
    let fx = Fixture::new().await;
    let ctx = fx.ctx();

    let first = commit_file(&fx.odb, "a.txt", b"first\n", &[]);
    fx.odb.set_ref("refs/heads/main", first.commit.clone());
    push(&ctx, &fx.keys, &[update("refs/heads/main", "refs/heads/main", false)])
        .await
        .unwrap();

    let rewritten = commit_file(&fx.odb, "a.txt", b"rewritten\n", &[]);
    fx.odb.set_ref("refs/heads/main", rewritten.commit.clone());

    let outcomes = push(&ctx, &fx.keys, &[update("refs/heads/main", "refs/heads/main", false)])
        .await
        .unwrap();
    assert_eq!(outcomes[0].status, PushStatus::Error);
    assert_eq!(outcomes[0].message.as_deref(), Some("non-fast-forward"));

    let outcomes = push(&ctx, &fx.keys, &[update("refs/heads/main", "refs/heads/main", true)])
        .await
        .unwrap();
    assert!(outcomes[0].is_ok());
    assert_eq!(
        refs::read(&ctx.op, "refs/heads/main", &fx.keys).await.unwrap(),
        RefValue::Known(rewritten.commit)
    );
}

#[tokio::test]
async fn publish_failure_turns_outcomes_into_errors() {
    let fx = Fixture::new().await;
    let c = commit_file(&fx.odb, "a.txt", b"x\n", &[]);
    fx.odb.set_ref("refs/heads/main", c.commit);
    fx.transport.fail_push.store(true, Ordering::SeqCst);

    let outcomes = push(&fx.ctx(), &fx.keys, &[update("refs/heads/main", "refs/heads/main", false)])
        .await
        .unwrap();
    assert_eq!(outcomes[0].status, PushStatus::Error);
    assert!(outcomes[0].message.as_deref().unwrap().contains("encrypted push failed"));
}

#[tokio::test]
async fn publish_failure_propagates_when_throwing() {
    let fx = Fixture::new().await;
    let c = commit_file(&fx.odb, "a.txt", b"x\n", &[]);
    fx.odb.set_ref("refs/heads/main", c.commit);
    fx.transport.fail_push.store(true, Ordering::SeqCst);

    let mut ctx = fx.ctx();
    ctx.options.throw_on_error = true;
    let result = push(&ctx, &fx.keys, &[update("refs/heads/main", "refs/heads/main", false)]).await;
    assert!(matches!(result, Err(GencError::Transport(_))));
}

#[tokio::test]
async fn pull_failure_before_push_is_not_fatal() {
    let fx = Fixture::new().await;
    let c = commit_file(&fx.odb, "a.txt", b"x\n", &[]);
    fx.odb.set_ref("refs/heads/main", c.commit);
    fx.transport.fail_pull.store(true, Ordering::SeqCst);

    let mut ctx = fx.ctx();
    ctx.options.throw_on_error = true;
    let outcomes = push(&ctx, &fx.keys, &[update("refs/heads/main", "refs/heads/main", false)])
        .await
        .unwrap();
    assert!(outcomes[0].is_ok());
}

#[tokio::test]
async fn foreign_ref_aborts_push() {
    let fx = Fixture::new().await;
    let ctx = fx.ctx();
    // A ref sealed with foreign keys cannot be listed
    refs::write(
        &ctx.op,
        "refs/heads/main",
        &genc_core::ObjectId::empty_tree(),
        &Keys::generate(),
    )
    .await
    .unwrap();

    let c = commit_file(&fx.odb, "a.txt", b"x\n", &[]);
    fx.odb.set_ref("refs/heads/main", c.commit);
    let result = push(&ctx, &fx.keys, &[update("refs/heads/main", "refs/heads/main", false)]).await;
    assert!(matches!(result, Err(GencError::Authentication(_))));
}
