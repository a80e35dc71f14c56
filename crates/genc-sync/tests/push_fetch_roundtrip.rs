//! Integration test: push → fetch through a directory "remote"
//!
//! Each side gets its own staging clone (a real directory, served through an
//! OpenDAL Fs operator) and an in-memory object database.

mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use common::{commit_file, DirTransport};
use genc_core::{GencError, RefPair, RefUpdate, RefValue};
use genc_crypto::{KdfParams, Keys};
use genc_git::MemoryOdb;
use genc_storage::build_local_operator;
use genc_sync::engine::{fetch, init, push, InitParams, KeyMaterial, SyncContext, SyncOptions};
use genc_sync::{objects, refs};
use tempfile::TempDir;

struct Side {
    _tmp: TempDir,
    staging: PathBuf,
    odb: MemoryOdb,
}

async fn setup(transport: &DirTransport, keys: &Keys) -> Side {
    let tmp = TempDir::new().unwrap();
    let gitdir = tmp.path().join(".git");
    let staging = gitdir.join("encrypted");
    let url = transport.url();

    init(InitParams {
        transport,
        staging_dir: &staging,
        remote_url: &url,
        keys_path: &gitdir.join("encrypted-keys.json"),
        material: KeyMaterial::Keys(keys.clone()),
        kdf: KdfParams::default(),
        throw_on_error: true,
    })
    .await
    .expect("init");

    Side {
        _tmp: tmp,
        staging,
        odb: MemoryOdb::new(),
    }
}

fn ctx<'a>(side: &'a Side, transport: &'a DirTransport) -> SyncContext<'a> {
    SyncContext {
        op: build_local_operator(&side.staging).unwrap(),
        odb: &side.odb,
        transport,
        staging_dir: side.staging.clone(),
        options: SyncOptions {
            concurrency: 4,
            ..SyncOptions::default()
        },
    }
}

fn update(name: &str) -> RefUpdate {
    RefUpdate {
        src: name.into(),
        dst: name.into(),
        force: false,
    }
}

fn file_count(dir: &Path) -> usize {
    let mut count = 0;
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        if entry.file_type().unwrap().is_dir() {
            count += file_count(&entry.path());
        } else {
            count += 1;
        }
    }
    count
}

#[tokio::test]
async fn one_commit_push_creates_one_ref_and_three_objects() {
    let remote = TempDir::new().unwrap();
    let transport = DirTransport::new(remote.path());
    let keys = Keys::generate();
    let side = setup(&transport, &keys).await;

    let c = commit_file(&side.odb, "hello.txt", b"hello\n", &[]);
    side.odb.set_ref("refs/heads/master", c.commit.clone());

    let ctx = ctx(&side, &transport);
    let outcomes = push(&ctx, &keys, &[update("refs/heads/master")]).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_ok(), "{outcomes:?}");

    assert_eq!(objects::list_object_files(&ctx.op).await.unwrap().len(), 3);
    assert_eq!(
        refs::list_all(&ctx.op, &keys).await.unwrap(),
        vec![RefPair::new("refs/heads/master", c.commit.clone())]
    );

    // Published to the remote: 3 objects + 1 ref
    assert_eq!(transport.pushes.load(Ordering::SeqCst), 1);
    assert_eq!(file_count(&remote.path().join("objects")), 3);
    assert_eq!(file_count(&remote.path().join("refs")), 1);
}

#[tokio::test]
async fn nothing_in_the_store_is_plaintext() {
    let remote = TempDir::new().unwrap();
    let transport = DirTransport::new(remote.path());
    let keys = Keys::generate();
    let side = setup(&transport, &keys).await;

    let c = commit_file(&side.odb, "secret-plan.txt", b"launch codes\n", &[]);
    side.odb.set_ref("refs/heads/master", c.commit.clone());
    push(&ctx(&side, &transport), &keys, &[update("refs/heads/master")])
        .await
        .unwrap();

    let mut stack = vec![remote.path().to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let name = entry.file_name().to_string_lossy().into_owned();
            assert!(!name.contains(&c.commit.as_str()[..8]));
            assert!(!name.contains("master"));
            if entry.file_type().unwrap().is_dir() {
                stack.push(entry.path());
            } else {
                let bytes = std::fs::read(entry.path()).unwrap();
                let text = String::from_utf8_lossy(&bytes);
                assert!(!text.contains("refs/heads"));
                assert!(!text.contains(c.commit.as_str()));
            }
        }
    }
}

#[tokio::test]
async fn push_then_fetch_into_independent_repo() {
    let remote = TempDir::new().unwrap();
    let transport = DirTransport::new(remote.path());
    let keys = Keys::generate();

    let a = setup(&transport, &keys).await;
    let c = commit_file(&a.odb, "hello.txt", b"hello\n", &[]);
    a.odb.set_ref("refs/heads/master", c.commit.clone());
    push(&ctx(&a, &transport), &keys, &[update("refs/heads/master")])
        .await
        .unwrap();

    let b = setup(&transport, &keys).await;
    let pairs = fetch(&ctx(&b, &transport), &keys).await.unwrap();

    assert_eq!(pairs, vec![RefPair::new("refs/heads/master", c.commit.clone())]);
    for id in [&c.blob, &c.tree, &c.commit] {
        assert_eq!(b.odb.wrapped(id), a.odb.wrapped(id), "object {id} differs");
    }
}

#[tokio::test]
async fn incremental_push_sends_only_new_objects() {
    let remote = TempDir::new().unwrap();
    let transport = DirTransport::new(remote.path());
    let keys = Keys::generate();
    let side = setup(&transport, &keys).await;
    let ctx = ctx(&side, &transport);

    let c1 = commit_file(&side.odb, "a.txt", b"one\n", &[]);
    side.odb.set_ref("refs/heads/master", c1.commit.clone());
    push(&ctx, &keys, &[update("refs/heads/master")]).await.unwrap();

    let c2 = commit_file(&side.odb, "a.txt", b"two\n", &[&c1.commit]);
    side.odb.set_ref("refs/heads/master", c2.commit.clone());
    let outcomes = push(&ctx, &keys, &[update("refs/heads/master")]).await.unwrap();
    assert!(outcomes[0].is_ok());

    assert_eq!(objects::list_object_files(&ctx.op).await.unwrap().len(), 6);
    assert_eq!(
        refs::read(&ctx.op, "refs/heads/master", &keys).await.unwrap(),
        RefValue::Known(c2.commit)
    );
}

#[tokio::test]
async fn repeated_push_is_idempotent() {
    let remote = TempDir::new().unwrap();
    let transport = DirTransport::new(remote.path());
    let keys = Keys::generate();
    let side = setup(&transport, &keys).await;
    let ctx = ctx(&side, &transport);

    let c = commit_file(&side.odb, "a.txt", b"same\n", &[]);
    side.odb.set_ref("refs/heads/master", c.commit.clone());
    push(&ctx, &keys, &[update("refs/heads/master")]).await.unwrap();
    let before = objects::list_object_files(&ctx.op).await.unwrap();

    let outcomes = push(&ctx, &keys, &[update("refs/heads/master")]).await.unwrap();
    assert!(outcomes[0].is_ok());
    assert_eq!(objects::list_object_files(&ctx.op).await.unwrap(), before);
}

#[tokio::test]
async fn fetch_with_wrong_keys_fails_authentication() {
    let remote = TempDir::new().unwrap();
    let transport = DirTransport::new(remote.path());
    let keys = Keys::generate();

    let a = setup(&transport, &keys).await;
    let c = commit_file(&a.odb, "a.txt", b"x\n", &[]);
    a.odb.set_ref("refs/heads/master", c.commit);
    push(&ctx(&a, &transport), &keys, &[update("refs/heads/master")])
        .await
        .unwrap();

    let other = Keys::generate();
    let b = setup(&transport, &other).await;
    let result = fetch(&ctx(&b, &transport), &other).await;
    assert!(matches!(result, Err(GencError::Authentication(_))));
}

#[tokio::test]
async fn fetch_detects_ref_to_missing_object() {
    let remote = TempDir::new().unwrap();
    let transport = DirTransport::new(remote.path());
    let keys = Keys::generate();
    let side = setup(&transport, &keys).await;
    let ctx = ctx(&side, &transport);

    let dangling = genc_core::ObjectId::parse("ce013625030ba8dba906f756967f9e9ca394464a").unwrap();
    refs::write(&ctx.op, "refs/heads/master", &dangling, &keys).await.unwrap();

    match fetch(&ctx, &keys).await {
        Err(GencError::CorruptStore(msg)) => {
            assert!(msg.contains("not in the encrypted store"), "{msg}");
        }
        other => panic!("expected CorruptStore, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_tolerates_unreachable_remote_by_default() {
    let remote = TempDir::new().unwrap();
    let transport = DirTransport::new(remote.path());
    let keys = Keys::generate();
    let side = setup(&transport, &keys).await;

    transport.fail_pull.store(true, Ordering::SeqCst);
    let pairs = fetch(&ctx(&side, &transport), &keys).await.unwrap();
    assert!(pairs.is_empty());

    let mut strict = ctx(&side, &transport);
    strict.options.throw_on_error = true;
    assert!(matches!(fetch(&strict, &keys).await, Err(GencError::Transport(_))));
}
