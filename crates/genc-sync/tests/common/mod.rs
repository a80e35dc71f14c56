//! Shared fixtures: a directory-copying transport and commit builders.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use genc_core::{GencError, GencResult, ObjectId};
use genc_git::{MemoryOdb, ObjectKind, Transport};

/// Written by `clone_repo` so `is_clone` can tell a clone from leftovers.
pub const CLONE_MARKER: &str = ".cloned";

/// "Remote" is a plain directory; pull/push copy files between it and the
/// staging dir, clone copies it wholesale.
#[derive(Debug)]
pub struct DirTransport {
    pub remote: PathBuf,
    pub fail_pull: AtomicBool,
    pub fail_push: AtomicBool,
    pub commits: AtomicUsize,
    pub pushes: AtomicUsize,
}

impl DirTransport {
    pub fn new(remote: &Path) -> Self {
        std::fs::create_dir_all(remote).expect("create remote dir");
        Self {
            remote: remote.to_path_buf(),
            fail_pull: AtomicBool::new(false),
            fail_push: AtomicBool::new(false),
            commits: AtomicUsize::new(0),
            pushes: AtomicUsize::new(0),
        }
    }

    pub fn url(&self) -> String {
        self.remote.to_string_lossy().into_owned()
    }
}

pub fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[async_trait]
impl Transport for DirTransport {
    async fn clone_repo(&self, dir: &Path, url: &str) -> GencResult<()> {
        copy_dir(Path::new(url), dir)
            .and_then(|()| std::fs::write(dir.join(CLONE_MARKER), b""))
            .map_err(|e| GencError::Transport(format!("clone: {e}")))
    }

    async fn is_clone(&self, dir: &Path) -> GencResult<bool> {
        Ok(dir.join(CLONE_MARKER).is_file())
    }

    async fn pull(&self, dir: &Path) -> GencResult<()> {
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(GencError::Transport("remote unreachable".into()));
        }
        copy_dir(&self.remote, dir).map_err(|e| GencError::Transport(format!("pull: {e}")))
    }

    async fn commit(&self, _dir: &Path, _message: &str) -> GencResult<bool> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn push(&self, dir: &Path) -> GencResult<()> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(GencError::Transport("remote rejected push".into()));
        }
        self.pushes.fetch_add(1, Ordering::SeqCst);
        copy_dir(dir, &self.remote).map_err(|e| GencError::Transport(format!("push: {e}")))
    }
}

pub fn tree_payload(entries: &[(&str, &str, &ObjectId)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (mode, name, id) in entries {
        out.extend_from_slice(format!("{mode} {name}\0").as_bytes());
        for i in 0..20 {
            let byte = u8::from_str_radix(&id.as_str()[i * 2..i * 2 + 2], 16).expect("hex id");
            out.push(byte);
        }
    }
    out
}

pub fn commit_payload(tree: &ObjectId, parents: &[&ObjectId], msg: &str) -> Vec<u8> {
    let mut s = format!("tree {tree}\n");
    for p in parents {
        s.push_str(&format!("parent {p}\n"));
    }
    s.push_str("author Dev <dev@example.com> 1700000000 +0000\n");
    s.push_str("committer Dev <dev@example.com> 1700000000 +0000\n\n");
    s.push_str(msg);
    s.push('\n');
    s.into_bytes()
}

/// Objects of a commit holding one file.
pub struct OneFileCommit {
    pub blob: ObjectId,
    pub tree: ObjectId,
    pub commit: ObjectId,
}

/// Commit a single file `name` with `content` on top of `parents`.
pub fn commit_file(
    odb: &MemoryOdb,
    name: &str,
    content: &[u8],
    parents: &[&ObjectId],
) -> OneFileCommit {
    let blob = odb.insert(ObjectKind::Blob, content);
    let tree = odb.insert(ObjectKind::Tree, &tree_payload(&[("100644", name, &blob)]));
    let commit = odb.insert(
        ObjectKind::Commit,
        &commit_payload(&tree, parents, &format!("add {name}")),
    );
    OneFileCommit { blob, tree, commit }
}
