//! Local object database capability
//!
//! [`GitDir`] reads loose objects straight from `.git/objects` and falls back
//! to `git cat-file` for packed ones; writes always produce loose objects.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use genc_core::{GencError, GencResult, ObjectId};

use crate::cmd::{git_checked, git_output};
use crate::loose::{deflate, inflate, object_id, unwrap, wrap, ObjectKind};

/// An object as handed back by the local database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawObject {
    /// Kind and payload, no framing.
    Content { kind: ObjectKind, data: Vec<u8> },
    /// A zlib-compressed, framed loose object exactly as stored on disk.
    Deflated(Vec<u8>),
}

impl RawObject {
    /// Kind and payload, inflating and unframing if needed.
    pub fn decode(self) -> GencResult<(ObjectKind, Vec<u8>)> {
        match self {
            RawObject::Content { kind, data } => Ok((kind, data)),
            RawObject::Deflated(bytes) => {
                let wrapped = inflate(&bytes)?;
                let (kind, payload) = unwrap(&wrapped)?;
                Ok((kind, payload.to_vec()))
            }
        }
    }

    /// The loose-object file bytes (framed + deflated).
    pub fn into_deflated(self) -> GencResult<Vec<u8>> {
        match self {
            RawObject::Content { kind, data } => deflate(&wrap(kind, &data)),
            RawObject::Deflated(bytes) => Ok(bytes),
        }
    }
}

#[async_trait]
pub trait ObjectDatabase: Send + Sync {
    /// Read an object. Missing objects are `GencError::MissingObject`.
    async fn read_object(&self, id: &ObjectId) -> GencResult<RawObject>;

    /// Store framed (uncompressed) object bytes, returning their id.
    async fn write_wrapped(&self, wrapped: &[u8]) -> GencResult<ObjectId>;

    async fn has_object(&self, id: &ObjectId) -> GencResult<bool>;

    /// Resolve a ref name (or any revision) to an object id.
    async fn resolve_ref(&self, name: &str) -> GencResult<Option<ObjectId>>;
}

/// A real git directory (`.git`).
#[derive(Debug, Clone)]
pub struct GitDir {
    git_dir: PathBuf,
    git_binary: String,
}

impl GitDir {
    pub fn new(git_dir: impl Into<PathBuf>, git_binary: impl Into<String>) -> Self {
        Self {
            git_dir: git_dir.into(),
            git_binary: git_binary.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.git_dir
    }

    fn loose_path(&self, id: &ObjectId) -> PathBuf {
        let (shard, rest) = id.as_str().split_at(2);
        self.git_dir.join("objects").join(shard).join(rest)
    }

    async fn git(&self, args: &[&str]) -> GencResult<std::process::Output> {
        let git_dir = self.git_dir.to_string_lossy();
        let mut full = vec!["--git-dir", git_dir.as_ref()];
        full.extend_from_slice(args);
        git_output(&self.git_binary, None, &full).await
    }

    /// Packed objects: ask git for the type, then the payload.
    async fn cat_file(&self, id: &ObjectId) -> GencResult<RawObject> {
        let typed = self.git(&["cat-file", "-t", id.as_str()]).await?;
        if !typed.status.success() {
            return Err(GencError::MissingObject(id.to_string()));
        }
        let kind_str = String::from_utf8_lossy(&typed.stdout).trim().to_string();
        let kind: ObjectKind = kind_str.parse().map_err(|_| GencError::UnsupportedObjectFormat {
            id: id.to_string(),
            detail: format!("object type {kind_str:?}"),
        })?;

        let git_dir = self.git_dir.to_string_lossy();
        let output = git_checked(
            &self.git_binary,
            None,
            &["--git-dir", git_dir.as_ref(), "cat-file", kind.as_str(), id.as_str()],
        )
        .await
        .map_err(|e| GencError::MissingObject(format!("{id}: {e}")))?;

        Ok(RawObject::Content {
            kind,
            data: output.stdout,
        })
    }
}

#[async_trait]
impl ObjectDatabase for GitDir {
    async fn read_object(&self, id: &ObjectId) -> GencResult<RawObject> {
        match tokio::fs::read(self.loose_path(id)).await {
            Ok(bytes) => return Ok(RawObject::Deflated(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if id.is_empty_tree() {
            return Ok(RawObject::Content {
                kind: ObjectKind::Tree,
                data: Vec::new(),
            });
        }
        self.cat_file(id).await
    }

    async fn write_wrapped(&self, wrapped: &[u8]) -> GencResult<ObjectId> {
        unwrap(wrapped)?;
        let id = object_id(wrapped);
        let path = self.loose_path(&id);
        if tokio::fs::try_exists(&path).await? {
            return Ok(id);
        }

        let deflated = deflate(wrapped)?;
        let parent = path
            .parent()
            .ok_or_else(|| GencError::InvalidObject(format!("no shard dir for {id}")))?;
        tokio::fs::create_dir_all(parent).await?;

        // Atomic write: temp file in the shard dir, then rename
        let tmp = parent.join(format!(".tmp-{}", &id.as_str()[2..]));
        tokio::fs::write(&tmp, &deflated).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::trace!(id = %id, "wrote loose object");
        Ok(id)
    }

    async fn has_object(&self, id: &ObjectId) -> GencResult<bool> {
        if id.is_empty_tree() || tokio::fs::try_exists(self.loose_path(id)).await? {
            return Ok(true);
        }
        let output = self.git(&["cat-file", "-e", id.as_str()]).await?;
        Ok(output.status.success())
    }

    async fn resolve_ref(&self, name: &str) -> GencResult<Option<ObjectId>> {
        let output = self.git(&["rev-parse", "--verify", "--quiet", name]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        let id = ObjectId::parse(&String::from_utf8_lossy(&output.stdout))?;
        Ok(Some(id))
    }
}
