//! Store I/O helpers over an OpenDAL operator

use genc_core::GencResult;
use opendal::{ErrorKind, Operator};

use crate::layout::{path_for, EntryKind};

/// A direct child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    /// Name without any trailing slash
    pub name: String,
    pub is_dir: bool,
}

/// Create `dir` if needed. Idempotent.
///
/// Backends without real directories (object stores, memory) report
/// `Unsupported`; writes there create parents implicitly.
pub async fn ensure_dir(op: &Operator, dir: &str) -> GencResult<()> {
    let dir_key = if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{dir}/")
    };
    match op.create_dir(&dir_key).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::Unsupported => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write an encrypted entry at its layout path, creating its directory first.
pub async fn write_encrypted(
    op: &Operator,
    kind: EntryKind,
    encrypted_filename: &str,
    bytes: Vec<u8>,
) -> GencResult<()> {
    let target = path_for(encrypted_filename, kind)?;
    ensure_dir(op, &target.dir).await?;
    op.write(&target.path, bytes).await?;
    tracing::trace!(path = %target.path, "wrote encrypted entry");
    Ok(())
}

/// Read a file, returning `None` when it does not exist.
pub async fn read_optional(op: &Operator, path: &str) -> GencResult<Option<Vec<u8>>> {
    match op.read(path).await {
        Ok(buf) => Ok(Some(buf.to_vec())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List the direct children of `dir`. A missing directory lists as empty.
pub async fn list_dir(op: &Operator, dir: &str) -> GencResult<Vec<ListedEntry>> {
    let dir_prefix = if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{dir}/")
    };

    let entries = match op.list(&dir_prefix).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut listed = Vec::with_capacity(entries.len());
    for entry in entries {
        // Some backends include the listed directory itself
        if entry.path() == dir_prefix {
            continue;
        }
        let name = entry.name().trim_end_matches('/');
        if name.is_empty() {
            continue;
        }
        listed.push(ListedEntry {
            name: name.to_string(),
            is_dir: entry.metadata().is_dir(),
        });
    }
    Ok(listed)
}
