//! Pure path computation for the encrypted store

use genc_core::{GencError, GencResult};

pub const OBJECTS_DIR: &str = "objects";
pub const REFS_DIR: &str = "refs";

/// Length of the object shard directory name (hex chars)
const SHARD_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Object,
    Ref,
}

/// Where an encrypted entry lives, relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPath {
    /// Containing directory (no trailing slash)
    pub dir: String,
    /// Full path of the entry
    pub path: String,
}

/// Map an encrypted (hex) filename to its store path.
///
/// Objects are sharded by their first two hex chars, refs are flat.
pub fn path_for(encrypted_filename: &str, kind: EntryKind) -> GencResult<EncryptedPath> {
    if !is_lower_hex(encrypted_filename) {
        return Err(GencError::CorruptStore(format!(
            "encrypted filename is not lowercase hex: {encrypted_filename:?}"
        )));
    }

    match kind {
        EntryKind::Object => {
            if encrypted_filename.len() <= SHARD_LEN {
                return Err(GencError::CorruptStore(format!(
                    "encrypted object filename too short: {encrypted_filename:?}"
                )));
            }
            let (shard, rest) = encrypted_filename.split_at(SHARD_LEN);
            let dir = format!("{OBJECTS_DIR}/{shard}");
            let path = format!("{dir}/{rest}");
            Ok(EncryptedPath { dir, path })
        }
        EntryKind::Ref => Ok(EncryptedPath {
            dir: REFS_DIR.to_string(),
            path: format!("{REFS_DIR}/{encrypted_filename}"),
        }),
    }
}

/// Reassemble an object's encrypted filename from its shard and file names.
pub fn object_filename_from_parts(shard: &str, rest: &str) -> GencResult<String> {
    if shard.len() != SHARD_LEN || !is_lower_hex(shard) {
        return Err(GencError::CorruptStore(format!(
            "malformed object shard directory: {shard:?}"
        )));
    }
    if rest.is_empty() || !is_lower_hex(rest) {
        return Err(GencError::CorruptStore(format!(
            "malformed object file name: {shard}/{rest}"
        )));
    }
    Ok(format!("{shard}{rest}"))
}

fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
