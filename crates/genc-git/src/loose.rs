//! git loose-object framing and compression
//!
//! A loose object is `zlib("<type> <len>\0<payload>")`; its id is the SHA-1
//! of the uncompressed, framed bytes.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use genc_core::{GencError, GencResult, ObjectId};
use sha1::{Digest, Sha1};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = GencError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(GencError::UnsupportedObjectFormat {
                id: String::new(),
                detail: format!("unknown object type {other:?}"),
            }),
        }
    }
}

/// Frame a payload as `"<type> <len>\0<payload>"`.
pub fn wrap(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind.as_str(), payload.len());
    let mut wrapped = Vec::with_capacity(header.len() + payload.len());
    wrapped.extend_from_slice(header.as_bytes());
    wrapped.extend_from_slice(payload);
    wrapped
}

/// Split framed bytes back into kind and payload, validating the header.
pub fn unwrap(wrapped: &[u8]) -> GencResult<(ObjectKind, &[u8])> {
    let nul = wrapped
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| GencError::InvalidObject("missing header terminator".into()))?;
    let header = std::str::from_utf8(&wrapped[..nul])
        .map_err(|_| GencError::InvalidObject("header is not UTF-8".into()))?;
    let (kind, len) = header
        .split_once(' ')
        .ok_or_else(|| GencError::InvalidObject(format!("malformed header {header:?}")))?;

    let kind: ObjectKind = kind.parse()?;
    let len: usize = len
        .parse()
        .map_err(|_| GencError::InvalidObject(format!("bad length in header {header:?}")))?;

    let payload = &wrapped[nul + 1..];
    if payload.len() != len {
        return Err(GencError::InvalidObject(format!(
            "header says {len} bytes, payload has {}",
            payload.len()
        )));
    }
    Ok((kind, payload))
}

pub fn deflate(data: &[u8]) -> GencResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn inflate(data: &[u8]) -> GencResult<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| GencError::InvalidObject(format!("zlib inflate failed: {e}")))?;
    Ok(out)
}

/// SHA-1 of the framed object bytes.
pub fn object_id(wrapped: &[u8]) -> ObjectId {
    let digest: [u8; 20] = Sha1::digest(wrapped).into();
    ObjectId::from_digest(&digest)
}
