use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GencError, GencResult};

/// Git's empty tree. Used by the host VCS to mean "no history yet", and
/// usually not stored physically in an object database.
pub const EMPTY_TREE_ID: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Prefix that routes a remote URL through the encrypted remote helper.
pub const ENCRYPTED_URL_PREFIX: &str = "encrypted::";

/// A git object identifier: 40 lowercase hex characters (SHA-1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    pub const HEX_LEN: usize = 40;

    pub fn parse(s: &str) -> GencResult<Self> {
        let s = s.trim();
        if s.len() != Self::HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(GencError::InvalidObject(format!(
                "not a 40-hex object id: {s:?}"
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn from_digest(digest: &[u8; 20]) -> Self {
        let mut s = String::with_capacity(Self::HEX_LEN);
        for byte in digest {
            s.push_str(&format!("{byte:02x}"));
        }
        Self(s)
    }

    pub fn empty_tree() -> Self {
        Self(EMPTY_TREE_ID.to_string())
    }

    pub fn is_empty_tree(&self) -> bool {
        self.0 == EMPTY_TREE_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = GencError;

    fn from_str(s: &str) -> GencResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = GencError;

    fn try_from(value: String) -> GencResult<Self> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(value: ObjectId) -> Self {
        value.0
    }
}

/// A decrypted ref: name plus target object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefPair {
    pub name: String,
    pub target: ObjectId,
}

impl RefPair {
    pub fn new(name: impl Into<String>, target: ObjectId) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }
}

/// Result of looking up one ref in the encrypted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    Known(ObjectId),
    /// No encrypted ref with this name yet. Rendered as `?`.
    Unknown,
}

impl RefValue {
    pub fn known(&self) -> Option<&ObjectId> {
        match self {
            RefValue::Known(id) => Some(id),
            RefValue::Unknown => None,
        }
    }
}

impl fmt::Display for RefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefValue::Known(id) => write!(f, "{id}"),
            RefValue::Unknown => f.write_str("?"),
        }
    }
}

/// One `src:dst` update requested by a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    /// Local ref (empty for a deletion request).
    pub src: String,
    /// Remote ref to update.
    pub dst: String,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Ok,
    Error,
}

/// Per-ref result of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub dst: String,
    pub status: PushStatus,
    pub message: Option<String>,
}

impl PushOutcome {
    pub fn ok(dst: impl Into<String>) -> Self {
        Self {
            dst: dst.into(),
            status: PushStatus::Ok,
            message: None,
        }
    }

    pub fn error(dst: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dst: dst.into(),
            status: PushStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == PushStatus::Ok
    }
}

/// A remote URL, split into its encrypted-transport form when it carries
/// the `encrypted::` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteUrl {
    Encrypted(String),
    Plain(String),
}

impl RemoteUrl {
    pub fn parse(url: &str) -> Self {
        match url.strip_prefix(ENCRYPTED_URL_PREFIX) {
            Some(inner) => RemoteUrl::Encrypted(inner.to_string()),
            None => RemoteUrl::Plain(url.to_string()),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, RemoteUrl::Encrypted(_))
    }

    /// The URL of the underlying repository (prefix stripped).
    pub fn inner(&self) -> &str {
        match self {
            RemoteUrl::Encrypted(u) | RemoteUrl::Plain(u) => u,
        }
    }
}
