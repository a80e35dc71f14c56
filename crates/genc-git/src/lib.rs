//! genc-git: the host VCS side of git-encrypted
//!
//! - [`loose`]: loose-object framing (`"<type> <len>\0payload"`), zlib, SHA-1 ids
//! - [`odb`]: the local object database capability and its `.git` implementation
//! - [`walk`]: commit/tree parsing and the push reachability diff
//! - [`cmd`]: running the git binary
//! - [`transport`]: clone/pull/commit/push of the encrypted staging repo

pub mod cmd;
pub mod loose;
pub mod memory;
pub mod odb;
pub mod safety;
pub mod transport;
pub mod walk;

pub use cmd::{git_checked, git_output};
pub use loose::{deflate, inflate, object_id, unwrap, wrap, ObjectKind};
pub use memory::MemoryOdb;
pub use odb::{GitDir, ObjectDatabase, RawObject};
pub use transport::{GitTransport, Transport};
pub use walk::{commit_ancestors, is_ancestor, objects_to_push};
