//! genc-storage: OpenDAL filesystem capability + encrypted store layout
//!
//! The encrypted store is a plain directory tree inside the staging clone:
//!
//! ```text
//! objects/<2 hex>/<rest hex>   encrypted loose objects
//! refs/<hex>                   encrypted refs
//! salt                         Argon2id salt (plaintext)
//! ```

pub mod layout;
pub mod operator;
pub mod store;

pub use layout::{object_filename_from_parts, path_for, EncryptedPath, EntryKind};
pub use operator::{build_local_operator, memory_operator};
pub use store::{ensure_dir, list_dir, read_optional, write_encrypted, ListedEntry};
