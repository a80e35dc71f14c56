//! genc-crypto: entry-level encryption for the encrypted git store
//!
//! Every stored entry (object or ref) is a `(name, content)` pair:
//!
//! ```text
//! name     → XChaCha20-Poly1305(key=filenames, nonce=HKDF(filenames_nonce, name))   → hex filename
//! content  → XChaCha20-Poly1305(key=secret,    nonce=HKDF(secret_nonce, name ∥ content),
//!                               AAD=encrypted filename)
//! ```
//!
//! Both nonces are derived from the plaintext, so the same entry always
//! encrypts to the same bytes (lookup by name, idempotent re-writes).
//!
//! Key bundle:
//! ```text
//! Passphrase ─Argon2id─▶ Master Key ─HKDF─┬─ secret           (content key)
//!                                          ├─ secret_nonce     (content nonce salt)
//!                                          ├─ filenames        (filename key)
//!                                          └─ filenames_nonce  (filename nonce salt)
//! ```

pub mod envelope;
pub mod kdf;
pub mod keyfile;
pub mod keys;
pub mod names;
pub mod nonce;

pub use envelope::{decrypt_file, decrypt_file_contents_only, encrypt_file};
pub use kdf::{derive_master_key, generate_salt, KdfParams, MasterKey};
pub use keyfile::{load_keys, save_keys};
pub use keys::Keys;
pub use names::{decrypt_filename, encrypt_filename, encrypted_filename_for};
pub use nonce::derive_nonce;

/// Size of a content or filename key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the Argon2id salt stored next to the encrypted repo
pub const SALT_SIZE: usize = 16;
