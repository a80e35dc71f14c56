//! The four-part key bundle shared by everyone with access to the encrypted repo

use genc_core::{GencError, GencResult};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::kdf::MasterKey;
use crate::{KEY_SIZE, NONCE_SIZE};

/// Content key + content nonce salt, filename key + filename nonce salt.
///
/// Loaded once per operation and never mutated. Zeroized on drop.
#[derive(Clone)]
pub struct Keys {
    secret: [u8; KEY_SIZE],
    secret_nonce: [u8; NONCE_SIZE],
    filenames: [u8; KEY_SIZE],
    filenames_nonce: [u8; NONCE_SIZE],
}

impl Keys {
    /// Assemble a bundle. The two nonce salts must differ, otherwise the
    /// content and filename domains would share a nonce space.
    pub fn new(
        secret: [u8; KEY_SIZE],
        secret_nonce: [u8; NONCE_SIZE],
        filenames: [u8; KEY_SIZE],
        filenames_nonce: [u8; NONCE_SIZE],
    ) -> GencResult<Self> {
        if secret_nonce == filenames_nonce {
            return Err(GencError::Keys(
                "content and filename nonce salts must differ".into(),
            ));
        }
        Ok(Self {
            secret,
            secret_nonce,
            filenames,
            filenames_nonce,
        })
    }

    /// Generate a fresh random bundle.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut keys = Self {
            secret: [0u8; KEY_SIZE],
            secret_nonce: [0u8; NONCE_SIZE],
            filenames: [0u8; KEY_SIZE],
            filenames_nonce: [0u8; NONCE_SIZE],
        };
        rng.fill_bytes(&mut keys.secret);
        rng.fill_bytes(&mut keys.secret_nonce);
        rng.fill_bytes(&mut keys.filenames);
        rng.fill_bytes(&mut keys.filenames_nonce);
        keys
    }

    /// Derive all four parts from a master key via HKDF-SHA256.
    pub fn from_master(master: &MasterKey) -> GencResult<Self> {
        Self::new(
            hkdf_derive(master.as_bytes(), b"git-encrypted-secret")?,
            hkdf_derive(master.as_bytes(), b"git-encrypted-secret-nonce")?,
            hkdf_derive(master.as_bytes(), b"git-encrypted-filenames")?,
            hkdf_derive(master.as_bytes(), b"git-encrypted-filenames-nonce")?,
        )
    }

    pub fn secret(&self) -> &[u8; KEY_SIZE] {
        &self.secret
    }

    pub fn secret_nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.secret_nonce
    }

    pub fn filenames(&self) -> &[u8; KEY_SIZE] {
        &self.filenames
    }

    pub fn filenames_nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.filenames_nonce
    }
}

impl Drop for Keys {
    fn drop(&mut self) {
        self.secret.zeroize();
        self.secret_nonce.zeroize();
        self.filenames.zeroize();
        self.filenames_nonce.zeroize();
    }
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys")
            .field("secret", &"[REDACTED]")
            .field("secret_nonce", &"[REDACTED]")
            .field("filenames", &"[REDACTED]")
            .field("filenames_nonce", &"[REDACTED]")
            .finish()
    }
}

/// HKDF-SHA256 expansion with a domain-specific info string.
fn hkdf_derive<const N: usize>(ikm: &[u8; KEY_SIZE], info: &[u8]) -> GencResult<[u8; N]> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; N];
    hkdf.expand(info, &mut okm)
        .map_err(|e| GencError::Keys(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}
