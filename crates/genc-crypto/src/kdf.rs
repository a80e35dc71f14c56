//! Key derivation: Argon2id passphrase → master key

use argon2::{Algorithm, Argon2, Params, Version};
use genc_core::config::CryptoConfig;
use genc_core::{GencError, GencResult};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{KEY_SIZE, SALT_SIZE};

/// Root of the key bundle: Argon2id output (or raw bytes in tests),
/// expanded into the four entry keys by [`Keys::from_master`](crate::Keys::from_master).
///
/// Wiped when dropped; `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Argon2id cost settings, normally the `argon2_*` keys of `[crypto]`.
///
/// Every clone of one encrypted remote must use the same values together
/// with the repo's `SALT_SIZE`-byte salt, or the derived keys differ and
/// every decrypt fails with `GencError::Authentication`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub mem_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::from(&CryptoConfig::default())
    }
}

impl From<&CryptoConfig> for KdfParams {
    fn from(cfg: &CryptoConfig) -> Self {
        Self {
            mem_cost_kib: cfg.argon2_mem_cost_kib,
            time_cost: cfg.argon2_time_cost,
            parallelism: cfg.argon2_parallelism,
        }
    }
}

/// Generate a random Argon2id salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit master key from a passphrase and salt using Argon2id.
///
/// The salt is stored in plaintext at the root of the encrypted repo so every
/// clone derives the same keys from the same passphrase.
pub fn derive_master_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> GencResult<MasterKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| GencError::Keys(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| GencError::Keys(format!("Argon2id KDF failed: {e}")))?;

    Ok(MasterKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_kdf_deterministic() {
        let passphrase = SecretString::from("test-passphrase-123");
        let salt = [1u8; SALT_SIZE];

        let key1 = derive_master_key(&passphrase, &salt, &fast_params()).unwrap();
        let key2 = derive_master_key(&passphrase, &salt, &fast_params()).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_salts() {
        let passphrase = SecretString::from("same-passphrase");

        let key1 = derive_master_key(&passphrase, &[1u8; SALT_SIZE], &fast_params()).unwrap();
        let key2 = derive_master_key(&passphrase, &[2u8; SALT_SIZE], &fast_params()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = KdfParams {
            mem_cost_kib: 1,
            time_cost: 0,
            parallelism: 1,
        };
        let result = derive_master_key(&SecretString::from("pw"), &[0u8; SALT_SIZE], &params);
        assert!(matches!(result, Err(GencError::Keys(_))));
    }

    #[test]
    fn test_params_from_config() {
        let cfg = CryptoConfig::default();
        let params = KdfParams::from(&cfg);
        assert_eq!(params.mem_cost_kib, 65536);
        assert_eq!(params.time_cost, 3);
    }

    #[test]
    fn test_default_params_follow_config() {
        let cfg = CryptoConfig::default();
        let params = KdfParams::default();
        assert_eq!(params.mem_cost_kib, cfg.argon2_mem_cost_kib);
        assert_eq!(params.time_cost, cfg.argon2_time_cost);
        assert_eq!(params.parallelism, cfg.argon2_parallelism);
    }

    #[test]
    fn test_master_key_debug_is_redacted() {
        let key = MasterKey::from_bytes([0xAB; KEY_SIZE]);
        let shown = format!("{key:?}");
        assert_eq!(shown, "MasterKey([REDACTED])");
    }
}
