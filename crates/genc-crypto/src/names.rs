//! Deterministic filename encryption
//!
//! Deterministic encryption (same name + keys = same ciphertext) is required
//! because both objects and refs are looked up by re-encrypting their
//! plaintext name. The nonce is derived from the name itself and stored in
//! front of the ciphertext, so decryption needs nothing but the keys:
//!
//! ```text
//! hex( [24 bytes: nonce = HKDF(filenames_nonce, name)][ciphertext][16 bytes: tag] )
//! ```

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use genc_core::{GencError, GencResult};

use crate::keys::Keys;
use crate::nonce::derive_nonce;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Encrypt `name` under the filename key with the given nonce.
///
/// Returns the lowercase hex of `nonce ∥ ciphertext ∥ tag`.
pub fn encrypt_filename(name: &[u8], nonce: &[u8; NONCE_SIZE], keys: &Keys) -> GencResult<String> {
    Ok(hex::encode(seal_filename(name, nonce, keys)?))
}

/// Derive the nonce for `name` and encrypt it: the store lookup key for `name`.
pub fn encrypted_filename_for(name: &str, keys: &Keys) -> GencResult<String> {
    let nonce = derive_nonce(keys.filenames_nonce(), name.as_bytes())?;
    encrypt_filename(name.as_bytes(), &nonce, keys)
}

/// Decrypt a hex filename produced by [`encrypt_filename`].
pub fn decrypt_filename(encrypted_hex: &str, keys: &Keys) -> GencResult<Vec<u8>> {
    open_filename(&decode_filename(encrypted_hex)?, keys)
}

pub(crate) fn seal_filename(
    name: &[u8],
    nonce: &[u8; NONCE_SIZE],
    keys: &Keys,
) -> GencResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(keys.filenames().into());
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(nonce), name)
        .map_err(|e| GencError::Authentication(format!("filename encryption failed: {e}")))?;

    let mut raw = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    raw.extend_from_slice(nonce);
    raw.extend_from_slice(&ciphertext);
    Ok(raw)
}

/// Decrypt the raw (already hex-decoded) filename bytes.
pub(crate) fn open_filename(raw: &[u8], keys: &Keys) -> GencResult<Vec<u8>> {
    if raw.len() < NONCE_SIZE + TAG_SIZE {
        return Err(GencError::Authentication(format!(
            "encrypted filename too short: {} bytes (minimum {})",
            raw.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(keys.filenames().into());
    let name = cipher
        .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| {
            GencError::Authentication(
                "filename decryption failed: wrong key or corrupted data".into(),
            )
        })?;

    // A valid tag under a nonce that does not belong to this name means the
    // entry was not produced by `encrypted_filename_for`.
    let expected = derive_nonce(keys.filenames_nonce(), &name)?;
    if expected.as_slice() != nonce_bytes {
        return Err(GencError::Authentication(
            "filename nonce does not match its plaintext".into(),
        ));
    }

    Ok(name)
}

/// Malformed hex means the store itself is invalid, not one bad entry.
pub(crate) fn decode_filename(encrypted_hex: &str) -> GencResult<Vec<u8>> {
    hex::decode(encrypted_hex).map_err(|e| {
        GencError::CorruptStore(format!("encrypted filename is not hex ({encrypted_hex:?}): {e}"))
    })
}
