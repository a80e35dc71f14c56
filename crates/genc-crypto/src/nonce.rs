//! Deterministic nonce derivation
//!
//! `nonce = HKDF-SHA256(salt, ikm = input).expand(label, 24)`.
//! Same `(salt, input)` always gives the same nonce; different inputs give
//! different nonces up to SHA-256 collisions.

use genc_core::{GencError, GencResult};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::NONCE_SIZE;

const NONCE_LABEL: &[u8] = b"git-encrypted-nonce-v1";

/// Tag prefixed to content nonce inputs so they can never equal a filename input.
const CONTENT_TAG: &[u8] = b"content\0";

pub fn derive_nonce(salt: &[u8], input: &[u8]) -> GencResult<[u8; NONCE_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), input);
    let mut nonce = [0u8; NONCE_SIZE];
    hkdf.expand(NONCE_LABEL, &mut nonce)
        .map_err(|e| GencError::Keys(format!("nonce derivation failed: {e}")))?;
    Ok(nonce)
}

/// Input for a content nonce: `"content\0" ∥ u64be(len(name)) ∥ name ∥ content`.
///
/// Binding the content in means a ref rewritten with a new target gets a new nonce.
pub(crate) fn content_nonce_input(name: &[u8], content: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(CONTENT_TAG.len() + 8 + name.len() + content.len());
    input.extend_from_slice(CONTENT_TAG);
    input.extend_from_slice(&(name.len() as u64).to_be_bytes());
    input.extend_from_slice(name);
    input.extend_from_slice(content);
    input
}
