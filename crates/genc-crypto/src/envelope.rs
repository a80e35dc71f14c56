//! Encrypted file envelope: encrypted filename followed by encrypted content
//!
//! Encrypted file format (binary):
//! ```text
//! [2 bytes: L, big-endian][L bytes: raw encrypted filename]
//! [24 bytes: content nonce][ciphertext][16 bytes: Poly1305 tag]
//! AAD = raw encrypted filename
//! ```
//!
//! The AAD binds the content to its name, so swapping two stored files
//! (e.g. the values of two refs) fails authentication.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use genc_core::{GencError, GencResult};

use crate::keys::Keys;
use crate::names::{decode_filename, open_filename, seal_filename};
use crate::nonce::{content_nonce_input, derive_nonce};
use crate::{NONCE_SIZE, TAG_SIZE};

const LEN_PREFIX: usize = 2;

/// Encrypt one `(name, contents)` entry.
///
/// Returns `(hex encrypted filename, file bytes)`. Both are deterministic in
/// `(name, contents, keys)`.
pub fn encrypt_file(name: &str, contents: &[u8], keys: &Keys) -> GencResult<(String, Vec<u8>)> {
    let name_nonce = derive_nonce(keys.filenames_nonce(), name.as_bytes())?;
    let raw_filename = seal_filename(name.as_bytes(), &name_nonce, keys)?;
    let filename_len = u16::try_from(raw_filename.len()).map_err(|_| {
        GencError::Keys(format!("name too long to encrypt: {} bytes", name.len()))
    })?;

    let content_nonce = derive_nonce(
        keys.secret_nonce(),
        &content_nonce_input(name.as_bytes(), contents),
    )?;
    let cipher = XChaCha20Poly1305::new(keys.secret().into());
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&content_nonce),
            Payload {
                msg: contents,
                aad: &raw_filename,
            },
        )
        .map_err(|e| GencError::Authentication(format!("content encryption failed: {e}")))?;

    let mut file =
        Vec::with_capacity(LEN_PREFIX + raw_filename.len() + NONCE_SIZE + ciphertext.len());
    file.extend_from_slice(&filename_len.to_be_bytes());
    file.extend_from_slice(&raw_filename);
    file.extend_from_slice(&content_nonce);
    file.extend_from_slice(&ciphertext);

    Ok((hex::encode(&raw_filename), file))
}

/// Decrypt both name and content.
///
/// `encrypted_filename_hex` is the name the file was found under; it must
/// match the filename recorded inside the envelope.
pub fn decrypt_file(
    file: &[u8],
    encrypted_filename_hex: &str,
    keys: &Keys,
) -> GencResult<(String, Vec<u8>)> {
    let hint = decode_filename(encrypted_filename_hex)?;
    let envelope = Envelope::parse(file)?;
    if envelope.filename != hint.as_slice() {
        return Err(GencError::Authentication(format!(
            "stored filename does not match {encrypted_filename_hex}"
        )));
    }

    let name = open_filename(envelope.filename, keys)?;
    let name = String::from_utf8(name).map_err(|e| {
        GencError::CorruptStore(format!("decrypted name is not UTF-8: {e}"))
    })?;
    let contents = envelope.open(keys)?;
    Ok((name, contents))
}

/// Decrypt only the content; the caller already knows the name.
pub fn decrypt_file_contents_only(file: &[u8], keys: &Keys) -> GencResult<Vec<u8>> {
    Envelope::parse(file)?.open(keys)
}

struct Envelope<'a> {
    filename: &'a [u8],
    nonce: &'a [u8],
    sealed: &'a [u8],
}

impl<'a> Envelope<'a> {
    fn parse(file: &'a [u8]) -> GencResult<Self> {
        if file.len() < LEN_PREFIX {
            return Err(truncated(file.len()));
        }
        let (len_bytes, rest) = file.split_at(LEN_PREFIX);
        let filename_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;

        if filename_len < NONCE_SIZE + TAG_SIZE || rest.len() < filename_len + NONCE_SIZE + TAG_SIZE
        {
            return Err(truncated(file.len()));
        }

        let (filename, rest) = rest.split_at(filename_len);
        let (nonce, sealed) = rest.split_at(NONCE_SIZE);
        Ok(Self {
            filename,
            nonce,
            sealed,
        })
    }

    fn open(&self, keys: &Keys) -> GencResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(keys.secret().into());
        cipher
            .decrypt(
                XNonce::from_slice(self.nonce),
                Payload {
                    msg: self.sealed,
                    aad: self.filename,
                },
            )
            .map_err(|_| {
                GencError::Authentication(
                    "content decryption failed: wrong key, corrupted data, or moved file".into(),
                )
            })
    }
}

fn truncated(len: usize) -> GencError {
    GencError::Authentication(format!("encrypted file truncated: {len} bytes"))
}
