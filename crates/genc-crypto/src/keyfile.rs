//! Persisted key bundle (JSON, base64 fields)
//!
//! Lives in the local git dir, never inside the staging clone, so it is
//! never committed to the encrypted remote.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use genc_core::{GencError, GencResult};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keys::Keys;
use crate::{KEY_SIZE, NONCE_SIZE};

const KEYFILE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyFile {
    version: u32,
    secret: String,
    secret_nonce: String,
    filenames: String,
    filenames_nonce: String,
}

/// Write `keys` to `path` atomically (write temp, then rename).
pub fn save_keys(path: &Path, keys: &Keys) -> GencResult<()> {
    let file = KeyFile {
        version: KEYFILE_VERSION,
        secret: STANDARD.encode(keys.secret()),
        secret_nonce: STANDARD.encode(keys.secret_nonce()),
        filenames: STANDARD.encode(keys.filenames()),
        filenames_nonce: STANDARD.encode(keys.filenames_nonce()),
    };
    let mut json = serde_json::to_vec_pretty(&file)
        .map_err(|e| GencError::Keys(format!("serializing key file: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    let written = write_private(&tmp_path, &json);
    json.zeroize();
    written?;

    std::fs::rename(&tmp_path, path)?;
    tracing::debug!(path = %path.display(), "saved key bundle");
    Ok(())
}

/// Create `path` readable by the owner only (0600 on unix) and write `data`.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    // Stale temp file from an interrupted save
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Load a key bundle written by [`save_keys`].
///
/// Returns `Ok(None)` when no key file exists yet.
pub fn load_keys(path: &Path) -> GencResult<Option<Keys>> {
    let mut data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let parsed: Result<KeyFile, _> = serde_json::from_slice(&data);
    data.zeroize();
    let file = parsed.map_err(|e| {
        GencError::Keys(format!("parsing key file {}: {e}", path.display()))
    })?;

    if file.version != KEYFILE_VERSION {
        return Err(GencError::Keys(format!(
            "unsupported key file version {} (expected {KEYFILE_VERSION})",
            file.version
        )));
    }

    let keys = Keys::new(
        decode_field::<KEY_SIZE>("secret", &file.secret)?,
        decode_field::<NONCE_SIZE>("secret_nonce", &file.secret_nonce)?,
        decode_field::<KEY_SIZE>("filenames", &file.filenames)?,
        decode_field::<NONCE_SIZE>("filenames_nonce", &file.filenames_nonce)?,
    )?;
    Ok(Some(keys))
}

fn decode_field<const N: usize>(field: &str, value: &str) -> GencResult<[u8; N]> {
    let mut bytes = STANDARD
        .decode(value)
        .map_err(|e| GencError::Keys(format!("key file field {field}: base64 decode: {e}")))?;
    let out: Result<[u8; N], _> = bytes.as_slice().try_into();
    bytes.zeroize();
    out.map_err(|_| GencError::Keys(format!("key file field {field}: expected {N} bytes")))
}
