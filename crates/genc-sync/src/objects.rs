//! Encrypted object store
//!
//! Each git object is stored as `encrypt_file(id, deflated loose object)`
//! under `objects/<2 hex>/<rest>` of its encrypted id.

use futures::stream::{self, StreamExt, TryStreamExt};
use genc_core::{GencError, GencResult, ObjectId};
use genc_crypto::{
    decrypt_file, decrypt_file_contents_only, encrypt_file, encrypted_filename_for, Keys,
};
use genc_git::{inflate, object_id, ObjectDatabase};
use genc_storage::layout::OBJECTS_DIR;
use genc_storage::{
    list_dir, object_filename_from_parts, path_for, read_optional, write_encrypted, EntryKind,
};
use opendal::Operator;
use tracing::debug;

/// Encrypt one local object into the store. Idempotent: re-exporting
/// produces byte-identical files.
pub async fn export_object(
    op: &Operator,
    odb: &dyn ObjectDatabase,
    id: &ObjectId,
    keys: &Keys,
) -> GencResult<()> {
    let deflated = odb.read_object(id).await?.into_deflated()?;
    let (filename, file) = encrypt_file(id.as_str(), &deflated, keys)?;
    write_encrypted(op, EntryKind::Object, &filename, file).await?;
    debug!(id = %id, "exported object");
    Ok(())
}

/// Decrypt one object from the store into the local database.
pub async fn import_object(
    op: &Operator,
    odb: &dyn ObjectDatabase,
    id: &ObjectId,
    keys: &Keys,
) -> GencResult<()> {
    let filename = encrypted_filename_for(id.as_str(), keys)?;
    let path = path_for(&filename, EntryKind::Object)?.path;
    let file = read_optional(op, &path)
        .await?
        .ok_or_else(|| GencError::MissingObject(format!("{id} not in encrypted store")))?;

    let deflated = decrypt_file_contents_only(&file, keys)?;
    store_verified(odb, id, &deflated).await
}

/// Whether the encrypted store holds `id`.
pub async fn has_object(op: &Operator, id: &ObjectId, keys: &Keys) -> GencResult<bool> {
    let filename = encrypted_filename_for(id.as_str(), keys)?;
    let path = path_for(&filename, EntryKind::Object)?.path;
    Ok(op.exists(&path).await?)
}

/// Encrypted filenames of every stored object.
pub async fn list_object_files(op: &Operator) -> GencResult<Vec<String>> {
    let mut filenames = Vec::new();
    for shard in list_dir(op, OBJECTS_DIR).await? {
        if !shard.is_dir {
            return Err(GencError::CorruptStore(format!(
                "unexpected file in {OBJECTS_DIR}/: {}",
                shard.name
            )));
        }
        let shard_dir = format!("{OBJECTS_DIR}/{}", shard.name);
        for file in list_dir(op, &shard_dir).await? {
            if file.is_dir {
                return Err(GencError::CorruptStore(format!(
                    "unexpected directory in {shard_dir}/: {}",
                    file.name
                )));
            }
            filenames.push(object_filename_from_parts(&shard.name, &file.name)?);
        }
    }
    filenames.sort();
    Ok(filenames)
}

/// Import every object in the store, `concurrency` at a time.
///
/// Returns the imported ids (in completion order).
pub async fn import_all_objects(
    op: &Operator,
    odb: &dyn ObjectDatabase,
    keys: &Keys,
    concurrency: usize,
) -> GencResult<Vec<ObjectId>> {
    let filenames = list_object_files(op).await?;
    debug!(count = filenames.len(), "importing encrypted objects");

    stream::iter(filenames)
        .map(|filename| import_file(op, odb, keys, filename))
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}

async fn import_file(
    op: &Operator,
    odb: &dyn ObjectDatabase,
    keys: &Keys,
    filename: String,
) -> GencResult<ObjectId> {
    let path = path_for(&filename, EntryKind::Object)?.path;
    let file = read_optional(op, &path)
        .await?
        .ok_or_else(|| GencError::CorruptStore(format!("listed object vanished: {path}")))?;

    let (name, deflated) = decrypt_file(&file, &filename, keys)?;
    let id = ObjectId::parse(&name)
        .map_err(|_| GencError::CorruptStore(format!("object stored under non-id name {name:?}")))?;
    store_verified(odb, &id, &deflated).await?;
    Ok(id)
}

/// Inflate, check the content hashes to `id`, write to the local database.
async fn store_verified(
    odb: &dyn ObjectDatabase,
    id: &ObjectId,
    deflated: &[u8],
) -> GencResult<()> {
    let wrapped = inflate(deflated)
        .map_err(|e| GencError::CorruptStore(format!("object {id}: {e}")))?;
    let actual = object_id(&wrapped);
    if &actual != id {
        return Err(GencError::CorruptStore(format!(
            "object {id} decrypted to content hashing to {actual}"
        )));
    }
    odb.write_wrapped(&wrapped).await?;
    debug!(id = %id, "imported object");
    Ok(())
}
