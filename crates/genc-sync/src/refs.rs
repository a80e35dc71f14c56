//! Encrypted ref store
//!
//! A ref is `encrypt_file(ref name, target id)` under `refs/<hex>`. Writing a
//! ref overwrites its single file; there is no ref history.

use genc_core::{GencError, GencResult, ObjectId, RefPair, RefValue};
use genc_crypto::{
    decrypt_file, decrypt_file_contents_only, encrypt_file, encrypted_filename_for, Keys,
};
use genc_storage::layout::REFS_DIR;
use genc_storage::{list_dir, path_for, read_optional, write_encrypted, EntryKind};
use opendal::Operator;

/// Store filename for a ref name.
pub fn encrypted_ref_filename(name: &str, keys: &Keys) -> GencResult<String> {
    encrypted_filename_for(name, keys)
}

/// Every ref in the store, ordered by encrypted filename.
pub async fn list_all(op: &Operator, keys: &Keys) -> GencResult<Vec<RefPair>> {
    let mut entries = list_dir(op, REFS_DIR).await?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut pairs = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.is_dir {
            return Err(GencError::CorruptStore(format!(
                "unexpected directory in {REFS_DIR}/: {}",
                entry.name
            )));
        }
        let path = path_for(&entry.name, EntryKind::Ref)?.path;
        let file = read_optional(op, &path)
            .await?
            .ok_or_else(|| GencError::CorruptStore(format!("listed ref vanished: {path}")))?;

        let (name, content) = decrypt_file(&file, &entry.name, keys)?;
        let target = parse_target(&name, &content)?;
        pairs.push(RefPair::new(name, target));
    }
    Ok(pairs)
}

/// Current value of `name`, or `RefValue::Unknown` when the store lacks it.
pub async fn read(op: &Operator, name: &str, keys: &Keys) -> GencResult<RefValue> {
    let filename = encrypted_ref_filename(name, keys)?;
    let path = path_for(&filename, EntryKind::Ref)?.path;
    let Some(file) = read_optional(op, &path).await? else {
        return Ok(RefValue::Unknown);
    };
    let content = decrypt_file_contents_only(&file, keys)?;
    Ok(RefValue::Known(parse_target(name, &content)?))
}

/// Point `name` at `target`. The only way refs change.
pub async fn write(op: &Operator, name: &str, target: &ObjectId, keys: &Keys) -> GencResult<()> {
    let (filename, file) = encrypt_file(name, target.as_str().as_bytes(), keys)?;
    write_encrypted(op, EntryKind::Ref, &filename, file).await?;
    tracing::debug!(ref_name = %name, target = %target, "wrote encrypted ref");
    Ok(())
}

/// `"<id> <name>"` lines joined by `\n`, in the given order.
pub fn refs_to_git_string(pairs: &[RefPair]) -> String {
    pairs
        .iter()
        .map(|pair| format!("{} {}", pair.target, pair.name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_target(name: &str, content: &[u8]) -> GencResult<ObjectId> {
    std::str::from_utf8(content)
        .ok()
        .and_then(|s| ObjectId::parse(s).ok())
        .ok_or_else(|| GencError::CorruptStore(format!("ref {name} does not hold an object id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use genc_storage::memory_operator;

    fn oid(c: char) -> ObjectId {
        ObjectId::parse(&c.to_string().repeat(40)).unwrap()
    }

    #[tokio::test]
    async fn test_write_read() {
        let op = memory_operator().unwrap();
        let keys = Keys::generate();

        write(&op, "refs/heads/main", &oid('a'), &keys).await.unwrap();
        assert_eq!(
            read(&op, "refs/heads/main", &keys).await.unwrap(),
            RefValue::Known(oid('a'))
        );
    }

    #[tokio::test]
    async fn test_unknown_ref() {
        let op = memory_operator().unwrap();
        let value = read(&op, "refs/heads/nope", &Keys::generate()).await.unwrap();
        assert_eq!(value, RefValue::Unknown);
        assert_eq!(value.to_string(), "?");
    }

    #[tokio::test]
    async fn test_overwrite_keeps_one_file() {
        let op = memory_operator().unwrap();
        let keys = Keys::generate();

        write(&op, "refs/heads/main", &oid('a'), &keys).await.unwrap();
        write(&op, "refs/heads/main", &oid('b'), &keys).await.unwrap();

        let pairs = list_all(&op, &keys).await.unwrap();
        assert_eq!(pairs, vec![RefPair::new("refs/heads/main", oid('b'))]);
    }

    #[tokio::test]
    async fn test_list_all_wrong_keys() {
        let op = memory_operator().unwrap();
        write(&op, "refs/heads/main", &oid('a'), &Keys::generate()).await.unwrap();

        let result = list_all(&op, &Keys::generate()).await;
        assert!(matches!(result, Err(GencError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_list_all_empty() {
        let op = memory_operator().unwrap();
        assert!(list_all(&op, &Keys::generate()).await.unwrap().is_empty());
    }

    #[test]
    fn test_refs_to_git_string() {
        let pairs = vec![
            RefPair::new("refs/heads/main", oid('a')),
            RefPair::new("refs/heads/dev", oid('b')),
        ];
        assert_eq!(
            refs_to_git_string(&pairs),
            format!("{} refs/heads/main\n{} refs/heads/dev", oid('a'), oid('b'))
        );
        assert_eq!(refs_to_git_string(&[]), "");
    }

    proptest::proptest! {
        #[test]
        fn prop_listed_refs_match_written(
            names in proptest::collection::btree_set("refs/(heads|tags)/[a-z0-9_-]{1,24}", 1..6),
        ) {
            let op = memory_operator().unwrap();
            let keys = Keys::generate();
            let mut written = Vec::new();
            tokio_test::block_on(async {
                for (i, name) in names.iter().enumerate() {
                    let target = ObjectId::parse(&format!("{i:040x}")).unwrap();
                    write(&op, name, &target, &keys).await.unwrap();
                    written.push(RefPair::new(name.clone(), target));
                }
            });
            let mut listed = tokio_test::block_on(list_all(&op, &keys)).unwrap();
            listed.sort_by(|a, b| a.name.cmp(&b.name));
            proptest::prop_assert_eq!(listed, written);
        }
    }
}
