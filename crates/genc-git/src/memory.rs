//! In-memory object database for tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use genc_core::{GencError, GencResult, ObjectId};

use crate::loose::{deflate, object_id, unwrap, wrap, ObjectKind};
use crate::odb::{ObjectDatabase, RawObject};

#[derive(Debug, Default)]
pub struct MemoryOdb {
    /// Framed (uncompressed) bytes keyed by id
    objects: Mutex<HashMap<ObjectId, Vec<u8>>>,
    refs: Mutex<HashMap<String, ObjectId>>,
    failing: Mutex<HashSet<ObjectId>>,
    deflated_reads: AtomicBool,
}

impl MemoryOdb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve reads as `RawObject::Deflated` (like loose objects on disk)
    /// instead of `RawObject::Content` (like packed objects).
    pub fn set_deflated_reads(&self, on: bool) {
        self.deflated_reads.store(on, Ordering::Relaxed);
    }

    pub fn insert(&self, kind: ObjectKind, payload: &[u8]) -> ObjectId {
        let wrapped = wrap(kind, payload);
        let id = object_id(&wrapped);
        lock(&self.objects).insert(id.clone(), wrapped);
        id
    }

    pub fn set_ref(&self, name: &str, id: ObjectId) {
        lock(&self.refs).insert(name.to_string(), id);
    }

    /// Make every subsequent read of `id` fail with an I/O error.
    pub fn fail_reads_for(&self, id: &ObjectId) {
        lock(&self.failing).insert(id.clone());
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        lock(&self.objects).contains_key(id)
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = lock(&self.objects).keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn wrapped(&self, id: &ObjectId) -> Option<Vec<u8>> {
        lock(&self.objects).get(id).cloned()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ObjectDatabase for MemoryOdb {
    async fn read_object(&self, id: &ObjectId) -> GencResult<RawObject> {
        if lock(&self.failing).contains(id) {
            return Err(GencError::Io(std::io::Error::other(format!(
                "injected read failure for {id}"
            ))));
        }

        let Some(wrapped) = self.wrapped(id) else {
            if id.is_empty_tree() {
                return Ok(RawObject::Content {
                    kind: ObjectKind::Tree,
                    data: Vec::new(),
                });
            }
            return Err(GencError::MissingObject(id.to_string()));
        };

        if self.deflated_reads.load(Ordering::Relaxed) {
            return Ok(RawObject::Deflated(deflate(&wrapped)?));
        }
        let (kind, payload) = unwrap(&wrapped)?;
        Ok(RawObject::Content {
            kind,
            data: payload.to_vec(),
        })
    }

    async fn write_wrapped(&self, wrapped: &[u8]) -> GencResult<ObjectId> {
        unwrap(wrapped)?;
        let id = object_id(wrapped);
        lock(&self.objects).insert(id.clone(), wrapped.to_vec());
        Ok(id)
    }

    async fn has_object(&self, id: &ObjectId) -> GencResult<bool> {
        Ok(id.is_empty_tree() || self.contains(id))
    }

    async fn resolve_ref(&self, name: &str) -> GencResult<Option<ObjectId>> {
        if let Some(id) = lock(&self.refs).get(name) {
            return Ok(Some(id.clone()));
        }
        match ObjectId::parse(name) {
            Ok(id) if self.contains(&id) => Ok(Some(id)),
            _ => Ok(None),
        }
    }
}
