//! In-memory fallback backend.
//!
//! Not persistent. Records are kept in insertion order behind a single mutex,
//! which serializes every read and write while the service runs degraded.

use super::{
    query::ID_FIELD, DeleteOutcome, DocumentStream, FieldUpdates, FlagBackend, FlagId, Query,
    StorageError, UpdateOutcome,
};
use async_trait::async_trait;
use futures::stream;
use mongodb::bson::Document;
use std::sync::{Mutex, MutexGuard};

/// In-memory record list.
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<Vec<Document>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<Document>> {
        // Each mutation is a single push, remove or field assignment, so a
        // poisoned lock still guards consistent records.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl FlagBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, mut record: Document) -> Result<FlagId, StorageError> {
        let id = FlagId::generate();
        record.remove(ID_FIELD);

        let mut stored = Document::new();
        stored.insert(ID_FIELD, id.to_bson());
        for (key, value) in record {
            stored.insert(key, value);
        }

        log::debug!("MemoryBackend: insert: {}", id);
        self.records().push(stored);
        Ok(id)
    }

    async fn find_all(&self) -> Result<DocumentStream, StorageError> {
        let snapshot = self.records().clone();
        Ok(Box::pin(stream::iter(
            snapshot.into_iter().map(Ok::<_, StorageError>),
        )))
    }

    async fn find_one(&self, query: &Query) -> Result<Option<Document>, StorageError> {
        Ok(self
            .records()
            .iter()
            .find(|record| query.matches(record))
            .cloned())
    }

    async fn update(
        &self,
        query: &Query,
        updates: &FieldUpdates,
    ) -> Result<UpdateOutcome, StorageError> {
        let mut records = self.records();
        let Some(record) = records.iter_mut().find(|record| query.matches(record)) else {
            return Ok(UpdateOutcome::default());
        };

        let modified = updates.apply(record);
        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete(&self, query: &Query) -> Result<DeleteOutcome, StorageError> {
        let mut records = self.records();
        match records.iter().position(|record| query.matches(record)) {
            Some(index) => {
                records.remove(index);
                Ok(DeleteOutcome { deleted: 1 })
            }
            None => Ok(DeleteOutcome { deleted: 0 }),
        }
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.records().len() as u64)
    }
}
