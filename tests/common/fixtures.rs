//! Test fixtures for building services and flags
#![allow(dead_code)]

use async_trait::async_trait;
use flagpost::flags::{FeatureFlag, FlagService, NewFlag};
use flagpost::storage::{
    DeleteOutcome, DocumentStream, FieldUpdates, FlagBackend, FlagId, FlagStore, Query,
    StorageError, UpdateOutcome,
};
use mongodb::bson::{doc, Document};
use std::sync::Arc;

/// Service over a fresh in-memory store
pub fn memory_service() -> FlagService {
    FlagService::new(Arc::new(FlagStore::in_memory()), "staging")
}

/// Service whose primary backend is `primary`
pub fn service_with_primary(primary: Arc<dyn FlagBackend>) -> FlagService {
    FlagService::new(Arc::new(FlagStore::with_primary(primary)), "staging")
}

/// Create a flag directly through the service
pub async fn create_test_flag(
    service: &FlagService,
    name: &str,
    environments: &[(&str, bool)],
) -> FeatureFlag {
    let mut new_flag = NewFlag::named(name).description(format!("{} description", name));
    for (env, on) in environments {
        new_flag = new_flag.environment(*env, *on);
    }
    service
        .create_flag(new_flag)
        .await
        .expect("Failed to create test flag")
}

/// Primary backend that is always unreachable
pub struct UnreachableBackend;

#[async_trait]
impl FlagBackend for UnreachableBackend {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn insert(&self, _record: Document) -> Result<FlagId, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn find_all(&self) -> Result<DocumentStream, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn find_one(&self, _query: &Query) -> Result<Option<Document>, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn update(
        &self,
        _query: &Query,
        _updates: &FieldUpdates,
    ) -> Result<UpdateOutcome, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _query: &Query) -> Result<DeleteOutcome, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
}

/// Primary backend holding a single record that is not a valid flag
pub struct CorruptBackend;

#[async_trait]
impl FlagBackend for CorruptBackend {
    fn name(&self) -> &'static str {
        "corrupt"
    }

    async fn insert(&self, _record: Document) -> Result<FlagId, StorageError> {
        Ok(FlagId::Raw("corrupt".into()))
    }

    async fn find_all(&self) -> Result<DocumentStream, StorageError> {
        Ok(Box::pin(futures::stream::iter(vec![Ok::<_, StorageError>(
            corrupt_record(),
        )])))
    }

    async fn find_one(&self, _query: &Query) -> Result<Option<Document>, StorageError> {
        Ok(Some(corrupt_record()))
    }

    async fn update(
        &self,
        _query: &Query,
        _updates: &FieldUpdates,
    ) -> Result<UpdateOutcome, StorageError> {
        Ok(UpdateOutcome {
            matched: 1,
            modified: 0,
        })
    }

    async fn delete(&self, _query: &Query) -> Result<DeleteOutcome, StorageError> {
        Ok(DeleteOutcome { deleted: 0 })
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(1)
    }
}

fn corrupt_record() -> Document {
    doc! { "_id": "corrupt", "description": "record without a name" }
}

/// Primary backend whose listing cursor fails after the first record
pub struct DroppedCursorBackend;

#[async_trait]
impl FlagBackend for DroppedCursorBackend {
    fn name(&self) -> &'static str {
        "dropped-cursor"
    }

    async fn insert(&self, _record: Document) -> Result<FlagId, StorageError> {
        Err(StorageError::Unavailable("connection reset".into()))
    }

    async fn find_all(&self) -> Result<DocumentStream, StorageError> {
        Ok(Box::pin(futures::stream::iter(vec![
            Ok(doc! { "_id": "first", "name": "first", "environments": {} }),
            Err(StorageError::Unavailable(
                "connection reset during getMore".into(),
            )),
        ])))
    }

    async fn find_one(&self, _query: &Query) -> Result<Option<Document>, StorageError> {
        Err(StorageError::Unavailable("connection reset".into()))
    }

    async fn update(
        &self,
        _query: &Query,
        _updates: &FieldUpdates,
    ) -> Result<UpdateOutcome, StorageError> {
        Err(StorageError::Unavailable("connection reset".into()))
    }

    async fn delete(&self, _query: &Query) -> Result<DeleteOutcome, StorageError> {
        Err(StorageError::Unavailable("connection reset".into()))
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Err(StorageError::Unavailable("connection reset".into()))
    }
}
