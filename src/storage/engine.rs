//! Backend selection with one-way degrade.
//!
//! A [`FlagStore`] starts out serving every call from its primary backend
//! (normally MongoDB). The first failure of any call flips it to the in-memory
//! fallback for good, and the failed call is replayed once against the
//! fallback. There is no reconnection: a restart is required to return to the
//! primary store.

use super::memory::MemoryBackend;
use super::mongo::MongoBackend;
use super::seed::seed_if_empty;
use super::{
    DeleteOutcome, DocumentStream, FieldUpdates, FlagBackend, FlagId, Query, StorageError,
    UpdateOutcome,
};
use crate::app_config::MongoConfig;
use futures::{stream, TryStreamExt};
use mongodb::bson::Document;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag record storage with automatic fallback.
pub struct FlagStore {
    primary: Option<Arc<dyn FlagBackend>>,
    fallback: MemoryBackend,
    available: AtomicBool,
}

impl FlagStore {
    /// Connect to the configured document store.
    ///
    /// Never fails: when the store cannot be reached within the configured
    /// timeout the engine runs on the in-memory fallback, which is not seeded.
    pub async fn connect(config: &MongoConfig) -> Self {
        match MongoBackend::connect(config).await {
            Ok(backend) => {
                if config.seed {
                    if let Err(e) = seed_if_empty(&backend).await {
                        log::error!("Error during seeding: {}", e);
                    }
                }
                Self::with_primary(Arc::new(backend))
            }
            Err(e) => {
                log::error!(
                    "MongoDB at {} unavailable: {}. Using in-memory fallback.",
                    config.target(),
                    e
                );
                Self::in_memory()
            }
        }
    }

    /// Engine with no primary backend.
    pub fn in_memory() -> Self {
        Self {
            primary: None,
            fallback: MemoryBackend::new(),
            available: AtomicBool::new(false),
        }
    }

    /// Engine serving from `primary` until it fails.
    pub fn with_primary(primary: Arc<dyn FlagBackend>) -> Self {
        Self {
            primary: Some(primary),
            fallback: MemoryBackend::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Whether calls are currently served by the primary backend.
    pub fn is_available(&self) -> bool {
        self.live_primary().is_some()
    }

    /// Name of the backend currently serving calls.
    pub fn backend_name(&self) -> &'static str {
        match self.live_primary() {
            Some(primary) => primary.name(),
            None => self.fallback.name(),
        }
    }

    fn live_primary(&self) -> Option<&Arc<dyn FlagBackend>> {
        if self.available.load(Ordering::Acquire) {
            self.primary.as_ref()
        } else {
            None
        }
    }

    fn degrade(&self, operation: &str, error: &StorageError) {
        if self.available.swap(false, Ordering::AcqRel) {
            log::warn!(
                "Primary store failed during {}, switching to in-memory fallback: {}",
                operation,
                error
            );
        } else {
            log::info!("Primary store failed during {}: {}", operation, error);
        }
    }

    /// Store a new record and return its identifier.
    pub async fn insert(&self, record: Document) -> Result<FlagId, StorageError> {
        if let Some(primary) = self.live_primary() {
            match primary.insert(record.clone()).await {
                Ok(id) => return Ok(id),
                Err(e) => self.degrade("insert", &e),
            }
        }
        self.fallback.insert(record).await
    }

    /// Stream every stored record.
    ///
    /// The primary's cursor is drained before returning so that a failure
    /// mid-scan degrades like any other call instead of reaching the caller.
    pub async fn find_all(&self) -> Result<DocumentStream, StorageError> {
        if let Some(primary) = self.live_primary() {
            let scanned = match primary.find_all().await {
                Ok(cursor) => cursor.try_collect::<Vec<_>>().await,
                Err(e) => Err(e),
            };
            match scanned {
                Ok(records) => {
                    return Ok(Box::pin(stream::iter(
                        records.into_iter().map(Ok::<_, StorageError>),
                    )))
                }
                Err(e) => self.degrade("find_all", &e),
            }
        }
        self.fallback.find_all().await
    }

    /// First record matching `query`, if any.
    pub async fn find_one(&self, query: &Query) -> Result<Option<Document>, StorageError> {
        if let Some(primary) = self.live_primary() {
            match primary.find_one(query).await {
                Ok(found) => return Ok(found),
                Err(e) => self.degrade("find_one", &e),
            }
        }
        self.fallback.find_one(query).await
    }

    /// Apply `updates` to the first record matching `query`.
    pub async fn update(
        &self,
        query: &Query,
        updates: &FieldUpdates,
    ) -> Result<UpdateOutcome, StorageError> {
        if let Some(primary) = self.live_primary() {
            match primary.update(query, updates).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => self.degrade("update", &e),
            }
        }
        self.fallback.update(query, updates).await
    }

    /// Remove the first record matching `query`.
    pub async fn delete(&self, query: &Query) -> Result<DeleteOutcome, StorageError> {
        if let Some(primary) = self.live_primary() {
            match primary.delete(query).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => self.degrade("delete", &e),
            }
        }
        self.fallback.delete(query).await
    }
}
