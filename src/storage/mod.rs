//! Storage engine for flag records.
//!
//! Records live in one of two backends:
//! - `mongo`: the MongoDB collection, used whenever it is reachable
//! - `memory`: a process-local list, used when the store is down
//!
//! [`FlagStore`] decides which one serves each call and degrades from the
//! first to the second on failure.

pub mod engine;
pub mod memory;
pub mod mongo;
pub mod query;
pub mod seed;

pub use engine::FlagStore;
pub use query::{FieldUpdates, FlagId, Query};

use async_trait::async_trait;
use futures::Stream;
use mongodb::bson::Document;
use std::pin::Pin;

/// A boxed stream of stored records.
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<Document, StorageError>> + Send>>;

/// Result of an update: whether a record was found, and whether it changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

impl UpdateOutcome {
    pub fn is_matched(&self) -> bool {
        self.matched > 0
    }

    pub fn is_modified(&self) -> bool {
        self.modified > 0
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: u64,
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        self.deleted > 0
    }
}

/// Storage operation errors.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// The backend rejected or failed the operation
    Backend(String),
    /// The backend could not be reached
    Unavailable(String),
    /// A stored record does not have the expected shape
    InvalidDocument(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Backend(msg) => write!(f, "Backend error: {}", msg),
            StorageError::Unavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            StorageError::InvalidDocument(msg) => write!(f, "Invalid document: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<mongodb::error::Error> for StorageError {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        match *e.kind {
            ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
                StorageError::Unavailable(e.to_string())
            }
            _ => StorageError::Backend(e.to_string()),
        }
    }
}

/// Trait for record backends.
///
/// Every backend must give identical answers for the same sequence of calls,
/// apart from the shape of the identifiers it assigns.
#[async_trait]
pub trait FlagBackend: Send + Sync {
    /// Short name used in logs and health output.
    fn name(&self) -> &'static str;

    /// Store a new record under a freshly assigned identifier.
    ///
    /// Any `_id` already present on `record` is discarded.
    async fn insert(&self, record: Document) -> Result<FlagId, StorageError>;

    /// Stream every stored record. Each call starts a fresh scan.
    async fn find_all(&self) -> Result<DocumentStream, StorageError>;

    /// First record matching `query`.
    async fn find_one(&self, query: &Query) -> Result<Option<Document>, StorageError>;

    /// Apply `updates` to the first record matching `query`.
    async fn update(
        &self,
        query: &Query,
        updates: &FieldUpdates,
    ) -> Result<UpdateOutcome, StorageError>;

    /// Remove the first record matching `query`.
    async fn delete(&self, query: &Query) -> Result<DeleteOutcome, StorageError>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64, StorageError>;
}
