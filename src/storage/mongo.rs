//! MongoDB backend.

use super::{
    query::ID_FIELD, DeleteOutcome, DocumentStream, FieldUpdates, FlagBackend, FlagId, Query,
    StorageError, UpdateOutcome,
};
use crate::app_config::MongoConfig;
use actix_web::rt::time::timeout;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};

/// MongoDB collection backend.
pub struct MongoBackend {
    collection: Collection<Document>,
}

impl MongoBackend {
    /// Connect and confirm the server answers a ping.
    ///
    /// The configured timeout bounds server selection, the TCP connect and the
    /// ping as a whole, so an unreachable server fails fast.
    pub async fn connect(config: &MongoConfig) -> Result<Self, StorageError> {
        let limit = config.connect_timeout();

        let mut options = ClientOptions::parse(config.connection_uri()).await?;
        options.app_name = Some("flagpost".to_string());
        options.server_selection_timeout = Some(limit);
        options.connect_timeout = Some(limit);

        let client = Client::with_options(options)?;
        let admin = client.database("admin");
        let ping = admin.run_command(doc! { "ping": 1 }, None);

        match timeout(limit, ping).await {
            Ok(result) => {
                result?;
            }
            Err(_) => {
                return Err(StorageError::Unavailable(format!(
                    "no reply to ping within {:?}",
                    limit
                )))
            }
        }

        log::info!("MongoBackend connected to {}", config.target());

        Ok(Self {
            collection: client
                .database(&config.database)
                .collection(&config.collection),
        })
    }
}

#[async_trait]
impl FlagBackend for MongoBackend {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn insert(&self, mut record: Document) -> Result<FlagId, StorageError> {
        record.remove(ID_FIELD);
        let result = self.collection.insert_one(record, None).await?;
        FlagId::from_bson(&result.inserted_id).ok_or_else(|| {
            StorageError::InvalidDocument(format!(
                "unsupported inserted id: {}",
                result.inserted_id
            ))
        })
    }

    async fn find_all(&self) -> Result<DocumentStream, StorageError> {
        let cursor = self.collection.find(None, None).await?;
        Ok(Box::pin(cursor.map_err(StorageError::from)))
    }

    async fn find_one(&self, query: &Query) -> Result<Option<Document>, StorageError> {
        Ok(self
            .collection
            .find_one(query.as_document().clone(), None)
            .await?)
    }

    async fn update(
        &self,
        query: &Query,
        updates: &FieldUpdates,
    ) -> Result<UpdateOutcome, StorageError> {
        let result = self
            .collection
            .update_one(
                query.as_document().clone(),
                updates.to_update_document(),
                None,
            )
            .await?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete(&self, query: &Query) -> Result<DeleteOutcome, StorageError> {
        let result = self
            .collection
            .delete_one(query.as_document().clone(), None)
            .await?;

        Ok(DeleteOutcome {
            deleted: result.deleted_count,
        })
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.collection.count_documents(None, None).await?)
    }
}
