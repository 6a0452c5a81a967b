use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOneAndUpdateOptions, ReplaceOptions, ReturnDocument};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app_config::AppConfigRecord;
use crate::store::{ConfigStore, StoreError};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// The config struct for MongoDB connections.
/// Contains the URI, database name and the collection holding config records.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MongoDBConfig {
    pub uri: String,
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "app_config".to_string()
}

/// A concrete `ConfigStore` implementation that uses MongoDB.
///
/// Records are keyed by `_id`, so the singleton id is unique by construction.
pub struct MongoDBStore {
    collection: Collection<AppConfigDocument>,
}

/// Document shape for storing config records in MongoDB.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct AppConfigDocument {
    #[serde(rename = "_id")]
    id: String,
    secret_key: String,
}

impl MongoDBStore {
    /// Creates a new `MongoDBStore` from the given config.
    pub async fn new(config: &MongoDBConfig) -> Result<Self, StoreError> {
        info!("Connecting to MongoDB database '{}'", config.database);

        let mut client_options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to parse MongoDB URI: {}", e)))?;

        client_options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client = Client::with_options(client_options)
            .map_err(|e| StoreError::Connection(format!("Failed to create MongoDB client: {}", e)))?;

        let collection = client
            .database(&config.database)
            .collection::<AppConfigDocument>(&config.collection);

        Ok(Self { collection })
    }

    fn record_to_doc(id: &str, record: &AppConfigRecord) -> AppConfigDocument {
        AppConfigDocument {
            id: id.to_string(),
            secret_key: record.secret_key.clone(),
        }
    }

    fn doc_to_record(doc: &AppConfigDocument) -> AppConfigRecord {
        AppConfigRecord {
            secret_key: doc.secret_key.clone(),
        }
    }

    /// Update that only writes fields when the upsert creates the document.
    fn set_on_insert(record: &AppConfigRecord) -> Document {
        doc! { "$setOnInsert": { "secret_key": record.secret_key.as_str() } }
    }

    fn is_duplicate_key(error: &MongoError) -> bool {
        match error.kind.as_ref() {
            ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
            ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
            _ => false,
        }
    }
}

#[async_trait]
impl ConfigStore for MongoDBStore {
    /// Single upsert with `$setOnInsert`, so an existing record is returned as is.
    async fn get_or_insert_config(
        &self,
        id: &str,
        initial: &AppConfigRecord,
    ) -> Result<AppConfigRecord, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let result = self
            .collection
            .find_one_and_update(doc! { "_id": id }, Self::set_on_insert(initial), options)
            .await;

        let doc = match result {
            Ok(doc) => doc,
            // Two concurrent upserts: the loser reads what the winner inserted.
            Err(e) if Self::is_duplicate_key(&e) => {
                warn!("Concurrent insert of config '{}', reading stored record", id);
                self.collection
                    .find_one(doc! { "_id": id }, None)
                    .await
                    .map_err(|e| StoreError::Query(format!("Failed to read config: {}", e)))?
            }
            Err(e) => {
                return Err(StoreError::Query(format!(
                    "Failed to get or insert config: {}",
                    e
                )))
            }
        };

        let doc = doc.ok_or_else(|| {
            StoreError::Query(format!("Config '{}' missing after upsert", id))
        })?;
        debug!("Resolved config document '{}'", doc.id);

        Ok(Self::doc_to_record(&doc))
    }

    async fn get_config(&self, id: &str) -> Result<Option<AppConfigRecord>, StoreError> {
        let doc = self
            .collection
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query config: {}", e)))?;

        Ok(doc.as_ref().map(Self::doc_to_record))
    }

    async fn put_config(&self, id: &str, record: &AppConfigRecord) -> Result<(), StoreError> {
        let doc = Self::record_to_doc(id, record);
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection
            .replace_one(doc! { "_id": id }, &doc, options)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to store config: {}", e)))?;

        Ok(())
    }

    async fn delete_config(&self, id: &str) -> Result<(), StoreError> {
        self.collection
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to delete config: {}", e)))?;

        Ok(())
    }
}
