use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use super::{memory_store::MemoryStore, mongodb_store::MongoDBStore};
use crate::app_config::AppConfigRecord;
use crate::config::{StoreBackend, StoreConfig};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Datastore is enabled, but no backend config is provided")]
    NotConfigured,
    #[error("Failed to connect to datastore: {0}")]
    Connection(String),
    #[error("Datastore query failed: {0}")]
    Query(String),
}

/// The ConfigStore trait abstracts persistence of app-wide configuration records.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Returns the record stored under `id`, atomically inserting `initial`
    /// first if there is none. An existing record is never modified.
    async fn get_or_insert_config(
        &self,
        id: &str,
        initial: &AppConfigRecord,
    ) -> Result<AppConfigRecord, StoreError>;
    async fn get_config(&self, id: &str) -> Result<Option<AppConfigRecord>, StoreError>;
    async fn put_config(&self, id: &str, record: &AppConfigRecord) -> Result<(), StoreError>;
    async fn delete_config(&self, id: &str) -> Result<(), StoreError>;
    fn is_persistent(&self) -> bool {
        // Only MemoryStore returns false, so startup can warn that the
        // secret will not survive a restart.
        true
    }
}

/// Creates a concrete store implementation based on the StoreConfig.
/// If `store.enabled = false`, returns a MemoryStore. Otherwise, picks the specified backend.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn ConfigStore>, StoreError> {
    if !config.enabled {
        warn!("Datastore is disabled. SECRET_KEY will only live as long as this process.");
        return Ok(Arc::new(MemoryStore::new()));
    }

    match &config.backend {
        Some(StoreBackend::MongoDB(mongo_config)) => match MongoDBStore::new(mongo_config).await {
            Ok(store) => {
                info!("Successfully created MongoDB store.");
                Ok(Arc::new(store))
            }
            Err(e) => {
                error!("Failed to create MongoDB store: {}", e);
                Err(e)
            }
        },
        None => {
            error!("Datastore is enabled, but no backend config is provided!");
            Err(StoreError::NotConfigured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_store_is_memory() {
        let config = StoreConfig {
            enabled: false,
            backend: None,
        };
        let store = create_store(&config).await.expect("memory store");
        assert!(!store.is_persistent());
    }

    #[tokio::test]
    async fn test_enabled_store_without_backend_fails() {
        let config = StoreConfig {
            enabled: true,
            backend: None,
        };
        let result = create_store(&config).await;
        assert!(matches!(result, Err(StoreError::NotConfigured)));
    }
}
