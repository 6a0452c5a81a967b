use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ConfigStore, StoreError};
use crate::app_config::AppConfigRecord;

/// A process-local store. Used when the datastore is disabled, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, AppConfigRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, StoreError> {
        let records = self.records.lock().map_err(|_| Self::poisoned())?;
        Ok(records.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn poisoned() -> StoreError {
        StoreError::Query("memory store mutex poisoned".to_string())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_or_insert_config(
        &self,
        id: &str,
        initial: &AppConfigRecord,
    ) -> Result<AppConfigRecord, StoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| initial.clone());
        Ok(record.clone())
    }

    async fn get_config(&self, id: &str) -> Result<Option<AppConfigRecord>, StoreError> {
        let records = self.records.lock().map_err(|_| Self::poisoned())?;
        Ok(records.get(id).cloned())
    }

    async fn put_config(&self, id: &str, record: &AppConfigRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        records.insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn delete_config(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        records.remove(id);
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
