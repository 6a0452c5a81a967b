use serde::Deserialize;
use serde_json::{Map, Value};

use crate::store::mongodb_store::MongoDBConfig;

/// A wrapper for the datastore configuration:
/// - enabled: if false, the secret lives in a process-local MemoryStore.
/// - backend: the actual store backend (MongoDB, etc.).
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(try_from = "RawStoreConfig")]
pub struct StoreConfig {
    pub enabled: bool,
    pub backend: Option<StoreBackend>,
}

/// The existing store backends. We differentiate them via a "type" tag in the YAML.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum StoreBackend {
    #[serde(rename = "mongo")]
    MongoDB(MongoDBConfig),
}

/// `STORE` as written in the settings file. The backend keys sit next to
/// `enabled`, so they are collected first and parsed once a `type` is seen.
#[derive(Deserialize)]
struct RawStoreConfig {
    #[serde(default)]
    enabled: bool,
    #[serde(flatten)]
    backend: Map<String, Value>,
}

impl TryFrom<RawStoreConfig> for StoreConfig {
    type Error = String;

    fn try_from(raw: RawStoreConfig) -> Result<Self, Self::Error> {
        let backend = if raw.backend.contains_key("type") {
            let backend = serde_json::from_value(Value::Object(raw.backend))
                .map_err(|e| format!("invalid STORE backend: {}", e))?;
            Some(backend)
        } else {
            None
        };

        Ok(Self {
            enabled: raw.enabled,
            backend,
        })
    }
}
