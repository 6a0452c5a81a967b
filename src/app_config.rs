//! App-wide configuration persisted in the datastore.
//!
//! `create_app` does not define a SECRET_KEY. Instead a random value is
//! generated on first startup, saved as a singleton record, and read back on
//! every later startup so it stays stable across restarts and instances.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::app::App;
use crate::config::StoreConfig;
use crate::error::ScaffoldError;
use crate::store::{create_store, ConfigStore, StoreError};
use crate::utils::token::token_urlsafe;

/// Id of the one configuration record.
pub const SINGLETON_ID: &str = "config";

/// Number of random bytes in a generated secret key.
const SECRET_KEY_BYTES: usize = 16;

/// Datastore record for app-wide configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppConfigRecord {
    pub secret_key: String,
}

impl AppConfigRecord {
    /// Initial values for app configuration.
    pub fn initial_config() -> Self {
        Self {
            secret_key: generate_secret_key(),
        }
    }
}

/// A fresh random secret key.
pub fn generate_secret_key() -> String {
    token_urlsafe(SECRET_KEY_BYTES)
}

/// Gets the singleton record, creating it with a random secret if absent.
pub async fn singleton(store: &dyn ConfigStore) -> Result<AppConfigRecord, StoreError> {
    singleton_with(store, generate_secret_key).await
}

/// Like [`singleton`], with the secret for a new record produced by `generate`.
///
/// The generated value is only persisted when no record exists yet.
pub async fn singleton_with<F>(
    store: &dyn ConfigStore,
    generate: F,
) -> Result<AppConfigRecord, StoreError>
where
    F: FnOnce() -> String,
{
    let initial = AppConfigRecord {
        secret_key: generate(),
    };
    store.get_or_insert_config(SINGLETON_ID, &initial).await
}

/// Opens a store client for the duration of one singleton lookup.
pub async fn get_config_from_datastore(
    config: &StoreConfig,
) -> Result<AppConfigRecord, ScaffoldError> {
    let store = create_store(config).await?;
    let record = singleton(store.as_ref()).await?;

    Ok(record)
}

/// Sets `SECRET_KEY` on the app from the datastore.
///
/// The store client only lives for this call.
pub async fn configure_secret_key(app: &mut App) -> Result<AppConfigRecord, ScaffoldError> {
    let store = create_store(&app.config.store)
        .await
        .inspect_err(|e| error!("Failed to configure SECRET_KEY: {}", e))?;

    configure_secret_key_with(app, store.as_ref(), generate_secret_key).await
}

/// Sets `SECRET_KEY` on the app from an already opened store, generating a
/// new secret with `generate` if none is stored.
pub async fn configure_secret_key_with<F>(
    app: &mut App,
    store: &dyn ConfigStore,
    generate: F,
) -> Result<AppConfigRecord, ScaffoldError>
where
    F: FnOnce() -> String,
{
    let record = singleton_with(store, generate)
        .await
        .inspect_err(|e| error!("Failed to configure SECRET_KEY: {}", e))?;

    app.config.secret_key = Some(record.secret_key.clone());
    info!("SECRET_KEY configured from datastore for app '{}'", app.name);

    Ok(record)
}
