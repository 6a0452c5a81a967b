//! Startup error type shared by the factory, settings loader and store.

use thiserror::Error;

use crate::store::StoreError;

/// Everything that can stop the application from starting.
///
/// None of these are recoverable locally; `main` logs them and exits.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("Failed to load settings: {0}")]
    Config(#[from] figment::Error),

    #[error("Missing required setting '{0}'")]
    MissingSetting(&'static str),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("SECRET_KEY is not configured")]
    MissingSecretKey,

    #[error("Datastore error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
