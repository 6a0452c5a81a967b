//! Library exports for securescaffold, shared between the binary and tests.

pub mod app;
pub mod app_config;
pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;

pub use app::{create_app, App};
pub use app_config::{configure_secret_key, AppConfigRecord};
pub use error::ScaffoldError;
