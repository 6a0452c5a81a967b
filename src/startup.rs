//! Application startup and server initialization.
//!
//! Builds the request pipeline for a configured [`App`] and serves it.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::app::App;
use crate::error::ScaffoldError;
use crate::routes;

/// Initializes and runs the application server.
///
/// The app's routes are wrapped with its security layers, then served on
/// the configured bind address.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be built (no SECRET_KEY), if the
/// server fails to bind to the specified address, or if serving fails.
pub async fn run(app: App) -> Result<(), ScaffoldError> {
    let router = app.router(routes::create_router(app.state()))?;

    info!("Starting server on {}", app.config.bind_address);

    let listener = TcpListener::bind(&app.config.bind_address)
        .await
        .inspect_err(|e| error!("Could not bind to {}: {}", app.config.bind_address, e))?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
