//! HTTP route definitions and handlers.
//!
//! A minimal page that exercises the security layers, plus a health check.

mod health_routes;
mod index_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all configured routes.
///
/// Combines all route modules into a single router and attaches
/// the application state for access in handlers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(index_routes::routes())
        .merge(health_routes::routes())
        .with_state(state)
}
