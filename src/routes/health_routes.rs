//! Health check endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Reports that the app is serving requests.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "app": state.app_name }))
}
