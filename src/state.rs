//! Shared application state.
//!
//! Contains what the app's own handlers need to render pages. Security
//! settings are not here; the middleware layers carry their own state.

/// Application state shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Name the app was created with.
    pub app_name: String,
    /// Form field the CSRF layer reads submitted tokens from.
    pub csrf_form_field: String,
}
