//! The application factory.
//!
//! `create_app` loads settings and attaches the security layers. The layers
//! are not global: [`App::router`] wraps a set of routes with them, passing
//! each its configuration explicitly.

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::ScaffoldError;
use crate::security::{
    csrf_middleware, security_headers_middleware, Csrf, CsrfOptions, SecurityHeaders,
    SecurityHeadersOptions, SecurityHeadersState,
};
use crate::state::AppState;

/// An application with secure default behaviours.
#[derive(Debug, Clone)]
pub struct App {
    pub name: String,
    pub config: Settings,
    pub talisman: SecurityHeaders,
    pub csrf: Csrf,
}

/// Creates an app from the default settings plus the optional
/// `FLASK_SETTINGS_FILENAME` overlay.
///
/// SECRET_KEY is not set here; see
/// [`configure_secret_key`](crate::app_config::configure_secret_key).
pub fn create_app(name: impl Into<String>) -> Result<App, ScaffoldError> {
    let settings = Settings::load()?;
    App::with_settings(name, settings)
}

impl App {
    /// Creates an app from already loaded settings.
    pub fn with_settings(name: impl Into<String>, config: Settings) -> Result<Self, ScaffoldError> {
        let name = name.into();
        let talisman = SecurityHeaders::new(security_headers_config(&config)?)?;
        let csrf = Csrf::new(CsrfOptions::from_settings(&config));

        info!("Created app '{}'", name);

        Ok(Self {
            name,
            config,
            talisman,
            csrf,
        })
    }

    /// State shared with the app's own handlers.
    pub fn state(&self) -> AppState {
        AppState {
            app_name: self.name.clone(),
            csrf_form_field: self.config.csrf_form_field.clone(),
        }
    }

    /// Wraps `routes` with the CSRF layer and, outermost, the security-header layer.
    ///
    /// Fails if CSRF protection is enabled and no SECRET_KEY is configured.
    pub fn router(&self, routes: Router) -> Result<Router, ScaffoldError> {
        let mut router = routes;

        if self.csrf.options().disabled {
            debug!("CSRF protection disabled for app '{}'", self.name);
        } else {
            let secret_key = self
                .config
                .secret_key
                .as_deref()
                .filter(|key| !key.is_empty())
                .ok_or(ScaffoldError::MissingSecretKey)?;
            router = router.layer(from_fn_with_state(
                self.csrf.state(secret_key)?,
                csrf_middleware,
            ));
        }

        let headers_state = Arc::new(SecurityHeadersState {
            headers: self.talisman.clone(),
            allow_http: self.config.debug || self.config.testing,
        });

        Ok(router.layer(from_fn_with_state(
            headers_state,
            security_headers_middleware,
        )))
    }
}

/// Maps the `CSP_POLICY*` settings onto security-header options.
///
/// All four keys must be present; `CSP_POLICY_REPORT_URI` may be null.
pub fn security_headers_config(config: &Settings) -> Result<SecurityHeadersOptions, ScaffoldError> {
    Ok(SecurityHeadersOptions {
        content_security_policy: config
            .csp_policy
            .clone()
            .ok_or(ScaffoldError::MissingSetting("CSP_POLICY"))?,
        content_security_policy_nonce_in: config
            .csp_policy_nonce_in
            .clone()
            .ok_or(ScaffoldError::MissingSetting("CSP_POLICY_NONCE_IN"))?,
        content_security_policy_report_only: config
            .csp_policy_report_only
            .ok_or(ScaffoldError::MissingSetting("CSP_POLICY_REPORT_ONLY"))?,
        content_security_policy_report_uri: config
            .csp_policy_report_uri
            .clone()
            .ok_or(ScaffoldError::MissingSetting("CSP_POLICY_REPORT_URI"))?,
    })
}
