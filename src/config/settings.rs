use std::fs::File;
use std::path::{Path, PathBuf};

use figment::providers::{Format, Yaml};
use figment::Figment;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::logging::LoggingConfig;
use super::security::{present, CspPolicy, SameSite};
use super::store::StoreConfig;
use crate::error::ScaffoldError;

/// Environment variable naming an optional YAML settings overlay.
pub const SETTINGS_FILENAME_ENV: &str = "FLASK_SETTINGS_FILENAME";

/// Built-in defaults, always loaded first.
pub const DEFAULT_SETTINGS: &str = include_str!("settings.yaml");

/// Runtime configuration of the application.
///
/// Keys use the upper-case names found in settings files (`SECRET_KEY`,
/// `CSP_POLICY`, ...). The four `CSP_POLICY*` keys are optional here so a
/// missing key can be reported when the security-header options are derived.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub testing: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub csp_policy: Option<CspPolicy>,
    #[serde(default)]
    pub csp_policy_nonce_in: Option<Vec<String>>,
    #[serde(default)]
    pub csp_policy_report_only: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub csp_policy_report_uri: Option<Option<String>>,

    #[serde(default)]
    pub csrf_disable: bool,
    #[serde(default = "default_csrf_cookie_name")]
    pub csrf_cookie_name: String,
    #[serde(default = "default_csrf_header_name")]
    pub csrf_header_name: String,
    #[serde(default = "default_csrf_form_field")]
    pub csrf_form_field: String,
    /// Cookie lifetime in seconds.
    #[serde(default = "default_csrf_cookie_timeout")]
    pub csrf_cookie_timeout: u64,
    #[serde(default)]
    pub csrf_cookie_secure: bool,
    #[serde(default)]
    pub csrf_cookie_httponly: bool,
    #[serde(default)]
    pub csrf_cookie_samesite: SameSite,
    #[serde(default = "default_true")]
    pub csrf_check_referer: bool,
    #[serde(default)]
    pub csrf_exempt_urls: Vec<String>,
}

impl Settings {
    /// Loads the defaults, then the file named by `FLASK_SETTINGS_FILENAME` if set.
    pub fn load() -> Result<Self, ScaffoldError> {
        let overlay = std::env::var_os(SETTINGS_FILENAME_ENV).map(PathBuf::from);
        Self::load_from(overlay.as_deref())
    }

    /// Loads the defaults, then `overlay` if given.
    ///
    /// A missing or unreadable overlay is skipped; a malformed one is an error.
    pub fn load_from(overlay: Option<&Path>) -> Result<Self, ScaffoldError> {
        let settings = Self::figment(overlay).extract::<Settings>()?;
        Ok(settings)
    }

    /// The layered figment behind [`Settings::load_from`].
    pub fn figment(overlay: Option<&Path>) -> Figment {
        let figment = Figment::new().merge(Yaml::string(DEFAULT_SETTINGS));

        match overlay {
            None => {
                debug!("{} not set, using default settings only", SETTINGS_FILENAME_ENV);
                figment
            }
            Some(path) => match File::open(path) {
                Ok(_) => {
                    info!("Loading settings overlay from {}", path.display());
                    figment.merge(Yaml::file(path))
                }
                Err(e) => {
                    warn!(
                        "Skipping settings file {}: {}",
                        path.display(),
                        e
                    );
                    figment
                }
            },
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_csrf_cookie_name() -> String {
    "_csrf_token".to_string()
}

fn default_csrf_form_field() -> String {
    "_csrf_token".to_string()
}

fn default_csrf_header_name() -> String {
    "X-CSRFToken".to_string()
}

fn default_csrf_cookie_timeout() -> u64 {
    // 5 days
    5 * 24 * 60 * 60
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn overlay(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write overlay");
        file
    }

    #[test]
    fn test_defaults_contain_policy_keys() {
        let settings = Settings::load_from(None).expect("defaults should load");
        assert!(settings.csp_policy.is_some());
        assert_eq!(
            settings.csp_policy_nonce_in,
            Some(vec!["script-src".to_string()])
        );
        assert_eq!(settings.csp_policy_report_only, Some(false));
        assert_eq!(settings.csp_policy_report_uri, Some(None));
        assert!(settings.secret_key.is_none());
        assert!(!settings.store.enabled);
        assert_eq!(settings.csrf_cookie_name, "_csrf_token");
        assert_eq!(settings.csrf_header_name, "X-CSRFToken");
    }

    #[test]
    fn test_overlay_wins_on_conflict() {
        let file = overlay(
            r#"
CSP_POLICY_REPORT_ONLY: true
CSP_POLICY_REPORT_URI: "https://example.com/csp"
BIND_ADDRESS: "0.0.0.0:9000"
"#,
        );
        let settings = Settings::load_from(Some(file.path())).expect("overlay should load");
        assert_eq!(settings.csp_policy_report_only, Some(true));
        assert_eq!(
            settings.csp_policy_report_uri,
            Some(Some("https://example.com/csp".to_string()))
        );
        assert_eq!(settings.bind_address, "0.0.0.0:9000");
        // Untouched keys keep their defaults.
        assert_eq!(
            settings.csp_policy_nonce_in,
            Some(vec!["script-src".to_string()])
        );
    }

    #[test]
    fn test_missing_overlay_is_skipped() {
        let settings = Settings::load_from(Some(Path::new("/nonexistent/settings.yaml")))
            .expect("missing overlay should be ignored");
        assert_eq!(settings.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn test_malformed_overlay_fails() {
        let file = overlay("CSP_POLICY_REPORT_ONLY: [unterminated");
        let result = Settings::load_from(Some(file.path()));
        assert!(matches!(result, Err(ScaffoldError::Config(_))));
    }

    #[test]
    fn test_wrong_type_in_overlay_fails() {
        let file = overlay("CSP_POLICY_REPORT_ONLY: \"sometimes\"");
        let result = Settings::load_from(Some(file.path()));
        assert!(matches!(result, Err(ScaffoldError::Config(_))));
    }

    #[test]
    fn test_store_overlay() {
        let file = overlay(
            r#"
STORE:
  enabled: true
  type: mongo
  uri: "mongodb://localhost:27017"
  database: "scaffold"
"#,
        );
        let settings = Settings::load_from(Some(file.path())).expect("overlay should load");
        assert!(settings.store.enabled);
        match settings.store.backend {
            Some(crate::config::StoreBackend::MongoDB(mongo)) => {
                assert_eq!(mongo.database, "scaffold");
                assert_eq!(mongo.collection, "app_config");
            }
            None => panic!("expected a mongo backend"),
        }
    }

    #[test]
    fn test_incomplete_store_backend_fails() {
        let file = overlay(
            r#"
STORE:
  enabled: true
  type: mongo
  uri: "mongodb://x"
"#,
        );
        let result = Settings::load_from(Some(file.path()));
        assert!(matches!(result, Err(ScaffoldError::Config(_))));
    }

    #[test]
    fn test_unknown_store_type_fails() {
        let file = overlay(
            r#"
STORE:
  enabled: true
  type: redis
"#,
        );
        let result = Settings::load_from(Some(file.path()));
        assert!(matches!(result, Err(ScaffoldError::Config(_))));
    }

    #[test]
    fn test_store_without_type_has_no_backend() {
        let file = overlay("STORE:\n  enabled: true\n");
        let settings = Settings::load_from(Some(file.path())).expect("overlay should load");
        assert!(settings.store.enabled);
        assert!(settings.store.backend.is_none());
    }

    #[test]
    fn test_csrf_form_field_default() {
        let settings = Settings::load_from(None).expect("defaults should load");
        assert_eq!(settings.csrf_form_field, "_csrf_token");
    }
}
