//! Security response headers: Content-Security-Policy with per-request
//! nonces, HSTS, frame and sniffing protection, and HTTPS redirects.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::config::CspPolicy;
use crate::error::ScaffoldError;
use crate::utils::http_helpers::is_secure_request;
use crate::utils::token::token_urlsafe;

const CSP_REPORT_ONLY: &str = "content-security-policy-report-only";
const PERMISSIONS_POLICY: &str = "permissions-policy";

/// Content-Security-Policy options, derived from the `CSP_POLICY*` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeadersOptions {
    pub content_security_policy: CspPolicy,
    pub content_security_policy_nonce_in: Vec<String>,
    pub content_security_policy_report_only: bool,
    pub content_security_policy_report_uri: Option<String>,
}

/// Nonce for the current request, allowed by the directives in `nonce_in`.
/// Handlers put it on inline `<script nonce="...">` tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(pub String);

/// The security-header layer of an [`App`](crate::app::App).
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    options: SecurityHeadersOptions,
    pub force_https: bool,
    pub force_https_permanent: bool,
    pub frame_options: Option<String>,
    pub strict_transport_security: bool,
    pub strict_transport_security_max_age: u64,
    pub strict_transport_security_include_subdomains: bool,
    pub content_type_nosniff: bool,
    pub referrer_policy: Option<String>,
    pub permissions_policy: Option<String>,
}

impl SecurityHeaders {
    pub fn new(options: SecurityHeadersOptions) -> Result<Self, ScaffoldError> {
        if options.content_security_policy_report_only
            && options.content_security_policy_report_uri.is_none()
        {
            return Err(ScaffoldError::InvalidSetting(
                "CSP_POLICY_REPORT_ONLY requires CSP_POLICY_REPORT_URI".to_string(),
            ));
        }

        let headers = Self {
            options,
            force_https: true,
            force_https_permanent: false,
            frame_options: Some("SAMEORIGIN".to_string()),
            strict_transport_security: true,
            strict_transport_security_max_age: 31_536_000,
            strict_transport_security_include_subdomains: true,
            content_type_nosniff: true,
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            permissions_policy: Some("browsing-topics=()".to_string()),
        };

        // Reject policies that can never be sent.
        let sample = headers.policy_value(Some("nonce"));
        if HeaderValue::from_str(&sample).is_err() {
            return Err(ScaffoldError::InvalidSetting(format!(
                "CSP_POLICY is not a valid header value: {}",
                sample
            )));
        }

        Ok(headers)
    }

    pub fn options(&self) -> &SecurityHeadersOptions {
        &self.options
    }

    fn uses_nonce(&self) -> bool {
        !self.options.content_security_policy_nonce_in.is_empty()
    }

    /// `Content-Security-Policy`, or its report-only variant.
    pub fn policy_header_name(&self) -> HeaderName {
        if self.options.content_security_policy_report_only {
            HeaderName::from_static(CSP_REPORT_ONLY)
        } else {
            header::CONTENT_SECURITY_POLICY
        }
    }

    /// Renders the policy, adding `'nonce-<nonce>'` to every nonce directive.
    pub fn policy_value(&self, nonce: Option<&str>) -> String {
        let nonce_in = &self.options.content_security_policy_nonce_in;
        let nonce_source = nonce.map(|n| format!("'nonce-{}'", n));
        let mut directives = Vec::new();

        for (name, sources) in &self.options.content_security_policy {
            let mut tokens = sources.to_vec();
            if let Some(source) = &nonce_source {
                if nonce_in.contains(name) {
                    tokens.push(source.clone());
                }
            }
            directives.push(render_directive(name, &tokens));
        }

        if let Some(source) = &nonce_source {
            for name in nonce_in {
                if !self.options.content_security_policy.contains_key(name) {
                    directives.push(render_directive(name, std::slice::from_ref(source)));
                }
            }
        }

        if let Some(uri) = &self.options.content_security_policy_report_uri {
            directives.push(format!("report-uri {}", uri));
        }

        directives.join("; ")
    }

    /// Adds the configured headers to a response.
    pub fn apply(&self, headers: &mut HeaderMap, secure: bool, nonce: Option<&str>) {
        match HeaderValue::from_str(&self.policy_value(nonce)) {
            Ok(value) => {
                headers.insert(self.policy_header_name(), value);
            }
            Err(e) => warn!("Dropping invalid Content-Security-Policy header: {}", e),
        }

        if let Some(frame_options) = &self.frame_options {
            insert_str(headers, header::X_FRAME_OPTIONS, frame_options);
        }
        if self.content_type_nosniff {
            headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );
        }
        if let Some(referrer_policy) = &self.referrer_policy {
            insert_str(headers, header::REFERRER_POLICY, referrer_policy);
        }
        if let Some(permissions_policy) = &self.permissions_policy {
            insert_str(
                headers,
                HeaderName::from_static(PERMISSIONS_POLICY),
                permissions_policy,
            );
        }
        if secure && self.strict_transport_security {
            let mut value = format!("max-age={}", self.strict_transport_security_max_age);
            if self.strict_transport_security_include_subdomains {
                value.push_str("; includeSubDomains");
            }
            insert_str(headers, header::STRICT_TRANSPORT_SECURITY, &value);
        }
    }

    /// The https URL to send an insecure request to, if it should be redirected.
    fn https_redirect(&self, request: &Request) -> Option<String> {
        if !self.force_https {
            return None;
        }
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())?;
        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Some(format!("https://{}{}", host, path))
    }
}

fn render_directive(name: &str, sources: &[String]) -> String {
    if sources.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, sources.join(" "))
    }
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => warn!("Dropping invalid {} header: {}", name, e),
    }
}

/// State handed to [`security_headers_middleware`].
#[derive(Debug)]
pub struct SecurityHeadersState {
    pub headers: SecurityHeaders,
    /// Set in debug and testing mode, where plain http is expected.
    pub allow_http: bool,
}

/// Redirects insecure requests, then decorates the response with security headers.
pub async fn security_headers_middleware(
    State(state): State<Arc<SecurityHeadersState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let secure = is_secure_request(request.uri(), request.headers());

    if !secure && !state.allow_http {
        if let Some(location) = state.headers.https_redirect(&request) {
            debug!("Redirecting insecure request to {}", location);
            let status = if state.headers.force_https_permanent {
                StatusCode::MOVED_PERMANENTLY
            } else {
                StatusCode::FOUND
            };
            return (status, [(header::LOCATION, location)]).into_response();
        }
    }

    let nonce = state.headers.uses_nonce().then(|| token_urlsafe(16));
    if let Some(nonce) = &nonce {
        request.extensions_mut().insert(CspNonce(nonce.clone()));
    }

    let mut response = next.run(request).await;
    state
        .headers
        .apply(response.headers_mut(), secure, nonce.as_deref());
    response
}
