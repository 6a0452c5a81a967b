//! Cross-site request forgery protection.
//!
//! Each client gets a random token in a cookie, signed with the app's
//! SECRET_KEY. Requests with unsafe methods must echo the token back in a
//! header or form field.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{FromRequest, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Form;
use base64::engine::{general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::{SameSite, Settings};
use crate::error::ScaffoldError;
use crate::utils::http_helpers::{get_cookie, is_secure_request, origin_of, HTTPError};
use crate::utils::token::token_urlsafe;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_BYTES: usize = 32;
const MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

/// CSRF settings, read from the `CSRF_*` keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfOptions {
    pub disabled: bool,
    pub cookie_name: String,
    pub header_name: String,
    pub form_field: String,
    pub cookie_timeout: u64,
    pub cookie_secure: bool,
    pub cookie_httponly: bool,
    pub cookie_samesite: SameSite,
    pub check_referer: bool,
    pub exempt_urls: Vec<String>,
}

impl CsrfOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            disabled: settings.csrf_disable,
            cookie_name: settings.csrf_cookie_name.clone(),
            header_name: settings.csrf_header_name.clone(),
            form_field: settings.csrf_form_field.clone(),
            cookie_timeout: settings.csrf_cookie_timeout,
            cookie_secure: settings.csrf_cookie_secure,
            cookie_httponly: settings.csrf_cookie_httponly,
            cookie_samesite: settings.csrf_cookie_samesite,
            check_referer: settings.csrf_check_referer,
            exempt_urls: settings.csrf_exempt_urls.clone(),
        }
    }
}

/// The token for the current request, for embedding in forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

/// The CSRF layer of an [`App`](crate::app::App).
#[derive(Debug, Clone)]
pub struct Csrf {
    options: CsrfOptions,
}

impl Csrf {
    pub fn new(options: CsrfOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CsrfOptions {
        &self.options
    }

    /// Excludes every path starting with `prefix` from token checks.
    pub fn exempt(&mut self, prefix: impl Into<String>) {
        self.options.exempt_urls.push(prefix.into());
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.options
            .exempt_urls
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Middleware state bound to the app's secret key.
    pub fn state(&self, secret_key: &str) -> Result<Arc<CsrfState>, ScaffoldError> {
        Ok(Arc::new(CsrfState {
            csrf: self.clone(),
            signer: TokenSigner::new(secret_key.as_bytes())?,
        }))
    }
}

/// Signs tokens so a cookie planted by another origin is rejected.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
}

impl TokenSigner {
    pub fn new(key: &[u8]) -> Result<Self, ScaffoldError> {
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| ScaffoldError::InvalidSetting(format!("SECRET_KEY: {}", e)))?;
        Ok(Self { mac })
    }

    pub fn sign(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Constant-time check that `signature` was produced for `token`.
    pub fn verify(&self, token: &str, signature: &str) -> bool {
        let Ok(signature) = general_purpose::URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }

    /// `<token>.<signature>` as stored in the cookie.
    pub fn cookie_value(&self, token: &str) -> String {
        format!("{}.{}", token, self.sign(token))
    }

    /// Splits a cookie value, dropping it unless the signature matches.
    pub fn parse_cookie(&self, value: &str) -> Option<SignedToken> {
        let (token, signature) = value.rsplit_once('.')?;
        if token.is_empty() || !self.verify(token, signature) {
            return None;
        }
        Some(SignedToken {
            token: token.to_string(),
            signature: signature.to_string(),
        })
    }
}

/// A token read back from a cookie with a valid signature.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub signature: String,
}

/// State handed to [`csrf_middleware`].
pub struct CsrfState {
    csrf: Csrf,
    signer: TokenSigner,
}

impl CsrfState {
    fn forbidden(reason: &str) -> HTTPError {
        warn!("CSRF check failed: {}", reason);
        HTTPError::new(StatusCode::FORBIDDEN, reason)
    }

    fn check_referer(&self, headers: &HeaderMap) -> Result<(), HTTPError> {
        let referer = headers
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Self::forbidden("Referer checking failed - no Referer."))?;
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Self::forbidden("Referer checking failed - no Host."))?;

        let expected = format!("https://{}", host.to_ascii_lowercase());
        if origin_of(referer).as_deref() != Some(expected.as_str()) {
            return Err(Self::forbidden(
                "Referer checking failed - origin does not match.",
            ));
        }
        Ok(())
    }

    /// The token submitted in the header, or else in an urlencoded form body.
    /// The body is buffered and put back into the returned request.
    async fn submitted_token(&self, request: Request) -> Result<(Option<String>, Request), HTTPError> {
        let options = self.csrf.options();

        let header_token = request
            .headers()
            .get(options.header_name.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if header_token.is_some() {
            return Ok((header_token, request));
        }

        if !is_urlencoded_form(request.headers()) {
            return Ok((None, request));
        }

        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, MAX_FORM_BYTES)
            .await
            .map_err(|_| HTTPError::new(StatusCode::PAYLOAD_TOO_LARGE, "Form body too large"))?;
        let token = form_field(bytes.clone(), &options.form_field).await;

        Ok((token, Request::from_parts(parts, Body::from(bytes))))
    }

    async fn verify(&self, request: Request, cookie: Option<&SignedToken>) -> Result<Request, HTTPError> {
        let options = self.csrf.options();

        if options.check_referer && is_secure_request(request.uri(), request.headers()) {
            self.check_referer(request.headers())?;
        }

        let cookie = cookie.ok_or_else(|| Self::forbidden("CSRF token missing."))?;
        let (submitted, request) = self.submitted_token(request).await?;

        match submitted {
            Some(token) if self.signer.verify(&token, &cookie.signature) => Ok(request),
            Some(_) => Err(Self::forbidden("CSRF tokens do not match.")),
            None => Err(Self::forbidden("CSRF token not submitted.")),
        }
    }

    fn set_cookie_header(&self, value: &str) -> Option<HeaderValue> {
        let options = self.csrf.options();
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite={}",
            options.cookie_name,
            value,
            options.cookie_timeout,
            options.cookie_samesite.as_str()
        );
        if options.cookie_secure || options.cookie_samesite == SameSite::None {
            cookie.push_str("; Secure");
        }
        if options.cookie_httponly {
            cookie.push_str("; HttpOnly");
        }
        HeaderValue::from_str(&cookie).ok()
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn is_urlencoded_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

async fn form_field(bytes: Bytes, field: &str) -> Option<String> {
    let request = Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(bytes))
        .ok()?;
    let Form(mut fields) = Form::<HashMap<String, String>>::from_request(request, &())
        .await
        .ok()?;
    fields.remove(field)
}

/// Validates the token on unsafe requests and issues one when the client has none.
pub async fn csrf_middleware(
    State(state): State<Arc<CsrfState>>,
    request: Request,
    next: Next,
) -> Result<Response, HTTPError> {
    let options = state.csrf.options();
    if options.disabled {
        return Ok(next.run(request).await);
    }

    let existing = get_cookie(request.headers(), &options.cookie_name)
        .and_then(|value| state.signer.parse_cookie(&value));

    let mut request = if !is_safe_method(request.method())
        && !state.csrf.is_exempt(request.uri().path())
    {
        state.verify(request, existing.as_ref()).await?
    } else {
        request
    };

    let (token, new_cookie) = match existing {
        Some(signed) => (signed.token, None),
        None => {
            let token = token_urlsafe(TOKEN_BYTES);
            let cookie = state.signer.cookie_value(&token);
            debug!("Issuing new CSRF token");
            (token, Some(cookie))
        }
    };
    request.extensions_mut().insert(CsrfToken(token));

    let mut response = next.run(request).await;

    if let Some(value) = new_cookie.and_then(|cookie| state.set_cookie_header(&cookie)) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Cookie"));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"hunter2").unwrap()
    }

    #[test]
    fn test_signed_cookie_round_trip() {
        let signer = signer();
        let cookie = signer.cookie_value("token123");
        let parsed = signer.parse_cookie(&cookie).expect("valid cookie");
        assert_eq!(parsed.token, "token123");
        assert!(signer.verify("token123", &parsed.signature));
    }

    #[test]
    fn test_cookie_signed_with_other_key_is_rejected() {
        let cookie = TokenSigner::new(b"other").unwrap().cookie_value("token123");
        assert!(signer().parse_cookie(&cookie).is_none());
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let signer = signer();
        let cookie = signer.cookie_value("token123");
        let tampered = cookie.replacen("token123", "token124", 1);
        assert!(signer.parse_cookie(&tampered).is_none());
        assert!(signer.parse_cookie("no-signature").is_none());
    }

    #[test]
    fn test_exempt_prefix() {
        let mut csrf = Csrf::new(CsrfOptions::from_settings(
            &Settings::load_from(None).unwrap(),
        ));
        assert!(!csrf.is_exempt("/api/hook"));
        csrf.exempt("/api/");
        assert!(csrf.is_exempt("/api/hook"));
        assert!(!csrf.is_exempt("/form"));
    }

    #[test]
    fn test_safe_methods() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::DELETE));
    }
}
