//! Request-pipeline layers that harden every response of an app.

pub mod csrf;
pub mod headers;

pub use csrf::{csrf_middleware, Csrf, CsrfOptions, CsrfState, CsrfToken};
pub use headers::{
    security_headers_middleware, CspNonce, SecurityHeaders, SecurityHeadersOptions,
    SecurityHeadersState,
};
