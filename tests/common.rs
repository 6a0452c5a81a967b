#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response};
use axum::Router;
use securescaffold::app::App;
use securescaffold::config::Settings;
use securescaffold::routes::create_router;

pub const TEST_SECRET: &str = "hunter2";
pub const HOST: &str = "example.com";

/// Default settings in testing mode, so plain http is not redirected.
pub fn test_settings() -> Settings {
    let mut settings = Settings::load_from(None).expect("default settings should load");
    settings.testing = true;
    settings
}

pub fn build_app(settings: Settings) -> App {
    let mut app = App::with_settings("test", settings).expect("app should build");
    app.config.secret_key = Some(TEST_SECRET.to_string());
    app
}

pub fn build_router(app: &App) -> Router {
    app.router(create_router(app.state()))
        .expect("router should build")
}

pub fn request(method: Method, path: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::HOST, HOST)
}

pub fn get(path: &str) -> Request<Body> {
    request(Method::GET, path)
        .body(Body::empty())
        .expect("failed to build request")
}

/// A urlencoded POST; callers add cookies and headers, then the body.
pub fn post_form(path: &str) -> axum::http::request::Builder {
    request(Method::POST, path).header(
        header::CONTENT_TYPE,
        "application/x-www-form-urlencoded",
    )
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

pub fn header_str<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

/// `name=value` of the CSRF cookie set on a response, ready for a `Cookie` header.
pub fn csrf_cookie(response: &Response<Body>) -> Option<String> {
    header_str(response, "set-cookie")
        .and_then(|cookie| cookie.split(';').next())
        .map(str::to_string)
}

/// The raw token inside a `name=<token>.<signature>` cookie pair.
pub fn token_from_cookie(cookie: &str) -> String {
    let (_, value) = cookie.split_once('=').expect("cookie should have a value");
    let (token, _) = value.rsplit_once('.').expect("cookie should be signed");
    token.to_string()
}
