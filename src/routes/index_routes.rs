//! A demo page carrying the CSP nonce and CSRF token, and its form handler.

use std::collections::HashMap;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Extension, Form, Router};

use crate::security::{CspNonce, CsrfToken};
use crate::state::AppState;

/// Registers the index page.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(index).post(submit))
}

async fn index(
    State(state): State<AppState>,
    nonce: Option<Extension<CspNonce>>,
    token: Option<Extension<CsrfToken>>,
) -> Html<String> {
    let nonce = nonce.map(|Extension(CspNonce(n))| n).unwrap_or_default();
    let token = token.map(|Extension(CsrfToken(t))| t).unwrap_or_default();

    Html(format!(
        r#"<!doctype html>
<html>
<head><title>{name}</title></head>
<body>
<form method="post" action="/">
<input type="hidden" name="{field}" value="{token}">
<input type="text" name="message">
<button type="submit">Send</button>
</form>
<script nonce="{nonce}">document.querySelector("input[name=message]").focus();</script>
</body>
</html>
"#,
        name = escape_html(&state.app_name),
        field = escape_html(&state.csrf_form_field),
        token = escape_html(&token),
        nonce = escape_html(&nonce),
    ))
}

/// Echoes the submitted message. Only reached once the CSRF layer accepted the form.
async fn submit(Form(fields): Form<HashMap<String, String>>) -> Html<String> {
    let message = fields.get("message").map(String::as_str).unwrap_or("");
    Html(format!("<p>Received: {}</p>\n", escape_html(message)))
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_html;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
    }
}
