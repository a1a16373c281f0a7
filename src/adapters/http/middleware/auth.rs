//! Authentication helpers and middleware for axum.
//!
//! - `bearer_token` - Reads `Authorization: Bearer <token>`
//! - `publisher_key_middleware` - Guards producer endpoints with a shared key
//!
//! ```text
//! POST /api/events → publisher_key_middleware → publish handler
//!                          │
//!                          └─ 401 if X-Publisher-Key does not match
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Header producers put the shared key in.
pub const PUBLISHER_KEY_HEADER: &str = "x-publisher-key";

/// Extracts the Bearer token from the `Authorization` header.
///
/// ```text
/// Authorization: Bearer <token>
/// ```
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Shared producer key. When unset every request is let through.
#[derive(Clone, Default)]
pub struct PublisherKey(Option<Arc<SecretString>>);

impl PublisherKey {
    pub fn new(key: Option<SecretString>) -> Self {
        Self(key.map(Arc::new))
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Compares in constant time.
    pub fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.0, presented) {
            (None, _) => true,
            (Some(expected), Some(presented)) => presented
                .as_bytes()
                .ct_eq(expected.expose_secret().as_bytes())
                .into(),
            (Some(_), None) => false,
        }
    }
}

/// Rejects requests whose `X-Publisher-Key` does not match the configured key.
pub async fn publisher_key_middleware(
    State(key): State<PublisherKey>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(PUBLISHER_KEY_HEADER)
        .and_then(|h| h.to_str().ok());
    let key_present = presented.is_some();

    if key.accepts(presented) {
        return next.run(request).await;
    }

    tracing::warn!(
        path = %request.uri().path(),
        key_present,
        "Publisher key rejected"
    );
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "code": "UNAUTHORIZED",
            "message": "Invalid publisher key"
        })),
    )
        .into_response()
}
