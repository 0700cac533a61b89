//! Access gate in front of the API.
//!
//! Credential issuing lives outside this crate; the server only needs a yes/no
//! per request.

use std::collections::HashMap;

use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::error::ApiError;
use crate::http::state::AppState;

pub trait Authenticator: Send + Sync {
    /// `token` is the `?token=` query parameter, if present. Media elements
    /// cannot set headers, so streaming URLs carry the credential there.
    fn is_authorized(&self, headers: &HeaderMap, token: Option<&str>) -> bool;
}

/// No access code configured: every request passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAccess;

impl Authenticator for OpenAccess {
    fn is_authorized(&self, _headers: &HeaderMap, _token: Option<&str>) -> bool {
        true
    }
}

/// One shared code for the whole household, sent as `Authorization: Bearer`
/// or `?token=`.
#[derive(Debug, Clone)]
pub struct SharedAccessCode {
    code: String,
}

impl SharedAccessCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl Authenticator for SharedAccessCode {
    fn is_authorized(&self, headers: &HeaderMap, token: Option<&str>) -> bool {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        bearer
            .or(token)
            .is_some_and(|given| codes_match(given.as_bytes(), self.code.as_bytes()))
    }
}

/// Compare without stopping at the first differing byte, so response time
/// does not reveal how much of a guess was right.
pub fn codes_match(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Route layer rejecting requests the configured [`Authenticator`] refuses.
pub async fn require_access(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let query: Option<Query<HashMap<String, String>>> = Query::try_from_uri(request.uri()).ok();
    let token = query.as_ref().and_then(|q| q.get("token")).map(String::as_str);

    if state.auth.is_authorized(request.headers(), token) {
        next.run(request).await
    } else {
        tracing::debug!("Rejected unauthorized request to {}", request.uri().path());
        ApiError::Unauthorized.into_response()
    }
}
