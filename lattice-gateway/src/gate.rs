//! Session/token gate.
//!
//! Sits in front of every route, before any body is read. Establishes the
//! client's session from the `session_id` cookie, then checks whether a
//! credential is present at all — a token stored in the session or an
//! `X-Auth-Token` header. Requests outside `/login` without one are served
//! the login challenge in place of whatever they asked for; the challenge is
//! negotiated against the original request's Accept header, so an API client
//! gets a 401 envelope and a browser gets the login form.
//!
//! The gate never validates tokens. The control plane does that when a
//! token is actually used.

use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use lattice_auth::SessionId;

use crate::routes;
use crate::state::AppState;

/// Cookie carrying the session identifier for browser clients.
pub const SESSION_COOKIE: &str = "session_id";

/// Header carrying the session identifier for programmatic clients.
pub static AUTH_HEADER: HeaderName = HeaderName::from_static("x-auth-token");

pub async fn session_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_id = cookie_value(request.headers(), SESSION_COOKIE).map(SessionId::from);
    let existing = match &cookie_id {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };
    let fresh = existing.is_none();
    let session = match existing {
        Some(session) => session,
        None => state.sessions.open().await,
    };
    let session_id = session.id().clone();
    request.extensions_mut().insert(session_id.clone());

    let header_token = request
        .headers()
        .get(&AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty());
    let authenticated = session.token().is_some() || header_token.is_some();

    let mut response = if request.uri().path().starts_with("/login") || authenticated {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "unauthenticated request, serving login challenge");
        routes::login_challenge(&state, request.headers())
    };

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("private"));
    if fresh {
        let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Pull one value out of a Cookie header.
fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
