//! Route handlers.
//!
//! Two resources: the entry point (`/`) for command submission and the login
//! exchange (`/login`). Handlers are thin — they decode, call the codec and
//! the backend collaborators, and hand a `Reply` (or a failure) to the
//! hypermedia layer.

use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use lattice_auth::{Credentials, SessionId};
use lattice_core::{lowdata, Envelope, GatewayError};

use crate::gate::{self, AUTH_HEADER};
use crate::hypermedia::{respond, Reply};
use crate::negotiate;
use crate::state::AppState;

/// Build the full application router with the session gate in front.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(entry_get).post(entry_post))
        .route("/login", get(login_get).post(login_post))
        .layer(middleware::from_fn_with_state(state.clone(), gate::session_gate))
        .with_state(state)
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

/// `GET /` — the API entry point, a welcome envelope.
///
/// Browsers get the bootstrap page for the web app instead.
async fn entry_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let reply = Reply::ok(Envelope::notice(200, "Welcome")).template("index.html");
    respond(&state, &headers, Ok(reply))
}

/// `POST /` — the primary execution vector.
///
/// The body (form, JSON, or YAML) pairs into a batch of low-data chunks;
/// each chunk is submitted to the control plane in order and the results
/// come back in the same order.
async fn entry_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let outcome = submit_lowdata(&state, &headers, &body).await;
    respond(&state, &headers, outcome)
}

async fn submit_lowdata(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Reply, GatewayError> {
    let decoder = negotiate::select_input(content_type(headers))?;
    let fields = decoder(body)?;
    let batch = lowdata::pair(&fields)?;
    tracing::debug!(chunks = batch.len(), "submitting low-data batch");

    let mut results = Vec::with_capacity(batch.len());
    for chunk in &batch {
        results.push(state.backend.execute(chunk).await?);
    }

    Ok(Reply::ok(Envelope::results(results)))
}

fn login_reply() -> Reply {
    Reply::with_status(StatusCode::UNAUTHORIZED, Envelope::notice(401, "Please log in"))
        .header(header::WWW_AUTHENTICATE, HeaderValue::from_static("Session"))
        .template("login.html")
}

/// The login challenge, negotiated against the request's Accept header.
///
/// Served both for `GET /login` and, by the gate, in place of any
/// unauthenticated request.
pub fn login_challenge(state: &AppState, headers: &HeaderMap) -> Response {
    respond(state, headers, Ok(login_reply()))
}

/// `GET /login` — present the login interface.
async fn login_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    login_challenge(&state, &headers)
}

/// `POST /login` — exchange credentials for a session token.
///
/// Redirects to the entry point with the session id in `X-Auth-Token`.
async fn login_post(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match authenticate(&state, &session_id, &headers, &body).await {
        Ok(response) => response,
        Err(error) => respond(&state, &headers, Err(error)),
    }
}

async fn authenticate(
    state: &AppState,
    session_id: &SessionId,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, GatewayError> {
    let decoder = negotiate::select_input(content_type(headers))?;
    let fields = decoder(body)?;
    let credentials = Credentials::from_fields(&fields);

    let token = state.authenticator.issue_token(&credentials).await?;
    if token.is_none() {
        tracing::info!(username = %credentials.username, eauth = %credentials.eauth,
            "credentials rejected by authentication backend");
    }

    // A rejected login clears the token slot and still redirects; the
    // session stays unauthenticated and the next request lands back on the
    // login challenge.
    state
        .sessions
        .set_token(session_id, token)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let mut response = StatusCode::FOUND.into_response();
    let headers_out = response.headers_mut();
    headers_out.insert(header::LOCATION, HeaderValue::from_static("/"));
    if let Ok(value) = HeaderValue::from_str(session_id.as_str()) {
        headers_out.insert(AUTH_HEADER.clone(), value);
    }
    Ok(response)
}
