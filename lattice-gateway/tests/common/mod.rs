//! Shared fixtures for gateway integration tests.
//!
//! Builds an in-process gateway with stub collaborators so the full request
//! pipeline (gate, negotiation, codec, error translation) runs without a
//! control plane listening anywhere.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use lattice_auth::{Authenticator, Credentials, SessionStore};
use lattice_core::{BackendError, Chunk, ExecutionBackend};
use lattice_gateway::config::GatewayConfig;
use lattice_gateway::negotiate::OutputRegistry;
use lattice_gateway::state::AppState;
use lattice_gateway::{routes, templates};

pub const TEST_USER: &str = "saltuser";
pub const TEST_PASSWORD: &str = "saltpass";
pub const TEST_TOKEN: &str = "token-5509364b";
pub const BACKEND_FAILURE: &str = "minion 'ms-3' did not respond";

/// Accepts exactly one username/password pair.
pub struct StubAuthenticator;

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn issue_token(&self, credentials: &Credentials) -> Result<Option<String>, BackendError> {
        if credentials.username == TEST_USER && credentials.password == TEST_PASSWORD {
            Ok(Some(TEST_TOKEN.to_string()))
        } else {
            Ok(None)
        }
    }
}

/// Echoes every chunk back as its own result.
pub struct EchoBackend;

#[async_trait]
impl ExecutionBackend for EchoBackend {
    async fn execute(&self, chunk: &Chunk) -> Result<Value, BackendError> {
        Ok(Value::Object(chunk.clone()))
    }
}

/// Fails every submission with a fixed detail string.
pub struct FailingBackend;

#[async_trait]
impl ExecutionBackend for FailingBackend {
    async fn execute(&self, _chunk: &Chunk) -> Result<Value, BackendError> {
        Err(BackendError(BACKEND_FAILURE.to_string()))
    }
}

pub struct TestGateway {
    pub state: AppState,
    app: Router,
}

impl TestGateway {
    /// Echo backend, debug off.
    pub fn new() -> Self {
        Self::build(false, Arc::new(EchoBackend))
    }

    pub fn build(debug: bool, backend: Arc<dyn ExecutionBackend>) -> Self {
        let config = GatewayConfig {
            port: 8000,
            bind: "127.0.0.1".to_string(),
            debug,
            ssl_crt: None,
            ssl_key: None,
            session_timeout: 600,
            control_socket: "/nonexistent/control.sock".into(),
        };

        let state = AppState {
            config: Arc::new(config),
            sessions: Arc::new(SessionStore::new(600)),
            authenticator: Arc::new(StubAuthenticator),
            backend,
            output: OutputRegistry::standard(),
            templates: Arc::new(templates::environment().expect("templates should compile")),
        };

        let app = routes::router(state.clone());
        Self { state, app }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf-8 body")
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

/// Pull a header value out as an owned string.
pub fn header(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// The `session_id` cookie set on a response, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    let cookie = header(response, "set-cookie")?;
    let pair = cookie.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    (name == "session_id").then(|| value.to_string())
}
