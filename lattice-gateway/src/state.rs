//! Shared application state.

use std::sync::Arc;

use minijinja::Environment;

use lattice_auth::{Authenticator, SessionStore};
use lattice_core::ExecutionBackend;

use crate::config::GatewayConfig;
use crate::negotiate::OutputRegistry;

/// Everything a request handler can reach, cloned per request.
///
/// The two backend collaborators sit behind trait objects so tests can swap
/// in stubs without a control plane running.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub sessions: Arc<SessionStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub backend: Arc<dyn ExecutionBackend>,
    pub output: OutputRegistry,
    pub templates: Arc<Environment<'static>>,
}
