//! Credential exchange with the external authentication backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use lattice_core::BackendError;

/// Credentials submitted to `POST /login`.
///
/// `eauth` names the backend that should check the username and password;
/// the gateway passes it through without interpretation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub eauth: String,
}

impl Credentials {
    /// Build credentials from decoded body fields.
    ///
    /// Missing or ill-typed fields come through empty; rejecting them is the
    /// authentication backend's call, not ours.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(fields.clone())).unwrap_or_default()
    }
}

/// The credential-checking side of the control plane.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange credentials for an opaque token.
    ///
    /// `Ok(None)` means the backend rejected the credentials; `Err` means it
    /// could not be asked at all.
    async fn issue_token(&self, credentials: &Credentials) -> Result<Option<String>, BackendError>;
}
