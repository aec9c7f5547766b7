//! Call contract for the execution backend.
//!
//! The control plane that actually schedules and runs submitted commands is
//! an external collaborator. The gateway reaches it only through this trait,
//! one chunk at a time, and treats whatever comes back as opaque data.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::lowdata::Chunk;

/// Opaque failure reported by a backend collaborator.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// The command-execution side of the control plane.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Run one low-data chunk to completion and return its result.
    ///
    /// The call blocks for as long as the control plane takes; the gateway
    /// imposes no timeout of its own.
    async fn execute(&self, chunk: &Chunk) -> Result<Value, BackendError>;
}
