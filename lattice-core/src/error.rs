//! Error types for the gateway request pipeline.
//!
//! Every route handler returns `Result<_, GatewayError>`; the hypermedia
//! layer translates the error into a response envelope exactly once. Nothing
//! in this taxonomy is retried.

use thiserror::Error;

use crate::backend::BackendError;

/// A failure anywhere in the request pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No registered output representation satisfies the Accept header.
    #[error("requested content type not available")]
    NotAcceptable,

    /// No registered decoder matches the request Content-Type.
    #[error("content type not supported")]
    UnsupportedMediaType,

    /// Repeated body fields could not be paired into complete chunks.
    #[error("error pairing parameters: {0}")]
    MalformedBatch(String),

    /// Opaque failure reported by the execution or authentication backend.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Anything else; never shown to clients outside debug mode.
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// The HTTP status this failure is reported with.
    ///
    /// Unsupported request media types report 406 rather than 415 for
    /// compatibility with existing clients of this API.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotAcceptable | Self::UnsupportedMediaType => 406,
            Self::MalformedBatch(_) => 400,
            Self::Backend(_) | Self::Internal(_) => 500,
        }
    }

    /// Whether the failure detail must be redacted outside debug mode.
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }
}
