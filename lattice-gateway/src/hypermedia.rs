//! The response side of the pipeline.
//!
//! Route handlers return `Result<Reply, GatewayError>`; this module turns
//! either arm into a serialized HTTP response. Failures are translated into
//! the same envelope shape as successes and pushed through the same output
//! negotiation, so an error still honors the client's Accept header.

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use lattice_core::{Envelope, GatewayError};

use crate::negotiate::{self, MEDIA_HTML};
use crate::state::AppState;
use crate::templates;

/// What clients see in place of a failure detail outside debug mode.
pub const GENERIC_ERROR: &str = "An unexpected error occurred";

/// A route handler's answer before negotiation.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub envelope: Envelope,
    /// Template installed for `text/html` on this response only.
    pub template: Option<&'static str>,
}

impl Reply {
    pub fn ok(envelope: Envelope) -> Self {
        Self::with_status(StatusCode::OK, envelope)
    }

    pub fn with_status(status: StatusCode, envelope: Envelope) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            envelope,
            template: None,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn template(mut self, name: &'static str) -> Self {
        self.template = Some(name);
        self
    }
}

/// Translate a pipeline failure into a reply.
///
/// Request-format failures (400/406) carry their own message. Server-side
/// failures are reported as 500 and their detail is replaced with a fixed
/// string unless the gateway runs in debug mode.
pub fn error_reply(error: &GatewayError, debug: bool) -> Reply {
    let status =
        StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = if error.is_server_error() && !debug {
        GENERIC_ERROR.to_string()
    } else {
        error.to_string()
    };

    let mut reply = Reply::with_status(status, Envelope::notice(status.as_u16(), message));
    if error.is_server_error() {
        reply.template = Some("500.html");
    }
    reply
}

/// Negotiate and serialize a handler outcome.
///
/// The shared output registry is cloned per response so a template install
/// never leaks into other requests. A 406 raised here, on the output side,
/// has no negotiated format left to be expressed in and goes out as plain
/// text.
pub fn respond(
    state: &AppState,
    request_headers: &HeaderMap,
    outcome: Result<Reply, GatewayError>,
) -> Response {
    let reply = match outcome {
        Ok(reply) => reply,
        Err(error) => {
            tracing::debug!(error = %error, "error while processing request");
            error_reply(&error, state.config.debug)
        }
    };

    let mut registry = state.output.clone();
    if let Some(name) = reply.template {
        registry.set(MEDIA_HTML, templates::renderer(state.templates.clone(), name));
    }

    let accept = request_headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());

    let (media_type, emitter) = match negotiate::select_output(accept, &registry) {
        Ok(selected) => selected,
        Err(error) => {
            return (StatusCode::NOT_ACCEPTABLE, error.to_string()).into_response();
        }
    };

    let body = match emitter.emit(&reply.envelope) {
        Ok(body) => body,
        Err(error) => {
            tracing::error!(media_type, error = %error, "emitter failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR).into_response();
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = reply.status;
    *response.headers_mut() = reply.headers;
    if let Ok(content_type) = HeaderValue::from_str(media_type) {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    response
}
