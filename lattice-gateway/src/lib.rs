//! Lattice Gateway - hypermedia REST front end for the control plane.
//!
//! Clients authenticate to obtain a session, submit low-data command batches
//! over HTTP, and receive results in whatever representation their Accept
//! header asks for (JSON, YAML, or a bootstrap HTML page). The actual command
//! execution and credential checking happen in the control plane, reached
//! over a narrow socket contract; this crate is the request/response
//! pipeline in front of it.

pub mod config;
pub mod gate;
pub mod hypermedia;
pub mod negotiate;
pub mod routes;
pub mod state;
pub mod templates;
pub mod tls;
pub mod upstream;
