//! Session and credential primitives for the Lattice gateway.
//!
//! This crate owns everything the gateway knows about *who* is calling:
//! opaque session identifiers, per-client session state with idle expiry,
//! the shared in-memory session store, and the trait through which the
//! external authentication backend is reached.
//!
//! The gateway never validates tokens itself. A session either holds a token
//! issued by the [`Authenticator`] or it does not; the control plane decides
//! whether the token is any good when a command is submitted with it.

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::{Authenticator, Credentials};
pub use session::{Session, SessionId};
pub use store::{SessionError, SessionStore};
