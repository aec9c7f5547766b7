//! Per-client session state.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session identifier handed to clients.
///
/// Travels back to the server either as the `session_id` cookie (browsers)
/// or as the `X-Auth-Token` header (programmatic clients).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// State tracked for one client between requests.
///
/// A session starts without a token; a successful login fills the token slot
/// and a failed one clears it again. Sessions expire after sitting idle for
/// the store's configured timeout.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    token: Option<String>,
    last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            token: None,
            last_seen: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The stored authentication token, if a login has succeeded.
    ///
    /// An empty token counts as no token.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Mark the session as used now.
    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    /// Whether the session has sat idle longer than `idle_timeout`.
    pub fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.last_seen + idle_timeout < Utc::now()
    }

    /// Force expiration for testing purposes.
    #[cfg(test)]
    pub(crate) fn force_idle(&mut self, idle: Duration) {
        self.last_seen = Utc::now() - idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_has_no_token() {
        let session = Session::new(SessionId::generate());
        assert!(session.token().is_none());
    }

    #[test]
    fn empty_token_counts_as_absent() {
        let mut session = Session::new(SessionId::generate());
        session.set_token(Some(String::new()));
        assert!(session.token().is_none());

        session.set_token(Some("6d1b722e".into()));
        assert_eq!(session.token(), Some("6d1b722e"));
    }

    #[test]
    fn clearing_the_token_slot() {
        let mut session = Session::new(SessionId::generate());
        session.set_token(Some("6d1b722e".into()));
        session.set_token(None);
        assert!(session.token().is_none());
    }

    #[test]
    fn session_not_expired_initially() {
        let session = Session::new(SessionId::generate());
        assert!(!session.is_expired(Duration::seconds(600)));
    }

    #[test]
    fn session_expires_after_sitting_idle() {
        let mut session = Session::new(SessionId::generate());
        session.force_idle(Duration::seconds(601));
        assert!(session.is_expired(Duration::seconds(600)));
    }

    #[test]
    fn touch_resets_the_idle_clock() {
        let mut session = Session::new(SessionId::generate());
        session.force_idle(Duration::seconds(601));
        session.touch();
        assert!(!session.is_expired(Duration::seconds(600)));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
