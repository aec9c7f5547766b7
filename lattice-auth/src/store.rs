//! Shared in-memory session storage.
//!
//! One store serves the whole process; every request touches exactly one
//! entry. Readers and writers are serialized by the lock, so sessions need
//! no cross-entry coordination of their own.

use std::collections::HashMap;

use chrono::Duration;
use tokio::sync::RwLock;

use crate::session::{Session, SessionId};

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
}

/// In-memory session store with a fixed idle timeout.
pub struct SessionStore {
    idle_timeout: Duration,
    inner: RwLock<HashMap<SessionId, Session>>,
}

impl SessionStore {
    /// Create a store whose sessions expire after `idle_secs` of inactivity.
    pub fn new(idle_secs: u64) -> Self {
        Self {
            idle_timeout: Duration::seconds(idle_secs as i64),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Create a fresh session and return a copy of it.
    pub async fn open(&self) -> Session {
        let session = Session::new(SessionId::generate());
        let mut inner = self.inner.write().await;
        inner.insert(session.id().clone(), session.clone());
        session
    }

    /// Look up a live session, refreshing its idle clock.
    ///
    /// An expired entry is dropped and reported as absent.
    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        let mut inner = self.inner.write().await;
        match inner.get_mut(id) {
            Some(session) if session.is_expired(self.idle_timeout) => {
                inner.remove(id);
                None
            }
            Some(session) => {
                session.touch();
                Some(session.clone())
            }
            None => None,
        }
    }

    /// Store a token (or clear the slot) on an existing session.
    pub async fn set_token(
        &self,
        id: &SessionId,
        token: Option<String>,
    ) -> Result<(), SessionError> {
        let mut inner = self.inner.write().await;
        let session = inner
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        session.set_token(token);
        session.touch();
        Ok(())
    }

    /// Drop every expired session and return how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, session| !session.is_expired(self.idle_timeout));
        before - inner.len()
    }

    /// Number of live entries, expired or not.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
