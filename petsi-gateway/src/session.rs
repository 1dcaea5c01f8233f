//! Chatbot session store.
//!
//! Maps a random session id (carried in a cookie) to its creation and expiry
//! timestamps. Nothing else is stored. Every chatbot request refreshes its own
//! entry and sweeps expired ones; there is no background reaper, so an expired
//! session lingers until the next chatbot call.

use chrono::{DateTime, Duration, Utc};
use petsi_common::validation::MAX_SESSION_TTL_SECS;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Timestamps for one chatbot session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// In-process session map shared across requests.
///
/// Writes for the same id are last-write-wins; the lock only keeps the map
/// itself consistent.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty store whose sessions live for `ttl_secs` after their
    /// latest touch, capped at [`MAX_SESSION_TTL_SECS`].
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs.min(MAX_SESSION_TTL_SECS) as i64),
        }
    }

    /// Session lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the presented id if it names a live session, otherwise mint a
    /// fresh one. The returned id is not recorded until [`touch`](Self::touch).
    pub async fn get_or_create(&self, session_id: Option<&str>) -> String {
        self.get_or_create_at(session_id, Utc::now()).await
    }

    pub async fn get_or_create_at(&self, session_id: Option<&str>, now: DateTime<Utc>) -> String {
        if let Some(id) = session_id.filter(|id| !id.is_empty()) {
            let sessions = self.sessions.read().await;
            if sessions.get(id).is_some_and(|s| !s.is_expired_at(now)) {
                return id.to_string();
            }
        }

        let id = Uuid::new_v4().to_string();
        tracing::debug!(session_id = %id, "Minted chatbot session");
        id
    }

    /// Overwrite the session with a new creation time and a full TTL.
    pub async fn touch(&self, session_id: &str) -> Session {
        self.touch_at(session_id, Utc::now()).await
    }

    pub async fn touch_at(&self, session_id: &str, now: DateTime<Utc>) -> Session {
        let session = Session {
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), session);
        session
    }

    /// Remove every session whose expiry has passed. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = sessions.len(), "Swept expired sessions");
        }
        removed
    }

    /// Look up a session without touching it.
    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).copied()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
