//! Per-session identity binding.
//!
//! A [`SessionContext`] is the authenticated identity of one interactive
//! session. The [`SessionRegistry`] keeps any number of them side by side,
//! keyed by an opaque [`SessionId`], so concurrent users never share state.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{db::UserId, error::AppError};

pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionContext {
    user_id: Option<UserId>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticated(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// Binds the session to `user_id`, replacing any previous binding.
    pub fn establish(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
    }

    pub fn current(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn clear(&mut self) {
        self.user_id = None;
    }

    pub fn require(&self) -> Result<UserId, AppError> {
        self.user_id.ok_or(AppError::Unauthorized)
    }
}

struct Entry {
    context: SessionContext,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<SessionId, Entry>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Starts a fresh session bound to `user_id`.
    pub async fn open(&self, user_id: UserId) -> SessionId {
        let sid = Uuid::new_v4();
        let now = Instant::now();
        let mut sessions = self.inner.write().await;
        sessions.retain(|_, entry| entry.is_live(now));
        sessions.insert(
            sid,
            Entry {
                context: SessionContext::authenticated(user_id),
                expires_at: now + self.ttl,
            },
        );
        debug!(%user_id, session_id = %sid, "session opened");
        sid
    }

    /// Rebinds `sid` to `user_id` and restarts its lifetime.
    pub async fn establish(&self, sid: SessionId, user_id: UserId) {
        let expires_at = Instant::now() + self.ttl;
        let mut sessions = self.inner.write().await;
        let entry = sessions.entry(sid).or_insert_with(|| Entry {
            context: SessionContext::new(),
            expires_at,
        });
        entry.context.establish(user_id);
        entry.expires_at = expires_at;
    }

    /// Snapshot of the session's context; empty when unknown or expired.
    pub async fn context(&self, sid: SessionId) -> SessionContext {
        let sessions = self.inner.read().await;
        match sessions.get(&sid) {
            Some(entry) if entry.is_live(Instant::now()) => entry.context,
            _ => SessionContext::new(),
        }
    }

    /// Ends the session. Returns whether it was live.
    pub async fn clear(&self, sid: SessionId) -> bool {
        let removed = self.inner.write().await.remove(&sid);
        let live = removed.is_some_and(|e| e.is_live(Instant::now()));
        debug!(session_id = %sid, live, "session cleared");
        live
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_starts_empty() {
        let ctx = SessionContext::new();
        assert_eq!(ctx.current(), None);
        assert!(matches!(ctx.require(), Err(AppError::Unauthorized)));
    }

    #[test]
    fn establish_overwrites_and_clear_resets() {
        let mut ctx = SessionContext::new();
        ctx.establish(UserId(1));
        ctx.establish(UserId(2));
        assert_eq!(ctx.current(), Some(UserId(2)));
        ctx.clear();
        assert_eq!(ctx.current(), None);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let alice = registry.open(UserId(1)).await;
        let bob = registry.open(UserId(2)).await;

        assert_eq!(registry.context(alice).await.current(), Some(UserId(1)));
        assert_eq!(registry.context(bob).await.current(), Some(UserId(2)));

        assert!(registry.clear(alice).await);
        assert_eq!(registry.context(alice).await.current(), None);
        assert_eq!(registry.context(bob).await.current(), Some(UserId(2)));
    }

    #[tokio::test]
    async fn unknown_session_is_empty() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        assert_eq!(registry.context(Uuid::new_v4()).await, SessionContext::new());
        assert!(!registry.clear(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn establish_rebinds_existing_session() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let sid = registry.open(UserId(1)).await;
        registry.establish(sid, UserId(7)).await;
        assert_eq!(registry.context(sid).await.current(), Some(UserId(7)));
    }

    #[tokio::test]
    async fn expired_sessions_are_empty_and_pruned() {
        let registry = SessionRegistry::new(Duration::ZERO);
        let sid = registry.open(UserId(1)).await;
        assert_eq!(registry.context(sid).await.current(), None);

        registry.open(UserId(2)).await;
        assert_eq!(registry.len().await, 1);
    }
}
