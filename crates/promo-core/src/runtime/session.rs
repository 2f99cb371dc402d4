use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::runtime::params::MarketingParams;
use crate::runtime::types::{RuntimeError, TaskToken};

/// Default session lifetime, measured from creation.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Remembered parameters and derived-task history for a root task.
///
/// Task tokens are held by reference only: the records they name live in the
/// task store and may already be gone.
#[derive(Debug, Clone)]
pub struct Session {
    pub root: TaskToken,
    pub params: MarketingParams,
    pub created_at: DateTime<Utc>,
    /// Updated on every lookup. Does not affect expiry.
    pub last_used: DateTime<Utc>,
    /// The root token followed by every regeneration, in order.
    pub task_ids: Vec<TaskToken>,
    created: Instant,
}

impl Session {
    fn new(root: &str, params: MarketingParams) -> Self {
        let now = Utc::now();
        Self {
            root: root.to_owned(),
            params,
            created_at: now,
            last_used: now,
            task_ids: vec![root.to_owned()],
            created: Instant::now(),
        }
    }

    fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.created) > timeout
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Store a new session keyed by `root`, replacing any previous one.
    async fn create_session(&self, root: &str, params: MarketingParams) -> Session;

    /// Sweep every expired session, then look up `root` and touch `last_used`.
    async fn get_session(&self, root: &str) -> Option<Session>;

    /// Record a regeneration under the session keyed by `root`.
    async fn append_task(&self, root: &str, token: &str) -> Result<(), RuntimeError>;

    async fn remove_session(&self, root: &str);

    /// Drop every expired session; returns how many were removed.
    async fn sweep_expired(&self) -> usize;
}

/// In-memory [`SessionStore`] with a fixed expiry window.
///
/// Expiry is lazy: every lookup sweeps the whole map first, there is no
/// background sweeper.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
    timeout: Duration,
}

impl MemorySessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    fn sweep_locked(&self, sessions: &mut HashMap<String, Session>) -> usize {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, self.timeout));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, remaining = sessions.len(), "expired sessions swept");
        }
        removed
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, root: &str, params: MarketingParams) -> Session {
        let session = Session::new(root, params);
        self.inner
            .write()
            .await
            .insert(root.to_owned(), session.clone());
        session
    }

    async fn get_session(&self, root: &str) -> Option<Session> {
        let mut guard = self.inner.write().await;
        self.sweep_locked(&mut guard);
        let session = guard.get_mut(root)?;
        session.last_used = Utc::now();
        Some(session.clone())
    }

    async fn append_task(&self, root: &str, token: &str) -> Result<(), RuntimeError> {
        let mut guard = self.inner.write().await;
        let session = guard
            .get_mut(root)
            .ok_or_else(|| RuntimeError::SessionNotFound {
                root: root.to_owned(),
            })?;
        session.task_ids.push(token.to_owned());
        Ok(())
    }

    async fn remove_session(&self, root: &str) {
        self.inner.write().await.remove(root);
    }

    async fn sweep_expired(&self) -> usize {
        let mut guard = self.inner.write().await;
        self.sweep_locked(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::params::Platforms;

    fn params(product: &str) -> MarketingParams {
        MarketingParams {
            img_prompt: "studio shot".into(),
            prompt: "announce".into(),
            platform: Platforms::One("Twitter".into()),
            product: product.into(),
            logo: "bG9nbw==".into(),
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn stored_params_are_independent_of_caller_copy() {
        let store = MemorySessionStore::default();
        let mut mine = params("Tea");
        store.create_session("root", mine.clone()).await;
        mine.product = "Coffee".into();

        let session = store.get_session("root").await.expect("session");
        assert_eq!(session.params.product, "Tea");
        assert_eq!(session.task_ids, vec!["root".to_owned()]);
    }

    #[tokio::test]
    async fn derived_tasks_are_appended_in_order() {
        let store = MemorySessionStore::default();
        store.create_session("root", params("Tea")).await;
        store.append_task("root", "a").await.unwrap();
        store.append_task("root", "b").await.unwrap();

        let session = store.get_session("root").await.unwrap();
        assert_eq!(session.task_ids, vec!["root", "a", "b"]);

        let err = store.append_task("missing", "c").await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_is_fixed_from_creation_not_renewed_by_access() {
        let store = MemorySessionStore::new(Duration::from_secs(3600));
        store.create_session("root", params("Tea")).await;

        for _ in 0..59 {
            tokio::time::advance(Duration::from_secs(60)).await;
            assert!(store.get_session("root").await.is_some());
        }
        // T+61min: the lookups above touched last_used but do not extend life.
        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(store.get_session("root").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_sweeps_unrelated_expired_sessions() {
        let store = MemorySessionStore::new(Duration::from_secs(10));
        store.create_session("old", params("Tea")).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        store.create_session("young", params("Tea")).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(store.get_session("nothing-here").await.is_none());
        assert_eq!(store.inner.read().await.len(), 1);
        assert!(store.get_session("young").await.is_some());
        assert_eq!(store.sweep_expired().await, 0);
    }

    #[tokio::test]
    async fn last_used_is_touched_on_lookup() {
        let store = MemorySessionStore::default();
        let created = store.create_session("root", params("Tea")).await;
        let fetched = store.get_session("root").await.unwrap();
        assert!(fetched.last_used >= created.last_used);
        assert_eq!(fetched.created_at, created.created_at);
    }
}
