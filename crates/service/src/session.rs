//! Session lookup seam.
//!
//! Services never read the session from ambient state: they receive a
//! [`SessionProvider`] at construction and ask it for the current user.

use async_trait::async_trait;
use models::session::CurrentSession;
use tokio::sync::RwLock;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The logged-in user, or `None` when nobody is.
    async fn current_session(&self) -> Option<CurrentSession>;
}

/// Provider with an explicitly set session, for embedding and tests.
#[derive(Default)]
pub struct FixedSession {
    inner: RwLock<Option<CurrentSession>>,
}

impl FixedSession {
    pub fn new(session: Option<CurrentSession>) -> Self {
        Self { inner: RwLock::new(session) }
    }

    pub fn user(user_id: &str) -> Self { Self::new(Some(CurrentSession::new(user_id))) }

    pub async fn set(&self, session: Option<CurrentSession>) {
        *self.inner.write().await = session;
    }
}

#[async_trait]
impl SessionProvider for FixedSession {
    async fn current_session(&self) -> Option<CurrentSession> {
        self.inner.read().await.clone()
    }
}
