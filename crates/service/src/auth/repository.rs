use std::sync::Arc;

use async_trait::async_trait;
use models::session::CurrentSession;
use models::user::UserRecord;

use super::errors::AuthError;
use crate::storage::{keys, CollectionStore};

/// Repository abstraction for auth-related persistence.
#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, AuthError>;
    /// Insert `user`, failing with [`AuthError::Conflict`] when the email is taken.
    async fn create_user(&self, user: UserRecord) -> Result<UserRecord, AuthError>;

    async fn session(&self) -> Result<Option<CurrentSession>, AuthError>;
    async fn set_session(&self, session: &CurrentSession) -> Result<(), AuthError>;
    async fn clear_session(&self) -> Result<(), AuthError>;
}

/// [`AuthRepository`] over the users collection and the session singleton.
pub struct StoreAuthRepository {
    store: Arc<CollectionStore>,
}

impl StoreAuthRepository {
    pub fn new(store: Arc<CollectionStore>) -> Self { Self { store } }
}

#[async_trait]
impl AuthRepository for StoreAuthRepository {
    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let users: Vec<UserRecord> = self.store.get_all(keys::USERS).await;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, AuthError> {
        let users: Vec<UserRecord> = self.store.get_all(keys::USERS).await;
        Ok(users.into_iter().find(|u| u.id == id))
    }

    async fn create_user(&self, user: UserRecord) -> Result<UserRecord, AuthError> {
        self.store
            .mutate(keys::USERS, |users: &mut Vec<UserRecord>| {
                if users.iter().any(|u| u.email == user.email) {
                    return Err(AuthError::Conflict);
                }
                users.push(user.clone());
                Ok(user)
            })
            .await
    }

    async fn session(&self) -> Result<Option<CurrentSession>, AuthError> {
        Ok(self.store.get_value(keys::SESSION).await)
    }

    // Write failures are already logged by the key/value layer and do not fail the caller.
    async fn set_session(&self, session: &CurrentSession) -> Result<(), AuthError> {
        self.store.set_value(keys::SESSION, session).await;
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), AuthError> {
        self.store.clear_value(keys::SESSION).await;
        Ok(())
    }
}
