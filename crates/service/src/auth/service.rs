use std::sync::Arc;

use async_trait::async_trait;
use models::session::CurrentSession;
use models::user::{normalize_email, UserRecord};
use tracing::{debug, info, instrument, warn};

use super::domain::{AuthUser, LoginInput, SignUpInput};
use super::errors::AuthError;
use super::repository::AuthRepository;
use crate::session::SessionProvider;

/// Auth business service independent of any front end
pub struct AuthService<R: AuthRepository> {
    repo: Arc<R>,
}

impl<R: AuthRepository> AuthService<R> {
    pub fn new(repo: Arc<R>) -> Self { Self { repo } }

    /// Register a new user and log them in.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{AuthService, domain::SignUpInput, repository::StoreAuthRepository};
    /// use service::storage::{CollectionStore, KeyValueStore, MemoryBackend};
    /// use std::sync::Arc;
    /// let store = Arc::new(CollectionStore::new(KeyValueStore::new(Arc::new(MemoryBackend::new()))));
    /// let svc = AuthService::new(Arc::new(StoreAuthRepository::new(store)));
    /// let input = SignUpInput { name: "Ada".into(), email: "Ada@Example.com".into(), password: "secret".into() };
    /// let user = tokio_test::block_on(svc.sign_up(input)).unwrap();
    /// assert_eq!(user.email, "ada@example.com");
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn sign_up(&self, input: SignUpInput) -> Result<AuthUser, AuthError> {
        if input.name.trim().is_empty() || input.email.trim().is_empty() || input.password.is_empty() {
            return Err(AuthError::Validation("name, email and password are required".into()));
        }
        let email = normalize_email(&input.email);
        if let Some(existing) = self.repo.find_user_by_email(&email).await? {
            debug!(user_id = %existing.id, "email already registered");
            return Err(AuthError::Conflict);
        }

        let record = UserRecord::create(&input.name, &email, &input.password)?;
        let user = self.repo.create_user(record).await?;
        self.repo.set_session(&CurrentSession::new(&user.id)).await?;
        info!(user_id = %user.id, email = %user.email, "user_signed_up");
        Ok(AuthUser::from(&user))
    }

    /// Authenticate a user and make them the active session.
    ///
    /// An unknown email and a wrong password fail identically.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{AuthService, domain::{LoginInput, SignUpInput}, repository::StoreAuthRepository};
    /// use service::storage::{CollectionStore, KeyValueStore, MemoryBackend};
    /// use std::sync::Arc;
    /// let store = Arc::new(CollectionStore::new(KeyValueStore::new(Arc::new(MemoryBackend::new()))));
    /// let svc = AuthService::new(Arc::new(StoreAuthRepository::new(store)));
    /// let _ = tokio_test::block_on(svc.sign_up(SignUpInput { name: "N".into(), email: "u@e.com".into(), password: "pw".into() }));
    /// tokio_test::block_on(svc.log_out());
    /// let user = tokio_test::block_on(svc.log_in(LoginInput { email: "U@E.com".into(), password: "pw".into() })).unwrap();
    /// assert_eq!(user.email, "u@e.com");
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn log_in(&self, input: LoginInput) -> Result<AuthUser, AuthError> {
        if input.email.trim().is_empty() || input.password.is_empty() {
            return Err(AuthError::Validation("email and password are required".into()));
        }
        let email = normalize_email(&input.email);
        let user = self
            .repo
            .find_user_by_email(&email)
            .await?
            .filter(|u| u.password == input.password)
            .ok_or(AuthError::Unauthorized)?;

        self.repo.set_session(&CurrentSession::new(&user.id)).await?;
        info!(user_id = %user.id, "user_logged_in");
        Ok(AuthUser::from(&user))
    }

    /// Clear the session. Idempotent and never fails.
    #[instrument(skip(self))]
    pub async fn log_out(&self) {
        match self.repo.clear_session().await {
            Ok(()) => info!("user_logged_out"),
            Err(e) => warn!(error = %e, "session clear failed"),
        }
    }

    /// The logged-in user; `None` when nobody is logged in or the session
    /// points at a user that no longer exists.
    pub async fn current_user(&self) -> Option<AuthUser> {
        let session = match self.repo.session().await {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "session lookup failed");
                return None;
            }
        };
        match self.repo.find_user_by_id(&session.user_id).await {
            Ok(Some(user)) => Some(AuthUser::from(&user)),
            Ok(None) => {
                debug!(user_id = %session.user_id, "session references a missing user");
                None
            }
            Err(e) => {
                warn!(error = %e, "user lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl<R: AuthRepository> SessionProvider for AuthService<R> {
    async fn current_session(&self) -> Option<CurrentSession> {
        self.current_user().await.map(|u| CurrentSession::new(u.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repository::StoreAuthRepository;
    use crate::storage::{keys, CollectionStore, KeyValueStore, MemoryBackend};

    fn service() -> (Arc<CollectionStore>, AuthService<StoreAuthRepository>) {
        let store = Arc::new(CollectionStore::new(KeyValueStore::new(Arc::new(MemoryBackend::new()))));
        let svc = AuthService::new(Arc::new(StoreAuthRepository::new(store.clone())));
        (store, svc)
    }

    fn signup(name: &str, email: &str, password: &str) -> SignUpInput {
        SignUpInput { name: name.into(), email: email.into(), password: password.into() }
    }

    fn login(email: &str, password: &str) -> LoginInput {
        LoginInput { email: email.into(), password: password.into() }
    }

    #[tokio::test]
    async fn sign_up_sets_session_and_strips_password() -> Result<(), anyhow::Error> {
        let (store, svc) = service();
        let user = svc.sign_up(signup("Ada", " Ada@X.com ", "pw")).await?;
        assert_eq!(user.email, "ada@x.com");
        assert_eq!(svc.current_user().await, Some(user.clone()));

        let json = serde_json::to_value(&user)?;
        assert!(json.get("password").is_none());

        // the stored record keeps the password
        let stored: Vec<UserRecord> = store.get_all(keys::USERS).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].password, "pw");
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_case_insensitively() -> Result<(), anyhow::Error> {
        let (_, svc) = service();
        svc.sign_up(signup("A", "A@x.com", "pw")).await?;
        let err = svc.sign_up(signup("B", "a@x.com", "other")).await.unwrap_err();
        assert_eq!(err, AuthError::Conflict);
        assert_eq!(err.to_string(), "account already exists");
        Ok(())
    }

    #[tokio::test]
    async fn sign_up_requires_every_field() {
        let (_, svc) = service();
        for input in [signup("", "a@x.com", "pw"), signup("A", " ", "pw"), signup("A", "a@x.com", "")] {
            assert!(matches!(svc.sign_up(input).await, Err(AuthError::Validation(_))));
        }
        assert_eq!(svc.current_user().await, None);
    }

    #[tokio::test]
    async fn login_failures_do_not_leak_which_field_was_wrong() -> Result<(), anyhow::Error> {
        let (_, svc) = service();
        svc.sign_up(signup("A", "a@x.com", "right")).await?;
        svc.log_out().await;

        let wrong_password = svc.log_in(login("a@x.com", "wrong")).await.unwrap_err();
        let unknown_email = svc.log_in(login("nobody@x.com", "right")).await.unwrap_err();
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(svc.current_user().await, None);

        assert!(matches!(svc.log_in(login("", "x")).await, Err(AuthError::Validation(_))));
        assert!(matches!(svc.log_in(login("a@x.com", "")).await, Err(AuthError::Validation(_))));

        let user = svc.log_in(login(" A@X.COM", "right")).await?;
        assert_eq!(svc.current_user().await.map(|u| u.id), Some(user.id));
        Ok(())
    }

    #[tokio::test]
    async fn log_out_is_idempotent() -> Result<(), anyhow::Error> {
        let (_, svc) = service();
        svc.log_out().await;
        svc.sign_up(signup("A", "a@x.com", "pw")).await?;
        svc.log_out().await;
        svc.log_out().await;
        assert_eq!(svc.current_user().await, None);
        assert_eq!(svc.current_session().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn orphaned_session_reads_as_logged_out() {
        let (store, svc) = service();
        assert!(store.set_value(keys::SESSION, &CurrentSession::new("ghost")).await);
        assert_eq!(svc.current_user().await, None);
        assert_eq!(svc.current_session().await, None);
    }

    #[tokio::test]
    async fn session_survives_a_new_service_instance() -> Result<(), anyhow::Error> {
        let (store, svc) = service();
        let user = svc.sign_up(signup("A", "a@x.com", "pw")).await?;
        let again = AuthService::new(Arc::new(StoreAuthRepository::new(store)));
        assert_eq!(again.current_session().await, Some(CurrentSession::new(user.id)));
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_user_entries_do_not_lock_out_or_erase_others() -> Result<(), anyhow::Error> {
        let (store, svc) = service();
        let raw = r#"[
            {"id":"b","name":"B","email":"b@x.com","password":"pw","createdAt":"2024-01-01T00:00:00Z"},
            {"id":"c","name":"C","email":"c@x.com","password":"pw","createdAt":1700000000000}
        ]"#;
        assert!(store.kv().write(keys::USERS, raw.into()).await);

        let b = svc.log_in(login("b@x.com", "pw")).await?;
        assert_eq!(b.id, "b");
        svc.sign_up(signup("A", "a@x.com", "pw")).await?;

        let stored: serde_json::Value = serde_json::from_str(&store.kv().read(keys::USERS).await.unwrap_or_default())?;
        let emails: Vec<&str> = stored
            .as_array()
            .map(|rows| rows.iter().filter_map(|r| r["email"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(emails, vec!["b@x.com", "c@x.com", "a@x.com"]);
        assert_eq!(stored[1]["createdAt"], serde_json::json!(1700000000000u64));
        Ok(())
    }

    struct BrokenRepository;

    #[async_trait]
    impl AuthRepository for BrokenRepository {
        async fn find_user_by_email(&self, _email: &str) -> Result<Option<UserRecord>, AuthError> {
            Err(AuthError::Repository("offline".into()))
        }
        async fn find_user_by_id(&self, _id: &str) -> Result<Option<UserRecord>, AuthError> {
            Err(AuthError::Repository("offline".into()))
        }
        async fn create_user(&self, _user: UserRecord) -> Result<UserRecord, AuthError> {
            Err(AuthError::Repository("offline".into()))
        }
        async fn session(&self) -> Result<Option<CurrentSession>, AuthError> {
            Err(AuthError::Repository("offline".into()))
        }
        async fn set_session(&self, _session: &CurrentSession) -> Result<(), AuthError> {
            Err(AuthError::Repository("offline".into()))
        }
        async fn clear_session(&self) -> Result<(), AuthError> {
            Err(AuthError::Repository("offline".into()))
        }
    }

    #[tokio::test]
    async fn repository_errors_propagate_except_on_read_paths() {
        let svc = AuthService::new(Arc::new(BrokenRepository));
        let err = svc.sign_up(signup("A", "a@x.com", "pw")).await.unwrap_err();
        assert_eq!(err.code(), 1200);
        // logout and session lookups swallow the failure
        svc.log_out().await;
        assert_eq!(svc.current_user().await, None);
    }
}
