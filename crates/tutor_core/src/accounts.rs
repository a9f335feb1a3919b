//! crates/tutor_core/src/accounts.rs
//!
//! The user directory: registration, password authentication, lookup and
//! partial updates on top of a `UserStore` port.

use crate::domain::{AuthMode, Identity, Role, UserRecord, UserUpdate};
use crate::ports::{PortError, UserStore};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Why an account operation failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountError {
    #[error("Username '{0}' is already registered")]
    UsernameTaken(String),
    #[error("Email '{0}' is already registered")]
    EmailTaken(String),
    #[error("User '{0}' not found")]
    NotFound(String),
    #[error("Invalid account data: {0}")]
    Invalid(String),
    #[error("User store failure: {0}")]
    Storage(String),
}

impl From<PortError> for AccountError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => AccountError::NotFound(what),
            PortError::Invalid(why) => AccountError::Invalid(why),
            other => AccountError::Storage(other.to_string()),
        }
    }
}

pub type AccountResult<T> = Result<T, AccountError>;

/// One-way hex SHA-256 digest of the UTF-8 password bytes.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    hex::encode(digest)
}

/// The account directory service.
#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn UserStore>,
}

impl Accounts {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Creates a new user with the `user` role.
    ///
    /// Fails if either the username or the email is already registered.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> AccountResult<UserRecord> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(AccountError::Invalid("username must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(AccountError::Invalid("password must not be empty".to_string()));
        }

        if self.store.find_by_username(username).await?.is_some() {
            return Err(AccountError::UsernameTaken(username.to_string()));
        }
        if self.store.find_by_email(email).await?.is_some() {
            return Err(AccountError::EmailTaken(email.to_string()));
        }

        let record = UserRecord {
            username: username.to_string(),
            password_hash: hash_password(password),
            email: email.to_string(),
            role: Role::User,
            created_at: Utc::now(),
            learning_style: None,
            interaction_count: 0,
        };

        // The checks above can race with a concurrent registration; the store
        // has the final say and the conflict is attributed afterwards.
        match self.store.insert_user(&record).await {
            Ok(()) => Ok(record),
            Err(PortError::Conflict(_)) => match self.store.find_by_username(username).await? {
                Some(_) => Err(AccountError::UsernameTaken(record.username)),
                None => Err(AccountError::EmailTaken(record.email)),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the record only when the password matches.
    ///
    /// An unknown user and a wrong password both yield `Ok(None)`.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> AccountResult<Option<UserRecord>> {
        let record = self.store.find_by_username(username.trim()).await?;
        Ok(record.filter(|user| user.password_hash == hash_password(password)))
    }

    pub async fn get(&self, username: &str) -> AccountResult<Option<UserRecord>> {
        Ok(self.store.find_by_username(username).await?)
    }

    /// Merges `changes` into the stored record and persists it.
    pub async fn update(&self, username: &str, changes: UserUpdate) -> AccountResult<UserRecord> {
        let mut record = self
            .store
            .find_by_username(username)
            .await?
            .ok_or_else(|| AccountError::NotFound(username.to_string()))?;

        if let Some(email) = changes.email {
            let email = email.trim().to_string();
            if email != record.email {
                if let Some(other) = self.store.find_by_email(&email).await? {
                    if other.username != record.username {
                        return Err(AccountError::EmailTaken(email));
                    }
                }
                record.email = email;
            }
        }
        if let Some(style) = changes.learning_style {
            record.learning_style = Some(style);
        }
        if let Some(count) = changes.interaction_count {
            if count < record.interaction_count {
                return Err(AccountError::Invalid(format!(
                    "interaction count cannot decrease from {} to {}",
                    record.interaction_count, count
                )));
            }
            record.interaction_count = count;
        }

        self.store.save_user(&record).await?;
        Ok(record)
    }

    /// The authentication callback used by the transport.
    ///
    /// Registration uses the username as the email address. Every failure,
    /// including storage errors, collapses into `None` and is logged.
    pub async fn authenticate_request(
        &self,
        mode: AuthMode,
        username: &str,
        password: &str,
    ) -> Option<Identity> {
        match mode {
            AuthMode::Register => match self.register(username, password, username).await {
                Ok(record) => {
                    info!("Registered user: {}", record.username);
                    Some(Identity::from(&record))
                }
                Err(AccountError::Storage(e)) => {
                    error!("Registration failed for {}: {}", username, e);
                    None
                }
                Err(e) => {
                    warn!("Registration rejected for {}: {}", username, e);
                    None
                }
            },
            AuthMode::Login => match self.authenticate(username, password).await {
                Ok(Some(record)) => {
                    info!("Login succeeded: {}", record.username);
                    Some(Identity::from(&record))
                }
                Ok(None) => {
                    warn!("Login failed: {}", username);
                    None
                }
                Err(e) => {
                    error!("Authentication error for {}: {}", username, e);
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LearningStyle;
    use crate::memory::InMemoryUserStore;
    use crate::ports::PortResult;

    fn accounts() -> Accounts {
        Accounts::new(Arc::new(InMemoryUserStore::default()))
    }

    #[test]
    fn hash_is_deterministic_and_not_plaintext() {
        let first = hash_password("hunter2");
        let second = hash_password("hunter2");
        assert_eq!(first, second);
        assert_ne!(first, "hunter2");
        assert_eq!(first.len(), 64);

        let digests: std::collections::HashSet<String> = ["a", "b", "hunter2", "Hunter2", "hunter2 ", ""]
            .iter()
            .map(|p| hash_password(p))
            .collect();
        assert_eq!(digests.len(), 6);
    }

    #[tokio::test]
    async fn register_then_lookup() {
        let accounts = accounts();
        let created = accounts.register("alice", "pw", "alice@example.com").await.unwrap();
        assert_eq!(created.role, Role::User);
        assert_eq!(created.interaction_count, 0);
        assert!(created.learning_style.is_none());
        assert_ne!(created.password_hash, "pw");

        let found = accounts.get("alice").await.unwrap().unwrap();
        assert_eq!(found.email, "alice@example.com");
        assert_eq!(found.role, Role::User);
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let accounts = accounts();
        accounts.register("alice", "pw", "alice@example.com").await.unwrap();

        let again = accounts.register("alice", "pw", "alice@example.com").await;
        assert_eq!(again, Err(AccountError::UsernameTaken("alice".to_string())));

        let same_email = accounts.register("bob", "pw", "alice@example.com").await;
        assert_eq!(same_email, Err(AccountError::EmailTaken("alice@example.com".to_string())));
        assert!(accounts.get("bob").await.unwrap().is_none());
    }

    /// Never sees existing emails, like a registration racing another one.
    #[derive(Default)]
    struct RacingStore(InMemoryUserStore);

    #[async_trait::async_trait]
    impl UserStore for RacingStore {
        async fn insert_user(&self, user: &UserRecord) -> PortResult<()> {
            self.0.insert_user(user).await
        }
        async fn find_by_username(&self, username: &str) -> PortResult<Option<UserRecord>> {
            self.0.find_by_username(username).await
        }
        async fn find_by_email(&self, _email: &str) -> PortResult<Option<UserRecord>> {
            Ok(None)
        }
        async fn save_user(&self, user: &UserRecord) -> PortResult<()> {
            self.0.save_user(user).await
        }
        async fn create_auth_session(&self, session_id: &str, username: &str) -> PortResult<()> {
            self.0.create_auth_session(session_id, username).await
        }
        async fn resolve_auth_session(&self, session_id: &str) -> PortResult<String> {
            self.0.resolve_auth_session(session_id).await
        }
        async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
            self.0.delete_auth_session(session_id).await
        }
    }

    #[tokio::test]
    async fn email_conflict_from_the_store_is_reported_as_email_taken() {
        let accounts = Accounts::new(Arc::new(RacingStore::default()));
        accounts.register("alice", "pw", "shared@example.com").await.unwrap();

        let late = accounts.register("bob", "pw", "shared@example.com").await;
        assert_eq!(late, Err(AccountError::EmailTaken("shared@example.com".to_string())));
        let again = accounts.register("alice", "pw", "other@example.com").await;
        assert_eq!(again, Err(AccountError::UsernameTaken("alice".to_string())));
        assert!(accounts.get("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn authenticate_does_not_reveal_which_part_failed() {
        let accounts = accounts();
        accounts.register("alice", "secret", "a@example.com").await.unwrap();

        let ok = accounts.authenticate("alice", "secret").await.unwrap();
        assert_eq!(ok.map(|u| u.username), Some("alice".to_string()));

        let wrong_password = accounts.authenticate("alice", "nope").await.unwrap();
        let unknown_user = accounts.authenticate("mallory", "secret").await.unwrap();
        assert!(wrong_password.is_none());
        assert!(unknown_user.is_none());
    }

    #[tokio::test]
    async fn update_merges_fields_and_guards_counter() {
        let accounts = accounts();
        accounts.register("alice", "pw", "a@example.com").await.unwrap();

        let updated = accounts
            .update(
                "alice",
                UserUpdate {
                    learning_style: Some(LearningStyle::Visual),
                    interaction_count: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.learning_style, Some(LearningStyle::Visual));
        assert_eq!(updated.email, "a@example.com");

        let lowered = accounts
            .update(
                "alice",
                UserUpdate {
                    interaction_count: Some(1),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(lowered, Err(AccountError::Invalid(_))));

        let stored = accounts.get("alice").await.unwrap().unwrap();
        assert_eq!(stored.interaction_count, 4);
        assert_eq!(stored.learning_style, Some(LearningStyle::Visual));
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let accounts = accounts();
        let result = accounts.update("ghost", UserUpdate::default()).await;
        assert_eq!(result, Err(AccountError::NotFound("ghost".to_string())));
    }

    #[tokio::test]
    async fn authenticate_request_uses_mode() {
        let accounts = accounts();
        let registered = accounts
            .authenticate_request(AuthMode::Register, "carol@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(registered.email, "carol@example.com");
        assert_eq!(registered.role, Role::User);

        assert!(accounts
            .authenticate_request(AuthMode::Register, "carol@example.com", "pw")
            .await
            .is_none());
        assert!(accounts
            .authenticate_request(AuthMode::Login, "carol@example.com", "pw")
            .await
            .is_some());
        assert!(accounts
            .authenticate_request(AuthMode::Login, "carol@example.com", "bad")
            .await
            .is_none());
    }
}
