//! Auth client — sign-in/up/out flows and the current-identity channel.

use tokio::sync::watch;
use tracing::{info, warn};

use tabhub_core::config::auth::AuthConfig;
use tabhub_core::error::AppError;
use tabhub_core::result::AppResult;
use tabhub_core::types::UserId;
use tabhub_database::repositories::UserRepository;

use crate::password::{PasswordHasher, PasswordValidator};
use crate::session::SessionFile;

/// The authenticated identity as seen by the rest of the process.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Identity {
    /// The signed-in user's id.
    pub user_id: UserId,
    /// The email the user signed in with.
    pub email: String,
}

/// Email/password authentication client.
///
/// Publishes every identity change on a watch channel; consumers (the tab
/// tracker, route guards) observe the channel rather than polling.
pub struct AuthClient {
    users: UserRepository,
    hasher: PasswordHasher,
    validator: PasswordValidator,
    session_file: SessionFile,
    current: watch::Sender<Option<Identity>>,
    ready: watch::Sender<bool>,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl AuthClient {
    /// Creates a new auth client. Call [`AuthClient::initialize`] before
    /// relying on [`AuthClient::wait_until_ready`].
    pub fn new(users: UserRepository, session_file: SessionFile, config: &AuthConfig) -> Self {
        let (current, _) = watch::channel(None);
        let (ready, _) = watch::channel(false);
        Self {
            users,
            hasher: PasswordHasher::new(),
            validator: PasswordValidator::new(config),
            session_file,
            current,
            ready,
        }
    }

    /// Resolve the first identity: restore a persisted session if one
    /// exists and the user is still known, then mark the client ready.
    ///
    /// Always marks ready, even when restoration fails — guards must not
    /// wait forever on a broken session file.
    pub async fn initialize(&self) {
        if let Some((user_id, email)) = self.session_file.load().await {
            match self.users.find_by_id(user_id).await {
                Ok(Some(user)) => {
                    info!(user_id = %user.id, "Restored persisted session");
                    let _ = self.current.send(Some(Identity {
                        user_id: user.id,
                        email: user.email,
                    }));
                }
                Ok(None) => {
                    warn!(%email, "Persisted session references an unknown user, discarding");
                    let _ = self.session_file.clear().await;
                }
                Err(e) => {
                    // Leave the session file in place; the next start may
                    // reach the database again.
                    warn!("Could not restore session: {e}");
                }
            }
        }
        let _ = self.ready.send(true);
    }

    /// One-shot wait point resolving once the first identity resolution
    /// has landed (successfully or not).
    pub async fn wait_until_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in self, so the channel cannot close early.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Subscribe to identity changes. The current value is delivered first.
    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    /// The currently signed-in identity, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Whether a user is currently signed in.
    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Register a new user and sign them in.
    pub async fn sign_up(&self, email: &str, password: &str) -> AppResult<Identity> {
        validate_email(email)?;
        self.validator.validate(password)?;

        let hash = self.hasher.hash_password(password)?;
        let user = self.users.create(email, &hash).await?;

        info!(user_id = %user.id, "User signed up");
        self.establish(user.id, &user.email).await
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<Identity> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::authentication("Invalid email or password"))?;

        if !self.hasher.verify_password(password, &user.password_hash)? {
            return Err(AppError::authentication("Invalid email or password"));
        }

        info!(user_id = %user.id, "User signed in");
        self.establish(user.id, &user.email).await
    }

    /// Sign out the current user.
    ///
    /// Signing out with no active session is success, not failure.
    pub async fn sign_out(&self) -> AppResult<()> {
        self.session_file.clear().await?;
        if self.current.borrow().is_some() {
            info!("User signed out");
        }
        let _ = self.current.send(None);
        Ok(())
    }

    async fn establish(&self, user_id: UserId, email: &str) -> AppResult<Identity> {
        let identity = Identity {
            user_id,
            email: email.to_string(),
        };
        // Session persistence failure downgrades to a non-restorable
        // session; the sign-in itself still succeeds.
        if let Err(e) = self.session_file.save(user_id, email).await {
            warn!("Failed to persist session: {e}");
        }
        let _ = self.current.send(Some(identity.clone()));
        Ok(identity)
    }
}

fn validate_email(email: &str) -> AppResult<()> {
    let valid = email.contains('@') && !email.starts_with('@') && !email.ends_with('@');
    if valid {
        Ok(())
    } else {
        Err(AppError::validation(format!("Invalid email: '{email}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("user").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
    }

    fn offline_client(state_dir: &std::path::Path) -> AuthClient {
        // A lazy pool never connects; sufficient for flows that touch
        // only the session file and the identity channel.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .unwrap();
        AuthClient::new(
            UserRepository::new(pool),
            SessionFile::new(state_dir),
            &AuthConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_success() {
        let dir = std::env::temp_dir().join(format!("tabhub-auth-{}", uuid::Uuid::new_v4()));
        let auth = offline_client(&dir);

        assert!(!auth.is_authenticated());
        auth.sign_out().await.unwrap();
        assert!(auth.current_identity().is_none());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_ready_resolves_without_session_file() {
        let dir = std::env::temp_dir().join(format!("tabhub-auth-{}", uuid::Uuid::new_v4()));
        let auth = offline_client(&dir);

        auth.initialize().await;
        auth.wait_until_ready().await;
        assert!(!auth.is_authenticated());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
