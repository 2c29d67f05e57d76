//! Persisted auth session.
//!
//! The signed-in identity is written to a small JSON file under the state
//! directory so a restarted process resumes its session without
//! re-entering credentials, mirroring the provider-stored session of the
//! upstream system.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tabhub_core::result::AppResult;
use tabhub_core::types::UserId;

/// File name of the persisted session inside the state directory.
const SESSION_FILE: &str = "session.json";

/// The persisted shape of a signed-in session.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    user_id: UserId,
    email: String,
}

/// Reads and writes the persisted auth session.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Create a session file handle under the given state directory.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: state_dir.into().join(SESSION_FILE),
        }
    }

    /// Load the persisted session, if any.
    ///
    /// A missing or unreadable file is treated as "no session" — a corrupt
    /// session only costs a fresh sign-in.
    pub async fn load(&self) -> Option<(UserId, String)> {
        let bytes = tokio::fs::read(&self.path).await.ok()?;
        match serde_json::from_slice::<StoredSession>(&bytes) {
            Ok(session) => Some((session.user_id, session.email)),
            Err(e) => {
                debug!("Ignoring unreadable session file: {e}");
                None
            }
        }
    }

    /// Persist the signed-in identity.
    pub async fn save(&self, user_id: UserId, email: &str) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let session = StoredSession {
            user_id,
            email: email.to_string(),
        };
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&session)?).await?;
        Ok(())
    }

    /// Remove the persisted session. Missing file is success.
    pub async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = std::env::temp_dir().join(format!("tabhub-session-{}", uuid::Uuid::new_v4()));
        let file = SessionFile::new(&dir);

        assert!(file.load().await.is_none());

        let user_id = UserId::new();
        file.save(user_id, "a@b.test").await.unwrap();
        let (loaded_id, loaded_email) = file.load().await.unwrap();
        assert_eq!(loaded_id, user_id);
        assert_eq!(loaded_email, "a@b.test");

        file.clear().await.unwrap();
        assert!(file.load().await.is_none());
        // Clearing twice is still success.
        file.clear().await.unwrap();

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
