//! Tab presence repository implementation.

use sqlx::PgPool;

use tabhub_core::error::{AppError, ErrorKind};
use tabhub_core::result::AppResult;
use tabhub_core::types::UserId;
use tabhub_entity::tab::TabRecord;

/// Repository for the `user_tabs` table.
#[derive(Debug, Clone)]
pub struct TabRepository {
    pool: PgPool,
}

impl TabRepository {
    /// Create a new tab repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write or overwrite the row matching `(user_id, device_id, tab_id)`.
    ///
    /// `created_at` is set on first insert only and preserved on every
    /// subsequent heartbeat. Returns the row as written.
    pub async fn upsert(&self, record: &TabRecord) -> AppResult<TabRecord> {
        sqlx::query_as::<_, TabRecord>(
            "INSERT INTO user_tabs (user_id, device_id, tab_id, user_agent, is_active, last_seen, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, device_id, tab_id) DO UPDATE SET \
                 user_agent = EXCLUDED.user_agent, \
                 is_active = EXCLUDED.is_active, \
                 last_seen = EXCLUDED.last_seen \
             RETURNING *",
        )
        .bind(record.user_id)
        .bind(record.device_id)
        .bind(record.tab_id)
        .bind(&record.user_agent)
        .bind(record.is_active)
        .bind(record.last_seen)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::StorageWrite, "Failed to upsert tab", e))
    }

    /// List all tab rows for a user, freshest first.
    pub async fn find_by_user(&self, user_id: UserId) -> AppResult<Vec<TabRecord>> {
        sqlx::query_as::<_, TabRecord>(
            "SELECT * FROM user_tabs WHERE user_id = $1 ORDER BY last_seen DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::StorageRead, "Failed to load tabs", e))
    }
}
