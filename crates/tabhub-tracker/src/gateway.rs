//! Presence gateway — the engine's only boundary to the durable store
//! and the push channel.

use async_trait::async_trait;
use sqlx::PgPool;

use tabhub_core::result::AppResult;
use tabhub_core::types::UserId;
use tabhub_database::listener::{ChangeSubscription, TabChangeListener};
use tabhub_database::repositories::TabRepository;
use tabhub_entity::tab::TabRecord;

/// Boundary adapter over the durable store and push channel.
///
/// Implementations must make `upsert` atomic per row (write fully or not
/// at all) and must deliver change notifications payload-free and
/// at-least-once: every notification means "something changed, reload".
#[async_trait]
pub trait PresenceGateway: Send + Sync + std::fmt::Debug + 'static {
    /// Write or overwrite the row matching the record's
    /// `(user_id, device_id, tab_id)` conflict key; returns the row as
    /// written (with the original `created_at` on overwrite).
    async fn upsert(&self, record: &TabRecord) -> AppResult<TabRecord>;

    /// All rows for the user, ordered by `last_seen` descending.
    async fn tabs_for_user(&self, user_id: UserId) -> AppResult<Vec<TabRecord>>;

    /// Register a push listener filtered to the user. Dropping the
    /// returned subscription stops delivery.
    async fn subscribe(&self, user_id: UserId) -> AppResult<ChangeSubscription>;
}

/// PostgreSQL-backed gateway: `user_tabs` upserts plus the LISTEN/NOTIFY
/// change listener.
#[derive(Debug)]
pub struct PgPresenceGateway {
    tabs: TabRepository,
    listener: TabChangeListener,
}

impl PgPresenceGateway {
    /// Create a gateway over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            tabs: TabRepository::new(pool.clone()),
            listener: TabChangeListener::new(pool),
        }
    }
}

#[async_trait]
impl PresenceGateway for PgPresenceGateway {
    async fn upsert(&self, record: &TabRecord) -> AppResult<TabRecord> {
        self.tabs.upsert(record).await
    }

    async fn tabs_for_user(&self, user_id: UserId) -> AppResult<Vec<TabRecord>> {
        self.tabs.find_by_user(user_id).await
    }

    async fn subscribe(&self, user_id: UserId) -> AppResult<ChangeSubscription> {
        self.listener.subscribe(user_id).await
    }
}
