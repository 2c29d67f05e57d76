//! LISTEN/NOTIFY change listener for the `user_tabs` table.
//!
//! A trigger on `user_tabs` pulses the `user_tabs_changes` channel with the
//! owning user id as its only payload. The listener filters to one user and
//! collapses deliveries into a single-slot dirty signal; consumers treat
//! every pulse as "something changed, reload". Delivery is at-least-once —
//! the channel never carries row data.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tabhub_core::error::{AppError, ErrorKind};
use tabhub_core::result::AppResult;
use tabhub_core::types::UserId;

/// Postgres NOTIFY channel pulsed by the `user_tabs_changed` trigger.
const CHANNEL: &str = "user_tabs_changes";

/// Reconnect backoff after a listener transport error.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Subscribes to tab-change notifications for single users.
#[derive(Debug)]
pub struct TabChangeListener {
    pool: PgPool,
}

impl TabChangeListener {
    /// Create a new listener factory over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a push listener filtered to `user_id`.
    ///
    /// The returned subscription stops delivery when dropped.
    pub async fn subscribe(&self, user_id: UserId) -> AppResult<ChangeSubscription> {
        let mut listener = PgListener::connect_with(&self.pool).await.map_err(|e| {
            AppError::with_source(ErrorKind::Channel, "Failed to connect change listener", e)
        })?;

        listener.listen(CHANNEL).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Channel,
                format!("Failed to LISTEN on '{CHANNEL}'"),
                e,
            )
        })?;

        let dirty = Arc::new(Notify::new());
        let signal = Arc::clone(&dirty);
        let filter = user_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        if notification.payload() == filter {
                            debug!(user_id = %filter, "Tab change notification received");
                            signal.notify_one();
                        }
                    }
                    Err(e) => {
                        // PgListener re-establishes its connection on the
                        // next recv; a missed NOTIFY is recovered by the
                        // consumer's reload-on-heartbeat cycle.
                        warn!("Change listener error, retrying: {e}");
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        });

        Ok(ChangeSubscription {
            dirty,
            task: Some(task),
        })
    }
}

/// Handle to an active change subscription.
///
/// Dropping the handle aborts the listener task, guaranteeing release on
/// all exit paths.
#[derive(Debug)]
pub struct ChangeSubscription {
    dirty: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    /// Build a subscription around an externally pulsed signal.
    ///
    /// Used by in-memory gateways and tests; no task is managed.
    pub fn detached(dirty: Arc<Notify>) -> Self {
        Self { dirty, task: None }
    }

    /// Wait until at least one change notification has arrived.
    ///
    /// Any number of notifications delivered before this call coalesce
    /// into a single wakeup.
    pub async fn changed(&self) {
        self.dirty.notified().await;
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
