//! Tab presence record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use tabhub_core::types::{DeviceId, TabId, UserId};

/// One heartbeat-maintained presence row per (user, device, tab).
///
/// A record first exists after the first successful heartbeat following
/// sign-in and is overwritten (never versioned) by every subsequent
/// heartbeat from the same tab. Column names follow the `user_tabs`
/// storage schema exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TabRecord {
    /// The user this tab belongs to. Immutable once set.
    pub user_id: UserId,
    /// Stable device identifier, persisted across restarts.
    pub device_id: DeviceId,
    /// Identifier of the running client instance; new per process.
    pub tab_id: TabId,
    /// Free-text client descriptor. Informational only.
    pub user_agent: String,
    /// Foreground/background state at the time of the last heartbeat.
    pub is_active: bool,
    /// Time of the last successful heartbeat write. Expected to be
    /// monotonically non-decreasing per tab, but any stored value is
    /// accepted.
    pub last_seen: DateTime<Utc>,
    /// Set once at first insert, never updated thereafter.
    pub created_at: DateTime<Utc>,
}

impl TabRecord {
    /// The reconciliation key identifying this tab within a user's view.
    pub fn key(&self) -> TabKey {
        TabKey {
            device_id: self.device_id,
            tab_id: self.tab_id,
        }
    }

    /// Seconds elapsed since the last heartbeat, clamped to zero so a
    /// clock-skewed future `last_seen` never yields a negative value.
    pub fn seconds_since_seen(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_seen).num_seconds().max(0)
    }
}

/// Identifies one tab within a user's set of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabKey {
    /// Device the tab runs on.
    pub device_id: DeviceId,
    /// The tab itself.
    pub tab_id: TabId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(last_seen: DateTime<Utc>) -> TabRecord {
        TabRecord {
            user_id: UserId::new(),
            device_id: DeviceId::new(),
            tab_id: TabId::new(),
            user_agent: "test".to_string(),
            is_active: true,
            last_seen,
            created_at: last_seen,
        }
    }

    #[test]
    fn test_seconds_since_seen() {
        let now = Utc::now();
        let rec = record(now - Duration::seconds(42));
        assert_eq!(rec.seconds_since_seen(now), 42);
    }

    #[test]
    fn test_future_last_seen_clamps_to_zero() {
        let now = Utc::now();
        let rec = record(now + Duration::seconds(30));
        assert_eq!(rec.seconds_since_seen(now), 0);
    }
}
