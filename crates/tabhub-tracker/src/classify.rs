//! Pure liveness classification.

use chrono::{DateTime, Utc};

use tabhub_core::config::presence::PresenceConfig;
use tabhub_entity::tab::{Liveness, TabRecord};

/// Classify a tab record against a logical `now` reference.
///
/// Total and side-effect free. Both threshold comparisons are strict:
/// exactly `active_threshold_seconds` since the last heartbeat is idle,
/// exactly `idle_threshold_seconds` is stale. A `last_seen` in the future
/// (cross-device clock skew) counts as zero elapsed seconds. Active
/// additionally requires the foreground flag; idle requires only recency.
pub fn classify(record: &TabRecord, now: DateTime<Utc>, config: &PresenceConfig) -> Liveness {
    let elapsed = record.seconds_since_seen(now);

    if elapsed < config.active_threshold_seconds as i64 && record.is_active {
        Liveness::Active
    } else if elapsed < config.idle_threshold_seconds as i64 {
        Liveness::Idle
    } else {
        Liveness::Stale
    }
}
