//! Presence tracking configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Presence tracking configuration.
///
/// Heartbeat periods adapt to foreground state; classification thresholds
/// drive the active/idle/stale decay of every known tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Heartbeat period while the tab is in the foreground, in seconds.
    #[serde(default = "default_active_heartbeat")]
    pub active_heartbeat_seconds: u64,
    /// Heartbeat period while the tab is in the background, in seconds.
    #[serde(default = "default_background_heartbeat")]
    pub background_heartbeat_seconds: u64,
    /// Period of the liveness recompute tick, in seconds.
    #[serde(default = "default_recompute")]
    pub recompute_seconds: u64,
    /// A foreground tab seen within this window is classified active.
    #[serde(default = "default_active_threshold")]
    pub active_threshold_seconds: u64,
    /// A tab seen within this window (but not active) is classified idle;
    /// beyond it the tab is stale.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_seconds: u64,
}

impl PresenceConfig {
    /// Heartbeat period for the given foreground state.
    pub fn heartbeat_period(&self, foreground: bool) -> Duration {
        if foreground {
            Duration::from_secs(self.active_heartbeat_seconds)
        } else {
            Duration::from_secs(self.background_heartbeat_seconds)
        }
    }

    /// Recompute tick period.
    pub fn recompute_period(&self) -> Duration {
        Duration::from_secs(self.recompute_seconds)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            active_heartbeat_seconds: default_active_heartbeat(),
            background_heartbeat_seconds: default_background_heartbeat(),
            recompute_seconds: default_recompute(),
            active_threshold_seconds: default_active_threshold(),
            idle_threshold_seconds: default_idle_threshold(),
        }
    }
}

fn default_active_heartbeat() -> u64 {
    5
}

fn default_background_heartbeat() -> u64 {
    30
}

fn default_recompute() -> u64 {
    2
}

fn default_active_threshold() -> u64 {
    15
}

fn default_idle_threshold() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PresenceConfig::default();
        assert_eq!(config.active_heartbeat_seconds, 5);
        assert_eq!(config.background_heartbeat_seconds, 30);
        assert_eq!(config.recompute_seconds, 2);
        assert_eq!(config.active_threshold_seconds, 15);
        assert_eq!(config.idle_threshold_seconds, 60);
    }

    #[test]
    fn test_heartbeat_period_by_foreground() {
        let config = PresenceConfig::default();
        assert_eq!(config.heartbeat_period(true), Duration::from_secs(5));
        assert_eq!(config.heartbeat_period(false), Duration::from_secs(30));
    }
}
