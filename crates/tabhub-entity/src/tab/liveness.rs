//! Liveness classification of a tab.

use serde::{Deserialize, Serialize};

/// Derived liveness state of a tab.
///
/// Computed from elapsed time since the last heartbeat and the last known
/// foreground flag; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    /// Heartbeat is recent and the tab was in the foreground.
    Active,
    /// Heartbeat is recent enough, regardless of foreground state.
    Idle,
    /// No recent heartbeat.
    Stale,
}

impl Liveness {
    /// Return the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Stale => "stale",
        }
    }

    /// Capitalized human-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Idle => "Idle",
            Self::Stale => "Stale",
        }
    }

    /// CSS class name used by presentation layers.
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Active => "state-active",
            Self::Idle => "state-idle",
            Self::Stale => "state-stale",
        }
    }
}

impl std::fmt::Display for Liveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Liveness {
    type Err = tabhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "idle" => Ok(Self::Idle),
            "stale" => Ok(Self::Stale),
            _ => Err(tabhub_core::AppError::validation(format!(
                "Invalid liveness state: '{s}'"
            ))),
        }
    }
}
