//! Local identity configuration.

use serde::{Deserialize, Serialize};

/// Local identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Directory holding durable local state (device id, auth session).
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Free-text label describing this client, stored with every
    /// heartbeat. Informational only.
    #[serde(default = "default_client_label")]
    pub client_label: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            client_label: default_client_label(),
        }
    }
}

fn default_state_dir() -> String {
    "data/state".to_string()
}

fn default_client_label() -> String {
    format!(
        "tabhub-agent/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}
