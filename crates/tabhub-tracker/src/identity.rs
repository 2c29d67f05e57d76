//! Local identity bootstrap and persistence.
//!
//! A device id is minted once per state directory and survives restarts;
//! a tab id is minted once per process lifetime and is never persisted,
//! so every fresh process registers as a new tab.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::{debug, warn};

use tabhub_core::config::identity::IdentityConfig;
use tabhub_core::result::AppResult;
use tabhub_core::types::{DeviceId, TabId};

/// File name of the durable device id inside the state directory.
const DEVICE_ID_FILE: &str = "device_id";

static PROCESS_TAB_ID: OnceLock<TabId> = OnceLock::new();

/// The tab id of this running process.
///
/// Minted on first access and stable for the process lifetime only.
pub fn process_tab_id() -> TabId {
    *PROCESS_TAB_ID.get_or_init(TabId::new)
}

/// The identity under which this process sends heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Stable per-device identifier.
    pub device_id: DeviceId,
    /// This process's tab identifier.
    pub tab_id: TabId,
}

/// Bootstraps and persists the durable device identifier.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    state_dir: PathBuf,
}

impl IdentityStore {
    /// Create an identity store over the configured state directory.
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            state_dir: PathBuf::from(&config.state_dir),
        }
    }

    /// Read the durable device id, minting and persisting one on first run.
    ///
    /// Idempotent across restarts on the same state directory. Concurrent
    /// first runs on one directory may race; the last writer's id wins for
    /// future runs, which is a benign label-level inconsistency.
    pub async fn device_id(&self) -> AppResult<DeviceId> {
        let path = self.state_dir.join(DEVICE_ID_FILE);

        if let Ok(raw) = tokio::fs::read_to_string(&path).await {
            match raw.trim().parse::<DeviceId>() {
                Ok(id) => {
                    debug!(device_id = %id, "Loaded durable device id");
                    return Ok(id);
                }
                Err(e) => {
                    warn!("Replacing unparseable device id file: {e}");
                }
            }
        }

        let id = DeviceId::new();
        tokio::fs::create_dir_all(&self.state_dir).await?;
        tokio::fs::write(&path, id.to_string()).await?;
        debug!(device_id = %id, "Minted new device id");
        Ok(id)
    }

    /// Resolve the full local identity for this process.
    pub async fn local_identity(&self) -> AppResult<LocalIdentity> {
        Ok(LocalIdentity {
            device_id: self.device_id().await?,
            tab_id: process_tab_id(),
        })
    }
}
