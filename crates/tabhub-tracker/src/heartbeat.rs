//! Period-adaptive heartbeat scheduler.
//!
//! One repeating timer pushes this tab's presence record to the durable
//! store: every 5s in the foreground, every 30s in the background
//! (configurable). Foreground transitions re-arm the timer and fire one
//! immediate out-of-band heartbeat. Writes run on spawned tasks so a slow
//! write never delays the next tick; a failed write is logged and simply
//! retried by the next tick.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use tabhub_auth::Identity;
use tabhub_core::config::presence::PresenceConfig;
use tabhub_entity::tab::TabRecord;

use crate::gateway::PresenceGateway;
use crate::identity::LocalIdentity;
use crate::reconciler::EngineEvent;

/// The heartbeat scheduler task state.
#[derive(Debug)]
pub struct HeartbeatScheduler {
    gateway: Arc<dyn PresenceGateway>,
    config: PresenceConfig,
    local: LocalIdentity,
    user_agent: String,
    identity_rx: watch::Receiver<Option<Identity>>,
    foreground_rx: watch::Receiver<bool>,
    events_tx: mpsc::Sender<EngineEvent>,
}

impl HeartbeatScheduler {
    /// Create a scheduler; it does nothing until [`HeartbeatScheduler::run`].
    pub fn new(
        gateway: Arc<dyn PresenceGateway>,
        config: PresenceConfig,
        local: LocalIdentity,
        user_agent: String,
        identity_rx: watch::Receiver<Option<Identity>>,
        foreground_rx: watch::Receiver<bool>,
        events_tx: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            gateway,
            config,
            local,
            user_agent,
            identity_rx,
            foreground_rx,
            events_tx,
        }
    }

    /// Run until the cancel signal flips to `true`.
    ///
    /// Exactly one timer exists at any time; re-arming on a foreground
    /// change replaces it, never duplicates it.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        let mut foreground_rx = self.foreground_rx.clone();
        let mut foreground = *foreground_rx.borrow();
        let mut period = self.config.heartbeat_period(foreground);
        let mut ticker = time::interval_at(Instant::now() + period, period);

        // One immediate heartbeat when tracking starts.
        self.beat(foreground);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
                changed = foreground_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_foreground = *foreground_rx.borrow_and_update();
                    if now_foreground == foreground {
                        continue;
                    }
                    foreground = now_foreground;
                    period = self.config.heartbeat_period(foreground);
                    ticker = time::interval_at(Instant::now() + period, period);
                    debug!(?period, foreground, "Heartbeat period switched");
                    if foreground {
                        // Announce presence immediately on return to
                        // foreground, outside the timer cadence.
                        self.beat(true);
                    }
                }
                _ = ticker.tick() => {
                    self.beat(foreground);
                }
            }
        }

        debug!("Heartbeat scheduler stopped");
    }

    /// Send one heartbeat. No-op without an authenticated user.
    fn beat(&self, foreground: bool) {
        let Some(identity) = self.identity_rx.borrow().clone() else {
            return;
        };

        let now = Utc::now();
        let record = TabRecord {
            user_id: identity.user_id,
            device_id: self.local.device_id,
            tab_id: self.local.tab_id,
            user_agent: self.user_agent.clone(),
            is_active: foreground,
            last_seen: now,
            // Preserved by the store on overwrite; only the first insert
            // uses it.
            created_at: now,
        };

        let gateway = Arc::clone(&self.gateway);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            match gateway.upsert(&record).await {
                Ok(written) => {
                    let _ = events.send(EngineEvent::LocalUpdate(written)).await;
                }
                Err(e) => {
                    // No retry queue; the next scheduled tick retries.
                    warn!("Heartbeat write failed: {e}");
                }
            }
        });
    }
}
