//! Reconciliation engine — the single owner of the known-tabs view.
//!
//! One task exclusively owns the map of known records for the current
//! user and receives everything that can mutate it through one ordered
//! event stream: local heartbeat results, completed reloads, the
//! recompute tick, and the coalesced push-channel dirty signal. No other
//! component touches the map.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, warn};

use tabhub_core::config::presence::PresenceConfig;
use tabhub_core::types::UserId;
use tabhub_database::listener::ChangeSubscription;
use tabhub_entity::tab::{TabKey, TabRecord};

use crate::gateway::PresenceGateway;
use crate::identity::LocalIdentity;
use crate::view::{TabsView, derive_view};

/// Events applied to the reconciler's state.
#[derive(Debug)]
pub enum EngineEvent {
    /// A locally sent heartbeat completed with this written record.
    LocalUpdate(TabRecord),
    /// A full reload of the user's records completed.
    Reloaded(Vec<TabRecord>),
    /// A reload failed; clears the in-flight marker so a queued reload
    /// can proceed.
    ReloadFailed,
}

/// The reconciliation engine task state.
pub struct Reconciler {
    gateway: Arc<dyn PresenceGateway>,
    config: PresenceConfig,
    local: LocalIdentity,
    user_id: UserId,
    known: HashMap<TabKey, TabRecord>,
    views: Arc<watch::Sender<TabsView>>,
    events_tx: mpsc::Sender<EngineEvent>,
    events_rx: Option<mpsc::Receiver<EngineEvent>>,
    subscription: Option<ChangeSubscription>,
    reload_in_flight: bool,
    reload_pending: bool,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("user_id", &self.user_id)
            .field("known", &self.known.len())
            .finish()
    }
}

impl Reconciler {
    /// Create an engine for one signed-in user.
    ///
    /// Returns the event sender the heartbeat scheduler publishes its
    /// write results to. `subscription` is `None` when the push channel
    /// could not be established; the engine then degrades to the
    /// heartbeat/recompute timers alone.
    pub fn new(
        gateway: Arc<dyn PresenceGateway>,
        config: PresenceConfig,
        local: LocalIdentity,
        user_id: UserId,
        views: Arc<watch::Sender<TabsView>>,
        subscription: Option<ChangeSubscription>,
    ) -> (Self, mpsc::Sender<EngineEvent>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let engine = Self {
            gateway,
            config,
            local,
            user_id,
            known: HashMap::new(),
            views,
            events_tx: events_tx.clone(),
            events_rx: Some(events_rx),
            subscription,
            reload_in_flight: false,
            reload_pending: false,
        };
        (engine, events_tx)
    }

    /// Run until the cancel signal flips to `true`.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        let mut events_rx = self
            .events_rx
            .take()
            .expect("reconciler can only run once");
        let subscription = self.subscription.take();

        let mut recompute = time::interval(self.config.recompute_period());
        recompute.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        // Recover the remote state once immediately after sign-in.
        self.start_reload();

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
                maybe_event = events_rx.recv() => {
                    match maybe_event {
                        Some(event) => self.apply(event),
                        None => break,
                    }
                }
                _ = recompute.tick() => {
                    // Advance the logical now so tabs decay from
                    // active to idle to stale without any I/O.
                    self.publish();
                }
                _ = wait_changed(&subscription) => {
                    self.start_reload();
                }
            }
        }

        debug!("Reconciler stopped");
    }

    /// Apply one event to the known set, publishing on any change.
    fn apply(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::LocalUpdate(record) => {
                if self.apply_local_update(record) {
                    self.publish();
                }
            }
            EngineEvent::Reloaded(records) => {
                self.reload_in_flight = false;
                // Wholesale replacement: keys absent from the reload
                // disappear from the local view.
                self.known = records.into_iter().map(|r| (r.key(), r)).collect();
                self.publish();
                self.run_pending_reload();
            }
            EngineEvent::ReloadFailed => {
                self.reload_in_flight = false;
                self.run_pending_reload();
            }
        }
    }

    /// Upsert one record by `(device_id, tab_id)`.
    ///
    /// An update whose `last_seen` is older than the held value is
    /// discarded: two in-flight heartbeats may complete out of order, and
    /// the newer value logically dominates. Returns whether the map
    /// changed.
    fn apply_local_update(&mut self, record: TabRecord) -> bool {
        match self.known.get(&record.key()) {
            Some(existing) if record.last_seen < existing.last_seen => {
                debug!(
                    tab_id = %record.tab_id,
                    "Discarding out-of-order update ({} < {})",
                    record.last_seen,
                    existing.last_seen
                );
                false
            }
            _ => {
                self.known.insert(record.key(), record);
                true
            }
        }
    }

    /// Kick off a wholesale reload unless one is already in flight, in
    /// which case exactly one follow-up reload is queued.
    fn start_reload(&mut self) {
        if self.reload_in_flight {
            self.reload_pending = true;
            return;
        }
        self.reload_in_flight = true;

        let gateway = Arc::clone(&self.gateway);
        let events = self.events_tx.clone();
        let user_id = self.user_id;
        // The query runs off-loop so a slow read never delays the timers.
        tokio::spawn(async move {
            match gateway.tabs_for_user(user_id).await {
                Ok(records) => {
                    let _ = events.send(EngineEvent::Reloaded(records)).await;
                }
                Err(e) => {
                    warn!("Tab reload failed: {e}");
                    let _ = events.send(EngineEvent::ReloadFailed).await;
                }
            }
        });
    }

    fn run_pending_reload(&mut self) {
        if self.reload_pending {
            self.reload_pending = false;
            self.start_reload();
        }
    }

    /// Recompute the derived view from scratch and publish it.
    fn publish(&self) {
        let view = derive_view(self.known.values(), Utc::now(), &self.config, &self.local);
        let _ = self.views.send(view);
    }
}

/// Wait for the next coalesced change notification, or forever when the
/// push channel is unavailable.
async fn wait_changed(subscription: &Option<ChangeSubscription>) {
    match subscription {
        Some(sub) => sub.changed().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use tabhub_core::result::AppResult;
    use tabhub_core::types::{DeviceId, TabId};

    #[derive(Debug)]
    struct NullGateway;

    #[async_trait]
    impl PresenceGateway for NullGateway {
        async fn upsert(&self, record: &TabRecord) -> AppResult<TabRecord> {
            Ok(record.clone())
        }

        async fn tabs_for_user(&self, _user_id: UserId) -> AppResult<Vec<TabRecord>> {
            Ok(Vec::new())
        }

        async fn subscribe(&self, _user_id: UserId) -> AppResult<ChangeSubscription> {
            Ok(ChangeSubscription::detached(Arc::new(
                tokio::sync::Notify::new(),
            )))
        }
    }

    fn engine(user_id: UserId, local: LocalIdentity) -> Reconciler {
        let views = Arc::new(watch::channel(TabsView::empty()).0);
        let (engine, _events) = Reconciler::new(
            Arc::new(NullGateway),
            PresenceConfig::default(),
            local,
            user_id,
            views,
            None,
        );
        engine
    }

    fn record(
        user_id: UserId,
        local: &LocalIdentity,
        last_seen: DateTime<chrono::Utc>,
    ) -> TabRecord {
        TabRecord {
            user_id,
            device_id: local.device_id,
            tab_id: local.tab_id,
            user_agent: "test".to_string(),
            is_active: true,
            last_seen,
            created_at: last_seen,
        }
    }

    fn local() -> LocalIdentity {
        LocalIdentity {
            device_id: DeviceId::new(),
            tab_id: TabId::new(),
        }
    }

    #[tokio::test]
    async fn test_local_update_is_idempotent() {
        let user = UserId::new();
        let local = local();
        let mut engine = engine(user, local);

        let rec = record(user, &local, Utc::now());
        assert!(engine.apply_local_update(rec.clone()));
        engine.apply_local_update(rec);
        assert_eq!(engine.known.len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_update_is_discarded() {
        let user = UserId::new();
        let local = local();
        let mut engine = engine(user, local);
        let now = Utc::now();

        let newer = record(user, &local, now);
        let older = record(user, &local, now - Duration::seconds(10));

        assert!(engine.apply_local_update(newer.clone()));
        // A write that completed late must not roll the view back.
        assert!(!engine.apply_local_update(older));
        assert_eq!(engine.known[&newer.key()].last_seen, now);
    }

    #[tokio::test]
    async fn test_equal_last_seen_still_applies() {
        // Last value wins on ties so a refreshed foreground flag lands.
        let user = UserId::new();
        let local = local();
        let mut engine = engine(user, local);
        let now = Utc::now();

        let mut first = record(user, &local, now);
        first.is_active = true;
        let mut second = record(user, &local, now);
        second.is_active = false;

        engine.apply_local_update(first);
        assert!(engine.apply_local_update(second.clone()));
        assert!(!engine.known[&second.key()].is_active);
    }

    #[tokio::test]
    async fn test_reload_replaces_wholesale() {
        let user = UserId::new();
        let local = local();
        let mut engine = engine(user, local);
        let now = Utc::now();

        engine.apply_local_update(record(user, &local, now));

        let survivor = TabRecord {
            user_id: user,
            device_id: DeviceId::new(),
            tab_id: TabId::new(),
            user_agent: "other".to_string(),
            is_active: false,
            last_seen: now,
            created_at: now,
        };
        engine.apply(EngineEvent::Reloaded(vec![survivor.clone()]));

        assert_eq!(engine.known.len(), 1);
        assert!(engine.known.contains_key(&survivor.key()));
    }

    #[tokio::test]
    async fn test_notifications_coalesce_into_one_followup_reload() {
        let user = UserId::new();
        let local = local();
        let mut engine = engine(user, local);

        engine.start_reload();
        assert!(engine.reload_in_flight);

        // Three notifications while the reload is in flight...
        engine.start_reload();
        engine.start_reload();
        engine.start_reload();
        assert!(engine.reload_pending);

        // ...collapse into a single follow-up when it completes.
        engine.apply(EngineEvent::Reloaded(Vec::new()));
        assert!(engine.reload_in_flight);
        assert!(!engine.reload_pending);

        engine.apply(EngineEvent::Reloaded(Vec::new()));
        assert!(!engine.reload_in_flight);
        assert!(!engine.reload_pending);
    }
}
