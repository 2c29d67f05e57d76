//! Integration tests for the tracking engine driven by an in-memory gateway.
//!
//! Time is paused, so heartbeat and recompute timers only fire when a test
//! advances the clock explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, watch};
use tokio::time;

use tabhub_auth::Identity;
use tabhub_core::AppError;
use tabhub_core::config::presence::PresenceConfig;
use tabhub_core::result::AppResult;
use tabhub_core::types::{DeviceId, TabId, UserId};
use tabhub_database::listener::ChangeSubscription;
use tabhub_entity::tab::TabRecord;
use tabhub_tracker::{LocalIdentity, PresenceGateway, TabTracker, TrackerContext};

type RowKey = (UserId, DeviceId, TabId);

#[derive(Debug, Default)]
struct MockGateway {
    rows: Mutex<HashMap<RowKey, TabRecord>>,
    dirty: Arc<Notify>,
    upserts: AtomicUsize,
    fail_subscribe: AtomicBool,
    hang_subscribe: AtomicBool,
}

impl MockGateway {
    fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    fn reset_upserts(&self) {
        self.upserts.store(0, Ordering::SeqCst);
    }

    fn seed(&self, record: TabRecord) {
        let key = (record.user_id, record.device_id, record.tab_id);
        self.rows.lock().unwrap().insert(key, record);
    }
}

#[async_trait]
impl PresenceGateway for MockGateway {
    async fn upsert(&self, record: &TabRecord) -> AppResult<TabRecord> {
        let key = (record.user_id, record.device_id, record.tab_id);
        let mut rows = self.rows.lock().unwrap();
        let mut written = record.clone();
        if let Some(existing) = rows.get(&key) {
            written.created_at = existing.created_at;
        }
        rows.insert(key, written.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(written)
    }

    async fn tabs_for_user(&self, user_id: UserId) -> AppResult<Vec<TabRecord>> {
        let rows = self.rows.lock().unwrap();
        let mut result: Vec<TabRecord> = rows
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(result)
    }

    async fn subscribe(&self, _user_id: UserId) -> AppResult<ChangeSubscription> {
        if self.hang_subscribe.load(Ordering::SeqCst) {
            // A connect that never completes.
            std::future::pending::<()>().await;
            unreachable!();
        }
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(AppError::channel("listener unavailable"));
        }
        Ok(ChangeSubscription::detached(Arc::clone(&self.dirty)))
    }
}

struct TestHarness {
    gateway: Arc<MockGateway>,
    identity_tx: watch::Sender<Option<Identity>>,
    tracker: TabTracker,
    local: LocalIdentity,
    user_id: UserId,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_gateway(Arc::new(MockGateway::default())).await
    }

    async fn with_gateway(gateway: Arc<MockGateway>) -> Self {
        let local = LocalIdentity {
            device_id: DeviceId::new(),
            tab_id: TabId::new(),
        };
        let user_id = UserId::new();
        let (identity_tx, identity_rx) = watch::channel(None);

        let tracker = TabTracker::spawn(TrackerContext {
            gateway: Arc::clone(&gateway) as Arc<dyn PresenceGateway>,
            presence: PresenceConfig::default(),
            local,
            client_label: "tabhub-agent/test".to_string(),
            identity_rx,
        });

        Self {
            gateway,
            identity_tx,
            tracker,
            local,
            user_id,
        }
    }

    fn sign_in(&self) {
        let _ = self.identity_tx.send(Some(Identity {
            user_id: self.user_id,
            email: "tester@example.com".to_string(),
        }));
    }

    fn sign_out(&self) {
        let _ = self.identity_tx.send(None);
    }

    fn other_device_record(&self) -> TabRecord {
        TabRecord {
            user_id: self.user_id,
            device_id: DeviceId::new(),
            tab_id: TabId::new(),
            user_agent: "tabhub-agent/other".to_string(),
            is_active: true,
            last_seen: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// Let every spawned task and in-flight write run to quiescence. The
/// paused clock only advances once all tasks are blocked, and 1ms is
/// shorter than any engine timer.
async fn settle() {
    time::sleep(Duration::from_millis(1)).await;
}

/// Advance the clock one second at a time so interval ticks and the
/// writes they spawn interleave the way they would in real time.
async fn advance_seconds(seconds: u64) {
    for _ in 0..seconds {
        time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_heartbeats_immediately() {
    let harness = TestHarness::new().await;
    harness.sign_in();
    settle().await;

    assert_eq!(harness.gateway.upsert_count(), 1);

    let view = harness.tracker.views().borrow().clone();
    assert_eq!(view.all.len(), 1);
    assert!(view.all[0].is_self);
    assert_eq!(view.all[0].record.tab_id, harness.local.tab_id);
}

#[tokio::test(start_paused = true)]
async fn test_no_heartbeat_without_identity() {
    let harness = TestHarness::new().await;
    advance_seconds(20).await;

    assert_eq!(harness.gateway.upsert_count(), 0);
    assert!(harness.tracker.views().borrow().all.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_foreground_cadence_is_five_seconds() {
    let harness = TestHarness::new().await;
    harness.sign_in();
    settle().await;
    harness.gateway.reset_upserts();

    // Ticks at +5s, +10s and +15s.
    advance_seconds(16).await;
    assert_eq!(harness.gateway.upsert_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_background_cadence_is_thirty_seconds() {
    let harness = TestHarness::new().await;
    harness.sign_in();
    settle().await;

    harness.tracker.set_foreground(false);
    settle().await;
    harness.gateway.reset_upserts();

    // Going background re-arms the timer without an immediate write.
    advance_seconds(29).await;
    assert_eq!(harness.gateway.upsert_count(), 0);

    advance_seconds(2).await;
    assert_eq!(harness.gateway.upsert_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_foreground_transition_heartbeats_immediately() {
    let harness = TestHarness::new().await;
    harness.sign_in();
    settle().await;

    harness.tracker.set_foreground(false);
    settle().await;
    harness.gateway.reset_upserts();

    harness.tracker.set_foreground(true);
    settle().await;
    assert_eq!(harness.gateway.upsert_count(), 1);

    // Repeating the current state is a no-op.
    harness.tracker.set_foreground(true);
    settle().await;
    assert_eq!(harness.gateway.upsert_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_stops_heartbeats_and_clears_view() {
    let harness = TestHarness::new().await;
    harness.sign_in();
    settle().await;
    assert!(!harness.tracker.views().borrow().all.is_empty());

    harness.sign_out();
    settle().await;
    assert!(harness.tracker.views().borrow().all.is_empty());

    harness.gateway.reset_upserts();
    advance_seconds(20).await;
    assert_eq!(harness.gateway.upsert_count(), 0);

    // Sign-out never deletes remote rows.
    assert_eq!(harness.gateway.rows.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_initial_reload_picks_up_other_devices() {
    let gateway = Arc::new(MockGateway::default());
    let harness = TestHarness::with_gateway(Arc::clone(&gateway)).await;
    gateway.seed(harness.other_device_record());

    harness.sign_in();
    settle().await;

    let view = harness.tracker.views().borrow().clone();
    assert_eq!(view.all.len(), 2);
    assert_eq!(view.devices.len(), 2);
    assert!(view.devices[0].is_self_device);
}

#[tokio::test(start_paused = true)]
async fn test_change_notification_triggers_reload() {
    let gateway = Arc::new(MockGateway::default());
    let harness = TestHarness::with_gateway(Arc::clone(&gateway)).await;

    harness.sign_in();
    settle().await;
    assert_eq!(harness.tracker.views().borrow().all.len(), 1);

    gateway.seed(harness.other_device_record());
    gateway.dirty.notify_one();
    settle().await;

    assert_eq!(harness.tracker.views().borrow().all.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_failure_degrades_to_timers() {
    let gateway = Arc::new(MockGateway::default());
    gateway.fail_subscribe.store(true, Ordering::SeqCst);
    let harness = TestHarness::with_gateway(Arc::clone(&gateway)).await;

    harness.sign_in();
    settle().await;

    // Heartbeats and the derived view still work without push delivery.
    assert_eq!(harness.gateway.upsert_count(), 1);
    assert_eq!(harness.tracker.views().borrow().all.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_handled_while_subscribe_stalls() {
    let gateway = Arc::new(MockGateway::default());
    gateway.hang_subscribe.store(true, Ordering::SeqCst);
    let harness = TestHarness::with_gateway(Arc::clone(&gateway)).await;

    harness.sign_in();
    settle().await;

    // Sign-out must be processed even though the session is still stuck
    // connecting its push channel.
    harness.sign_out();
    settle().await;
    assert!(harness.tracker.views().borrow().all.is_empty());

    advance_seconds(20).await;
    assert_eq!(gateway.upsert_count(), 0);

    // Shutdown completes promptly rather than waiting on the connect.
    time::timeout(Duration::from_secs(5), harness.tracker.shutdown())
        .await
        .expect("shutdown blocked on a stalled subscribe");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_all_timers() {
    let harness = TestHarness::new().await;
    harness.sign_in();
    settle().await;

    let gateway = Arc::clone(&harness.gateway);
    gateway.reset_upserts();
    harness.tracker.shutdown().await;

    advance_seconds(20).await;
    assert_eq!(gateway.upsert_count(), 0);
}
