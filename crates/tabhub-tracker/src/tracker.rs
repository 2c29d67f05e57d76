//! Tracking lifecycle facade.
//!
//! Binds the presence engine to the identity stream: sign-in starts the
//! heartbeat scheduler, reconciler, and push subscription; sign-out
//! cancels all of them and clears the published view. Remote rows are
//! never deleted here.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tabhub_auth::Identity;
use tabhub_core::config::presence::PresenceConfig;

use crate::gateway::PresenceGateway;
use crate::heartbeat::HeartbeatScheduler;
use crate::identity::LocalIdentity;
use crate::reconciler::Reconciler;
use crate::view::TabsView;

/// Everything the tracker needs, constructed once at process start.
#[derive(Clone)]
pub struct TrackerContext {
    /// The engine's only boundary to storage and the push channel.
    pub gateway: Arc<dyn PresenceGateway>,
    /// Presence timing configuration.
    pub presence: PresenceConfig,
    /// This process's device and tab identity.
    pub local: LocalIdentity,
    /// Client label stored with every heartbeat.
    pub client_label: String,
    /// The current-identity stream from the auth collaborator.
    pub identity_rx: watch::Receiver<Option<Identity>>,
}

impl std::fmt::Debug for TrackerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerContext")
            .field("local", &self.local)
            .field("client_label", &self.client_label)
            .finish()
    }
}

/// Handle to the running tab tracker.
#[derive(Debug)]
pub struct TabTracker {
    local: LocalIdentity,
    foreground_tx: watch::Sender<bool>,
    views: Arc<watch::Sender<TabsView>>,
    shutdown_tx: watch::Sender<bool>,
    supervisor: JoinHandle<()>,
}

impl TabTracker {
    /// Spawn the tracker's supervisor task.
    ///
    /// Tracking itself starts and stops with the identity stream; the
    /// returned handle is for observation, foreground changes, and
    /// shutdown.
    pub fn spawn(ctx: TrackerContext) -> Self {
        let local = ctx.local;
        let (foreground_tx, foreground_rx) = watch::channel(true);
        let views = Arc::new(watch::channel(TabsView::empty()).0);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let supervisor = tokio::spawn(supervise(
            ctx,
            foreground_rx,
            Arc::clone(&views),
            shutdown_rx,
        ));

        Self {
            local,
            foreground_tx,
            views,
            shutdown_tx,
            supervisor,
        }
    }

    /// Subscribe to derived view snapshots.
    pub fn views(&self) -> watch::Receiver<TabsView> {
        self.views.subscribe()
    }

    /// The identity this process heartbeats under.
    pub fn local_identity(&self) -> LocalIdentity {
        self.local
    }

    /// Report a foreground/background transition.
    ///
    /// Idempotent: repeating the current state has no effect and does not
    /// re-arm any timer.
    pub fn set_foreground(&self, foreground: bool) {
        self.foreground_tx.send_if_modified(|current| {
            if *current != foreground {
                *current = foreground;
                true
            } else {
                false
            }
        });
    }

    /// Stop tracking and release every timer and subscription.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.supervisor.await;
    }
}

/// One signed-in tracking session's cancellable resources.
struct RunningSession {
    cancel: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

async fn supervise(
    ctx: TrackerContext,
    foreground_rx: watch::Receiver<bool>,
    views: Arc<watch::Sender<TabsView>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut identity_rx = ctx.identity_rx.clone();
    let mut running: Option<RunningSession> = None;

    // The user may already be signed in (restored session).
    if let Some(identity) = identity_rx.borrow_and_update().clone() {
        running = Some(start_session(&ctx, identity, &foreground_rx, &views));
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            changed = identity_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let identity = identity_rx.borrow_and_update().clone();
                if let Some(session) = running.take() {
                    stop_session(session, &views);
                }
                if let Some(identity) = identity {
                    running = Some(start_session(&ctx, identity, &foreground_rx, &views));
                }
            }
        }
    }

    if let Some(session) = running.take() {
        stop_session(session, &views);
    }
}

/// Spawn one tracking session without blocking the supervisor.
///
/// All awaiting (including the push-channel subscribe, which can stall on
/// a slow connect) happens inside the spawned task, so the supervisor's
/// select loop stays free to handle sign-out and shutdown.
fn start_session(
    ctx: &TrackerContext,
    identity: Identity,
    foreground_rx: &watch::Receiver<bool>,
    views: &Arc<watch::Sender<TabsView>>,
) -> RunningSession {
    info!(user_id = %identity.user_id, "Starting tab tracking");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let session = tokio::spawn(run_session(
        ctx.clone(),
        identity,
        foreground_rx.clone(),
        Arc::clone(views),
        cancel_rx,
    ));

    RunningSession {
        cancel: cancel_tx,
        tasks: vec![session],
    }
}

async fn run_session(
    ctx: TrackerContext,
    identity: Identity,
    foreground_rx: watch::Receiver<bool>,
    views: Arc<watch::Sender<TabsView>>,
    cancel: watch::Receiver<bool>,
) {
    let subscription = match ctx.gateway.subscribe(identity.user_id).await {
        Ok(sub) => Some(sub),
        Err(e) => {
            // Degraded mode: the heartbeat and recompute timers still
            // refresh local state on every cycle.
            warn!("Push subscription failed, continuing without it: {e}");
            None
        }
    };

    let (engine, events_tx) = Reconciler::new(
        Arc::clone(&ctx.gateway),
        ctx.presence.clone(),
        ctx.local,
        identity.user_id,
        views,
        subscription,
    );

    let scheduler = HeartbeatScheduler::new(
        ctx.gateway,
        ctx.presence,
        ctx.local,
        ctx.client_label,
        ctx.identity_rx,
        foreground_rx,
        events_tx,
    );

    tokio::join!(engine.run(cancel.clone()), scheduler.run(cancel));
}

fn stop_session(session: RunningSession, views: &Arc<watch::Sender<TabsView>>) {
    info!("Stopping tab tracking");
    // Signal first, then abort: nothing may heartbeat past this point.
    let _ = session.cancel.send(true);
    for task in session.tasks {
        task.abort();
    }
    let _ = views.send(TabsView::empty());
}
