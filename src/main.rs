//! TabHub Agent
//!
//! Main entry point that wires all crates together: configuration,
//! database, authentication, and the tab presence tracker.

use std::sync::Arc;

use clap::Parser;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use tabhub_auth::{AuthClient, SessionFile};
use tabhub_core::config::AppConfig;
use tabhub_core::error::AppError;
use tabhub_database::repositories::UserRepository;
use tabhub_database::{DatabasePool, migration};
use tabhub_tracker::{
    IdentityStore, PgPresenceGateway, PresenceGateway, TabTracker, TrackerContext,
};

/// Tracks this process as a live tab across the signed-in user's devices.
#[derive(Debug, Parser)]
#[command(name = "tabhub-agent", version, about)]
struct Cli {
    /// Configuration environment (loads config/<env>.toml as an overlay).
    #[arg(long, default_value = "development", env = "TABHUB_ENV")]
    env: String,

    /// Email to sign in with. Without credentials, a persisted session
    /// is restored if one exists.
    #[arg(long, requires = "password")]
    email: Option<String>,

    /// Password for --email.
    #[arg(long, requires = "email")]
    password: Option<String>,

    /// Create the account before signing in.
    #[arg(long, requires = "email")]
    register: bool,

    /// Start in the background heartbeat cadence.
    #[arg(long)]
    background: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Agent error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main agent run function
async fn run(cli: Cli, config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting TabHub agent v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;
    if !db.health_check().await? {
        return Err(AppError::database("Database health check failed"));
    }

    tracing::info!("Running database migrations...");
    migration::run_migrations(db.pool()).await?;
    tracing::info!("Database migrations complete");

    // ── Step 2: Local identity ───────────────────────────────────
    let identity_store = IdentityStore::new(&config.identity);
    let local = identity_store.local_identity().await?;
    tracing::info!(
        device_id = %local.device_id,
        tab_id = %local.tab_id,
        "Local identity ready"
    );

    // ── Step 3: Authentication ───────────────────────────────────
    tracing::info!("Initializing authentication...");
    let auth = Arc::new(AuthClient::new(
        UserRepository::new(db.pool().clone()),
        SessionFile::new(&config.identity.state_dir),
        &config.auth,
    ));
    auth.initialize().await;

    match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => {
            let identity = if cli.register {
                auth.sign_up(email, password).await?
            } else {
                auth.sign_in(email, password).await?
            };
            tracing::info!(user_id = %identity.user_id, "Signed in as {}", identity.email);
        }
        _ => match auth.current_identity() {
            Some(identity) => {
                tracing::info!(
                    user_id = %identity.user_id,
                    "Restored session for {}",
                    identity.email
                );
            }
            None => {
                tracing::warn!("No credentials and no persisted session; tracking is idle");
            }
        },
    }

    // ── Step 4: Start the tracker ────────────────────────────────
    tracing::info!("Starting tab tracker...");
    let gateway: Arc<dyn PresenceGateway> = Arc::new(PgPresenceGateway::new(db.pool().clone()));

    let tracker = TabTracker::spawn(TrackerContext {
        gateway,
        presence: config.presence.clone(),
        local,
        client_label: config.identity.client_label.clone(),
        identity_rx: auth.watch_identity(),
    });

    if cli.background {
        tracker.set_foreground(false);
    }

    // ── Step 5: Report view changes until shutdown ───────────────
    let mut views = tracker.views();
    let report = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow().clone();
            tracing::info!(
                tabs = view.all.len(),
                devices = view.devices.len(),
                active = view.active().len(),
                idle = view.idle().len(),
                stale = view.stale().len(),
                "Presence updated"
            );
        }
    });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping tracker...");

    tracker.shutdown().await;
    report.abort();
    db.close().await;

    tracing::info!("TabHub agent shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
