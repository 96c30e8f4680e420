use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use matchpoint_core::MatchpointConfig;
use matchpoint_portal::{ConfigCredentials, PortalBooker};
use matchpoint_scheduler::ExecutionEngine;
use matchpoint_store::BookingStore;

/// Court-reservation execution daemon: polls for due booking instances and
/// drives each through the portal's submission protocol.
#[derive(Parser)]
#[command(name = "matchpoint-daemon", version)]
struct Cli {
    /// Path to matchpoint.toml (default: ~/.matchpoint/matchpoint.toml,
    /// overridable per key via env vars like MATCHPOINT_ENGINE__MAX_RETRIES).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchpoint=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = MatchpointConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        MatchpointConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    let store = Arc::new(BookingStore::new(conn)?);

    let credentials = Arc::new(ConfigCredentials::new(&config.credentials));
    let booker = Arc::new(PortalBooker::new(config.portal.clone(), credentials));
    let engine = ExecutionEngine::new(Arc::clone(&store), booker, &config.engine);

    // Shutdown plumbing: ctrl-c flips the watch channel the engine selects on.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(
        portal = %config.portal.base_url,
        window_days = config.portal.advance_window_days,
        "matchpoint daemon ready"
    );
    engine.run(shutdown_rx).await;

    info!("matchpoint daemon stopped");
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
