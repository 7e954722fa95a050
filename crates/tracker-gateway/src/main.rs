use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod app;
mod http;

/// Inventory tracker HTTP server with a live `/api/sync` event stream.
#[derive(Parser)]
#[command(name = "tracker-gateway", version, about)]
struct Cli {
    /// Path to tracker.toml (falls back to $TRACKER_CONFIG, then ./tracker.toml).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tracker_gateway=info,tracker_sync=info,tracker_inventory=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("TRACKER_CONFIG").ok());
    let config = tracker_core::TrackerConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        tracker_core::TrackerConfig::default()
    });

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");
    let db = rusqlite::Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    tracker_inventory::db::init_db(&db)?;
    let inventory = tracker_inventory::InventoryStore::new(db);

    let addr: SocketAddr = config.listen_addr().parse()?;
    let shutdown = CancellationToken::new();
    let state = Arc::new(app::AppState::new(config, inventory, shutdown.clone()));
    info!(
        mailbox_capacity = state.registry.capacity(),
        "sync hub ready"
    );
    let router = app::build_router(state);

    info!("tracker gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    info!("tracker gateway stopped");
    Ok(())
}

/// Wait for Ctrl-C, then cancel the root token so open sync streams close.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        // keep serving; only an explicit cancel stops us now
        shutdown.cancelled().await;
        return;
    }
    info!("shutdown requested");
    shutdown.cancel();
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "could not create database directory");
            }
        }
    }
}
