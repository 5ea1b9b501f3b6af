//! orderstream server
//!
//! Propagates committed order mutations to live WebSocket clients in
//! near-real time, using the `order_changes` table as the durable
//! change log.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use orderstream_core::connections::ConnectionRegistry;
use orderstream_core::events::NotificationBus;
use orderstream_core::processors::{ChangeLogPoller, HeartbeatScheduler, OrderEnricher};
use orderstream_core::store::PgRecordStore;
use server::{build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Real-time order change propagation server
#[derive(Parser, Debug)]
#[command(name = "orderstream-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./orderstream.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:8000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting orderstream-server v{}", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::new(&args.config, args.listen)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    let listen_addr = config.server.listen;

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Composition root: every component is constructed once, here, and
    // handed its collaborators explicitly.
    let store = Arc::new(PgRecordStore::new(db_pool.clone()));

    let bus = NotificationBus::new();
    let registry = Arc::new(ConnectionRegistry::new(store.clone()));
    bus.subscribe(registry.clone()).await;

    let enricher = OrderEnricher::new(store.clone());
    let poller = ChangeLogPoller::new(
        store.clone(),
        enricher,
        bus.clone(),
        config.poll_interval(),
    );
    poller.start().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat = HeartbeatScheduler::new(
        registry.clone(),
        config.heartbeat_interval(),
        shutdown_rx,
    );
    let heartbeat_handle = tokio::spawn(heartbeat.run());

    let state = AppState {
        store,
        registry,
        poller: poller.clone(),
    };

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Shutdown: stop the loops, then release the pool. In-flight
    // broadcast sends are not drained; clients reconnect for a fresh
    // snapshot.
    tracing::info!("Shutting down pipeline...");
    let _ = shutdown_tx.send(true);
    poller.stop().await;
    let _ = heartbeat_handle.await;

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
