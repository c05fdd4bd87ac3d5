use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anti_bruteforce::bucket::RateCounter;
use anti_bruteforce::config::{Config, LogConfig};
use anti_bruteforce::counter_store::MemoryCounterStore;
use anti_bruteforce::database::{SqliteStorage, initialize_database};
use anti_bruteforce::{AppState, Engine, handlers};

const CONFIG_ENV: &str = "ANTI_BRUTEFORCE_CONFIG";

fn spawn_counter_cleanup(
    store: MemoryCounterStore,
    interval: std::time::Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let removed = store.cleanup_expired().await;
                    if removed > 0 {
                        info!(removed, "expired counters swept");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    });
}

fn init_tracing(log: &LogConfig) -> Result<()> {
    let file_layer = match &log.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.yml".to_string());
    let config = Config::load(&config_path).await?;

    init_tracing(&config.log)?;

    let db_pool = initialize_database(&config.database.url).await?;
    let storage = Arc::new(SqliteStorage::new(db_pool));

    let shutdown = CancellationToken::new();
    let store = MemoryCounterStore::new();
    spawn_counter_cleanup(
        store.clone(),
        config.bucket.cleanup_interval(),
        shutdown.clone(),
    );

    let counter = RateCounter::new(
        Arc::new(store),
        config.bucket.expiry_period(),
        config.bucket.safety_ttl(),
        shutdown.clone(),
    );
    let engine = Engine::new(storage.clone(), storage.as_ref(), counter)
        .await
        .context("Failed to start decision engine")?;
    let engine = Arc::new(engine);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    let state = AppState {
        config: Arc::new(config),
        engine: engine.clone(),
    };
    let app = handlers::router(state);

    info!("listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server error")?;

    engine.counter().shutdown().await;
    storage.close().await;
    info!("stopped");
    Ok(())
}
