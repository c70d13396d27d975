use chrono::Utc;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use game_core::TopicCatalog;
use game_persistence::{connect_and_migrate, SeaOrmGameStore};
use game_server::{config::Config, game_manager::GameManager};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!("Server stopped with error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting Word Party server...");

    let config = Config::from_env()?;

    info!("Loading topics from directory: {}", config.topics_directory);
    let catalog = TopicCatalog::from_directory(&config.topics_directory).map_err(|e| {
        error!("Set TOPICS_DIRECTORY to a directory containing match.txt and unmatch.txt");
        e
    })?;

    let db = connect_and_migrate(&config.database_url).await?;
    let store = Arc::new(SeaOrmGameStore::new(db));

    let game_manager = Arc::new(GameManager::new(
        store,
        Arc::new(catalog),
        config.game_settings.clone(),
        config.lifecycle.clone(),
    ));
    game_manager.restore_active_games().await?;

    // Round ticker
    let ticker_manager = game_manager.clone();
    let tick_interval = config.tick_interval;
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            let closed = ticker_manager.tick(Utc::now()).await;
            if !closed.is_empty() {
                info!("Closed {} rounds", closed.len());
            }
        }
    });

    info!(
        "Server started, checking rounds every {:?}. Press Ctrl+C to stop.",
        tick_interval
    );
    shutdown_signal().await?;

    ticker.abort();
    info!(
        "Server shutdown complete with {} unfinished games.",
        game_manager.get_active_games_count().await
    );
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down gracefully...");
    }

    Ok(())
}
