use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manhwadex_core::sync::SyncRunner;
use manhwadex_core::{
    load_config, validate_config, CacheLayer, CatalogueService, SqliteStore, Syncer,
    UpstreamClient,
};
use manhwadex_server::api::create_router;
use manhwadex_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("MANHWADEX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration loaded successfully");

    // Wire the core collaborators
    let store = Arc::new(
        SqliteStore::new(&config.database.path)
            .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?,
    );
    let upstream = Arc::new(
        UpstreamClient::new(&config.upstream)
            .map_err(|e| anyhow::anyhow!("Failed to build upstream client: {}", e))?,
    );
    let cache = Arc::new(CacheLayer::new(&config.cache));
    cache.spawn_sweepers();

    let runner = Arc::new(SyncRunner::new(
        store.clone() as _,
        upstream.clone() as _,
        cache.clone(),
    ));
    let syncer = Arc::new(Syncer::new(
        runner.clone() as _,
        store.clone() as _,
        config.sync.batch_size,
        Duration::from_secs(config.sync.effective_interval_secs(config.profile)),
    ));
    syncer.start();

    let service = Arc::new(CatalogueService::new(
        store as _,
        upstream as _,
        cache,
        runner,
        syncer.clone(),
    ));

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), service, syncer.clone()));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app).await.context("Server error")?;

    syncer.stop();
    Ok(())
}
