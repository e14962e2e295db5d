use babylon_indexer::{
    api, blockchain, cache, config::Config, db, network::NetworkRegistry, state::AppState,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting babylon-indexer");

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!(
        "Configuration loaded for networks: {:?}",
        config.networks.keys().collect::<Vec<_>>()
    );

    // Setup database connection
    let db_pool = db::connection::establish_connection(&config.database_url).await?;
    tracing::info!("Database connection established");

    // Initialize cache
    let cache = cache::init_cache(&config);
    tracing::info!(
        "Cache initialized with capacity {} and validator TTL {:?}",
        config.cache_max_capacity,
        config.validator_cache_ttl
    );

    let registry = Arc::new(NetworkRegistry::from_config(&config, &db_pool, &cache)?);
    let shutdown = CancellationToken::new();

    let app_state = Arc::new(AppState {
        config: config.clone(),
        db_pool: db_pool.clone(),
        registry: registry.clone(),
        shutdown: shutdown.clone(),
    });

    // Start ingestion for every configured network
    let mut ingestion = Vec::new();
    for services in registry.all() {
        ingestion.push(tokio::spawn(blockchain::start_ingestion(
            services.clone(),
            config.clone(),
            shutdown.clone(),
        )));
    }
    tracing::info!("Ingestion started for {} network(s)", ingestion.len());

    // Start HTTP server
    let app = api::create_router(app_state);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let signal_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown requested");
            signal_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    for handle in ingestion {
        let _ = handle.await;
    }
    db_pool.close().await;
    tracing::info!("Stopped");

    Ok(())
}
