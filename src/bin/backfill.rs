//! One-shot backfill of a height range, trackers included.
//!
//!   backfill <mainnet|testnet> <from> [to]

use babylon_indexer::{
    blockchain::{
        batch_manager::{BatchConfig, EventDispatcher},
        client::build_backoff,
        polling,
    },
    cache,
    config::Config,
    db::connection,
    network::NetworkServices,
    validation::{validate_backfill_range, validate_network},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        error!("usage: backfill <network> <from> [to]");
        std::process::exit(2);
    }
    let network = validate_network(&args[0])?;
    let (from, target) = validate_backfill_range(&args[1], args.get(2).map(String::as_str))?;

    let config = Config::from_env()?;
    let network_config = config
        .network(network)
        .ok_or_else(|| format!("{} is not configured", network))?;
    let db_pool = connection::establish_connection(&config.database_url).await?;
    let cache = cache::init_cache(&config);
    let services = NetworkServices::connect(network_config, &config, db_pool.clone(), &cache)?;

    let shutdown = CancellationToken::new();
    let intake_stop = CancellationToken::new();
    let dispatcher = services.take_event_receiver().map(|receiver| {
        let dispatcher = EventDispatcher::new(
            network,
            db_pool.clone(),
            receiver,
            BatchConfig {
                max_batch_size: config.event_batch_size,
                flush_interval: config.event_flush_interval,
            },
            services.packets.clone(),
            services.covenants.clone(),
        );
        tokio::spawn(dispatcher.run(intake_stop.clone()))
    });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing in-flight heights");
            signal_shutdown.cancel();
        }
    });

    let report = polling::backfill(
        &services,
        from,
        target,
        config.backfill_concurrency,
        build_backoff(&config.rpc),
        &shutdown,
    )
    .await?;

    intake_stop.cancel();
    if let Some(handle) = dispatcher {
        let _ = handle.await;
    }

    info!(
        "✅ {} {}..={}: {} processed, {} skipped, {} failed",
        network, report.from, report.to, report.processed, report.skipped, report.failed
    );
    db_pool.close().await;
    Ok(())
}
