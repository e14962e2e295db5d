//! Producers feeding the per-height routine: live subscription, gap
//! repair on a timer and on-demand backfill.

use crate::blockchain::batch_manager::{BatchConfig, EventDispatcher};
use crate::blockchain::client::build_backoff;
use crate::blockchain::processor::{BlockProcessor, ProcessError, ProcessOutcome};
use crate::blockchain::subscription::FINALITY_DELAY;
use crate::blockchain::worker_pool::WorkerPool;
use crate::config::Config;
use crate::db;
use crate::network::NetworkServices;
use backon::ExponentialBuilder;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillTarget {
    Height(u64),
    /// The chain tip minus the finality delay, read when the run starts.
    Latest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub from: u64,
    pub to: u64,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Processes the given heights with bounded concurrency. Stops taking new
/// heights once cancelled; heights already started run to completion.
pub async fn process_heights(
    processor: &BlockProcessor,
    heights: impl IntoIterator<Item = u64>,
    concurrency: usize,
    backoff: ExponentialBuilder,
    shutdown: &CancellationToken,
) -> BackfillReport {
    let mut report = BackfillReport::default();
    let token = shutdown.clone();

    let mut results = stream::iter(heights)
        .take_while(move |_| futures::future::ready(!token.is_cancelled()))
        .map(|height| async move {
            (height, processor.process_with_retry(height, None, backoff).await)
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((height, result)) = results.next().await {
        match result {
            Ok(ProcessOutcome::Processed { .. }) => report.processed += 1,
            Ok(ProcessOutcome::InFlight) => report.skipped += 1,
            Err(e) => {
                error!("{} height {} failed: {}", processor.network(), height, e);
                report.failed += 1;
            }
        }
    }
    report.cancelled = shutdown.is_cancelled();
    report
}

/// Walks `[from, target]` through the per-height routine.
pub async fn backfill(
    services: &NetworkServices,
    from: u64,
    target: BackfillTarget,
    concurrency: usize,
    backoff: ExponentialBuilder,
    shutdown: &CancellationToken,
) -> Result<BackfillReport, ProcessError> {
    let to = match target {
        BackfillTarget::Height(height) => height,
        BackfillTarget::Latest => services
            .client
            .current_height()
            .await?
            .saturating_sub(FINALITY_DELAY),
    };
    let from = from.max(1);
    if from > to {
        debug!("Nothing to backfill on {}: {} > {}", services.network, from, to);
        return Ok(BackfillReport { from, to, ..Default::default() });
    }

    info!("Backfilling {} heights {}..={}", services.network, from, to);
    let mut report =
        process_heights(&services.processor, from..=to, concurrency, backoff, shutdown).await;
    report.from = from;
    report.to = to;
    info!(
        "Backfill of {} {}..={} finished: {} processed, {} skipped, {} failed{}",
        services.network,
        from,
        to,
        report.processed,
        report.skipped,
        report.failed,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    Ok(report)
}

/// One gap repair pass: missing heights below the live window, lowest
/// first, at most `batch` of them.
pub async fn repair_gaps(
    services: &NetworkServices,
    batch: u64,
    concurrency: usize,
    backoff: ExponentialBuilder,
    shutdown: &CancellationToken,
) -> Result<BackfillReport, ProcessError> {
    let tip = services.client.current_height().await?;
    // Heights the live stream is about to schedule are left to it
    let upper = tip.saturating_sub(FINALITY_DELAY + 1);

    let bounds = db::block::height_bounds(&services.pool, services.network).await?;
    let lower = match (services.config.start_height, bounds) {
        (Some(start), _) => start,
        (None, Some((min, _))) => min.max(1) as u64,
        (None, None) => return Ok(BackfillReport::default()),
    };
    if lower > upper {
        return Ok(BackfillReport::default());
    }

    let missing = db::block::missing_heights(
        &services.pool,
        services.network,
        lower as i64,
        upper as i64,
        batch as usize,
    )
    .await?;
    if missing.is_empty() {
        return Ok(BackfillReport {
            from: lower,
            to: upper,
            ..Default::default()
        });
    }

    info!(
        "Repairing {} missing {} heights starting at {}",
        missing.len(),
        services.network,
        missing[0]
    );
    let mut report = process_heights(
        &services.processor,
        missing.into_iter().map(|h| h as u64),
        concurrency,
        backoff,
        shutdown,
    )
    .await;
    report.from = lower;
    report.to = upper;
    Ok(report)
}

async fn run_gap_repair(
    services: Arc<NetworkServices>,
    config: Arc<Config>,
    backoff: ExponentialBuilder,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(config.gap_repair_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match repair_gaps(
                    &services,
                    config.gap_repair_batch,
                    config.backfill_concurrency,
                    backoff,
                    &shutdown,
                ).await {
                    Ok(report) if report.processed > 0 || report.failed > 0 => info!(
                        "Gap repair on {}: {} repaired, {} failed",
                        services.network, report.processed, report.failed
                    ),
                    Ok(_) => debug!("No gaps on {}", services.network),
                    Err(e) => warn!("Gap repair on {} failed: {}", services.network, e),
                }
            }
            _ = shutdown.cancelled() => {
                info!("Shutting down gap repair for {}", services.network);
                break;
            }
        }
    }
}

/// Starts every producer for one network and runs until shutdown.
pub async fn start_ingestion(
    services: Arc<NetworkServices>,
    config: Arc<Config>,
    shutdown: CancellationToken,
) {
    info!("Starting ingestion for {}", services.network);
    let backoff = build_backoff(&config.rpc);
    // Stopped only after the workers drain, so no processed height loses its events
    let intake_stop = CancellationToken::new();

    let dispatcher_handle = match services.take_event_receiver() {
        Some(receiver) => {
            let dispatcher = EventDispatcher::new(
                services.network,
                services.pool.clone(),
                receiver,
                BatchConfig {
                    max_batch_size: config.event_batch_size,
                    flush_interval: config.event_flush_interval,
                },
                services.packets.clone(),
                services.covenants.clone(),
            );
            Some(tokio::spawn(dispatcher.run(intake_stop.clone())))
        }
        None => {
            error!("Event intake for {} already taken; trackers will not run", services.network);
            None
        }
    };

    let worker_pool = WorkerPool::new(
        services.processor.clone(),
        config.worker_count,
        backoff,
        shutdown.clone(),
    );

    let live_services = services.clone();
    let live_sender = worker_pool.get_sender();
    let live_shutdown = shutdown.clone();
    let live_handle = tokio::spawn(async move {
        live_services
            .subscription
            .run(live_sender, live_shutdown)
            .await;
    });

    let repair_handle = tokio::spawn(run_gap_repair(
        services.clone(),
        config.clone(),
        backoff,
        shutdown.clone(),
    ));

    shutdown.cancelled().await;

    let _ = live_handle.await;
    let _ = repair_handle.await;
    worker_pool.join().await;
    intake_stop.cancel();
    if let Some(handle) = dispatcher_handle {
        let _ = handle.await;
    }
    info!("Ingestion for {} stopped", services.network);
}
