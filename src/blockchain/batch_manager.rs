//! Queue-and-drain intake between the pipeline and the trackers. Events
//! are buffered and applied in height order on size or interval, so block
//! processing never waits on tracker writes.
//!
//! Every event arrives already persisted in the outbox and is deleted once
//! applied. Transitions that close a covenant set wait until the ledger is
//! contiguous up to their height and no earlier event is still queued, so
//! signatures delivered late by an out-of-order producer still count.

use crate::db;
use crate::models::{DomainEvent, Network, OutboxEvent};
use crate::trackers::{CovenantTracker, PacketTracker, TrackerError};
use backon::{ExponentialBuilder, Retryable};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct BatchConfig {
    pub max_batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            flush_interval: Duration::from_millis(500),
        }
    }
}

pub struct EventDispatcher {
    network: Network,
    pool: SqlitePool,
    receiver: mpsc::UnboundedReceiver<OutboxEvent>,
    buffer: Vec<OutboxEvent>,
    /// Closing transitions waiting for the height watermark.
    held: Vec<OutboxEvent>,
    last_flush: Instant,
    config: BatchConfig,
    packets: Arc<PacketTracker>,
    covenants: Arc<CovenantTracker>,
}

/// Routes one event to its tracker.
pub async fn dispatch_event(
    packets: &PacketTracker,
    covenants: &CovenantTracker,
    event: &DomainEvent,
) -> Result<(), TrackerError> {
    match event {
        DomainEvent::Packet(e) => packets.on_packet_event(e).await.map(|_| ()),
        DomainEvent::Covenant(e) => covenants.on_covenant_event(e).await.map(|_| ()),
    }
}

fn by_height(events: &mut Vec<OutboxEvent>) {
    // Stable: events of one height keep their in-block order
    events.sort_by_key(|e| (e.event.height(), e.id));
    events.dedup_by_key(|e| e.id);
}

impl EventDispatcher {
    pub fn new(
        network: Network,
        pool: SqlitePool,
        receiver: mpsc::UnboundedReceiver<OutboxEvent>,
        config: BatchConfig,
        packets: Arc<PacketTracker>,
        covenants: Arc<CovenantTracker>,
    ) -> Self {
        Self {
            network,
            pool,
            receiver,
            buffer: Vec::with_capacity(config.max_batch_size),
            held: Vec::new(),
            last_flush: Instant::now(),
            config,
            packets,
            covenants,
        }
    }

    fn should_flush(&self) -> bool {
        self.buffer.len() >= self.config.max_batch_size
            || (!self.buffer.is_empty() && self.last_flush.elapsed() >= self.config.flush_interval)
    }

    /// Applies one event and clears its outbox row. Returns false when the
    /// tracker kept failing; the row stays queued.
    async fn apply(&self, queued: &OutboxEvent) -> bool {
        let backoff = ExponentialBuilder::default().with_max_times(3);
        let applied = (|| dispatch_event(&self.packets, &self.covenants, &queued.event))
            .retry(backoff)
            .await;

        let outcome = match applied {
            Ok(()) => db::outbox::complete(&self.pool, queued.id).await,
            Err(e) => {
                error!(
                    "Failed to apply event at {} height {}: {}",
                    self.network,
                    queued.event.height(),
                    e
                );
                if let Err(e) = db::outbox::record_failure(&self.pool, queued.id).await {
                    warn!("Could not record failure of outbox row {}: {}", queued.id, e);
                }
                return false;
            }
        };
        if let Err(e) = outcome {
            // Applied but still queued: replayed later, trackers absorb it
            warn!("Could not clear outbox row {}: {}", queued.id, e);
        }
        true
    }

    async fn flush(&mut self) {
        self.last_flush = Instant::now();
        if self.buffer.is_empty() && self.held.is_empty() {
            return;
        }

        let mut events = std::mem::take(&mut self.buffer);
        by_height(&mut events);

        let mut applied = 0;
        let mut retry = Vec::new();
        for queued in events {
            if queued.event.closes_covenant_set() {
                self.held.push(queued);
            } else if self.apply(&queued).await {
                applied += 1;
            } else {
                retry.push(queued);
            }
        }
        self.buffer = retry;

        applied += self.release_held().await;
        if applied > 0 {
            debug!("Applied {} {} events", applied, self.network);
        }
    }

    /// Applies held closing transitions, lowest height first, while the
    /// watermark covers them.
    async fn release_held(&mut self) -> usize {
        by_height(&mut self.held);

        let mut released = 0;
        while let Some(queued) = self.held.first() {
            let height = queued.event.height();
            match db::outbox::settled_through(&self.pool, self.network, height).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        "Holding {} closing transitions at {} height {} and above",
                        self.held.len(),
                        self.network,
                        height
                    );
                    break;
                }
                Err(e) => {
                    warn!("Could not read {} event watermark: {}", self.network, e);
                    break;
                }
            }

            let queued = self.held.remove(0);
            if !self.apply(&queued).await {
                self.held.insert(0, queued);
                break;
            }
            released += 1;
        }
        released
    }

    /// Loads events left queued by an earlier run.
    async fn replay_pending(&mut self) {
        match db::outbox::pending(&self.pool, self.network).await {
            Ok(pending) if !pending.is_empty() => {
                info!("Replaying {} queued {} events", pending.len(), self.network);
                self.buffer.extend(pending);
                self.flush().await;
            }
            Ok(_) => {}
            Err(e) => error!("Could not read queued {} events: {}", self.network, e),
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        self.replay_pending().await;
        let mut ticker = interval(self.config.flush_interval);

        loop {
            tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(event) => {
                        self.buffer.push(event);
                        if self.should_flush() {
                            self.flush().await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => self.flush().await,
                _ = shutdown.cancelled() => {
                    while let Ok(event) = self.receiver.try_recv() {
                        self.buffer.push(event);
                    }
                    break;
                }
            }
        }

        self.flush().await;
        if !self.held.is_empty() || !self.buffer.is_empty() {
            info!(
                "{} {} events stay queued for the next start",
                self.held.len() + self.buffer.len(),
                self.network
            );
        }
        info!("Event dispatcher stopped");
    }
}
