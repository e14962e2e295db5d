use crate::blockchain::models::RawBlock;
use crate::blockchain::processor::{BlockProcessor, ProcessOutcome};
use backon::ExponentialBuilder;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A height to process, with the pushed block when the live stream has one.
#[derive(Debug, Clone)]
pub struct HeightJob {
    pub height: u64,
    pub hint: Option<RawBlock>,
}

pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    sender: mpsc::Sender<HeightJob>,
}

struct WorkerHandle {
    id: usize,
    handle: tokio::task::JoinHandle<()>,
}

impl WorkerPool {
    pub fn new(
        processor: Arc<BlockProcessor>,
        worker_count: usize,
        backoff: ExponentialBuilder,
        shutdown: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(1000);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let mut workers = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let worker = Worker {
                id,
                processor: processor.clone(),
                receiver: receiver.clone(),
                backoff,
                shutdown: shutdown.clone(),
            };
            let handle = tokio::spawn(async move {
                worker.run().await;
            });

            workers.push(WorkerHandle { id, handle });
        }

        Self { workers, sender }
    }

    pub fn get_sender(&self) -> mpsc::Sender<HeightJob> {
        self.sender.clone()
    }

    /// Closes the queue and waits for in-progress heights to finish.
    pub async fn join(self) {
        drop(self.sender);
        for worker in self.workers {
            if let Err(e) = worker.handle.await {
                error!("Worker {} panicked: {}", worker.id, e);
            }
        }
    }
}

struct Worker {
    id: usize,
    processor: Arc<BlockProcessor>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<HeightJob>>>,
    backoff: ExponentialBuilder,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(&self) {
        info!("{} worker {} started", self.processor.network(), self.id);

        loop {
            let job = {
                let mut receiver = self.receiver.lock().await;
                tokio::select! {
                    job = receiver.recv() => match job {
                        Some(job) => job,
                        None => {
                            info!("Worker {} channel closed, shutting down", self.id);
                            break;
                        }
                    },
                    _ = self.shutdown.cancelled() => break,
                }
            };

            // A height runs to completion once started; shutdown is only
            // observed between jobs.
            match self
                .processor
                .process_with_retry(job.height, job.hint, self.backoff)
                .await
            {
                Ok(ProcessOutcome::InFlight) => {
                    debug!("Worker {} skipped height {} (in flight)", self.id, job.height)
                }
                Ok(_) => {}
                Err(e) => error!(
                    "Worker {} gave up on {} height {}: {}",
                    self.id,
                    self.processor.network(),
                    job.height,
                    e
                ),
            }
        }

        info!("Worker {} shutting down", self.id);
    }
}
