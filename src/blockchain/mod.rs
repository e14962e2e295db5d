pub mod batch_manager;
pub mod client;
pub mod events;
pub mod models;
pub mod polling;
pub mod processor;
pub mod subscription;
pub mod worker_pool;

// Re-exports for convenience
pub use client::{ChainClient, ClientError, CometClient, RestClient};
pub use polling::{backfill, start_ingestion, BackfillReport, BackfillTarget};
pub use processor::{BlockProcessor, ProcessError, ProcessOutcome};
pub use subscription::{LiveSubscription, SubscriptionState, FINALITY_DELAY};
