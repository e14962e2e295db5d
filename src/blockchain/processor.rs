//! Per-height ingestion routine shared by every producer.

use crate::blockchain::client::{ChainClient, ClientError};
use crate::blockchain::events::extract_events;
use crate::blockchain::models::{GasTotals, RawBlock, RawTx};
use crate::db;
use crate::decoder;
use crate::models::{
    BlockRecord, Network, OutboxEvent, SignatureAttestation, TransactionRecord, TxStatus,
};
use crate::resolver::{ResolveError, ValidatorDirectory};
use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use dashmap::DashSet;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Chain client error: {0}")]
    Client(#[from] ClientError),

    #[error("Validator directory error: {0}")]
    Directory(#[from] ResolveError),

    #[error("Block hash unavailable at height {0}")]
    MissingHash(u64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ProcessError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessError::Client(e) => e.is_retryable(),
            ProcessError::Directory(_) | ProcessError::MissingHash(_) | ProcessError::Database(_) => {
                true
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed {
        height: u64,
        transactions: usize,
        events: usize,
    },
    /// Another task is already processing this height.
    InFlight,
}

/// Removes the height from the in-flight set however processing ends,
/// including when the future is dropped.
struct InFlightGuard<'a> {
    set: &'a DashSet<u64>,
    height: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.height);
    }
}

/// Hash a transaction is indexed under: SHA-256 of its bytes, uppercase hex.
pub fn tx_hash(bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(bytes))
}

pub struct BlockProcessor {
    network: Network,
    pool: SqlitePool,
    client: Arc<dyn ChainClient>,
    validators: Arc<dyn ValidatorDirectory>,
    events: mpsc::UnboundedSender<OutboxEvent>,
    in_flight: DashSet<u64>,
    last_processed: AtomicU64,
}

impl BlockProcessor {
    pub fn new(
        network: Network,
        pool: SqlitePool,
        client: Arc<dyn ChainClient>,
        validators: Arc<dyn ValidatorDirectory>,
        events: mpsc::UnboundedSender<OutboxEvent>,
    ) -> Self {
        Self {
            network,
            pool,
            client,
            validators,
            events,
            in_flight: DashSet::new(),
            last_processed: AtomicU64::new(0),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Highest height processed by this instance, 0 before the first one.
    pub fn last_processed(&self) -> u64 {
        self.last_processed.load(Ordering::Relaxed)
    }

    /// Processes one height. `hint` is a block already pushed by the live
    /// subscription; when present the header fetch is skipped.
    ///
    /// Nothing is written unless fetching and resolution succeed, and every
    /// write is keyed by natural id, so calling this again for the same
    /// height leaves the store unchanged.
    pub async fn process_height(
        &self,
        height: u64,
        hint: Option<RawBlock>,
    ) -> Result<ProcessOutcome, ProcessError> {
        if !self.in_flight.insert(height) {
            debug!("{} height {} already in flight", self.network, height);
            return Ok(ProcessOutcome::InFlight);
        }
        let _guard = InFlightGuard {
            set: &self.in_flight,
            height,
        };

        let (mut block, txs) = self.fetch(height, hint).await?;

        let proposer = if block.proposer_address.is_empty() {
            None
        } else {
            self.validators.resolve_by_attestor(&block.proposer_address).await?
        };
        if proposer.is_none() {
            debug!(
                "Proposer {} at {} height {} not in validator directory",
                block.proposer_address, self.network, height
            );
        }
        let signatures = self.resolve_signatures(&block).await?;

        if block.hash.is_none() {
            debug!("No hash for {} height {}, fetching header", self.network, height);
            block.hash = self.client.block(height).await?.hash;
        }
        let Some(hash) = block.hash.clone() else {
            return Err(ProcessError::MissingHash(height));
        };

        let gas = block.gas_totals.unwrap_or_else(|| GasTotals {
            wanted: txs.iter().map(|t| t.gas_wanted).sum(),
            used: txs.iter().map(|t| t.gas_used).sum(),
        });

        // One transaction per height: dropped or failed work rolls back whole
        let mut db_tx = self.pool.begin().await?;
        let mut stored = 0;
        let mut queued = Vec::new();
        for tx in &txs {
            let inserted = self
                .store_transaction(&mut db_tx, tx, block.timestamp)
                .await
                .inspect_err(|e| {
                    warn!("Failed to store transaction {} at height {}: {}", tx.hash, height, e)
                })?;
            if inserted {
                stored += 1;
            }

            for (position, event) in extract_events(self.network, tx, block.timestamp)
                .into_iter()
                .enumerate()
            {
                let id = db::outbox::enqueue(
                    &mut *db_tx,
                    self.network,
                    height as i64,
                    &tx.hash,
                    position as i64,
                    &event,
                )
                .await?;
                if let Some(id) = id {
                    queued.push(OutboxEvent { id, event });
                }
            }
        }

        let record = BlockRecord {
            network: self.network,
            height: height as i64,
            hash,
            proposer,
            proposer_address: block.proposer_address.clone(),
            tx_count: block.txs.len().max(txs.len()) as i64,
            timestamp: block.timestamp,
            signatures,
            app_hash: block.app_hash.clone(),
            gas_wanted: gas.wanted,
            gas_used: gas.used,
        };
        db::block::upsert_block(&mut *db_tx, &record).await?;
        db_tx.commit().await?;
        self.last_processed.fetch_max(height, Ordering::Relaxed);

        // Queued rows outlive a missing dispatcher; they are replayed on start
        let event_count = queued.len();
        for event in queued {
            if self.events.send(event).is_err() {
                warn!("Event dispatcher for {} is gone, events stay queued", self.network);
                break;
            }
        }

        info!(
            "Processed {} height {}: {} txs ({} new), {} events",
            self.network,
            height,
            txs.len(),
            stored,
            event_count
        );
        Ok(ProcessOutcome::Processed {
            height,
            transactions: txs.len(),
            events: event_count,
        })
    }

    /// Retries retryable failures with capped exponential backoff.
    pub async fn process_with_retry(
        &self,
        height: u64,
        hint: Option<RawBlock>,
        backoff: ExponentialBuilder,
    ) -> Result<ProcessOutcome, ProcessError> {
        (|| self.process_height(height, hint.clone()))
            .retry(backoff)
            .when(ProcessError::is_retryable)
            .notify(|err: &ProcessError, dur: Duration| {
                warn!(
                    "{} height {} failed: {}. Retrying in {:?}",
                    self.network, height, err, dur
                );
            })
            .await
    }

    async fn fetch(
        &self,
        height: u64,
        hint: Option<RawBlock>,
    ) -> Result<(RawBlock, Vec<RawTx>), ProcessError> {
        let (block, mut txs) = match hint {
            Some(block) => (block, self.client.tx_search(height).await?),
            None => futures::try_join!(self.client.block(height), self.client.tx_search(height))?,
        };

        if txs.len() < block.txs.len() {
            warn!(
                "Tx index returned {} of {} txs at {} height {}, reading block results",
                txs.len(),
                block.txs.len(),
                self.network,
                height
            );
            txs = self.txs_from_block(&block).await?;
        }
        txs.sort_by_key(|t| t.index);
        Ok((block, txs))
    }

    /// Rebuilds the height's transactions from block data and block results.
    async fn txs_from_block(&self, block: &RawBlock) -> Result<Vec<RawTx>, ClientError> {
        let results = self.client.block_results(block.height).await?;
        if results.len() != block.txs.len() {
            return Err(ClientError::Malformed(format!(
                "block {} has {} txs but {} results",
                block.height,
                block.txs.len(),
                results.len()
            )));
        }

        block
            .txs
            .iter()
            .zip(results)
            .enumerate()
            .map(|(index, (encoded, result))| {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| {
                        ClientError::Malformed(format!("tx {} in block {}: {}", index, block.height, e))
                    })?;
                Ok(RawTx {
                    hash: tx_hash(&bytes),
                    height: block.height,
                    index: index as u32,
                    code: result.code,
                    gas_wanted: result.gas_wanted,
                    gas_used: result.gas_used,
                    events: result.events,
                    tx: encoded.clone(),
                })
            })
            .collect()
    }

    /// Commit signers that the directory cannot place are dropped.
    async fn resolve_signatures(
        &self,
        block: &RawBlock,
    ) -> Result<Vec<SignatureAttestation>, ResolveError> {
        let lookups = block
            .signatures
            .iter()
            .map(|sig| self.validators.resolve_by_attestor(&sig.validator_address));
        let resolved = join_all(lookups).await;

        let mut signatures = Vec::with_capacity(block.signatures.len());
        for (sig, validator) in block.signatures.iter().zip(resolved) {
            match validator? {
                Some(validator) => signatures.push(SignatureAttestation {
                    validator,
                    timestamp: sig.timestamp,
                }),
                None => debug!(
                    "Dropping signature of unknown attestor {} at height {}",
                    sig.validator_address, block.height
                ),
            }
        }
        Ok(signatures)
    }

    async fn store_transaction(
        &self,
        conn: &mut SqliteConnection,
        tx: &RawTx,
        timestamp: i64,
    ) -> Result<bool, sqlx::Error> {
        let decoded = decoder::decode_base64(&tx.tx);
        if let Some(err) = &decoded.error {
            warn!("Could not decode transaction {}: {}", tx.hash, err);
        }

        let (memo, fee) = decoded
            .envelope
            .as_ref()
            .map(|e| (e.memo.clone(), e.fee.clone()))
            .unwrap_or_default();

        let record = TransactionRecord {
            network: self.network,
            hash: tx.hash.clone(),
            height: tx.height as i64,
            status: TxStatus::from_code(tx.code),
            fee,
            message_count: decoded.messages.len() as i64,
            primary_message_type: decoded.primary_type().map(str::to_string),
            memo,
            timestamp,
            messages: decoded.messages,
        };
        db::transaction::upsert_transaction(conn, &record).await
    }
}
