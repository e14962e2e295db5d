//! Fixtures shared by the test modules: an in-memory store, a scripted
//! chain client and static resolvers.

use crate::blockchain::client::{ChainClient, ClientError};
use crate::blockchain::models::{EventAttribute, RawBlock, RawCommitSig, RawTx, RpcEvent, TxResult};
use crate::blockchain::processor::{tx_hash, BlockProcessor};
use crate::db::connection::establish_connection;
use crate::db::migration::run_migrations;
use crate::decoder::proto::{Any, AuthInfo, Coin, Fee, TxBody, TxRaw};
use crate::models::{Network, OutboxEvent};
use crate::resolver::{ChannelResolver, ResolveError, ValidatorDirectory};
use async_trait::async_trait;
use base64::Engine;
use prost::Message;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

pub const BASE_TIME_MS: i64 = 1_700_000_000_000;

/// Single-connection in-memory database with the schema applied.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");
    pool
}

/// File-backed database opened the way the service opens it, with a
/// multi-connection pool. The files are removed on drop.
pub struct TempDatabase {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl TempDatabase {
    pub async fn create(name: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let path = std::env::temp_dir().join(format!(
            "babylon-indexer-{}-{}-{}.db",
            name,
            std::process::id(),
            nanos
        ));
        let pool = establish_connection(&format!("sqlite://{}", path.display()))
            .await
            .expect("file-backed sqlite");
        Self { pool, path }
    }
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub fn any(type_url: &str, value: Vec<u8>) -> Any {
    Any {
        type_url: type_url.to_string(),
        value,
    }
}

pub fn envelope(messages: Vec<Any>, memo: &str) -> Vec<u8> {
    let body = TxBody {
        messages,
        memo: memo.to_string(),
        ..Default::default()
    };
    let auth = AuthInfo {
        fee: Some(Fee {
            amount: vec![Coin {
                denom: "ubbn".to_string(),
                amount: "2500".to_string(),
            }],
            gas_limit: 250_000,
            ..Default::default()
        }),
        ..Default::default()
    };
    TxRaw {
        body_bytes: body.encode_to_vec(),
        auth_info_bytes: auth.encode_to_vec(),
        signatures: vec![vec![7u8; 64]],
    }
    .encode_to_vec()
}

pub fn event(kind: &str, attrs: &[(&str, &str)]) -> RpcEvent {
    RpcEvent {
        kind: kind.to_string(),
        attributes: attrs
            .iter()
            .map(|(k, v)| EventAttribute {
                key: k.to_string(),
                value: Some(v.to_string()),
            })
            .collect(),
    }
}

pub fn raw_tx(height: u64, index: u32, bytes: &[u8], code: Option<u32>, events: Vec<RpcEvent>) -> RawTx {
    RawTx {
        hash: tx_hash(bytes),
        height,
        index,
        code,
        gas_wanted: 200_000,
        gas_used: 150_000,
        events,
        tx: base64::engine::general_purpose::STANDARD.encode(bytes),
    }
}

pub fn block_time(height: u64) -> i64 {
    BASE_TIME_MS + height as i64 * 1_000
}

pub fn raw_block(height: u64, txs: &[RawTx], signers: &[&str]) -> RawBlock {
    RawBlock {
        height,
        hash: Some(format!("{:064X}", height)),
        timestamp: block_time(height),
        proposer_address: signers.first().copied().unwrap_or_default().to_string(),
        app_hash: format!("APP{}", height),
        signatures: signers
            .iter()
            .map(|s| RawCommitSig {
                validator_address: s.to_string(),
                timestamp: block_time(height) - 500,
            })
            .collect(),
        txs: txs.iter().map(|t| t.tx.clone()).collect(),
        gas_totals: None,
    }
}

/// Chain client answering from fixed per-height data.
#[derive(Default)]
pub struct MockChainClient {
    pub tip: u64,
    pub blocks: HashMap<u64, RawBlock>,
    pub indexed: HashMap<u64, Vec<RawTx>>,
    pub results: HashMap<u64, Vec<TxResult>>,
    pub fetch_delay: Option<Duration>,
    pub block_calls: AtomicUsize,
}

impl MockChainClient {
    pub fn with_height(mut self, block: RawBlock, txs: Vec<RawTx>) -> Self {
        self.tip = self.tip.max(block.height);
        self.indexed.insert(block.height, txs);
        self.blocks.insert(block.height, block);
        self
    }

    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn current_height(&self) -> Result<u64, ClientError> {
        Ok(self.tip)
    }

    async fn block(&self, height: u64) -> Result<RawBlock, ClientError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("block {}", height)))
    }

    async fn block_results(&self, height: u64) -> Result<Vec<TxResult>, ClientError> {
        self.results
            .get(&height)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("block_results {}", height)))
    }

    async fn tx_search(&self, height: u64) -> Result<Vec<RawTx>, ClientError> {
        Ok(self.indexed.get(&height).cloned().unwrap_or_default())
    }

    async fn raw_transaction(&self, hash: &str) -> Result<RawTx, ClientError> {
        self.indexed
            .values()
            .flatten()
            .find(|t| t.hash.eq_ignore_ascii_case(hash))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(hash.to_string()))
    }
}

/// Directory with a fixed attestor to validator table.
#[derive(Default)]
pub struct StaticValidatorDirectory {
    pub known: HashMap<String, String>,
    pub unavailable: bool,
}

impl StaticValidatorDirectory {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            known: entries
                .iter()
                .map(|(a, v)| (a.to_string(), v.to_string()))
                .collect(),
            unavailable: false,
        }
    }
}

#[async_trait]
impl ValidatorDirectory for StaticValidatorDirectory {
    async fn resolve_by_attestor(&self, address: &str) -> Result<Option<String>, ResolveError> {
        if self.unavailable {
            return Err(ResolveError::Malformed("directory unavailable".to_string()));
        }
        Ok(self.known.get(address).cloned())
    }
}

/// Channel resolver whose bindings can be added while a test runs.
#[derive(Default)]
pub struct StaticChannelResolver {
    chains: Mutex<HashMap<(String, String), String>>,
}

impl StaticChannelResolver {
    pub fn bind(&self, port: &str, channel: &str, chain_id: &str) {
        self.chains
            .lock()
            .unwrap()
            .insert((port.to_string(), channel.to_string()), chain_id.to_string());
    }
}

#[async_trait]
impl ChannelResolver for StaticChannelResolver {
    async fn chain_id_for_channel(
        &self,
        channel: &str,
        port: &str,
    ) -> Result<Option<String>, ResolveError> {
        Ok(self
            .chains
            .lock()
            .unwrap()
            .get(&(port.to_string(), channel.to_string()))
            .cloned())
    }
}

pub fn processor(
    pool: &SqlitePool,
    client: Arc<MockChainClient>,
    directory: StaticValidatorDirectory,
) -> (BlockProcessor, mpsc::UnboundedReceiver<OutboxEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let processor = BlockProcessor::new(
        Network::Testnet,
        pool.clone(),
        client,
        Arc::new(directory),
        tx,
    );
    (processor, rx)
}

/// Every stored block and transaction row as text, for exact comparison.
pub async fn snapshot(pool: &SqlitePool) -> Vec<String> {
    let mut rows: Vec<String> = sqlx::query_scalar(
        r#"SELECT network || '|' || height || '|' || hash || '|' || IFNULL(proposer, '-') || '|'
                  || proposer_address || '|' || tx_count || '|' || timestamp || '|' || signatures
                  || '|' || app_hash || '|' || gas_wanted || '|' || gas_used
           FROM blocks ORDER BY network, height"#,
    )
    .fetch_all(pool)
    .await
    .expect("blocks snapshot");

    let txs: Vec<String> = sqlx::query_scalar(
        r#"SELECT network || '|' || hash || '|' || height || '|' || status || '|' || fee || '|'
                  || message_count || '|' || IFNULL(primary_message_type, '-') || '|' || memo
                  || '|' || timestamp || '|' || messages
           FROM transactions ORDER BY network, hash"#,
    )
    .fetch_all(pool)
    .await
    .expect("transactions snapshot");

    rows.extend(txs);
    rows
}
