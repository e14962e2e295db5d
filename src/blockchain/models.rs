//! CometBFT RPC payloads and the normalized shapes the pipeline works on.

use crate::blockchain::client::ClientError;
use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts numbers sent either as JSON numbers or as decimal strings.
fn num<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("out of range: {}", n))),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!("expected number, got {}", other))),
    }
}

pub fn parse_time_ms(value: &str) -> Result<i64, ClientError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.timestamp_millis())
        .map_err(|e| ClientError::Malformed(format!("bad timestamp {}: {}", value, e)))
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusResult {
    pub sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
pub struct SyncInfo {
    #[serde(deserialize_with = "num")]
    pub latest_block_height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockId {
    #[serde(default)]
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    #[serde(deserialize_with = "num")]
    pub height: i64,
    pub time: String,
    #[serde(default)]
    pub proposer_address: String,
    #[serde(default)]
    pub app_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockData {
    #[serde(default)]
    pub txs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitSig {
    #[serde(default)]
    pub validator_address: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub signatures: Vec<CommitSig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub header: Header,
    #[serde(default)]
    pub data: BlockData,
    #[serde(default)]
    pub last_commit: Option<Commit>,
}

#[derive(Debug, Deserialize)]
pub struct BlockResult {
    pub block_id: BlockId,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RpcEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

impl RpcEvent {
    /// Attribute value with surrounding JSON quotes removed; typed module
    /// events encode their fields as JSON strings.
    pub fn attr(&self, key: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .and_then(|a| a.value.as_deref())
            .map(|v| v.trim_matches('"').to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxResult {
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default, deserialize_with = "num")]
    pub gas_wanted: i64,
    #[serde(default, deserialize_with = "num")]
    pub gas_used: i64,
    #[serde(default)]
    pub events: Vec<RpcEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcTx {
    pub hash: String,
    #[serde(deserialize_with = "num")]
    pub height: i64,
    #[serde(default)]
    pub index: u32,
    pub tx_result: TxResult,
    pub tx: String,
}

#[derive(Debug, Deserialize)]
pub struct TxSearchResult {
    #[serde(default)]
    pub txs: Vec<RpcTx>,
    #[serde(deserialize_with = "num")]
    pub total_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct BlockResultsResult {
    #[serde(default)]
    pub txs_results: Option<Vec<TxResult>>,
}

/// `value` of a `tendermint/event/NewBlock` websocket notification.
#[derive(Debug, Deserialize)]
pub struct NewBlockValue {
    pub block: Block,
    #[serde(default)]
    pub block_id: Option<BlockId>,
    #[serde(default)]
    pub result_finalize_block: Option<FinalizeBlockResult>,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeBlockResult {
    #[serde(default)]
    pub tx_results: Vec<TxResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GasTotals {
    pub wanted: i64,
    pub used: i64,
}

impl GasTotals {
    pub fn sum<'a>(results: impl IntoIterator<Item = &'a TxResult>) -> Self {
        results.into_iter().fold(Self::default(), |acc, r| Self {
            wanted: acc.wanted + r.gas_wanted,
            used: acc.used + r.gas_used,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommitSig {
    pub validator_address: String,
    pub timestamp: i64,
}

/// Block header data in the shape the processor consumes, from either the
/// `block` endpoint or a pushed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub height: u64,
    pub hash: Option<String>,
    pub timestamp: i64,
    pub proposer_address: String,
    pub app_hash: String,
    pub signatures: Vec<RawCommitSig>,
    /// Base64 tx bytes as carried in the block body.
    pub txs: Vec<String>,
    /// Gas totals already aggregated by the source, if it carried them.
    pub gas_totals: Option<GasTotals>,
}

impl RawBlock {
    pub fn from_rpc(block: Block, hash: Option<String>) -> Result<Self, ClientError> {
        let height = u64::try_from(block.header.height)
            .map_err(|_| ClientError::Malformed(format!("negative height {}", block.header.height)))?;
        let timestamp = parse_time_ms(&block.header.time)?;
        let signatures = block
            .last_commit
            .unwrap_or_default()
            .signatures
            .into_iter()
            // absent votes carry no address
            .filter(|s| !s.validator_address.is_empty())
            .map(|s| RawCommitSig {
                timestamp: s
                    .timestamp
                    .as_deref()
                    .and_then(|t| parse_time_ms(t).ok())
                    .unwrap_or(timestamp),
                validator_address: s.validator_address,
            })
            .collect();

        Ok(Self {
            height,
            hash: hash.filter(|h| !h.is_empty()),
            timestamp,
            proposer_address: block.header.proposer_address,
            app_hash: block.header.app_hash,
            signatures,
            txs: block.data.txs.unwrap_or_default(),
            gas_totals: None,
        })
    }

    pub fn from_notification(value: NewBlockValue) -> Result<Self, ClientError> {
        let hash = value.block_id.map(|id| id.hash);
        let gas = value
            .result_finalize_block
            .as_ref()
            .map(|r| GasTotals::sum(&r.tx_results));
        let mut raw = Self::from_rpc(value.block, hash)?;
        raw.gas_totals = gas;
        Ok(raw)
    }
}

/// One transaction with its execution result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTx {
    pub hash: String,
    pub height: u64,
    pub index: u32,
    pub code: Option<u32>,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub events: Vec<RpcEvent>,
    /// Base64 envelope bytes.
    pub tx: String,
}

impl From<RpcTx> for RawTx {
    fn from(t: RpcTx) -> Self {
        Self {
            hash: t.hash.to_uppercase(),
            height: t.height.max(0) as u64,
            index: t.index,
            code: t.tx_result.code,
            gas_wanted: t.tx_result.gas_wanted,
            gas_used: t.tx_result.gas_used,
            events: t.tx_result.events,
            tx: t.tx,
        }
    }
}
