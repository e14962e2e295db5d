// Block, transaction, packet and covenant records shared by the pipeline,
// the trackers and the db layer.

pub mod events;

use crate::decoder::DecodedMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use events::{
    CovenantEvent, CovenantEventKind, DomainEvent, OutboxEvent, PacketEvent, PacketEventKind,
};

/// Networks the indexer knows how to ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Testnet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// Prefix of the environment keys configuring this network.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Network::Mainnet => "BABYLON_MAINNET",
            Network::Testnet => "BABYLON_TESTNET",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureAttestation {
    pub validator: String,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub network: Network,
    pub height: i64,
    pub hash: String,
    /// Resolved validator id of the proposer, if the directory knows it.
    pub proposer: Option<String>,
    pub proposer_address: String,
    pub tx_count: i64,
    pub timestamp: i64,
    pub signatures: Vec<SignatureAttestation>,
    pub app_hash: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Success,
    Failed,
    Pending,
}

impl TxStatus {
    /// Absent or zero result code means the transaction succeeded.
    pub fn from_code(code: Option<u32>) -> Self {
        match code {
            None | Some(0) => TxStatus::Success,
            Some(_) => TxStatus::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Success => "SUCCESS",
            TxStatus::Failed => "FAILED",
            TxStatus::Pending => "PENDING",
        }
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(TxStatus::Success),
            "FAILED" => Ok(TxStatus::Failed),
            "PENDING" => Ok(TxStatus::Pending),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub network: Network,
    pub hash: String,
    pub height: i64,
    pub status: TxStatus,
    pub fee: Fee,
    pub message_count: i64,
    pub primary_message_type: Option<String>,
    pub memo: String,
    pub timestamp: i64,
    pub messages: Vec<DecodedMessage>,
}

/// Natural key of an IBC packet: the sending side's port/channel plus sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketKey {
    pub network: Network,
    pub source_port: String,
    pub source_channel: String,
    pub sequence: u64,
}

impl fmt::Display for PacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}",
            self.network, self.source_port, self.source_channel, self.sequence
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketStatus {
    Sent,
    Received,
    Acknowledged,
    Timeout,
}

impl PacketStatus {
    pub fn rank(&self) -> u8 {
        match self {
            PacketStatus::Sent => 0,
            PacketStatus::Received => 1,
            PacketStatus::Acknowledged | PacketStatus::Timeout => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PacketStatus::Acknowledged | PacketStatus::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PacketStatus::Sent => "SENT",
            PacketStatus::Received => "RECEIVED",
            PacketStatus::Acknowledged => "ACKNOWLEDGED",
            PacketStatus::Timeout => "TIMEOUT",
        }
    }
}

impl FromStr for PacketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SENT" => Ok(PacketStatus::Sent),
            "RECEIVED" => Ok(PacketStatus::Received),
            "ACKNOWLEDGED" => Ok(PacketStatus::Acknowledged),
            "TIMEOUT" => Ok(PacketStatus::Timeout),
            other => Err(other.to_string()),
        }
    }
}

/// One observed lifecycle step of a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketTransition {
    pub tx_hash: String,
    pub height: i64,
    pub timestamp: i64,
    pub relayer: Option<String>,
}

/// ICS-20 fungible token packet payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDetails {
    pub denom: String,
    pub amount: String,
    pub sender: String,
    pub receiver: String,
}

pub const UNKNOWN_CHAIN_ID: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub key: PacketKey,
    pub destination_port: Option<String>,
    pub destination_channel: Option<String>,
    pub counterparty_chain_id: String,
    pub status: PacketStatus,
    pub sent: Option<PacketTransition>,
    pub received: Option<PacketTransition>,
    pub acknowledged: Option<PacketTransition>,
    pub timed_out: Option<PacketTransition>,
    pub completion_time_ms: Option<i64>,
    pub transfer: Option<TransferDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CovenantTxType {
    Staking,
    Unbonding,
}

impl CovenantTxType {
    pub const ALL: [CovenantTxType; 2] = [CovenantTxType::Staking, CovenantTxType::Unbonding];

    /// Delegation state after which unsigned slots of this set count as missed.
    pub fn terminal_state(&self) -> DelegationState {
        match self {
            CovenantTxType::Staking => DelegationState::Active,
            CovenantTxType::Unbonding => DelegationState::Unbonded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CovenantTxType::Staking => "STAKING",
            CovenantTxType::Unbonding => "UNBONDING",
        }
    }
}

impl FromStr for CovenantTxType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STAKING" => Ok(CovenantTxType::Staking),
            "UNBONDING" => Ok(CovenantTxType::Unbonding),
            other => Err(other.to_string()),
        }
    }
}

/// BTC delegation states as reported by the btcstaking module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelegationState {
    Pending,
    Verified,
    Active,
    Unbonded,
    Expired,
    Slashed,
}

impl FromStr for DelegationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(DelegationState::Pending),
            "VERIFIED" => Ok(DelegationState::Verified),
            "ACTIVE" => Ok(DelegationState::Active),
            "UNBONDED" => Ok(DelegationState::Unbonded),
            "EXPIRED" => Ok(DelegationState::Expired),
            "SLASHED" => Ok(DelegationState::Slashed),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotState {
    Pending,
    Signed,
    Missed,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Pending => "PENDING",
            SlotState::Signed => "SIGNED",
            SlotState::Missed => "MISSED",
        }
    }
}

impl FromStr for SlotState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(SlotState::Pending),
            "SIGNED" => Ok(SlotState::Signed),
            "MISSED" => Ok(SlotState::Missed),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CovenantKey {
    pub network: Network,
    pub staking_tx_id: String,
    pub tx_type: CovenantTxType,
}

impl fmt::Display for CovenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.network, self.staking_tx_id, self.tx_type.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSlot {
    pub member_pk: String,
    pub signature: Option<String>,
    pub state: SlotState,
    pub height: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovenantSignatureSet {
    pub key: CovenantKey,
    pub slots: Vec<SignatureSlot>,
    pub signed_count: i64,
    pub missed_count: i64,
    pub total: i64,
}

/// Per-member participation across all tracked delegations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovenantMemberStats {
    pub member_pk: String,
    pub signed: i64,
    pub missed: i64,
    /// Percentage; 100 when the member never missed.
    pub rate: f64,
}

impl CovenantMemberStats {
    pub fn new(member_pk: String, signed: i64, missed: i64) -> Self {
        let rate = if missed == 0 {
            100.0
        } else {
            signed as f64 * 100.0 / (signed + missed) as f64
        };
        Self { member_pk, signed, missed, rate }
    }
}
