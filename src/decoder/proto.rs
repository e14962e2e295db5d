//! Protobuf schemas for the tx envelope and the message types the indexer
//! decodes. Field tags follow the upstream cosmos-sdk, ibc-go, wasmd and
//! babylon proto definitions.
#![allow(clippy::derive_partial_eq_without_eq)]

// cosmos.tx.v1beta1 ---------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxBody {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthInfo {
    #[prost(message, repeated, tag = "1")]
    pub signer_infos: Vec<SignerInfo>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Fee>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignerInfo {
    #[prost(message, optional, tag = "1")]
    pub public_key: Option<Any>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Fee {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<Coin>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

/// google.protobuf.Any
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

/// cosmos.crypto.secp256k1.PubKey / ed25519.PubKey share this layout.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PubKey {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

// cosmos.bank.v1beta1 -------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgSend {
    #[prost(string, tag = "1")]
    pub from_address: String,
    #[prost(string, tag = "2")]
    pub to_address: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BankIo {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(message, repeated, tag = "2")]
    pub coins: Vec<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgMultiSend {
    #[prost(message, repeated, tag = "1")]
    pub inputs: Vec<BankIo>,
    #[prost(message, repeated, tag = "2")]
    pub outputs: Vec<BankIo>,
}

// cosmos.staking.v1beta1 ----------------------------------------------------

/// Shared by MsgDelegate and MsgUndelegate.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgDelegate {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_address: String,
    #[prost(message, optional, tag = "3")]
    pub amount: Option<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgBeginRedelegate {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_src_address: String,
    #[prost(string, tag = "3")]
    pub validator_dst_address: String,
    #[prost(message, optional, tag = "4")]
    pub amount: Option<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgEditValidator {
    #[prost(message, optional, tag = "1")]
    pub description: Option<Description>,
    #[prost(string, tag = "2")]
    pub validator_address: String,
    #[prost(string, tag = "3")]
    pub commission_rate: String,
    #[prost(string, tag = "4")]
    pub min_self_delegation: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Description {
    #[prost(string, tag = "1")]
    pub moniker: String,
    #[prost(string, tag = "2")]
    pub identity: String,
    #[prost(string, tag = "3")]
    pub website: String,
    #[prost(string, tag = "4")]
    pub security_contact: String,
    #[prost(string, tag = "5")]
    pub details: String,
}

// babylon.epoching.v1 -------------------------------------------------------

/// Shared by MsgWrappedDelegate and MsgWrappedUndelegate.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgWrappedDelegate {
    #[prost(message, optional, tag = "1")]
    pub msg: Option<MsgDelegate>,
}

// cosmos.distribution.v1beta1 ----------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgWithdrawDelegatorReward {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgWithdrawValidatorCommission {
    #[prost(string, tag = "1")]
    pub validator_address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgSetWithdrawAddress {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub withdraw_address: String,
}

// cosmos.slashing / cosmos.authz -------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgUnjail {
    #[prost(string, tag = "1")]
    pub validator_addr: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgExec {
    #[prost(string, tag = "1")]
    pub grantee: String,
    #[prost(message, repeated, tag = "2")]
    pub msgs: Vec<Any>,
}

// cosmos.gov ----------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgVote {
    #[prost(uint64, tag = "1")]
    pub proposal_id: u64,
    #[prost(string, tag = "2")]
    pub voter: String,
    #[prost(int32, tag = "3")]
    pub option: i32,
    #[prost(string, tag = "4")]
    pub metadata: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgDeposit {
    #[prost(uint64, tag = "1")]
    pub proposal_id: u64,
    #[prost(string, tag = "2")]
    pub depositor: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgSubmitProposal {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(message, repeated, tag = "2")]
    pub initial_deposit: Vec<Coin>,
    #[prost(string, tag = "3")]
    pub proposer: String,
    #[prost(string, tag = "4")]
    pub metadata: String,
    #[prost(string, tag = "5")]
    pub title: String,
    #[prost(string, tag = "6")]
    pub summary: String,
    #[prost(bool, tag = "7")]
    pub expedited: bool,
}

// cosmwasm.wasm.v1 ----------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgExecuteContract {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(string, tag = "2")]
    pub contract: String,
    #[prost(bytes = "vec", tag = "3")]
    pub msg: Vec<u8>,
    #[prost(message, repeated, tag = "5")]
    pub funds: Vec<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgInstantiateContract {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(string, tag = "2")]
    pub admin: String,
    #[prost(uint64, tag = "3")]
    pub code_id: u64,
    #[prost(string, tag = "4")]
    pub label: String,
    #[prost(bytes = "vec", tag = "5")]
    pub msg: Vec<u8>,
    #[prost(message, repeated, tag = "6")]
    pub funds: Vec<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgInstantiateContract2 {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(string, tag = "2")]
    pub admin: String,
    #[prost(uint64, tag = "3")]
    pub code_id: u64,
    #[prost(string, tag = "4")]
    pub label: String,
    #[prost(bytes = "vec", tag = "5")]
    pub msg: Vec<u8>,
    #[prost(message, repeated, tag = "6")]
    pub funds: Vec<Coin>,
    #[prost(bytes = "vec", tag = "7")]
    pub salt: Vec<u8>,
    #[prost(bool, tag = "8")]
    pub fix_msg: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgMigrateContract {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(string, tag = "2")]
    pub contract: String,
    #[prost(uint64, tag = "3")]
    pub code_id: u64,
    #[prost(bytes = "vec", tag = "4")]
    pub msg: Vec<u8>,
}

// ibc -----------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Height {
    #[prost(uint64, tag = "1")]
    pub revision_number: u64,
    #[prost(uint64, tag = "2")]
    pub revision_height: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgTransfer {
    #[prost(string, tag = "1")]
    pub source_port: String,
    #[prost(string, tag = "2")]
    pub source_channel: String,
    #[prost(message, optional, tag = "3")]
    pub token: Option<Coin>,
    #[prost(string, tag = "4")]
    pub sender: String,
    #[prost(string, tag = "5")]
    pub receiver: String,
    #[prost(message, optional, tag = "6")]
    pub timeout_height: Option<Height>,
    #[prost(uint64, tag = "7")]
    pub timeout_timestamp: u64,
    #[prost(string, tag = "8")]
    pub memo: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Packet {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(string, tag = "2")]
    pub source_port: String,
    #[prost(string, tag = "3")]
    pub source_channel: String,
    #[prost(string, tag = "4")]
    pub destination_port: String,
    #[prost(string, tag = "5")]
    pub destination_channel: String,
    #[prost(bytes = "vec", tag = "6")]
    pub data: Vec<u8>,
    #[prost(message, optional, tag = "7")]
    pub timeout_height: Option<Height>,
    #[prost(uint64, tag = "8")]
    pub timeout_timestamp: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgRecvPacket {
    #[prost(message, optional, tag = "1")]
    pub packet: Option<Packet>,
    #[prost(bytes = "vec", tag = "2")]
    pub proof_commitment: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub proof_height: Option<Height>,
    #[prost(string, tag = "4")]
    pub signer: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgAcknowledgement {
    #[prost(message, optional, tag = "1")]
    pub packet: Option<Packet>,
    #[prost(bytes = "vec", tag = "2")]
    pub acknowledgement: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub proof_acked: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub proof_height: Option<Height>,
    #[prost(string, tag = "5")]
    pub signer: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgTimeout {
    #[prost(message, optional, tag = "1")]
    pub packet: Option<Packet>,
    #[prost(bytes = "vec", tag = "2")]
    pub proof_unreceived: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub proof_height: Option<Height>,
    #[prost(uint64, tag = "4")]
    pub next_sequence_recv: u64,
    #[prost(string, tag = "5")]
    pub signer: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgUpdateClient {
    #[prost(string, tag = "1")]
    pub client_id: String,
    #[prost(message, optional, tag = "2")]
    pub client_message: Option<Any>,
    #[prost(string, tag = "3")]
    pub signer: String,
}

// babylon.btcstaking.v1 -----------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProofOfPossessionBtc {
    #[prost(int32, tag = "1")]
    pub btc_sig_type: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub btc_sig: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InclusionProof {
    #[prost(message, optional, tag = "1")]
    pub key: Option<TransactionKey>,
    #[prost(bytes = "vec", tag = "2")]
    pub proof: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionKey {
    #[prost(uint32, tag = "1")]
    pub index: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgCreateBtcDelegation {
    #[prost(string, tag = "1")]
    pub staker_addr: String,
    #[prost(message, optional, tag = "2")]
    pub pop: Option<ProofOfPossessionBtc>,
    #[prost(bytes = "vec", tag = "3")]
    pub btc_pk: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub fp_btc_pk_list: Vec<Vec<u8>>,
    #[prost(uint32, tag = "5")]
    pub staking_time: u32,
    #[prost(int64, tag = "6")]
    pub staking_value: i64,
    #[prost(bytes = "vec", tag = "7")]
    pub staking_tx: Vec<u8>,
    #[prost(message, optional, tag = "8")]
    pub staking_tx_inclusion_proof: Option<InclusionProof>,
    #[prost(bytes = "vec", tag = "9")]
    pub slashing_tx: Vec<u8>,
    #[prost(bytes = "vec", tag = "10")]
    pub delegator_slashing_sig: Vec<u8>,
    #[prost(uint32, tag = "11")]
    pub unbonding_time: u32,
    #[prost(bytes = "vec", tag = "12")]
    pub unbonding_tx: Vec<u8>,
    #[prost(int64, tag = "13")]
    pub unbonding_value: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgAddCovenantSigs {
    #[prost(string, tag = "1")]
    pub signer: String,
    #[prost(bytes = "vec", tag = "2")]
    pub pk: Vec<u8>,
    #[prost(string, tag = "3")]
    pub staking_tx_hash: String,
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub slashing_tx_sigs: Vec<Vec<u8>>,
    #[prost(bytes = "vec", tag = "5")]
    pub unbonding_tx_sig: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "6")]
    pub slashing_unbonding_tx_sigs: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgBtcUndelegate {
    #[prost(string, tag = "1")]
    pub signer: String,
    #[prost(string, tag = "2")]
    pub staking_tx_hash: String,
    #[prost(bytes = "vec", tag = "3")]
    pub stake_spending_tx: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub stake_spending_tx_inclusion_proof: Option<InclusionProof>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgCreateFinalityProvider {
    #[prost(string, tag = "1")]
    pub addr: String,
    #[prost(message, optional, tag = "2")]
    pub description: Option<Description>,
    #[prost(string, tag = "3")]
    pub commission: String,
    #[prost(bytes = "vec", tag = "4")]
    pub btc_pk: Vec<u8>,
    #[prost(message, optional, tag = "5")]
    pub pop: Option<ProofOfPossessionBtc>,
}

// babylon.finality.v1 -------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgAddFinalitySig {
    #[prost(string, tag = "1")]
    pub signer: String,
    #[prost(bytes = "vec", tag = "2")]
    pub fp_btc_pk: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub block_height: u64,
    #[prost(bytes = "vec", tag = "4")]
    pub pub_rand: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub block_app_hash: Vec<u8>,
    #[prost(bytes = "vec", tag = "7")]
    pub finality_sig: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgCommitPubRandList {
    #[prost(string, tag = "1")]
    pub signer: String,
    #[prost(bytes = "vec", tag = "2")]
    pub fp_btc_pk: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub start_height: u64,
    #[prost(uint64, tag = "4")]
    pub num_pub_rand: u64,
    #[prost(bytes = "vec", tag = "5")]
    pub commitment: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub sig: Vec<u8>,
}

// babylon.btclightclient.v1 / btccheckpoint.v1 ------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgInsertHeaders {
    #[prost(string, tag = "1")]
    pub signer: String,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub headers: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BtcSpvProof {
    #[prost(bytes = "vec", tag = "1")]
    pub btc_transaction: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub btc_transaction_index: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub merkle_nodes: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub confirming_btc_header: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgInsertBtcSpvProof {
    #[prost(string, tag = "1")]
    pub submitter: String,
    #[prost(message, repeated, tag = "2")]
    pub proofs: Vec<BtcSpvProof>,
}
