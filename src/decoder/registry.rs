//! Static dispatch tables from type url to decode function.

use super::message::decode_nested;
use super::normalize::{hex, hex_list, normalize_json, wide, wide_signed};
use super::proto::*;
use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    BankSend,
    BankMultiSend,
    StakingDelegate,
    StakingUndelegate,
    StakingRedelegate,
    WrappedDelegate,
    WrappedUndelegate,
    WithdrawReward,
    GovVote,
    GovDeposit,
    GovSubmitProposal,
    ContractExecute,
    ContractInstantiate,
    ContractMigrate,
    IbcTransfer,
    IbcRecvPacket,
    IbcAcknowledgement,
    IbcTimeout,
    IbcUpdateClient,
    BtcDelegationCreate,
    CovenantSignatures,
    BtcUndelegate,
    FinalityProviderCreate,
    FinalityVote,
    PubRandCommit,
    BtcHeaders,
    BtcSpvProof,
    /// Base-chain message resolved through the namespace registry.
    Generic,
    Unknown,
}

pub struct Decoded {
    pub content: Value,
    pub inline: Option<Value>,
}

impl From<Value> for Decoded {
    fn from(content: Value) -> Self {
        Self { content, inline: None }
    }
}

pub type DecodeFn = fn(&[u8]) -> Result<Decoded, prost::DecodeError>;

/// Decoder for messages that wrap further `Any` values; receives the
/// nesting depth of those inner values.
pub type NestedDecodeFn = fn(&[u8], usize) -> Result<Decoded, prost::DecodeError>;

#[derive(Clone, Copy)]
pub enum Decoder {
    Flat(DecodeFn),
    Nested(NestedDecodeFn),
}

pub struct MessageSpec {
    pub type_url: &'static str,
    pub kind: MessageKind,
    pub decode: Decoder,
}

const fn spec(type_url: &'static str, kind: MessageKind, decode: DecodeFn) -> MessageSpec {
    MessageSpec { type_url, kind, decode: Decoder::Flat(decode) }
}

const fn nested(type_url: &'static str, kind: MessageKind, decode: NestedDecodeFn) -> MessageSpec {
    MessageSpec { type_url, kind, decode: Decoder::Nested(decode) }
}

pub static KNOWN_MESSAGES: &[MessageSpec] = &[
    spec("/cosmos.bank.v1beta1.MsgSend", MessageKind::BankSend, bank_send),
    spec("/cosmos.bank.v1beta1.MsgMultiSend", MessageKind::BankMultiSend, bank_multi_send),
    spec("/cosmos.staking.v1beta1.MsgDelegate", MessageKind::StakingDelegate, delegate),
    spec("/cosmos.staking.v1beta1.MsgUndelegate", MessageKind::StakingUndelegate, delegate),
    spec("/cosmos.staking.v1beta1.MsgBeginRedelegate", MessageKind::StakingRedelegate, redelegate),
    spec("/babylon.epoching.v1.MsgWrappedDelegate", MessageKind::WrappedDelegate, wrapped_delegate),
    spec("/babylon.epoching.v1.MsgWrappedUndelegate", MessageKind::WrappedUndelegate, wrapped_delegate),
    spec("/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward", MessageKind::WithdrawReward, withdraw_reward),
    spec("/cosmos.gov.v1beta1.MsgVote", MessageKind::GovVote, gov_vote),
    spec("/cosmos.gov.v1.MsgVote", MessageKind::GovVote, gov_vote),
    spec("/cosmos.gov.v1.MsgDeposit", MessageKind::GovDeposit, gov_deposit),
    nested("/cosmos.gov.v1.MsgSubmitProposal", MessageKind::GovSubmitProposal, gov_submit_proposal),
    spec("/cosmwasm.wasm.v1.MsgExecuteContract", MessageKind::ContractExecute, contract_execute),
    spec("/cosmwasm.wasm.v1.MsgInstantiateContract", MessageKind::ContractInstantiate, contract_instantiate),
    spec("/cosmwasm.wasm.v1.MsgInstantiateContract2", MessageKind::ContractInstantiate, contract_instantiate2),
    spec("/cosmwasm.wasm.v1.MsgMigrateContract", MessageKind::ContractMigrate, contract_migrate),
    spec("/ibc.applications.transfer.v1.MsgTransfer", MessageKind::IbcTransfer, ibc_transfer),
    spec("/ibc.core.channel.v1.MsgRecvPacket", MessageKind::IbcRecvPacket, ibc_recv_packet),
    spec("/ibc.core.channel.v1.MsgAcknowledgement", MessageKind::IbcAcknowledgement, ibc_acknowledgement),
    spec("/ibc.core.channel.v1.MsgTimeout", MessageKind::IbcTimeout, ibc_timeout),
    spec("/ibc.core.client.v1.MsgUpdateClient", MessageKind::IbcUpdateClient, ibc_update_client),
    spec("/babylon.btcstaking.v1.MsgCreateBTCDelegation", MessageKind::BtcDelegationCreate, create_btc_delegation),
    spec("/babylon.btcstaking.v1.MsgAddCovenantSigs", MessageKind::CovenantSignatures, add_covenant_sigs),
    spec("/babylon.btcstaking.v1.MsgBTCUndelegate", MessageKind::BtcUndelegate, btc_undelegate),
    spec("/babylon.btcstaking.v1.MsgCreateFinalityProvider", MessageKind::FinalityProviderCreate, create_finality_provider),
    spec("/babylon.finality.v1.MsgAddFinalitySig", MessageKind::FinalityVote, add_finality_sig),
    spec("/babylon.finality.v1.MsgCommitPubRandList", MessageKind::PubRandCommit, commit_pub_rand),
    spec("/babylon.btclightclient.v1.MsgInsertHeaders", MessageKind::BtcHeaders, insert_headers),
    spec("/babylon.btccheckpoint.v1.MsgInsertBTCSpvProof", MessageKind::BtcSpvProof, insert_spv_proof),
];

/// Base-chain messages outside the typed table, keyed by namespace path.
pub static COSMOS_NAMESPACE: &[MessageSpec] = &[
    spec("/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission", MessageKind::Generic, withdraw_commission),
    spec("/cosmos.distribution.v1beta1.MsgSetWithdrawAddress", MessageKind::Generic, set_withdraw_address),
    spec("/cosmos.slashing.v1beta1.MsgUnjail", MessageKind::Generic, unjail),
    spec("/cosmos.staking.v1beta1.MsgEditValidator", MessageKind::Generic, edit_validator),
    nested("/cosmos.authz.v1beta1.MsgExec", MessageKind::Generic, authz_exec),
];

const COSMOS_PREFIX: &str = "/cosmos.";

pub fn lookup_known(type_url: &str) -> Option<&'static MessageSpec> {
    KNOWN_MESSAGES.iter().find(|s| s.type_url == type_url)
}

pub fn lookup_namespace(type_url: &str) -> Option<&'static MessageSpec> {
    if !type_url.starts_with(COSMOS_PREFIX) {
        return None;
    }
    COSMOS_NAMESPACE.iter().find(|s| s.type_url == type_url)
}

fn coin(c: &Coin) -> Value {
    json!({ "denom": c.denom, "amount": c.amount })
}

fn coins(list: &[Coin]) -> Value {
    Value::Array(list.iter().map(coin).collect())
}

fn opt_coin(c: &Option<Coin>) -> Value {
    c.as_ref().map(coin).unwrap_or(Value::Null)
}

fn height(h: &Option<Height>) -> Value {
    match h {
        Some(h) => json!({
            "revision_number": wide(h.revision_number),
            "revision_height": wide(h.revision_height),
        }),
        None => Value::Null,
    }
}

fn packet(p: &Option<Packet>) -> Value {
    match p {
        Some(p) => json!({
            "sequence": wide(p.sequence),
            "source_port": p.source_port,
            "source_channel": p.source_channel,
            "destination_port": p.destination_port,
            "destination_channel": p.destination_channel,
            "data": hex(&p.data),
            "timeout_height": height(&p.timeout_height),
            "timeout_timestamp": wide(p.timeout_timestamp),
        }),
        None => Value::Null,
    }
}

fn description(d: &Option<Description>) -> Value {
    match d {
        Some(d) => json!({
            "moniker": d.moniker,
            "identity": d.identity,
            "website": d.website,
            "security_contact": d.security_contact,
            "details": d.details,
        }),
        None => Value::Null,
    }
}

fn pop(p: &Option<ProofOfPossessionBtc>) -> Value {
    match p {
        Some(p) => json!({ "btc_sig_type": p.btc_sig_type, "btc_sig": hex(&p.btc_sig) }),
        None => Value::Null,
    }
}

fn inclusion_proof(p: &Option<InclusionProof>) -> Value {
    match p {
        Some(p) => json!({
            "key": p.key.as_ref().map(|k| json!({ "index": k.index, "hash": hex(&k.hash) })),
            "proof": hex(&p.proof),
        }),
        None => Value::Null,
    }
}

fn any_list(list: &[Any], depth: usize) -> Value {
    Value::Array(
        list.iter()
            .map(|a| decode_nested(a, depth).into_json())
            .collect(),
    )
}

fn inline_json(bytes: &[u8]) -> Option<Value> {
    serde_json::from_slice::<Value>(bytes).ok().map(normalize_json)
}

fn bank_send(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgSend::decode(bytes)?;
    Ok(json!({
        "from_address": m.from_address,
        "to_address": m.to_address,
        "amount": coins(&m.amount),
    })
    .into())
}

fn bank_multi_send(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgMultiSend::decode(bytes)?;
    let io = |list: &[BankIo]| {
        Value::Array(
            list.iter()
                .map(|x| json!({ "address": x.address, "coins": coins(&x.coins) }))
                .collect(),
        )
    };
    Ok(json!({ "inputs": io(&m.inputs), "outputs": io(&m.outputs) }).into())
}

fn delegate_content(m: &MsgDelegate) -> Value {
    json!({
        "delegator_address": m.delegator_address,
        "validator_address": m.validator_address,
        "amount": opt_coin(&m.amount),
    })
}

fn delegate(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgDelegate::decode(bytes)?;
    Ok(delegate_content(&m).into())
}

fn redelegate(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgBeginRedelegate::decode(bytes)?;
    Ok(json!({
        "delegator_address": m.delegator_address,
        "validator_src_address": m.validator_src_address,
        "validator_dst_address": m.validator_dst_address,
        "amount": opt_coin(&m.amount),
    })
    .into())
}

fn wrapped_delegate(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgWrappedDelegate::decode(bytes)?;
    let inner = m.msg.as_ref().map(delegate_content).unwrap_or(Value::Null);
    Ok(json!({ "msg": inner }).into())
}

fn withdraw_reward(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgWithdrawDelegatorReward::decode(bytes)?;
    Ok(json!({
        "delegator_address": m.delegator_address,
        "validator_address": m.validator_address,
    })
    .into())
}

fn gov_vote(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgVote::decode(bytes)?;
    let option = match m.option {
        1 => "VOTE_OPTION_YES",
        2 => "VOTE_OPTION_ABSTAIN",
        3 => "VOTE_OPTION_NO",
        4 => "VOTE_OPTION_NO_WITH_VETO",
        _ => "VOTE_OPTION_UNSPECIFIED",
    };
    Ok(json!({
        "proposal_id": wide(m.proposal_id),
        "voter": m.voter,
        "option": option,
        "metadata": m.metadata,
    })
    .into())
}

fn gov_deposit(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgDeposit::decode(bytes)?;
    Ok(json!({
        "proposal_id": wide(m.proposal_id),
        "depositor": m.depositor,
        "amount": coins(&m.amount),
    })
    .into())
}

fn gov_submit_proposal(bytes: &[u8], depth: usize) -> Result<Decoded, prost::DecodeError> {
    let m = MsgSubmitProposal::decode(bytes)?;
    Ok(json!({
        "messages": any_list(&m.messages, depth),
        "initial_deposit": coins(&m.initial_deposit),
        "proposer": m.proposer,
        "metadata": m.metadata,
        "title": m.title,
        "summary": m.summary,
        "expedited": m.expedited,
    })
    .into())
}

fn contract_execute(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgExecuteContract::decode(bytes)?;
    Ok(Decoded {
        content: json!({
            "sender": m.sender,
            "contract": m.contract,
            "msg": hex(&m.msg),
            "funds": coins(&m.funds),
        }),
        inline: inline_json(&m.msg),
    })
}

fn contract_instantiate(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgInstantiateContract::decode(bytes)?;
    Ok(Decoded {
        content: json!({
            "sender": m.sender,
            "admin": m.admin,
            "code_id": wide(m.code_id),
            "label": m.label,
            "msg": hex(&m.msg),
            "funds": coins(&m.funds),
        }),
        inline: inline_json(&m.msg),
    })
}

fn contract_instantiate2(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgInstantiateContract2::decode(bytes)?;
    Ok(Decoded {
        content: json!({
            "sender": m.sender,
            "admin": m.admin,
            "code_id": wide(m.code_id),
            "label": m.label,
            "msg": hex(&m.msg),
            "funds": coins(&m.funds),
            "salt": hex(&m.salt),
            "fix_msg": m.fix_msg,
        }),
        inline: inline_json(&m.msg),
    })
}

fn contract_migrate(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgMigrateContract::decode(bytes)?;
    Ok(Decoded {
        content: json!({
            "sender": m.sender,
            "contract": m.contract,
            "code_id": wide(m.code_id),
            "msg": hex(&m.msg),
        }),
        inline: inline_json(&m.msg),
    })
}

fn ibc_transfer(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgTransfer::decode(bytes)?;
    Ok(json!({
        "source_port": m.source_port,
        "source_channel": m.source_channel,
        "token": opt_coin(&m.token),
        "sender": m.sender,
        "receiver": m.receiver,
        "timeout_height": height(&m.timeout_height),
        "timeout_timestamp": wide(m.timeout_timestamp),
        "memo": m.memo,
    })
    .into())
}

fn ibc_recv_packet(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgRecvPacket::decode(bytes)?;
    Ok(json!({
        "packet": packet(&m.packet),
        "proof_commitment": hex(&m.proof_commitment),
        "proof_height": height(&m.proof_height),
        "signer": m.signer,
    })
    .into())
}

fn ibc_acknowledgement(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgAcknowledgement::decode(bytes)?;
    Ok(json!({
        "packet": packet(&m.packet),
        "acknowledgement": hex(&m.acknowledgement),
        "proof_acked": hex(&m.proof_acked),
        "proof_height": height(&m.proof_height),
        "signer": m.signer,
    })
    .into())
}

fn ibc_timeout(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgTimeout::decode(bytes)?;
    Ok(json!({
        "packet": packet(&m.packet),
        "proof_unreceived": hex(&m.proof_unreceived),
        "proof_height": height(&m.proof_height),
        "next_sequence_recv": wide(m.next_sequence_recv),
        "signer": m.signer,
    })
    .into())
}

fn ibc_update_client(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgUpdateClient::decode(bytes)?;
    // Header payloads are large and chain specific; keep only their type.
    let header_type = m.client_message.as_ref().map(|a| a.type_url.clone());
    Ok(json!({
        "client_id": m.client_id,
        "client_message_type": header_type,
        "signer": m.signer,
    })
    .into())
}

fn create_btc_delegation(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgCreateBtcDelegation::decode(bytes)?;
    Ok(json!({
        "staker_addr": m.staker_addr,
        "pop": pop(&m.pop),
        "btc_pk": hex(&m.btc_pk),
        "fp_btc_pk_list": hex_list(&m.fp_btc_pk_list),
        "staking_time": m.staking_time,
        "staking_value": wide_signed(m.staking_value),
        "staking_tx": hex(&m.staking_tx),
        "staking_tx_inclusion_proof": inclusion_proof(&m.staking_tx_inclusion_proof),
        "slashing_tx": hex(&m.slashing_tx),
        "delegator_slashing_sig": hex(&m.delegator_slashing_sig),
        "unbonding_time": m.unbonding_time,
        "unbonding_tx": hex(&m.unbonding_tx),
        "unbonding_value": wide_signed(m.unbonding_value),
    })
    .into())
}

fn add_covenant_sigs(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgAddCovenantSigs::decode(bytes)?;
    Ok(json!({
        "signer": m.signer,
        "pk": hex(&m.pk),
        "staking_tx_hash": m.staking_tx_hash,
        "slashing_tx_sigs": hex_list(&m.slashing_tx_sigs),
        "unbonding_tx_sig": hex(&m.unbonding_tx_sig),
        "slashing_unbonding_tx_sigs": hex_list(&m.slashing_unbonding_tx_sigs),
    })
    .into())
}

fn btc_undelegate(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgBtcUndelegate::decode(bytes)?;
    Ok(json!({
        "signer": m.signer,
        "staking_tx_hash": m.staking_tx_hash,
        "stake_spending_tx": hex(&m.stake_spending_tx),
        "stake_spending_tx_inclusion_proof": inclusion_proof(&m.stake_spending_tx_inclusion_proof),
    })
    .into())
}

fn create_finality_provider(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgCreateFinalityProvider::decode(bytes)?;
    Ok(json!({
        "addr": m.addr,
        "description": description(&m.description),
        "commission": m.commission,
        "btc_pk": hex(&m.btc_pk),
        "pop": pop(&m.pop),
    })
    .into())
}

fn add_finality_sig(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgAddFinalitySig::decode(bytes)?;
    Ok(json!({
        "signer": m.signer,
        "fp_btc_pk": hex(&m.fp_btc_pk),
        "block_height": wide(m.block_height),
        "pub_rand": hex(&m.pub_rand),
        "block_app_hash": hex(&m.block_app_hash),
        "finality_sig": hex(&m.finality_sig),
    })
    .into())
}

fn commit_pub_rand(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgCommitPubRandList::decode(bytes)?;
    Ok(json!({
        "signer": m.signer,
        "fp_btc_pk": hex(&m.fp_btc_pk),
        "start_height": wide(m.start_height),
        "num_pub_rand": wide(m.num_pub_rand),
        "commitment": hex(&m.commitment),
        "sig": hex(&m.sig),
    })
    .into())
}

fn insert_headers(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgInsertHeaders::decode(bytes)?;
    Ok(json!({ "signer": m.signer, "headers": hex_list(&m.headers) }).into())
}

fn insert_spv_proof(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgInsertBtcSpvProof::decode(bytes)?;
    let proofs: Vec<Value> = m
        .proofs
        .iter()
        .map(|p| {
            json!({
                "btc_transaction": hex(&p.btc_transaction),
                "btc_transaction_index": p.btc_transaction_index,
                "merkle_nodes": hex(&p.merkle_nodes),
                "confirming_btc_header": hex(&p.confirming_btc_header),
            })
        })
        .collect();
    Ok(json!({ "submitter": m.submitter, "proofs": proofs }).into())
}

fn withdraw_commission(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgWithdrawValidatorCommission::decode(bytes)?;
    Ok(json!({ "validator_address": m.validator_address }).into())
}

fn set_withdraw_address(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgSetWithdrawAddress::decode(bytes)?;
    Ok(json!({
        "delegator_address": m.delegator_address,
        "withdraw_address": m.withdraw_address,
    })
    .into())
}

fn unjail(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgUnjail::decode(bytes)?;
    Ok(json!({ "validator_addr": m.validator_addr }).into())
}

fn edit_validator(bytes: &[u8]) -> Result<Decoded, prost::DecodeError> {
    let m = MsgEditValidator::decode(bytes)?;
    Ok(json!({
        "description": description(&m.description),
        "validator_address": m.validator_address,
        "commission_rate": m.commission_rate,
        "min_self_delegation": m.min_self_delegation,
    })
    .into())
}

fn authz_exec(bytes: &[u8], depth: usize) -> Result<Decoded, prost::DecodeError> {
    let m = MsgExec::decode(bytes)?;
    Ok(json!({ "grantee": m.grantee, "msgs": any_list(&m.msgs, depth) }).into())
}
