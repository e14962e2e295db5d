//! Domain events extracted from transaction result events.

use crate::blockchain::models::{RawTx, RpcEvent};
use crate::models::{
    CovenantEvent, CovenantEventKind, CovenantKey, CovenantTxType, DomainEvent,
    Network, PacketEvent, PacketEventKind, PacketKey,
};
use tracing::{debug, warn};

const BTCSTAKING_PREFIX: &str = "babylon.btcstaking.v1.";

/// Extracts packet and covenant events from one transaction. Failed
/// transactions carry no state changes and yield nothing.
pub fn extract_events(network: Network, tx: &RawTx, timestamp: i64) -> Vec<DomainEvent> {
    if tx.code.unwrap_or(0) != 0 {
        return Vec::new();
    }

    let relayer = tx
        .events
        .iter()
        .filter(|e| e.kind == "message")
        .find_map(|e| e.attr("sender"));

    let mut events = Vec::new();
    for event in &tx.events {
        if let Some(kind) = PacketEventKind::from_event_type(&event.kind) {
            if let Some(packet) = packet_event(network, kind, event, tx, timestamp, &relayer) {
                events.push(DomainEvent::Packet(packet));
            }
        } else if let Some(name) = event.kind.strip_prefix(BTCSTAKING_PREFIX) {
            events.extend(
                covenant_events(network, name, event, tx.height as i64)
                    .into_iter()
                    .map(DomainEvent::Covenant),
            );
        }
    }
    events
}

fn packet_event(
    network: Network,
    kind: PacketEventKind,
    event: &RpcEvent,
    tx: &RawTx,
    timestamp: i64,
    relayer: &Option<String>,
) -> Option<PacketEvent> {
    let sequence = match event.attr("packet_sequence").map(|s| s.parse::<u64>()) {
        Some(Ok(sequence)) => sequence,
        _ => {
            warn!("{} in tx {} has no usable packet_sequence", event.kind, tx.hash);
            return None;
        }
    };
    let (Some(source_port), Some(source_channel)) =
        (event.attr("packet_src_port"), event.attr("packet_src_channel"))
    else {
        warn!("{} in tx {} has no source channel", event.kind, tx.hash);
        return None;
    };

    Some(PacketEvent {
        kind,
        key: PacketKey {
            network,
            source_port,
            source_channel,
            sequence,
        },
        destination_port: event.attr("packet_dst_port").unwrap_or_default(),
        destination_channel: event.attr("packet_dst_channel").unwrap_or_default(),
        tx_hash: tx.hash.clone(),
        height: tx.height as i64,
        timestamp,
        relayer: relayer.clone(),
        data: event
            .attributes
            .iter()
            .find(|a| a.key == "packet_data")
            .and_then(|a| a.value.clone()),
    })
}

fn key(network: Network, staking_tx_id: &str, tx_type: CovenantTxType) -> CovenantKey {
    CovenantKey {
        network,
        staking_tx_id: staking_tx_id.to_ascii_lowercase(),
        tx_type,
    }
}

fn covenant_events(network: Network, name: &str, event: &RpcEvent, height: i64) -> Vec<CovenantEvent> {
    let Some(staking_tx_id) = event.attr("staking_tx_hash").filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    let for_both = |kind: CovenantEventKind| {
        CovenantTxType::ALL
            .iter()
            .map(|tx_type| CovenantEvent {
                key: key(network, &staking_tx_id, *tx_type),
                height,
                kind: kind.clone(),
            })
            .collect::<Vec<_>>()
    };

    match name {
        "EventBTCDelegationCreated" => for_both(CovenantEventKind::Created),
        "EventCovenantSignatureReceived" => {
            let (Some(member_pk), Some(signature)) = (
                event.attr("covenant_btc_pk_hex"),
                event.attr("covenant_unbonding_signature_hex"),
            ) else {
                warn!("Covenant signature event for {} is incomplete", staking_tx_id);
                return Vec::new();
            };
            for_both(CovenantEventKind::SignatureReceived {
                member_pk: member_pk.to_ascii_lowercase(),
                signature,
            })
        }
        "EventBTCDelegationStateUpdate"
        | "EventCovenantQuorumReached"
        | "EventBTCDelegationInclusionProofReceived"
        | "EventBTCDelgationUnbondedEarly"
        | "EventBTCDelegationExpired" => match event.attr("new_state").map(|s| s.parse()) {
            Some(Ok(state)) => for_both(CovenantEventKind::StateTransition { state }),
            Some(Err(other)) => {
                debug!("Unrecognized delegation state {} for {}", other, staking_tx_id);
                Vec::new()
            }
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}
