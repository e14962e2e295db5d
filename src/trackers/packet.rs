use super::TrackerError;
use crate::db;
use crate::models::{
    PacketEvent, PacketEventKind, PacketRecord, PacketStatus, PacketTransition, TransferDetails,
    UNKNOWN_CHAIN_ID,
};
use crate::resolver::ChannelResolver;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Unchanged,
    Updated(PacketRecord),
}

/// ICS-20 `FungibleTokenPacketData`.
#[derive(Debug, Deserialize)]
struct FungibleTokenPacket {
    denom: String,
    #[serde(deserialize_with = "amount_string")]
    amount: String,
    sender: String,
    receiver: String,
}

fn amount_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("bad amount {}", other))),
    }
}

/// Transfer details when the packet data is a fungible token transfer.
pub fn parse_transfer(data: &str) -> Option<TransferDetails> {
    let packet: FungibleTokenPacket = serde_json::from_str(data).ok()?;
    Some(TransferDetails {
        denom: packet.denom,
        amount: packet.amount,
        sender: packet.sender,
        receiver: packet.receiver,
    })
}

fn status_of(kind: PacketEventKind) -> PacketStatus {
    match kind {
        PacketEventKind::Send => PacketStatus::Sent,
        PacketEventKind::Receive => PacketStatus::Received,
        PacketEventKind::Acknowledge => PacketStatus::Acknowledged,
        PacketEventKind::Timeout => PacketStatus::Timeout,
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Folds one event into the current record. Every field is written at most
/// once and the status only moves forward, so events may arrive in any
/// order and any number of times.
pub fn merge(current: Option<&PacketRecord>, event: &PacketEvent) -> MergeOutcome {
    let incoming = status_of(event.kind);
    let mut record = match current {
        Some(record) => record.clone(),
        None => PacketRecord {
            key: event.key.clone(),
            destination_port: None,
            destination_channel: None,
            counterparty_chain_id: UNKNOWN_CHAIN_ID.to_string(),
            status: incoming,
            sent: None,
            received: None,
            acknowledged: None,
            timed_out: None,
            completion_time_ms: None,
            transfer: None,
        },
    };

    let slot = match event.kind {
        PacketEventKind::Send => &mut record.sent,
        PacketEventKind::Receive => &mut record.received,
        PacketEventKind::Acknowledge => &mut record.acknowledged,
        PacketEventKind::Timeout => &mut record.timed_out,
    };
    if slot.is_none() {
        *slot = Some(PacketTransition {
            tx_hash: event.tx_hash.clone(),
            height: event.height,
            timestamp: event.timestamp,
            relayer: event.relayer.clone(),
        });
    }

    if record.destination_port.is_none() {
        record.destination_port = non_empty(&event.destination_port);
    }
    if record.destination_channel.is_none() {
        record.destination_channel = non_empty(&event.destination_channel);
    }
    if record.transfer.is_none() {
        record.transfer = event.data.as_deref().and_then(parse_transfer);
    }

    if record.status.is_terminal() && incoming.is_terminal() && record.status != incoming {
        warn!(
            "Packet {} already {}, ignoring conflicting {} in tx {}",
            record.key,
            record.status.as_str(),
            incoming.as_str(),
            event.tx_hash
        );
    } else if incoming.rank() > record.status.rank() {
        record.status = incoming;
    }

    if record.completion_time_ms.is_none() {
        if let (Some(sent), Some(ack)) = (&record.sent, &record.acknowledged) {
            record.completion_time_ms = Some(ack.timestamp - sent.timestamp);
        }
    }

    match current {
        Some(existing) if *existing == record => MergeOutcome::Unchanged,
        _ => MergeOutcome::Updated(record),
    }
}

pub struct PacketTracker {
    pool: SqlitePool,
    resolver: Arc<dyn ChannelResolver>,
}

impl PacketTracker {
    pub fn new(pool: SqlitePool, resolver: Arc<dyn ChannelResolver>) -> Self {
        Self { pool, resolver }
    }

    /// Applies an event and persists the record if anything changed.
    pub async fn on_packet_event(&self, event: &PacketEvent) -> Result<bool, TrackerError> {
        let current = db::packet::get_packet(&self.pool, &event.key).await?;

        let (mut record, mut changed) = match merge(current.as_ref(), event) {
            MergeOutcome::Updated(record) => (record, true),
            MergeOutcome::Unchanged => match current {
                Some(record) => (record, false),
                None => return Ok(false),
            },
        };

        if record.counterparty_chain_id == UNKNOWN_CHAIN_ID {
            let (port, channel) = event.local_end();
            match self.resolver.chain_id_for_channel(channel, port).await {
                Ok(Some(chain_id)) => {
                    record.counterparty_chain_id = chain_id;
                    changed = true;
                }
                Ok(None) => debug!("Counterparty of {}/{} not resolvable yet", port, channel),
                Err(e) => warn!("Failed to resolve counterparty of {}/{}: {}", port, channel, e),
            }
        }

        if changed {
            db::packet::upsert_packet(&self.pool, &record).await?;
            info!(
                "Packet {} is {} (counterparty {})",
                record.key,
                record.status.as_str(),
                record.counterparty_chain_id
            );
        }
        Ok(changed)
    }
}
