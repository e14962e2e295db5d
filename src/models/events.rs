//! Domain events extracted from transaction results and fed to the trackers.

use super::{CovenantKey, DelegationState, PacketKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketEventKind {
    Send,
    Receive,
    Acknowledge,
    Timeout,
}

impl PacketEventKind {
    /// Event type string emitted by the IBC core channel module.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "send_packet" => Some(PacketEventKind::Send),
            "recv_packet" => Some(PacketEventKind::Receive),
            "acknowledge_packet" => Some(PacketEventKind::Acknowledge),
            "timeout_packet" => Some(PacketEventKind::Timeout),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketEvent {
    pub kind: PacketEventKind,
    pub key: PacketKey,
    pub destination_port: String,
    pub destination_channel: String,
    pub tx_hash: String,
    pub height: i64,
    pub timestamp: i64,
    pub relayer: Option<String>,
    /// Raw packet data as emitted in the event attributes.
    pub data: Option<String>,
}

impl PacketEvent {
    /// Port and channel on this chain's side of the packet.
    pub fn local_end(&self) -> (&str, &str) {
        match self.kind {
            PacketEventKind::Receive => (&self.destination_port, &self.destination_channel),
            _ => (&self.key.source_port, &self.key.source_channel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CovenantEventKind {
    Created,
    SignatureReceived { member_pk: String, signature: String },
    StateTransition { state: DelegationState },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovenantEvent {
    pub key: CovenantKey,
    pub height: i64,
    pub kind: CovenantEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainEvent {
    Packet(PacketEvent),
    Covenant(CovenantEvent),
}

impl DomainEvent {
    pub fn height(&self) -> i64 {
        match self {
            DomainEvent::Packet(e) => e.height,
            DomainEvent::Covenant(e) => e.height,
        }
    }

    /// True for the terminal transition that closes a covenant set. Those
    /// are applied only once every earlier height has been applied.
    pub fn closes_covenant_set(&self) -> bool {
        match self {
            DomainEvent::Covenant(CovenantEvent {
                key,
                kind: CovenantEventKind::StateTransition { state },
                ..
            }) => *state == key.tx_type.terminal_state(),
            _ => false,
        }
    }
}

/// An event persisted in the outbox, handed to the dispatcher with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEvent {
    pub id: i64,
    pub event: DomainEvent,
}
