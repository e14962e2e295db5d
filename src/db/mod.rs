pub mod block;
pub mod connection;
pub mod covenant;
pub mod migration;
pub mod outbox;
pub mod packet;
pub mod transaction;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub const INIT_SCHEMA: &str = r#"
-- One row per (network, height)
CREATE TABLE IF NOT EXISTS blocks (
    network TEXT NOT NULL,
    height INTEGER NOT NULL,
    hash TEXT NOT NULL,
    proposer TEXT,
    proposer_address TEXT NOT NULL,
    tx_count INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    signatures TEXT NOT NULL,
    app_hash TEXT NOT NULL,
    gas_wanted INTEGER NOT NULL,
    gas_used INTEGER NOT NULL,
    PRIMARY KEY (network, height)
);

CREATE TABLE IF NOT EXISTS transactions (
    network TEXT NOT NULL,
    hash TEXT NOT NULL,
    height INTEGER NOT NULL,
    status TEXT NOT NULL,
    fee TEXT NOT NULL,
    message_count INTEGER NOT NULL,
    primary_message_type TEXT,
    memo TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    messages TEXT NOT NULL,
    PRIMARY KEY (network, hash)
);

CREATE TABLE IF NOT EXISTS packets (
    network TEXT NOT NULL,
    source_port TEXT NOT NULL,
    source_channel TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    destination_port TEXT,
    destination_channel TEXT,
    counterparty_chain_id TEXT NOT NULL,
    status TEXT NOT NULL,
    sent TEXT,
    received TEXT,
    acknowledged TEXT,
    timed_out TEXT,
    completion_time_ms INTEGER,
    transfer TEXT,
    PRIMARY KEY (network, source_port, source_channel, sequence)
);

CREATE TABLE IF NOT EXISTS covenant_sets (
    network TEXT NOT NULL,
    staking_tx_id TEXT NOT NULL,
    tx_type TEXT NOT NULL,
    signed_count INTEGER NOT NULL DEFAULT 0,
    missed_count INTEGER NOT NULL DEFAULT 0,
    total INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (network, staking_tx_id, tx_type)
);

CREATE TABLE IF NOT EXISTS covenant_slots (
    network TEXT NOT NULL,
    staking_tx_id TEXT NOT NULL,
    tx_type TEXT NOT NULL,
    member_pk TEXT NOT NULL,
    signature TEXT,
    state TEXT NOT NULL,
    height INTEGER,
    PRIMARY KEY (network, staking_tx_id, tx_type, member_pk),
    FOREIGN KEY (network, staking_tx_id, tx_type)
        REFERENCES covenant_sets(network, staking_tx_id, tx_type)
);

-- Tracker events written with their block, deleted once applied
CREATE TABLE IF NOT EXISTS event_outbox (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    network TEXT NOT NULL,
    height INTEGER NOT NULL,
    tx_hash TEXT NOT NULL,
    position INTEGER NOT NULL,
    closing INTEGER NOT NULL DEFAULT 0,
    payload TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    UNIQUE (network, tx_hash, position)
);

CREATE INDEX IF NOT EXISTS idx_event_outbox_height ON event_outbox(network, height);
CREATE INDEX IF NOT EXISTS idx_transactions_height ON transactions(network, height);
CREATE INDEX IF NOT EXISTS idx_packets_status ON packets(network, status);
CREATE INDEX IF NOT EXISTS idx_covenant_slots_member ON covenant_slots(network, member_pk, state);
"#;

/// Structured columns are stored as JSON text.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

pub(crate) fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(text).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn parse_column<T>(value: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|v: String| sqlx::Error::Decode(format!("unexpected value {}", v).into()))
}
