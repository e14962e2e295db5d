use crate::db::{from_json, parse_column, to_json};
use crate::models::{PacketKey, PacketRecord, PacketTransition, UNKNOWN_CHAIN_ID};
use sqlx::{Pool, Row, Sqlite};

fn opt_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>, sqlx::Error> {
    value.as_ref().map(to_json).transpose()
}

fn transition(text: Option<String>) -> Result<Option<PacketTransition>, sqlx::Error> {
    text.as_deref().map(from_json).transpose()
}

/// Writes a merged record. The update folds it into whatever is stored,
/// so a writer holding an older merge never moves a packet backwards:
/// observed transitions are kept, and status only rises in rank.
pub async fn upsert_packet(pool: &Pool<Sqlite>, record: &PacketRecord) -> Result<(), sqlx::Error> {
    let key = &record.key;

    sqlx::query(
        r#"
        INSERT INTO packets
        (network, source_port, source_channel, sequence, destination_port, destination_channel,
         counterparty_chain_id, status, sent, received, acknowledged, timed_out,
         completion_time_ms, transfer)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(network, source_port, source_channel, sequence) DO UPDATE SET
            destination_port = COALESCE(packets.destination_port, excluded.destination_port),
            destination_channel = COALESCE(packets.destination_channel, excluded.destination_channel),
            counterparty_chain_id = CASE WHEN packets.counterparty_chain_id = ?
                THEN excluded.counterparty_chain_id ELSE packets.counterparty_chain_id END,
            status = CASE
                WHEN (CASE excluded.status WHEN 'SENT' THEN 0 WHEN 'RECEIVED' THEN 1 ELSE 2 END)
                   > (CASE packets.status WHEN 'SENT' THEN 0 WHEN 'RECEIVED' THEN 1 ELSE 2 END)
                THEN excluded.status ELSE packets.status END,
            sent = COALESCE(packets.sent, excluded.sent),
            received = COALESCE(packets.received, excluded.received),
            acknowledged = COALESCE(packets.acknowledged, excluded.acknowledged),
            timed_out = COALESCE(packets.timed_out, excluded.timed_out),
            completion_time_ms = COALESCE(
                packets.completion_time_ms,
                excluded.completion_time_ms,
                json_extract(COALESCE(packets.acknowledged, excluded.acknowledged), '$.timestamp')
                    - json_extract(COALESCE(packets.sent, excluded.sent), '$.timestamp')
            ),
            transfer = COALESCE(packets.transfer, excluded.transfer)
        "#,
    )
    .bind(key.network.as_str())
    .bind(&key.source_port)
    .bind(&key.source_channel)
    .bind(key.sequence as i64)
    .bind(&record.destination_port)
    .bind(&record.destination_channel)
    .bind(&record.counterparty_chain_id)
    .bind(record.status.as_str())
    .bind(opt_json(&record.sent)?)
    .bind(opt_json(&record.received)?)
    .bind(opt_json(&record.acknowledged)?)
    .bind(opt_json(&record.timed_out)?)
    .bind(record.completion_time_ms)
    .bind(opt_json(&record.transfer)?)
    .bind(UNKNOWN_CHAIN_ID)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_packet(
    pool: &Pool<Sqlite>,
    key: &PacketKey,
) -> Result<Option<PacketRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT destination_port, destination_channel, counterparty_chain_id, status,
                  sent, received, acknowledged, timed_out, completion_time_ms, transfer
           FROM packets
           WHERE network = ? AND source_port = ? AND source_channel = ? AND sequence = ?"#,
    )
    .bind(key.network.as_str())
    .bind(&key.source_port)
    .bind(&key.source_channel)
    .bind(key.sequence as i64)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(PacketRecord {
        key: key.clone(),
        destination_port: row.get("destination_port"),
        destination_channel: row.get("destination_channel"),
        counterparty_chain_id: row.get("counterparty_chain_id"),
        status: parse_column(row.get::<&str, _>("status"))?,
        sent: transition(row.get("sent"))?,
        received: transition(row.get("received"))?,
        acknowledged: transition(row.get("acknowledged"))?,
        timed_out: transition(row.get("timed_out"))?,
        completion_time_ms: row.get("completion_time_ms"),
        transfer: row
            .get::<Option<String>, _>("transfer")
            .as_deref()
            .map(from_json)
            .transpose()?,
    }))
}
