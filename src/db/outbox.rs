use crate::db::{from_json, to_json};
use crate::models::{DomainEvent, Network, OutboxEvent};
use sqlx::{Executor, Pool, Row, Sqlite};
use tracing::warn;

/// Queues an event in the caller's transaction. Returns the new row id, or
/// None when the same event of the same transaction is already queued.
pub async fn enqueue<'e, E>(
    executor: E,
    network: Network,
    height: i64,
    tx_hash: &str,
    position: i64,
    event: &DomainEvent,
) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"INSERT INTO event_outbox (network, height, tx_hash, position, closing, payload)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT(network, tx_hash, position) DO NOTHING
           RETURNING id"#,
    )
    .bind(network.as_str())
    .bind(height)
    .bind(tx_hash)
    .bind(position)
    .bind(event.closes_covenant_set())
    .bind(to_json(event)?)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|r| r.get("id")))
}

/// Every queued event of a network, lowest height first.
pub async fn pending(
    pool: &Pool<Sqlite>,
    network: Network,
) -> Result<Vec<OutboxEvent>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, payload FROM event_outbox WHERE network = ? ORDER BY height, id",
    )
    .bind(network.as_str())
    .fetch_all(pool)
    .await?;

    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get("id");
        match from_json::<DomainEvent>(row.get("payload")) {
            Ok(event) => events.push(OutboxEvent { id, event }),
            Err(e) => warn!("Skipping unreadable outbox row {}: {}", id, e),
        }
    }
    Ok(events)
}

pub async fn complete(pool: &Pool<Sqlite>, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM event_outbox WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn record_failure(pool: &Pool<Sqlite>, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE event_outbox SET attempts = attempts + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// True when every height from the lowest stored block up to `height` is
/// stored and no event at or below `height` is still queued, closing
/// transitions aside.
pub async fn settled_through(
    pool: &Pool<Sqlite>,
    network: Network,
    height: i64,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT
               (SELECT COUNT(*) FROM event_outbox
                WHERE network = ? AND height <= ? AND closing = 0) AS queued,
               (SELECT MIN(height) FROM blocks WHERE network = ?) AS lowest,
               (SELECT COUNT(*) FROM blocks WHERE network = ? AND height <= ?) AS stored"#,
    )
    .bind(network.as_str())
    .bind(height)
    .bind(network.as_str())
    .bind(network.as_str())
    .bind(height)
    .fetch_one(pool)
    .await?;

    let queued: i64 = row.get("queued");
    let lowest: Option<i64> = row.get("lowest");
    let stored: i64 = row.get("stored");
    Ok(queued == 0 && lowest.is_some_and(|lowest| stored == height - lowest + 1))
}

pub async fn count(pool: &Pool<Sqlite>, network: Network) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) FROM event_outbox WHERE network = ?")
        .bind(network.as_str())
        .fetch_one(pool)
        .await?;
    Ok(row.get(0))
}
