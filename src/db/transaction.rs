use crate::db::{from_json, parse_column, to_json};
use crate::models::{Network, TransactionRecord};
use sqlx::{Executor, Pool, Row, Sqlite};

/// Inserts a transaction keyed by hash. Returns false when it was already stored.
pub async fn upsert_transaction<'e, E>(
    executor: E,
    record: &TransactionRecord,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let fee = to_json(&record.fee)?;
    let messages = to_json(&record.messages)?;

    let result = sqlx::query(
        r#"
        INSERT INTO transactions
        (network, hash, height, status, fee, message_count, primary_message_type,
         memo, timestamp, messages)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(network, hash) DO NOTHING
        "#,
    )
    .bind(record.network.as_str())
    .bind(&record.hash)
    .bind(record.height)
    .bind(record.status.as_str())
    .bind(fee)
    .bind(record.message_count)
    .bind(&record.primary_message_type)
    .bind(&record.memo)
    .bind(record.timestamp)
    .bind(messages)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_transaction(
    pool: &Pool<Sqlite>,
    network: Network,
    hash: &str,
) -> Result<Option<TransactionRecord>, sqlx::Error> {
    // Use query instead of query! to avoid compile-time type checking
    let row = sqlx::query(
        r#"SELECT hash, height, status, fee, message_count, primary_message_type,
                  memo, timestamp, messages
           FROM transactions WHERE network = ? AND hash = ?"#,
    )
    .bind(network.as_str())
    .bind(hash.to_uppercase())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(TransactionRecord {
        network,
        hash: row.get("hash"),
        height: row.get("height"),
        status: parse_column(row.get::<&str, _>("status"))?,
        fee: from_json(row.get::<&str, _>("fee"))?,
        message_count: row.get("message_count"),
        primary_message_type: row.get("primary_message_type"),
        memo: row.get("memo"),
        timestamp: row.get("timestamp"),
        messages: from_json(row.get::<&str, _>("messages"))?,
    }))
}

pub async fn count_transactions_at(
    pool: &Pool<Sqlite>,
    network: Network,
    height: i64,
) -> Result<i64, sqlx::Error> {
    let count = sqlx::query("SELECT COUNT(*) FROM transactions WHERE network = ? AND height = ?")
        .bind(network.as_str())
        .bind(height)
        .fetch_one(pool)
        .await?
        .get::<i64, _>(0);

    Ok(count)
}
