use crate::db::{from_json, to_json};
use crate::models::{BlockRecord, Network};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Pool, Row, Sqlite};

const GAP_SCAN_WINDOW: i64 = 10_000;

/// Inserts a block. A row that already exists is left as it is, except
/// that an empty stored hash is replaced by a known one.
pub async fn upsert_block<'e, E>(executor: E, block: &BlockRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let signatures = to_json(&block.signatures)?;

    sqlx::query(
        r#"
        INSERT INTO blocks
        (network, height, hash, proposer, proposer_address, tx_count, timestamp,
         signatures, app_hash, gas_wanted, gas_used)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(network, height) DO UPDATE SET
            hash = CASE WHEN blocks.hash = '' THEN excluded.hash ELSE blocks.hash END
        "#,
    )
    .bind(block.network.as_str())
    .bind(block.height)
    .bind(&block.hash)
    .bind(&block.proposer)
    .bind(&block.proposer_address)
    .bind(block.tx_count)
    .bind(block.timestamp)
    .bind(signatures)
    .bind(&block.app_hash)
    .bind(block.gas_wanted)
    .bind(block.gas_used)
    .execute(executor)
    .await?;

    Ok(())
}

fn block_from_row(network: Network, row: &SqliteRow) -> Result<BlockRecord, sqlx::Error> {
    Ok(BlockRecord {
        network,
        height: row.get("height"),
        hash: row.get("hash"),
        proposer: row.get("proposer"),
        proposer_address: row.get("proposer_address"),
        tx_count: row.get("tx_count"),
        timestamp: row.get("timestamp"),
        signatures: from_json(row.get::<&str, _>("signatures"))?,
        app_hash: row.get("app_hash"),
        gas_wanted: row.get("gas_wanted"),
        gas_used: row.get("gas_used"),
    })
}

pub async fn get_block(
    pool: &Pool<Sqlite>,
    network: Network,
    height: i64,
) -> Result<Option<BlockRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT height, hash, proposer, proposer_address, tx_count, timestamp,
                  signatures, app_hash, gas_wanted, gas_used
           FROM blocks WHERE network = ? AND height = ?"#,
    )
    .bind(network.as_str())
    .bind(height)
    .fetch_optional(pool)
    .await?;

    row.map(|r| block_from_row(network, &r)).transpose()
}

pub async fn count_blocks(pool: &Pool<Sqlite>, network: Network) -> Result<i64, sqlx::Error> {
    let count = sqlx::query("SELECT COUNT(*) FROM blocks WHERE network = ?")
        .bind(network.as_str())
        .fetch_one(pool)
        .await?
        .get::<i64, _>(0);

    Ok(count)
}

/// Lowest and highest stored heights.
pub async fn height_bounds(
    pool: &Pool<Sqlite>,
    network: Network,
) -> Result<Option<(i64, i64)>, sqlx::Error> {
    let row = sqlx::query("SELECT MIN(height), MAX(height) FROM blocks WHERE network = ?")
        .bind(network.as_str())
        .fetch_one(pool)
        .await?;

    let min: Option<i64> = row.get(0);
    let max: Option<i64> = row.get(1);
    Ok(min.zip(max))
}

/// Heights in `[from, to]` with no stored block, lowest first, at most `limit`.
pub async fn missing_heights(
    pool: &Pool<Sqlite>,
    network: Network,
    from: i64,
    to: i64,
    limit: usize,
) -> Result<Vec<i64>, sqlx::Error> {
    let mut missing = Vec::new();
    let mut window_start = from;

    while window_start <= to && missing.len() < limit {
        let window_end = (window_start + GAP_SCAN_WINDOW - 1).min(to);
        let stored: Vec<i64> = sqlx::query(
            "SELECT height FROM blocks WHERE network = ? AND height BETWEEN ? AND ? ORDER BY height",
        )
        .bind(network.as_str())
        .bind(window_start)
        .bind(window_end)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|r| r.get::<i64, _>(0))
        .collect();

        if stored.len() as i64 != window_end - window_start + 1 {
            let mut stored = stored.into_iter().peekable();
            for height in window_start..=window_end {
                if stored.peek() == Some(&height) {
                    stored.next();
                } else {
                    missing.push(height);
                    if missing.len() == limit {
                        break;
                    }
                }
            }
        }
        window_start = window_end + 1;
    }

    Ok(missing)
}
