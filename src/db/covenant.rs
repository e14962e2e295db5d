use crate::db::parse_column;
use crate::models::{
    CovenantKey, CovenantMemberStats, CovenantSignatureSet, Network, SignatureSlot, SlotState,
};
use sqlx::{Pool, Row, Sqlite, SqliteConnection};

/// What a signature write did to its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotUpdate {
    Signed,
    UnknownSet,
    UnknownMember,
    AlreadyFinal(SlotState),
}

/// Creates the set with one pending slot per member. Returns false when
/// the set already existed, in which case nothing is written.
pub async fn seed_set(
    pool: &Pool<Sqlite>,
    key: &CovenantKey,
    members: &[String],
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let created = sqlx::query(
        r#"INSERT INTO covenant_sets (network, staking_tx_id, tx_type, total)
           VALUES (?, ?, ?, ?)
           ON CONFLICT(network, staking_tx_id, tx_type) DO NOTHING"#,
    )
    .bind(key.network.as_str())
    .bind(&key.staking_tx_id)
    .bind(key.tx_type.as_str())
    .bind(members.len() as i64)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    if created {
        for member in members {
            sqlx::query(
                r#"INSERT INTO covenant_slots (network, staking_tx_id, tx_type, member_pk, state)
                   VALUES (?, ?, ?, ?, ?)
                   ON CONFLICT DO NOTHING"#,
            )
            .bind(key.network.as_str())
            .bind(&key.staking_tx_id)
            .bind(key.tx_type.as_str())
            .bind(member)
            .bind(SlotState::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(created)
}

async fn recount(conn: &mut SqliteConnection, key: &CovenantKey) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE covenant_sets SET
            signed_count = (SELECT COUNT(*) FROM covenant_slots s
                WHERE s.network = covenant_sets.network AND s.staking_tx_id = covenant_sets.staking_tx_id
                  AND s.tx_type = covenant_sets.tx_type AND s.state = 'SIGNED'),
            missed_count = (SELECT COUNT(*) FROM covenant_slots s
                WHERE s.network = covenant_sets.network AND s.staking_tx_id = covenant_sets.staking_tx_id
                  AND s.tx_type = covenant_sets.tx_type AND s.state = 'MISSED'),
            total = (SELECT COUNT(*) FROM covenant_slots s
                WHERE s.network = covenant_sets.network AND s.staking_tx_id = covenant_sets.staking_tx_id
                  AND s.tx_type = covenant_sets.tx_type)
        WHERE network = ? AND staking_tx_id = ? AND tx_type = ?
        "#,
    )
    .bind(key.network.as_str())
    .bind(&key.staking_tx_id)
    .bind(key.tx_type.as_str())
    .execute(conn)
    .await?;

    Ok(())
}

/// Moves a pending slot to SIGNED. Final slots are never touched.
pub async fn record_signature(
    pool: &Pool<Sqlite>,
    key: &CovenantKey,
    member_pk: &str,
    signature: &str,
    height: i64,
) -> Result<SlotUpdate, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"UPDATE covenant_slots SET state = 'SIGNED', signature = ?, height = ?
           WHERE network = ? AND staking_tx_id = ? AND tx_type = ? AND member_pk = ?
             AND state = 'PENDING'"#,
    )
    .bind(signature)
    .bind(height)
    .bind(key.network.as_str())
    .bind(&key.staking_tx_id)
    .bind(key.tx_type.as_str())
    .bind(member_pk)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let outcome = if updated > 0 {
        recount(&mut tx, key).await?;
        SlotUpdate::Signed
    } else {
        let existing = sqlx::query(
            r#"SELECT state FROM covenant_slots
               WHERE network = ? AND staking_tx_id = ? AND tx_type = ? AND member_pk = ?"#,
        )
        .bind(key.network.as_str())
        .bind(&key.staking_tx_id)
        .bind(key.tx_type.as_str())
        .bind(member_pk)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            Some(row) => SlotUpdate::AlreadyFinal(parse_column(row.get::<&str, _>("state"))?),
            None if set_exists(&mut tx, key).await? => SlotUpdate::UnknownMember,
            None => SlotUpdate::UnknownSet,
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

async fn set_exists(conn: &mut SqliteConnection, key: &CovenantKey) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT 1 FROM covenant_sets WHERE network = ? AND staking_tx_id = ? AND tx_type = ?",
    )
    .bind(key.network.as_str())
    .bind(&key.staking_tx_id)
    .bind(key.tx_type.as_str())
    .fetch_optional(conn)
    .await?;

    Ok(row.is_some())
}

/// Closes the set: every slot still pending becomes MISSED. Returns the
/// number of slots moved.
pub async fn mark_pending_missed(
    pool: &Pool<Sqlite>,
    key: &CovenantKey,
    height: i64,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let missed = sqlx::query(
        r#"UPDATE covenant_slots SET state = 'MISSED', height = ?
           WHERE network = ? AND staking_tx_id = ? AND tx_type = ? AND state = 'PENDING'"#,
    )
    .bind(height)
    .bind(key.network.as_str())
    .bind(&key.staking_tx_id)
    .bind(key.tx_type.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if missed > 0 {
        recount(&mut tx, key).await?;
    }

    tx.commit().await?;
    Ok(missed)
}

pub async fn get_set(
    pool: &Pool<Sqlite>,
    key: &CovenantKey,
) -> Result<Option<CovenantSignatureSet>, sqlx::Error> {
    let set = sqlx::query(
        r#"SELECT signed_count, missed_count, total FROM covenant_sets
           WHERE network = ? AND staking_tx_id = ? AND tx_type = ?"#,
    )
    .bind(key.network.as_str())
    .bind(&key.staking_tx_id)
    .bind(key.tx_type.as_str())
    .fetch_optional(pool)
    .await?;

    let Some(set) = set else {
        return Ok(None);
    };

    let rows = sqlx::query(
        r#"SELECT member_pk, signature, state, height FROM covenant_slots
           WHERE network = ? AND staking_tx_id = ? AND tx_type = ?
           ORDER BY member_pk"#,
    )
    .bind(key.network.as_str())
    .bind(&key.staking_tx_id)
    .bind(key.tx_type.as_str())
    .fetch_all(pool)
    .await?;

    let slots = rows
        .iter()
        .map(|row| {
            Ok(SignatureSlot {
                member_pk: row.get("member_pk"),
                signature: row.get("signature"),
                state: parse_column(row.get::<&str, _>("state"))?,
                height: row.get("height"),
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(Some(CovenantSignatureSet {
        key: key.clone(),
        slots,
        signed_count: set.get("signed_count"),
        missed_count: set.get("missed_count"),
        total: set.get("total"),
    }))
}

/// Participation of every member seen on a network, derived from slot states.
pub async fn member_stats(
    pool: &Pool<Sqlite>,
    network: Network,
) -> Result<Vec<CovenantMemberStats>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT member_pk,
                  SUM(CASE WHEN state = 'SIGNED' THEN 1 ELSE 0 END) AS signed,
                  SUM(CASE WHEN state = 'MISSED' THEN 1 ELSE 0 END) AS missed
           FROM covenant_slots
           WHERE network = ?
           GROUP BY member_pk
           ORDER BY member_pk"#,
    )
    .bind(network.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            CovenantMemberStats::new(row.get("member_pk"), row.get("signed"), row.get("missed"))
        })
        .collect())
}
