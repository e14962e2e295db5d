use super::TrackerError;
use crate::db;
use crate::db::covenant::SlotUpdate;
use crate::models::{CovenantEvent, CovenantEventKind, CovenantKey, CovenantMemberStats, Network};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CovenantOutcome {
    Seeded,
    AlreadySeeded,
    Signed,
    Ignored,
    Closed { missed: u64 },
    NoChange,
}

pub struct CovenantTracker {
    pool: SqlitePool,
    members: Vec<String>,
}

impl CovenantTracker {
    /// `members` is the covenant committee, as lowercase hex public keys.
    pub fn new(pool: SqlitePool, members: Vec<String>) -> Self {
        if members.is_empty() {
            warn!("No covenant members configured; signature sets will be empty");
        }
        Self { pool, members }
    }

    pub async fn on_covenant_event(
        &self,
        event: &CovenantEvent,
    ) -> Result<CovenantOutcome, TrackerError> {
        let key = &event.key;
        match &event.kind {
            CovenantEventKind::Created => {
                if db::covenant::seed_set(&self.pool, key, &self.members).await? {
                    debug!("Seeded covenant set {} with {} slots", key, self.members.len());
                    Ok(CovenantOutcome::Seeded)
                } else {
                    debug!("Covenant set {} already seeded", key);
                    Ok(CovenantOutcome::AlreadySeeded)
                }
            }
            CovenantEventKind::SignatureReceived { member_pk, signature } => {
                self.sign(key, member_pk, signature, event.height).await
            }
            CovenantEventKind::StateTransition { state } => {
                if *state != key.tx_type.terminal_state() {
                    return Ok(CovenantOutcome::NoChange);
                }
                let missed = db::covenant::mark_pending_missed(&self.pool, key, event.height).await?;
                if missed > 0 {
                    info!("Covenant set {} closed at height {}: {} missed", key, event.height, missed);
                }
                Ok(CovenantOutcome::Closed { missed })
            }
        }
    }

    async fn sign(
        &self,
        key: &CovenantKey,
        member_pk: &str,
        signature: &str,
        height: i64,
    ) -> Result<CovenantOutcome, TrackerError> {
        let member_pk = member_pk.to_ascii_lowercase();
        let mut update =
            db::covenant::record_signature(&self.pool, key, &member_pk, signature, height).await?;

        // A signature indexed ahead of its delegation seeds the set itself.
        if update == SlotUpdate::UnknownSet {
            db::covenant::seed_set(&self.pool, key, &self.members).await?;
            update =
                db::covenant::record_signature(&self.pool, key, &member_pk, signature, height)
                    .await?;
        }

        match update {
            SlotUpdate::Signed => {
                debug!("Covenant member {} signed {} at height {}", member_pk, key, height);
                Ok(CovenantOutcome::Signed)
            }
            SlotUpdate::AlreadyFinal(state) => {
                debug!(
                    "Ignoring signature from {} for {}: slot already {}",
                    member_pk,
                    key,
                    state.as_str()
                );
                Ok(CovenantOutcome::Ignored)
            }
            SlotUpdate::UnknownMember | SlotUpdate::UnknownSet => {
                warn!("Ignoring signature for {} from unknown covenant member {}", key, member_pk);
                Ok(CovenantOutcome::Ignored)
            }
        }
    }

    pub async fn member_stats(
        &self,
        network: Network,
    ) -> Result<Vec<CovenantMemberStats>, TrackerError> {
        Ok(db::covenant::member_stats(&self.pool, network).await?)
    }
}
