//! Derived state kept from domain events: IBC packet lifecycles and
//! covenant signature sets.

pub mod covenant;
pub mod packet;

use thiserror::Error;

pub use covenant::{CovenantOutcome, CovenantTracker};
pub use packet::{merge, MergeOutcome, PacketTracker};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
