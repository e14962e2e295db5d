//! Lookups the pipeline and trackers depend on but do not own: the
//! validator directory and the IBC channel to chain-id resolver.

pub mod channel;
pub mod validator;

use crate::blockchain::client::ClientError;
use async_trait::async_trait;
use thiserror::Error;

pub use channel::RestChannelResolver;
pub use validator::RestValidatorDirectory;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Lookup failed: {0}")]
    Client(#[from] ClientError),

    #[error("Unexpected lookup response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ValidatorDirectory: Send + Sync {
    /// Validator id (operator address) for a consensus attestor address.
    async fn resolve_by_attestor(&self, address: &str) -> Result<Option<String>, ResolveError>;
}

#[async_trait]
pub trait ChannelResolver: Send + Sync {
    /// Chain id of the counterparty behind a local channel end.
    async fn chain_id_for_channel(
        &self,
        channel: &str,
        port: &str,
    ) -> Result<Option<String>, ResolveError>;
}
