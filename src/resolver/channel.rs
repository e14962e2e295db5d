use super::{ChannelResolver, ResolveError};
use crate::blockchain::client::{ClientError, RestClient};
use crate::cache::{CacheKey, ChannelCacheManager};
use crate::models::Network;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    channel: ChannelEnd,
}

#[derive(Debug, Deserialize)]
struct ChannelEnd {
    #[serde(default)]
    connection_hops: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionResponse {
    connection: ConnectionEnd,
}

#[derive(Debug, Deserialize)]
struct ConnectionEnd {
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct ClientStateResponse {
    client_state: ClientState,
}

#[derive(Debug, Deserialize)]
struct ClientState {
    #[serde(default)]
    chain_id: Option<String>,
}

/// Follows channel -> connection -> client -> chain id through the IBC
/// REST endpoints, caching each resolved channel.
pub struct RestChannelResolver {
    network: Network,
    rest: Arc<RestClient>,
    cache: ChannelCacheManager,
}

impl RestChannelResolver {
    pub fn new(network: Network, rest: Arc<RestClient>, cache: ChannelCacheManager) -> Self {
        Self { network, rest, cache }
    }

    async fn lookup(&self, channel: &str, port: &str) -> Result<Option<String>, ResolveError> {
        let chan: ChannelResponse = self
            .rest
            .get(&format!("ibc/core/channel/v1/channels/{}/ports/{}", channel, port), &[])
            .await?;
        let Some(connection_id) = chan.channel.connection_hops.first() else {
            return Err(ResolveError::Malformed(format!(
                "channel {}/{} has no connection hops",
                port, channel
            )));
        };

        let conn: ConnectionResponse = self
            .rest
            .get(&format!("ibc/core/connection/v1/connections/{}", connection_id), &[])
            .await?;

        let client: ClientStateResponse = self
            .rest
            .get(
                &format!("ibc/core/client/v1/client_states/{}", conn.connection.client_id),
                &[],
            )
            .await?;

        Ok(client.client_state.chain_id.filter(|id| !id.is_empty()))
    }
}

#[async_trait]
impl ChannelResolver for RestChannelResolver {
    async fn chain_id_for_channel(
        &self,
        channel: &str,
        port: &str,
    ) -> Result<Option<String>, ResolveError> {
        let key = CacheKey::channel_chain(self.network, port, channel);
        if let Some(chain_id) = self.cache.get(&key).await {
            return Ok(Some(chain_id));
        }

        match self.lookup(channel, port).await {
            Ok(Some(chain_id)) => {
                self.cache.insert(key, chain_id.clone()).await;
                Ok(Some(chain_id))
            }
            Ok(None) => Ok(None),
            Err(ResolveError::Client(ClientError::NotFound(path))) => {
                debug!("No IBC binding for {}/{} ({})", port, channel, path);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
