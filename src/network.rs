//! Per-network service wiring. Each configured network gets its own
//! client, processor, trackers and live subscription; nothing is shared
//! between networks except the database pool and the resolver caches.

use crate::blockchain::client::{ChainClient, ClientError, CometClient, RestClient};
use crate::blockchain::processor::BlockProcessor;
use crate::blockchain::subscription::{LiveSubscription, SubscriptionState};
use crate::cache::ResolverCache;
use crate::config::{Config, NetworkConfig};
use crate::db;
use crate::models::{Network, OutboxEvent};
use crate::resolver::{
    ChannelResolver, RestChannelResolver, RestValidatorDirectory, ValidatorDirectory,
};
use crate::trackers::{CovenantTracker, PacketTracker};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct NetworkServices {
    pub network: Network,
    pub config: NetworkConfig,
    pub pool: SqlitePool,
    pub client: Arc<dyn ChainClient>,
    pub processor: Arc<BlockProcessor>,
    pub packets: Arc<PacketTracker>,
    pub covenants: Arc<CovenantTracker>,
    pub subscription: Arc<LiveSubscription>,
    events: Mutex<Option<mpsc::UnboundedReceiver<OutboxEvent>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionStatus {
    pub network: Network,
    pub last_processed_height: u64,
    pub lowest_stored_height: Option<i64>,
    pub highest_stored_height: Option<i64>,
    pub stored_blocks: i64,
    pub chain_height: Option<u64>,
    pub subscription: SubscriptionState,
}

impl NetworkServices {
    /// Wires a network from explicit dependencies.
    pub fn from_parts(
        config: NetworkConfig,
        pool: SqlitePool,
        client: Arc<dyn ChainClient>,
        validators: Arc<dyn ValidatorDirectory>,
        channels: Arc<dyn ChannelResolver>,
        reconnect_delay: Duration,
    ) -> Self {
        let network = config.network;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let processor = Arc::new(BlockProcessor::new(
            network,
            pool.clone(),
            client.clone(),
            validators,
            events_tx,
        ));
        let packets = Arc::new(PacketTracker::new(pool.clone(), channels));
        let covenants = Arc::new(CovenantTracker::new(pool.clone(), config.covenant_pks.clone()));
        let subscription = Arc::new(LiveSubscription::new(
            network,
            config.ws_url.clone(),
            reconnect_delay,
        ));

        Self {
            network,
            config,
            pool,
            client,
            processor,
            packets,
            covenants,
            subscription,
            events: Mutex::new(Some(events_rx)),
        }
    }

    /// Wires a network against its configured RPC and REST endpoints.
    pub fn connect(
        config: &NetworkConfig,
        settings: &Config,
        pool: SqlitePool,
        cache: &ResolverCache,
    ) -> Result<Self, ClientError> {
        let client = Arc::new(CometClient::new(&config.rpc_url, &settings.rpc)?);
        let rest = Arc::new(RestClient::new(&config.rest_url, &settings.rpc)?);

        let validators = Arc::new(RestValidatorDirectory::new(
            config.network,
            rest.clone(),
            cache.validators.clone(),
        ));
        let channels = Arc::new(RestChannelResolver::new(
            config.network,
            rest,
            cache.channels.clone(),
        ));

        Ok(Self::from_parts(
            config.clone(),
            pool,
            client,
            validators,
            channels,
            settings.ws_reconnect_delay,
        ))
    }

    /// Hands the tracker intake queue to its consumer; only the first call
    /// gets it.
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<OutboxEvent>> {
        match self.events.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub async fn status(&self) -> Result<IngestionStatus, sqlx::Error> {
        let bounds = db::block::height_bounds(&self.pool, self.network).await?;
        let stored_blocks = db::block::count_blocks(&self.pool, self.network).await?;
        let chain_height = match self.client.current_height().await {
            Ok(height) => Some(height),
            Err(e) => {
                warn!("Could not read {} chain height: {}", self.network, e);
                None
            }
        };

        Ok(IngestionStatus {
            network: self.network,
            last_processed_height: self.processor.last_processed(),
            lowest_stored_height: bounds.map(|(min, _)| min),
            highest_stored_height: bounds.map(|(_, max)| max),
            stored_blocks,
            chain_height,
            subscription: self.subscription.state(),
        })
    }
}

/// Services for every configured network.
#[derive(Default)]
pub struct NetworkRegistry {
    services: HashMap<Network, Arc<NetworkServices>>,
}

impl NetworkRegistry {
    pub fn from_config(
        config: &Config,
        pool: &SqlitePool,
        cache: &ResolverCache,
    ) -> Result<Self, ClientError> {
        let mut registry = Self::default();
        for network_config in config.networks.values() {
            let services = NetworkServices::connect(network_config, config, pool.clone(), cache)?;
            info!("Registered {} ({})", network_config.network, network_config.rpc_url);
            registry.insert(services);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, services: NetworkServices) {
        self.services.insert(services.network, Arc::new(services));
    }

    pub fn get(&self, network: Network) -> Option<Arc<NetworkServices>> {
        self.services.get(&network).cloned()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<NetworkServices>> {
        self.services.values()
    }
}
