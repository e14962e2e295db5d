// Configuration structure for:
// - per-network RPC / REST / websocket endpoints and covenant members
// - database connection string
// - server listening address/port
// - RPC timeouts, rate limit and retry policy
// - pipeline sizing (workers, backfill concurrency, gap repair cadence)

use crate::models::Network;
use dotenv::dotenv;
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No chain endpoint configured; set BABYLON_MAINNET_RPC_URL or BABYLON_TESTNET_RPC_URL")]
    NoEndpoints,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub timeout: Duration,
    pub rate_limit: Option<u32>,
    pub max_retries: usize,
    pub max_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub network: Network,
    pub rpc_url: String,
    /// REST endpoint for validator and IBC lookups.
    pub rest_url: String,
    pub ws_url: String,
    pub covenant_pks: Vec<String>,
    pub start_height: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub networks: BTreeMap<Network, NetworkConfig>,
    pub rpc: RpcSettings,
    pub worker_count: usize,
    pub backfill_concurrency: usize,
    pub gap_repair_interval: Duration,
    pub gap_repair_batch: u64,
    pub ws_reconnect_delay: Duration,
    pub event_batch_size: usize,
    pub event_flush_interval: Duration,
    pub cache_max_capacity: u64,
    pub validator_cache_ttl: Duration,
}

fn var_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value }),
        _ => Ok(default),
    }
}

fn var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `http(s)://host:26657` becomes `ws(s)://host:26657/websocket`.
fn default_ws_url(rpc_url: &str) -> String {
    let base = rpc_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/websocket", ws)
}

/// Standard node layout serves REST on 1317 next to RPC on 26657.
fn default_rest_url(rpc_url: &str) -> String {
    rpc_url.trim_end_matches('/').replace(":26657", ":1317")
}

fn parse_pks(list: &str) -> Vec<String> {
    list.split(',')
        .map(|pk| pk.trim().to_ascii_lowercase())
        .filter(|pk| !pk.is_empty())
        .collect()
}

impl NetworkConfig {
    fn from_env(network: Network) -> Result<Option<Self>, ConfigError> {
        let prefix = network.env_prefix();
        let Some(rpc_url) = var_opt(&format!("{}_RPC_URL", prefix)) else {
            return Ok(None);
        };
        let ws_url = var_opt(&format!("{}_WS_URL", prefix))
            .unwrap_or_else(|| default_ws_url(&rpc_url));
        let covenant_pks = var_opt(&format!("{}_COVENANT_PKS", prefix))
            .map(|v| parse_pks(&v))
            .unwrap_or_default();
        let start_key = format!("{}_START_HEIGHT", prefix);
        let start_height = match var_opt(&start_key) {
            Some(v) => Some(v.parse().map_err(|_| ConfigError::InvalidValue {
                key: start_key.clone(),
                value: v,
            })?),
            None => None,
        };

        Ok(Some(Self {
            network,
            rest_url: var_opt(&format!("{}_REST_URL", prefix))
                .unwrap_or_else(|| default_rest_url(&rpc_url)),
            ws_url,
            rpc_url,
            covenant_pks,
            start_height,
        }))
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let mut networks = BTreeMap::new();
        for network in Network::ALL {
            if let Some(cfg) = NetworkConfig::from_env(network)? {
                networks.insert(network, cfg);
            }
        }
        if networks.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }

        let rpc = RpcSettings {
            timeout: Duration::from_secs(var_or("RPC_TIMEOUT_SECS", 30)?),
            rate_limit: var_opt("RPC_RATE_LIMIT").and_then(|v| v.parse().ok()),
            max_retries: var_or("RPC_MAX_RETRIES", 5)?,
            max_delay: Duration::from_secs(var_or("RETRY_MAX_DELAY_SECS", 30)?),
        };

        Ok(Self {
            database_url: var_opt("DATABASE_URL").unwrap_or_else(|| "sqlite:indexer.db".to_string()),
            server_host: var_opt("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: var_or("SERVER_PORT", 8080)?,
            networks,
            rpc,
            worker_count: var_or("WORKER_COUNT", num_cpus::get())?.max(1),
            backfill_concurrency: var_or("BACKFILL_CONCURRENCY", 4)?.max(1),
            gap_repair_interval: Duration::from_secs(var_or("GAP_REPAIR_INTERVAL_SECS", 60)?),
            gap_repair_batch: var_or("GAP_REPAIR_BATCH", 500)?,
            ws_reconnect_delay: Duration::from_secs(var_or("WS_RECONNECT_SECS", 5)?),
            event_batch_size: var_or("EVENT_BATCH_SIZE", 100)?.max(1),
            event_flush_interval: Duration::from_millis(var_or("EVENT_FLUSH_MS", 500)?),
            cache_max_capacity: var_or("CACHE_MAX_CAPACITY", 10_000)?,
            validator_cache_ttl: Duration::from_secs(var_or("VALIDATOR_CACHE_TTL_SECS", 600)?),
        })
    }

    pub fn network(&self, network: Network) -> Option<&NetworkConfig> {
        self.networks.get(&network)
    }
}
