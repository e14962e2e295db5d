use super::{ResolveError, ValidatorDirectory};
use crate::blockchain::client::{ClientError, RestClient};
use crate::cache::{CacheKey, ValidatorCacheManager};
use crate::models::Network;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PAGE_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct ValidatorsPage {
    #[serde(default)]
    validators: Vec<StakingValidator>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StakingValidator {
    operator_address: String,
    consensus_pubkey: Option<ConsensusPubkey>,
}

#[derive(Debug, Deserialize)]
struct ConsensusPubkey {
    key: String,
}

/// Consensus address as used in block headers and commits: the first 20
/// bytes of SHA-256 over the ed25519 public key, uppercase hex.
pub fn consensus_address(pubkey: &[u8]) -> String {
    let digest = Sha256::digest(pubkey);
    hex::encode_upper(&digest[..20])
}

/// Directory backed by the staking module's validator list.
pub struct RestValidatorDirectory {
    network: Network,
    rest: Arc<RestClient>,
    cache: ValidatorCacheManager,
    last_refresh: Mutex<Option<Instant>>,
    min_refresh_interval: Duration,
}

impl RestValidatorDirectory {
    pub fn new(network: Network, rest: Arc<RestClient>, cache: ValidatorCacheManager) -> Self {
        Self {
            network,
            rest,
            cache,
            last_refresh: Mutex::new(None),
            min_refresh_interval: Duration::from_secs(30),
        }
    }

    /// Reloads the full validator set into the cache.
    async fn refresh(&self) -> Result<usize, ResolveError> {
        let mut next_key: Option<String> = None;
        let mut loaded = 0;
        loop {
            let mut query = vec![("pagination.limit", PAGE_LIMIT.to_string())];
            if let Some(key) = &next_key {
                query.push(("pagination.key", key.clone()));
            }
            let page: ValidatorsPage = self
                .rest
                .get("cosmos/staking/v1beta1/validators", &query)
                .await?;

            for validator in page.validators {
                let Some(pubkey) = validator.consensus_pubkey else {
                    continue;
                };
                match base64::engine::general_purpose::STANDARD.decode(&pubkey.key) {
                    Ok(bytes) => {
                        let key = CacheKey::attestor(self.network, &consensus_address(&bytes));
                        self.cache.insert(key, validator.operator_address).await;
                        loaded += 1;
                    }
                    Err(e) => warn!(
                        "Skipping validator {} with undecodable consensus key: {}",
                        validator.operator_address, e
                    ),
                }
            }

            next_key = page
                .pagination
                .and_then(|p| p.next_key)
                .filter(|k| !k.is_empty());
            if next_key.is_none() {
                break;
            }
        }
        info!("Loaded {} validators for {}", loaded, self.network);
        Ok(loaded)
    }
}

#[async_trait]
impl ValidatorDirectory for RestValidatorDirectory {
    async fn resolve_by_attestor(&self, address: &str) -> Result<Option<String>, ResolveError> {
        let key = CacheKey::attestor(self.network, address);
        if let Some(validator) = self.cache.get(&key).await {
            return Ok(Some(validator));
        }

        // One refresh at a time; callers that waited re-check the cache.
        let mut last = self.last_refresh.lock().await;
        if let Some(validator) = self.cache.get(&key).await {
            return Ok(Some(validator));
        }
        let stale = last.map_or(true, |t| t.elapsed() >= self.min_refresh_interval);
        if stale {
            match self.refresh().await {
                Ok(_) => *last = Some(Instant::now()),
                Err(ResolveError::Client(ClientError::NotFound(path))) => {
                    warn!("Validator endpoint not available on {}: {}", self.network, path);
                    *last = Some(Instant::now());
                }
                Err(e) => return Err(e),
            }
        }

        let resolved = self.cache.get(&key).await;
        if resolved.is_none() {
            debug!("Attestor {} is not a known validator on {}", address, self.network);
        }
        Ok(resolved)
    }
}
