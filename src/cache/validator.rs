//! Attestor address to validator cache

use super::keys::CacheKey;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

/// Validator sets rotate, so entries expire and are refreshed from the
/// directory on the next miss.
#[derive(Clone)]
pub struct ValidatorCacheManager {
    cache: Cache<CacheKey, String>,
}

impl ValidatorCacheManager {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let result = self.cache.get(key).await;
        if result.is_none() {
            debug!("Cache miss for key: {}", key);
        }
        result
    }

    pub async fn insert(&self, key: CacheKey, validator: String) {
        self.cache.insert(key, validator).await;
    }
}
