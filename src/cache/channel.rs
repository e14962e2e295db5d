//! Channel to counterparty chain cache

use super::keys::CacheKey;
use moka::future::Cache;
use tracing::debug;

/// Channel bindings never change for the lifetime of a channel, so entries
/// have no TTL; capacity alone bounds the cache.
#[derive(Clone)]
pub struct ChannelCacheManager {
    cache: Cache<CacheKey, String>,
}

impl ChannelCacheManager {
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(capacity).build();
        Self { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, chain_id: String) {
        debug!("Cached counterparty chain: {} = {}", key, chain_id);
        self.cache.insert(key, chain_id).await;
    }
}
