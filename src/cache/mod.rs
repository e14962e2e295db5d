pub mod channel;
pub mod keys;
pub mod validator;

use crate::config::Config;

pub use channel::ChannelCacheManager;
pub use keys::CacheKey;
pub use validator::ValidatorCacheManager;

/// Caches backing the resolvers, shared by every network.
#[derive(Clone)]
pub struct ResolverCache {
    pub channels: ChannelCacheManager,
    pub validators: ValidatorCacheManager,
}

pub fn init_cache(config: &Config) -> ResolverCache {
    ResolverCache {
        channels: ChannelCacheManager::new(config.cache_max_capacity),
        validators: ValidatorCacheManager::new(config.cache_max_capacity, config.validator_cache_ttl),
    }
}
