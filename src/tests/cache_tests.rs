//! tests/cache_tests.rs - resolver caches and key normalization

#[cfg(test)]
mod tests {
    use crate::cache::{CacheKey, ChannelCacheManager, ValidatorCacheManager};
    use crate::models::Network;
    use crate::resolver::validator::consensus_address;
    use std::time::Duration;

    #[test]
    fn test_consensus_address() {
        assert_eq!(consensus_address(&[0u8; 32]), "66687AADF862BD776C8FC18B8E9F8E2008971485");
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(
            CacheKey::attestor(Network::Mainnet, "abcd"),
            CacheKey::attestor(Network::Mainnet, "ABCD")
        );
        assert_ne!(
            CacheKey::attestor(Network::Mainnet, "ABCD"),
            CacheKey::attestor(Network::Testnet, "ABCD")
        );
        assert_eq!(
            CacheKey::channel_chain(Network::Testnet, "transfer", "channel-0").to_string(),
            "chan:testnet:transfer:channel-0"
        );
    }

    #[tokio::test]
    async fn test_channel_cache() {
        let cache = ChannelCacheManager::new(100);
        let key = CacheKey::channel_chain(Network::Mainnet, "transfer", "channel-3");

        assert_eq!(cache.get(&key).await, None);
        cache.insert(key.clone(), "osmosis-1".to_string()).await;
        assert_eq!(cache.get(&key).await.as_deref(), Some("osmosis-1"));
    }

    #[tokio::test]
    async fn test_validator_cache_expiry() {
        let cache = ValidatorCacheManager::new(100, Duration::from_millis(100));
        let key = CacheKey::attestor(Network::Mainnet, "ab01");

        cache.insert(key.clone(), "bbnvaloper1x".to_string()).await;
        assert_eq!(cache.get(&key).await.as_deref(), Some("bbnvaloper1x"));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(cache.get(&key).await, None);
    }
}
