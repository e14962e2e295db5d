#[cfg(test)]
mod tests {
    use crate::db;
    use crate::models::{BlockRecord, Network, SignatureAttestation};
    use crate::tests::support::memory_pool;

    fn block(network: Network, height: i64, hash: &str) -> BlockRecord {
        BlockRecord {
            network,
            height,
            hash: hash.to_string(),
            proposer: Some("val-one".to_string()),
            proposer_address: "ADDR1".to_string(),
            tx_count: 0,
            timestamp: 1_700_000_000_000 + height,
            signatures: vec![SignatureAttestation {
                validator: "val-one".to_string(),
                timestamp: 1_700_000_000_000,
            }],
            app_hash: "APP".to_string(),
            gas_wanted: 0,
            gas_used: 0,
        }
    }

    #[tokio::test]
    async fn test_block_round_trip_and_existing_row_kept() {
        let pool = memory_pool().await;
        let original = block(Network::Mainnet, 5, "HASH5");
        db::block::upsert_block(&pool, &original).await.unwrap();

        let mut replay = original.clone();
        replay.proposer = None;
        replay.tx_count = 9;
        db::block::upsert_block(&pool, &replay).await.unwrap();

        let stored = db::block::get_block(&pool, Network::Mainnet, 5).await.unwrap().unwrap();
        assert_eq!(stored, original);
        assert!(db::block::get_block(&pool, Network::Testnet, 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_hash_is_backfilled() {
        let pool = memory_pool().await;
        db::block::upsert_block(&pool, &block(Network::Mainnet, 6, "")).await.unwrap();
        db::block::upsert_block(&pool, &block(Network::Mainnet, 6, "HASH6")).await.unwrap();
        db::block::upsert_block(&pool, &block(Network::Mainnet, 6, "OTHER")).await.unwrap();

        let stored = db::block::get_block(&pool, Network::Mainnet, 6).await.unwrap().unwrap();
        assert_eq!(stored.hash, "HASH6");
    }

    #[tokio::test]
    async fn test_missing_heights_and_bounds() {
        let pool = memory_pool().await;
        assert_eq!(db::block::height_bounds(&pool, Network::Testnet).await.unwrap(), None);

        for height in [3, 4, 7, 10] {
            db::block::upsert_block(&pool, &block(Network::Testnet, height, "H")).await.unwrap();
        }
        db::block::upsert_block(&pool, &block(Network::Mainnet, 5, "H")).await.unwrap();

        assert_eq!(db::block::height_bounds(&pool, Network::Testnet).await.unwrap(), Some((3, 10)));
        assert_eq!(db::block::count_blocks(&pool, Network::Testnet).await.unwrap(), 4);
        assert_eq!(
            db::block::missing_heights(&pool, Network::Testnet, 1, 12, 100).await.unwrap(),
            vec![1, 2, 5, 6, 8, 9, 11, 12]
        );
        assert_eq!(
            db::block::missing_heights(&pool, Network::Testnet, 3, 12, 3).await.unwrap(),
            vec![5, 6, 8]
        );
        assert!(db::block::missing_heights(&pool, Network::Testnet, 3, 4, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_heights_across_scan_windows() {
        let pool = memory_pool().await;
        db::block::upsert_block(&pool, &block(Network::Testnet, 1, "H")).await.unwrap();

        let missing = db::block::missing_heights(&pool, Network::Testnet, 1, 25_000, 50_000)
            .await
            .unwrap();

        assert_eq!(missing.len(), 24_999);
        assert_eq!(missing.first(), Some(&2));
        assert_eq!(missing.last(), Some(&25_000));
    }
}
