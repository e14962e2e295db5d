#[cfg(test)]
mod tests {
    use crate::blockchain::batch_manager::{BatchConfig, EventDispatcher};
    use crate::blockchain::polling::{backfill, repair_gaps, BackfillReport, BackfillTarget};
    use crate::blockchain::worker_pool::{HeightJob, WorkerPool};
    use crate::config::NetworkConfig;
    use crate::db;
    use crate::blockchain::models::RawTx;
    use crate::models::{CovenantKey, CovenantTxType, Network, PacketKey, PacketStatus, SlotState};
    use crate::network::NetworkServices;
    use crate::tests::support::{
        event, memory_pool, raw_block, raw_tx, MockChainClient, StaticChannelResolver,
        StaticValidatorDirectory,
    };
    use backon::ExponentialBuilder;
    use sqlx::SqlitePool;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    const MEMBERS: [&str; 3] = ["aa01", "bb02", "cc03"];

    fn backoff() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(1))
            .with_max_times(1)
    }

    fn chain(tip: u64) -> MockChainClient {
        (1..=tip).fold(MockChainClient::default(), |client, height| {
            client.with_height(raw_block(height, &[], &["ADDR1"]), vec![])
        })
    }

    fn services(pool: &SqlitePool, client: MockChainClient, start_height: Option<u64>) -> NetworkServices {
        let config = NetworkConfig {
            network: Network::Testnet,
            rpc_url: "http://127.0.0.1:26657".to_string(),
            rest_url: "http://127.0.0.1:1317".to_string(),
            ws_url: "ws://127.0.0.1:26657/websocket".to_string(),
            covenant_pks: MEMBERS.iter().map(|m| m.to_string()).collect(),
            start_height,
        };
        NetworkServices::from_parts(
            config,
            pool.clone(),
            Arc::new(client),
            Arc::new(StaticValidatorDirectory::with(&[("ADDR1", "val-one")])),
            Arc::new(StaticChannelResolver::default()),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_backfill_explicit_range() {
        let pool = memory_pool().await;
        let services = services(&pool, chain(12), None);

        let report = backfill(&services, 3, BackfillTarget::Height(9), 3, backoff(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report,
            BackfillReport { from: 3, to: 9, processed: 7, ..Default::default() }
        );
        assert_eq!(db::block::height_bounds(&pool, Network::Testnet).await.unwrap(), Some((3, 9)));
    }

    #[tokio::test]
    async fn test_backfill_to_latest_stops_short_of_tip() {
        let pool = memory_pool().await;
        let services = services(&pool, chain(10), None);

        let report = backfill(&services, 1, BackfillTarget::Latest, 4, backoff(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!((report.from, report.to, report.processed), (1, 8, 8));
    }

    #[tokio::test]
    async fn test_backfill_reports_failures_and_cancellation() {
        let pool = memory_pool().await;
        let services = services(&pool, chain(3), None);

        let report = backfill(&services, 2, BackfillTarget::Height(5), 1, backoff(), &CancellationToken::new())
            .await
            .unwrap();
        // heights 4 and 5 do not exist on the node
        assert_eq!((report.processed, report.failed), (2, 2));

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let report = backfill(&services, 1, BackfillTarget::Height(3), 1, backoff(), &cancelled)
            .await
            .unwrap();
        assert_eq!(report.processed, 0);
        assert!(report.cancelled);
    }

    #[tokio::test]
    async fn test_repair_fills_holes_below_live_window() {
        let pool = memory_pool().await;
        let services = services(&pool, chain(10), None);
        for height in [1, 2, 5] {
            services.processor.process_height(height, None).await.unwrap();
        }

        let report = repair_gaps(&services, 100, 2, backoff(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!((report.from, report.to, report.processed), (1, 7, 4));
        assert!(db::block::missing_heights(&pool, Network::Testnet, 1, 7, 10).await.unwrap().is_empty());
        assert!(db::block::get_block(&pool, Network::Testnet, 8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repair_uses_start_height_and_batch_limit() {
        let pool = memory_pool().await;
        let services = services(&pool, chain(20), Some(4));

        let report = repair_gaps(&services, 5, 2, backoff(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.processed, 5);
        assert_eq!(db::block::height_bounds(&pool, Network::Testnet).await.unwrap(), Some((4, 8)));
    }

    #[tokio::test]
    async fn test_repair_without_anchor_does_nothing() {
        let pool = memory_pool().await;
        let services = services(&pool, chain(10), None);

        let report = repair_gaps(&services, 100, 2, backoff(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report, BackfillReport::default());
    }

    /// Transfer sent at height 2 and acknowledged at height 3.
    fn ibc_chain() -> MockChainClient {
        let send = raw_tx(
            2,
            0,
            b"ibc-send",
            None,
            vec![event(
                "send_packet",
                &[
                    ("packet_sequence", "1"),
                    ("packet_src_port", "transfer"),
                    ("packet_src_channel", "channel-0"),
                    ("packet_dst_port", "transfer"),
                    ("packet_dst_channel", "channel-9"),
                ],
            )],
        );
        let ack = raw_tx(
            3,
            0,
            b"ibc-ack",
            None,
            vec![event(
                "acknowledge_packet",
                &[
                    ("packet_sequence", "1"),
                    ("packet_src_port", "transfer"),
                    ("packet_src_channel", "channel-0"),
                ],
            )],
        );
        chain(1)
            .with_height(raw_block(2, &[send.clone()], &["ADDR1"]), vec![send])
            .with_height(raw_block(3, &[ack.clone()], &["ADDR1"]), vec![ack])
    }

    #[tokio::test]
    async fn test_worker_pool_and_dispatcher() {
        let pool = memory_pool().await;
        let client = ibc_chain();
        let services = services(&pool, client, None);

        let intake_stop = CancellationToken::new();
        let dispatcher = EventDispatcher::new(
            Network::Testnet,
            pool.clone(),
            services.take_event_receiver().unwrap(),
            BatchConfig::default(),
            services.packets.clone(),
            services.covenants.clone(),
        );
        let dispatcher_handle = tokio::spawn(dispatcher.run(intake_stop.clone()));
        assert!(services.take_event_receiver().is_none());

        let workers = WorkerPool::new(services.processor.clone(), 2, backoff(), CancellationToken::new());
        let jobs = workers.get_sender();
        for height in [3, 1, 2] {
            jobs.send(HeightJob { height, hint: None }).await.unwrap();
        }
        drop(jobs);
        workers.join().await;
        intake_stop.cancel();
        dispatcher_handle.await.unwrap();

        assert_eq!(db::block::count_blocks(&pool, Network::Testnet).await.unwrap(), 3);
        let key = PacketKey {
            network: Network::Testnet,
            source_port: "transfer".to_string(),
            source_channel: "channel-0".to_string(),
            sequence: 1,
        };
        let packet = db::packet::get_packet(&pool, &key).await.unwrap().unwrap();
        assert_eq!(packet.status, PacketStatus::Acknowledged);
        assert_eq!(packet.completion_time_ms, Some(1_000));
        assert_eq!(db::outbox::count(&pool, Network::Testnet).await.unwrap(), 0);
    }

    fn packet_key() -> PacketKey {
        PacketKey {
            network: Network::Testnet,
            source_port: "transfer".to_string(),
            source_channel: "channel-0".to_string(),
            sequence: 1,
        }
    }

    #[tokio::test]
    async fn test_queued_events_replay_on_start() {
        let pool = memory_pool().await;
        let services = services(&pool, ibc_chain(), None);
        drop(services.take_event_receiver());

        for height in [2, 3] {
            services.processor.process_height(height, None).await.unwrap();
        }
        assert_eq!(db::outbox::count(&pool, Network::Testnet).await.unwrap(), 2);
        assert!(db::packet::get_packet(&pool, &packet_key()).await.unwrap().is_none());

        let (_sender, receiver) = mpsc::unbounded_channel();
        let dispatcher = EventDispatcher::new(
            Network::Testnet,
            pool.clone(),
            receiver,
            BatchConfig::default(),
            services.packets.clone(),
            services.covenants.clone(),
        );
        let stop = CancellationToken::new();
        stop.cancel();
        dispatcher.run(stop).await;

        let packet = db::packet::get_packet(&pool, &packet_key()).await.unwrap().unwrap();
        assert_eq!(packet.status, PacketStatus::Acknowledged);
        assert_eq!(db::outbox::count(&pool, Network::Testnet).await.unwrap(), 0);
    }

    fn staking_tx(height: u64, name: &str, attrs: &[(&str, &str)]) -> RawTx {
        let mut attributes = vec![("staking_tx_hash", "\"deadbeef\"")];
        attributes.extend_from_slice(attrs);
        raw_tx(
            height,
            0,
            format!("{}-{}-{:?}", height, name, attrs).as_bytes(),
            None,
            vec![event(&format!("babylon.btcstaking.v1.{}", name), &attributes)],
        )
    }

    fn signature_tx(height: u64, member: &'static str) -> RawTx {
        staking_tx(
            height,
            "EventCovenantSignatureReceived",
            &[
                ("covenant_btc_pk_hex", member),
                ("covenant_unbonding_signature_hex", "\"5151\""),
            ],
        )
    }

    #[tokio::test]
    async fn test_covenant_closure_waits_for_earlier_heights() {
        let pool = memory_pool().await;
        let created = staking_tx(100, "EventBTCDelegationCreated", &[("new_state", "\"PENDING\"")]);
        let first = signature_tx(101, "\"aa01\"");
        let mut second = signature_tx(101, "\"bb02\"");
        second.index = 1;
        let active = staking_tx(103, "EventBTCDelegationStateUpdate", &[("new_state", "\"ACTIVE\"")]);
        let client = MockChainClient::default()
            .with_height(raw_block(100, &[created.clone()], &["ADDR1"]), vec![created])
            .with_height(
                raw_block(101, &[first.clone(), second.clone()], &["ADDR1"]),
                vec![first, second],
            )
            .with_height(raw_block(102, &[], &["ADDR1"]), vec![])
            .with_height(raw_block(103, &[active.clone()], &["ADDR1"]), vec![active]);
        let services = services(&pool, client, None);

        let intake_stop = CancellationToken::new();
        let dispatcher = EventDispatcher::new(
            Network::Testnet,
            pool.clone(),
            services.take_event_receiver().unwrap(),
            BatchConfig { max_batch_size: 1, flush_interval: Duration::from_millis(5) },
            services.packets.clone(),
            services.covenants.clone(),
        );
        let dispatcher_handle = tokio::spawn(dispatcher.run(intake_stop.clone()));

        // The activation is indexed before the signatures that precede it
        for height in [100, 103] {
            services.processor.process_height(height, None).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        let key = CovenantKey {
            network: Network::Testnet,
            staking_tx_id: "deadbeef".to_string(),
            tx_type: CovenantTxType::Staking,
        };
        let set = db::covenant::get_set(&pool, &key).await.unwrap().unwrap();
        assert_eq!((set.signed_count, set.missed_count), (0, 0));

        for height in [101, 102] {
            services.processor.process_height(height, None).await.unwrap();
        }
        intake_stop.cancel();
        dispatcher_handle.await.unwrap();

        let set = db::covenant::get_set(&pool, &key).await.unwrap().unwrap();
        assert_eq!((set.signed_count, set.missed_count, set.total), (2, 1, 3));
        let states: Vec<SlotState> = set.slots.iter().map(|s| s.state).collect();
        assert_eq!(states, vec![SlotState::Signed, SlotState::Signed, SlotState::Missed]);
        assert_eq!(db::outbox::count(&pool, Network::Testnet).await.unwrap(), 0);
    }
}
