#[cfg(test)]
mod tests {
    use crate::db;
    use crate::models::{
        Network, PacketEvent, PacketEventKind, PacketKey, PacketStatus, UNKNOWN_CHAIN_ID,
    };
    use crate::tests::support::{memory_pool, StaticChannelResolver};
    use crate::trackers::packet::parse_transfer;
    use crate::trackers::{merge, MergeOutcome, PacketTracker};
    use std::sync::Arc;

    const TRANSFER_DATA: &str =
        r#"{"amount":"2500","denom":"ubbn","receiver":"osmo1dest","sender":"bbn1src"}"#;

    fn key(sequence: u64) -> PacketKey {
        PacketKey {
            network: Network::Mainnet,
            source_port: "transfer".to_string(),
            source_channel: "channel-0".to_string(),
            sequence,
        }
    }

    fn packet_event(kind: PacketEventKind, sequence: u64, timestamp: i64) -> PacketEvent {
        PacketEvent {
            kind,
            key: key(sequence),
            destination_port: "transfer".to_string(),
            destination_channel: "channel-5".to_string(),
            tx_hash: format!("TX{}", timestamp),
            height: timestamp / 1_000,
            timestamp,
            relayer: Some("bbn1relayer".to_string()),
            data: Some(TRANSFER_DATA.to_string()),
        }
    }

    fn updated(outcome: MergeOutcome) -> crate::models::PacketRecord {
        match outcome {
            MergeOutcome::Updated(record) => record,
            MergeOutcome::Unchanged => panic!("expected an update"),
        }
    }

    #[test]
    fn test_merge_full_lifecycle() {
        let sent = updated(merge(None, &packet_event(PacketEventKind::Send, 1, 10_000)));
        assert_eq!(sent.status, PacketStatus::Sent);
        assert_eq!(sent.counterparty_chain_id, UNKNOWN_CHAIN_ID);
        assert_eq!(sent.destination_channel.as_deref(), Some("channel-5"));
        assert_eq!(sent.transfer.as_ref().unwrap().amount, "2500");
        assert_eq!(sent.completion_time_ms, None);

        let received = updated(merge(Some(&sent), &packet_event(PacketEventKind::Receive, 1, 12_000)));
        assert_eq!(received.status, PacketStatus::Received);
        assert_eq!(received.completion_time_ms, None);

        let acked = updated(merge(Some(&received), &packet_event(PacketEventKind::Acknowledge, 1, 15_500)));
        assert_eq!(acked.status, PacketStatus::Acknowledged);
        assert_eq!(acked.completion_time_ms, Some(5_500));
        assert_eq!(acked.sent.as_ref().unwrap().tx_hash, "TX10000");
    }

    #[test]
    fn test_duplicate_ack_keeps_first_transition() {
        let sent = updated(merge(None, &packet_event(PacketEventKind::Send, 2, 1_000)));
        let acked = updated(merge(Some(&sent), &packet_event(PacketEventKind::Acknowledge, 2, 4_000)));

        let replay = merge(Some(&acked), &packet_event(PacketEventKind::Acknowledge, 2, 9_000));

        assert_eq!(replay, MergeOutcome::Unchanged);
        assert_eq!(acked.completion_time_ms, Some(3_000));
    }

    #[test]
    fn test_ack_before_send() {
        let acked = updated(merge(None, &packet_event(PacketEventKind::Acknowledge, 3, 8_000)));
        assert_eq!(acked.status, PacketStatus::Acknowledged);
        assert_eq!(acked.completion_time_ms, None);

        let complete = updated(merge(Some(&acked), &packet_event(PacketEventKind::Send, 3, 2_000)));
        // status never moves backwards
        assert_eq!(complete.status, PacketStatus::Acknowledged);
        assert_eq!(complete.completion_time_ms, Some(6_000));
    }

    #[test]
    fn test_conflicting_terminal_event_is_recorded_but_status_kept() {
        let timed_out = updated(merge(None, &packet_event(PacketEventKind::Timeout, 4, 5_000)));

        let after = updated(merge(Some(&timed_out), &packet_event(PacketEventKind::Acknowledge, 4, 6_000)));

        assert_eq!(after.status, PacketStatus::Timeout);
        assert!(after.acknowledged.is_some());
    }

    #[test]
    fn test_receive_only_has_no_completion_time() {
        let received = updated(merge(None, &packet_event(PacketEventKind::Receive, 5, 3_000)));

        assert_eq!(received.status, PacketStatus::Received);
        assert!(received.sent.is_none());
        assert_eq!(received.completion_time_ms, None);
    }

    #[test]
    fn test_parse_transfer() {
        let details = parse_transfer(TRANSFER_DATA).unwrap();
        assert_eq!(details.denom, "ubbn");
        assert_eq!(details.sender, "bbn1src");
        assert_eq!(details.receiver, "osmo1dest");

        let numeric = parse_transfer(r#"{"amount":42,"denom":"d","receiver":"r","sender":"s"}"#).unwrap();
        assert_eq!(numeric.amount, "42");

        assert!(parse_transfer("not json").is_none());
        assert!(parse_transfer(r#"{"memo":"other app"}"#).is_none());
    }

    #[tokio::test]
    async fn test_tracker_persists_and_ignores_replays() {
        let pool = memory_pool().await;
        let resolver = Arc::new(StaticChannelResolver::default());
        resolver.bind("transfer", "channel-0", "osmosis-1");
        let tracker = PacketTracker::new(pool.clone(), resolver);

        assert!(tracker.on_packet_event(&packet_event(PacketEventKind::Send, 6, 1_000)).await.unwrap());
        assert!(tracker.on_packet_event(&packet_event(PacketEventKind::Acknowledge, 6, 2_500)).await.unwrap());
        assert!(!tracker.on_packet_event(&packet_event(PacketEventKind::Acknowledge, 6, 2_500)).await.unwrap());

        let stored = db::packet::get_packet(&pool, &key(6)).await.unwrap().unwrap();
        assert_eq!(stored.status, PacketStatus::Acknowledged);
        assert_eq!(stored.counterparty_chain_id, "osmosis-1");
        assert_eq!(stored.completion_time_ms, Some(1_500));
        assert_eq!(stored.acknowledged.unwrap().relayer.as_deref(), Some("bbn1relayer"));
    }

    #[tokio::test]
    async fn test_counterparty_resolved_on_later_event() {
        let pool = memory_pool().await;
        let resolver = Arc::new(StaticChannelResolver::default());
        let tracker = PacketTracker::new(pool.clone(), resolver.clone());

        tracker.on_packet_event(&packet_event(PacketEventKind::Send, 7, 1_000)).await.unwrap();
        let stored = db::packet::get_packet(&pool, &key(7)).await.unwrap().unwrap();
        assert_eq!(stored.counterparty_chain_id, UNKNOWN_CHAIN_ID);

        resolver.bind("transfer", "channel-0", "cosmoshub-4");
        // a replay changes nothing but still fills in the counterparty
        assert!(tracker.on_packet_event(&packet_event(PacketEventKind::Send, 7, 1_000)).await.unwrap());

        let stored = db::packet::get_packet(&pool, &key(7)).await.unwrap().unwrap();
        assert_eq!(stored.counterparty_chain_id, "cosmoshub-4");
        assert_eq!(stored.status, PacketStatus::Sent);
    }

    #[tokio::test]
    async fn test_received_packet_resolves_through_destination_channel() {
        let pool = memory_pool().await;
        let resolver = Arc::new(StaticChannelResolver::default());
        resolver.bind("transfer", "channel-5", "osmosis-1");
        let tracker = PacketTracker::new(pool.clone(), resolver);

        tracker.on_packet_event(&packet_event(PacketEventKind::Receive, 8, 1_000)).await.unwrap();

        let stored = db::packet::get_packet(&pool, &key(8)).await.unwrap().unwrap();
        assert_eq!(stored.counterparty_chain_id, "osmosis-1");
    }

    #[tokio::test]
    async fn test_stale_write_cannot_regress_stored_packet() {
        let pool = memory_pool().await;
        let sent = updated(merge(None, &packet_event(PacketEventKind::Send, 4, 10_000)));
        let mut acked = updated(merge(Some(&sent), &packet_event(PacketEventKind::Acknowledge, 4, 15_500)));
        acked.counterparty_chain_id = "osmosis-1".to_string();

        db::packet::upsert_packet(&pool, &acked).await.unwrap();
        db::packet::upsert_packet(&pool, &sent).await.unwrap();

        let stored = db::packet::get_packet(&pool, &key(4)).await.unwrap().unwrap();
        assert_eq!(stored, acked);
    }

    #[tokio::test]
    async fn test_concurrent_writers_fold_transitions() {
        let pool = memory_pool().await;
        let acked = updated(merge(None, &packet_event(PacketEventKind::Acknowledge, 5, 15_500)));
        let sent = updated(merge(None, &packet_event(PacketEventKind::Send, 5, 10_000)));

        db::packet::upsert_packet(&pool, &acked).await.unwrap();
        db::packet::upsert_packet(&pool, &sent).await.unwrap();

        let stored = db::packet::get_packet(&pool, &key(5)).await.unwrap().unwrap();
        assert_eq!(stored.status, PacketStatus::Acknowledged);
        assert_eq!(stored.sent, sent.sent);
        assert_eq!(stored.acknowledged, acked.acknowledged);
        assert_eq!(stored.completion_time_ms, Some(5_500));
    }
}
