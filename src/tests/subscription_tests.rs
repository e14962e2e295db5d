#[cfg(test)]
mod tests {
    use crate::blockchain::client::ClientError;
    use crate::blockchain::models::GasTotals;
    use crate::blockchain::subscription::{
        parse_notification, HintBuffer, LiveSubscription, SubscriptionState, FINALITY_DELAY,
    };
    use crate::models::Network;
    use crate::tests::support::raw_block;
    use serde_json::json;
    use std::time::Duration;

    fn new_block_frame(height: u64) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "query": "tm.event='NewBlock'",
                "data": {
                    "type": "tendermint/event/NewBlock",
                    "value": {
                        "block": {
                            "header": {
                                "height": height.to_string(),
                                "time": "2024-05-01T12:00:00.5Z",
                                "proposer_address": "PROPOSER",
                                "app_hash": "APPHASH"
                            },
                            "data": { "txs": ["CgA="] },
                            "last_commit": {
                                "signatures": [
                                    { "validator_address": "VAL1", "timestamp": "2024-05-01T11:59:59Z" },
                                    { "validator_address": "", "timestamp": "0001-01-01T00:00:00Z" }
                                ]
                            }
                        },
                        "block_id": { "hash": "BLOCKHASH" },
                        "result_finalize_block": {
                            "tx_results": [
                                { "code": 0, "gas_wanted": "100", "gas_used": "80" },
                                { "code": 1, "gas_wanted": "50", "gas_used": "20" }
                            ]
                        }
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_parse_new_block_notification() {
        let block = parse_notification(&new_block_frame(1_000)).unwrap().unwrap();

        assert_eq!(block.height, 1_000);
        assert_eq!(block.hash.as_deref(), Some("BLOCKHASH"));
        assert_eq!(block.timestamp, 1_714_564_800_500);
        assert_eq!(block.proposer_address, "PROPOSER");
        assert_eq!(block.txs, vec!["CgA=".to_string()]);
        // absent votes are filtered
        assert_eq!(block.signatures.len(), 1);
        assert_eq!(block.signatures[0].timestamp, 1_714_564_799_000);
        assert_eq!(block.gas_totals, Some(GasTotals { wanted: 150, used: 100 }));
    }

    #[test]
    fn test_subscribe_ack_is_not_a_block() {
        let ack = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        assert!(parse_notification(ack).unwrap().is_none());

        let other = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "data": { "type": "tendermint/event/Tx", "value": {} } }
        });
        assert!(parse_notification(&other.to_string()).unwrap().is_none());
    }

    #[test]
    fn test_error_and_garbage_frames() {
        let error = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"Internal error","data":"subscription limit"}}"#;
        assert!(matches!(
            parse_notification(error),
            Err(ClientError::Rpc { code: -32603, .. })
        ));
        assert!(matches!(parse_notification("not json"), Err(ClientError::Malformed(_))));
    }

    #[test]
    fn test_hint_buffer_schedules_finalized_height() {
        assert_eq!(FINALITY_DELAY, 2);
        let mut buffer = HintBuffer::default();

        assert!(buffer.push(raw_block(1, &[], &[])).is_none());
        assert!(buffer.push(raw_block(2, &[], &[])).is_none());

        let job = buffer.push(raw_block(3, &[], &[])).unwrap();
        assert_eq!(job.height, 1);
        assert_eq!(job.hint.unwrap().height, 1);

        let job = buffer.push(raw_block(4, &[], &[])).unwrap();
        assert_eq!(job.height, 2);
        assert!(job.hint.is_some());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_hint_buffer_after_missed_notifications() {
        let mut buffer = HintBuffer::default();
        buffer.push(raw_block(10, &[], &[]));
        buffer.push(raw_block(11, &[], &[]));

        // 12 and 13 never arrived
        let job = buffer.push(raw_block(14, &[], &[])).unwrap();
        assert_eq!(job.height, 12);
        assert!(job.hint.is_none());
        assert_eq!(buffer.len(), 1);
        assert!(!buffer.is_empty());
    }

    #[tokio::test]
    async fn test_subscription_stops_on_cancel() {
        let subscription = LiveSubscription::new(
            Network::Testnet,
            "ws://127.0.0.1:9/websocket".to_string(),
            Duration::from_secs(60),
        );
        let mut state = subscription.watch_state();
        let (jobs, _rx) = tokio::sync::mpsc::channel(8);
        let shutdown = tokio_util::sync::CancellationToken::new();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            while *state.borrow_and_update() != SubscriptionState::BackingOff {
                if state.changed().await.is_err() {
                    return;
                }
            }
            canceller.cancel();
        });

        tokio::time::timeout(Duration::from_secs(10), subscription.run(jobs, shutdown))
            .await
            .expect("subscription did not stop");
        assert_eq!(subscription.state(), SubscriptionState::Stopped);
    }
}
