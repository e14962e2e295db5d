#[cfg(test)]
mod tests {
    use crate::blockchain::events::extract_events;
    use crate::models::{
        CovenantEventKind, CovenantTxType, DelegationState, DomainEvent, Network, PacketEventKind,
    };
    use crate::tests::support::{event, raw_tx};

    const TS: i64 = 1_700_000_123_000;

    fn covenant_events(events: Vec<DomainEvent>) -> Vec<crate::models::CovenantEvent> {
        events
            .into_iter()
            .map(|e| match e {
                DomainEvent::Covenant(c) => c,
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_packet_events() {
        let tx = raw_tx(
            55,
            0,
            b"ibc",
            Some(0),
            vec![
                event("message", &[("action", "/ibc.core.channel.v1.MsgRecvPacket")]),
                event("message", &[("sender", "bbn1relayer")]),
                event(
                    "recv_packet",
                    &[
                        ("packet_data", r#"{"amount":"5","denom":"uatom","receiver":"bbn1r","sender":"cosmos1s"}"#),
                        ("packet_sequence", "321"),
                        ("packet_src_port", "transfer"),
                        ("packet_src_channel", "channel-141"),
                        ("packet_dst_port", "transfer"),
                        ("packet_dst_channel", "channel-3"),
                    ],
                ),
                event("write_acknowledgement", &[("packet_sequence", "321")]),
            ],
        );

        let events = extract_events(Network::Mainnet, &tx, TS);

        assert_eq!(events.len(), 1);
        let DomainEvent::Packet(packet) = &events[0] else {
            panic!("expected a packet event");
        };
        assert_eq!(packet.kind, PacketEventKind::Receive);
        assert_eq!(packet.key.network, Network::Mainnet);
        assert_eq!(packet.key.source_channel, "channel-141");
        assert_eq!(packet.key.sequence, 321);
        assert_eq!(packet.destination_channel, "channel-3");
        assert_eq!(packet.local_end(), ("transfer", "channel-3"));
        assert_eq!(packet.relayer.as_deref(), Some("bbn1relayer"));
        assert_eq!(packet.height, 55);
        assert_eq!(packet.timestamp, TS);
        assert!(packet.data.as_deref().unwrap().contains("uatom"));
    }

    #[test]
    fn test_packet_event_without_sequence_is_skipped() {
        let tx = raw_tx(
            56,
            0,
            b"bad",
            None,
            vec![event(
                "acknowledge_packet",
                &[("packet_src_port", "transfer"), ("packet_src_channel", "channel-0")],
            )],
        );

        assert!(extract_events(Network::Testnet, &tx, TS).is_empty());
    }

    #[test]
    fn test_failed_tx_yields_nothing() {
        let tx = raw_tx(
            57,
            0,
            b"failed",
            Some(13),
            vec![event(
                "send_packet",
                &[
                    ("packet_sequence", "1"),
                    ("packet_src_port", "transfer"),
                    ("packet_src_channel", "channel-0"),
                ],
            )],
        );

        assert!(extract_events(Network::Testnet, &tx, TS).is_empty());
    }

    #[test]
    fn test_delegation_created_seeds_both_sets() {
        let tx = raw_tx(
            60,
            0,
            b"create",
            None,
            vec![event(
                "babylon.btcstaking.v1.EventBTCDelegationCreated",
                &[("staking_tx_hash", "\"ABCDEF01\""), ("new_state", "\"PENDING\"")],
            )],
        );

        let events = covenant_events(extract_events(Network::Testnet, &tx, TS));

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key.tx_type, CovenantTxType::Staking);
        assert_eq!(events[1].key.tx_type, CovenantTxType::Unbonding);
        assert!(events.iter().all(|e| e.key.staking_tx_id == "abcdef01"));
        assert!(events.iter().all(|e| e.kind == CovenantEventKind::Created && e.height == 60));
    }

    #[test]
    fn test_covenant_signature_event() {
        let tx = raw_tx(
            61,
            0,
            b"sig",
            None,
            vec![event(
                "babylon.btcstaking.v1.EventCovenantSignatureReceived",
                &[
                    ("staking_tx_hash", "\"abcdef01\""),
                    ("covenant_btc_pk_hex", "\"AA01\""),
                    ("covenant_unbonding_signature_hex", "\"5151\""),
                ],
            )],
        );

        let events = covenant_events(extract_events(Network::Testnet, &tx, TS));

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].kind,
            CovenantEventKind::SignatureReceived {
                member_pk: "aa01".to_string(),
                signature: "5151".to_string(),
            }
        );
    }

    #[test]
    fn test_state_events() {
        let tx = raw_tx(
            62,
            0,
            b"state",
            None,
            vec![
                event(
                    "babylon.btcstaking.v1.EventBTCDelegationStateUpdate",
                    &[("staking_tx_hash", "\"abcdef01\""), ("new_state", "\"ACTIVE\"")],
                ),
                event(
                    "babylon.btcstaking.v1.EventBTCDelgationUnbondedEarly",
                    &[("staking_tx_hash", "\"abcdef02\""), ("new_state", "\"UNBONDED\"")],
                ),
                event(
                    "babylon.btcstaking.v1.EventBTCDelegationStateUpdate",
                    &[("staking_tx_hash", "\"abcdef03\""), ("new_state", "\"SOMETHING_NEW\"")],
                ),
                event("babylon.btcstaking.v1.EventFinalityProviderCreated", &[("btc_pk", "\"00\"")]),
            ],
        );

        let events = covenant_events(extract_events(Network::Testnet, &tx, TS));

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0].kind,
            CovenantEventKind::StateTransition { state: DelegationState::Active }
        );
        assert_eq!(events[2].key.staking_tx_id, "abcdef02");
        assert_eq!(
            events[2].kind,
            CovenantEventKind::StateTransition { state: DelegationState::Unbonded }
        );
    }
}
