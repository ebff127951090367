//! Tests for the BLE attack strategies
//!
//! The harness tests feed a scripted peer through `MockTransport` and check
//! what goes out on the air.

#[cfg(test)]
mod strategy_tests {
    use crate::ble::attack::*;
    use bleshock_attack::{AttackStrategy, Event, ResetTrigger, Session, Verdict};
    use bleshock_core::AttackParams;
    use bleshock_packet::{
        AttPdu, BdAddress, ControlPdu, DataPayload, L2capPayload, LinkPdu, PairingParams, SmPdu,
    };

    const AA: u32 = 0x9A32_8370;

    fn session() -> Session {
        Session::new(BdAddress::ZERO, BdAddress([1, 2, 3, 4, 5, 6]), AA, 0x17_9A9C)
    }

    fn response() -> Event {
        Event::Sm(SmPdu::PairingResponse(PairingParams {
            io_capability: 3,
            oob_data_flag: 0,
            auth_req: 0x01,
            max_key_size: 16,
            initiator_key_distribution: 0,
            responder_key_distribution: 0,
        }))
    }

    #[test]
    fn test_key_size_defaults() {
        let attack = KeySizeOverflowAttack::default();
        let pairing = attack.pairing();
        assert_eq!(pairing.max_key_size, 253);
        assert_eq!(pairing.io_capability, 4);
        assert_eq!(pairing.auth_req, 0x05);
        assert_eq!(pairing.initiator_key_distribution, 0x07);
        assert_eq!(pairing.responder_key_distribution, 0x07);
        assert!(!pairing.key_size_is_legal());
    }

    #[test]
    fn test_key_size_pairing_request_is_captured() {
        let attack = KeySizeOverflowAttack::default();
        let mut session = session();

        let injection = attack.on_negotiation_complete(&mut session);
        assert_eq!(injection.verdict, Verdict::Continue);
        assert_eq!(injection.frames.len(), 1);
        assert!(injection.frames[0].capture);
        assert_eq!(injection.frames[0].packet.access_address, AA);
        assert_eq!(injection.frames[0].packet.summary(), "SM_PAIRING_REQUEST");
    }

    #[test]
    fn test_key_size_enc_req_on_pairing_response() {
        let attack = KeySizeOverflowAttack::default();
        let mut session = session();
        attack.on_negotiation_complete(&mut session);

        let injection = attack.on_response(&mut session, &response());
        assert_eq!(injection.verdict, Verdict::TriggerReached);
        assert_eq!(injection.frames.len(), 1);
        assert!(!injection.frames[0].capture);

        let LinkPdu::Data(pdu) = &injection.frames[0].packet.pdu else {
            panic!("expected a data PDU");
        };
        match &pdu.payload {
            DataPayload::Control(ControlPdu::EncReq(req)) => {
                assert_eq!(req.rand, 0);
                assert_eq!(req.ediv, 0);
                assert_eq!(req.skd_m, 0);
                assert_eq!(req.iv_m, 0);
            }
            other => panic!("unexpected payload {:?}", other),
        }

        // A second response in the same attempt is not answered again
        let again = attack.on_response(&mut session, &response());
        assert!(again.frames.is_empty());
    }

    #[test]
    fn test_key_size_waits_on_other_frames() {
        let attack = KeySizeOverflowAttack::default();
        let mut session = session();
        attack.on_negotiation_complete(&mut session);

        for event in [
            Event::DataPdu { is_empty: true },
            Event::Sm(SmPdu::PairingFailed { reason: 0x06 }),
            Event::Att(AttPdu::ExchangeMtuRsp { mtu: 23 }),
        ] {
            let injection = attack.on_response(&mut session, &event);
            assert_eq!(injection.verdict, Verdict::Continue);
            assert!(injection.frames.is_empty());
        }
    }

    #[test]
    fn test_key_size_from_params() {
        let params = AttackParams::parse_pairs(&["max_key_size=17", "key_distribution=0x01"]).unwrap();
        let attack = KeySizeOverflowAttack::from_params(&params).unwrap();
        assert_eq!(attack.pairing().max_key_size, 17);
        assert_eq!(attack.pairing().initiator_key_distribution, 0x01);
        assert_eq!(attack.pairing().auth_req, 0x05);

        let params = AttackParams::parse_pairs(&["max_key_size=300"]).unwrap();
        assert!(KeySizeOverflowAttack::from_params(&params).is_err());
    }

    #[test]
    fn test_sequential_att_burst() {
        let attack = SequentialAttAttack::default();
        let mut session = session();

        let injection = attack.on_negotiation_complete(&mut session);
        assert_eq!(injection.verdict, Verdict::TriggerReached);
        assert_eq!(injection.frames.len(), 2);
        for frame in &injection.frames {
            let LinkPdu::Data(pdu) = &frame.packet.pdu else {
                panic!("expected a data PDU");
            };
            let DataPayload::L2cap(l2cap) = &pdu.payload else {
                panic!("expected L2CAP");
            };
            assert_eq!(l2cap.payload, L2capPayload::Att(AttPdu::ExchangeMtuReq { mtu: 247 }));
        }
        assert_eq!(attack.reset_trigger(), ResetTrigger::Immediate);
    }

    #[test]
    fn test_sequential_att_rejects_zero_requests() {
        assert!(SequentialAttAttack::new(247, 0).is_err());

        let params = AttackParams::parse_pairs(&["requests=3", "mtu=517"]).unwrap();
        let attack = SequentialAttAttack::from_params(&params).unwrap();
        assert_eq!(attack.requests(), 3);
        assert_eq!(attack.mtu(), 517);
    }
}

#[cfg(test)]
mod protocol_tests {
    use crate::ble::protocol::*;
    use bleshock_core::{AttackId, AttackParams, Error};

    #[test]
    fn test_catalogue() {
        let ble = BleProtocol::new();
        assert_eq!(ble.attacks().len(), 2);
        assert_eq!(ble.attacks()[0].shortname, "key-size-overflow");
        assert_eq!(ble.attacks()[1].shortname, "sequential-att");
        assert_eq!(ble.attacks()[0].capture_file(), "key-size-overflow.pcap");
    }

    #[test]
    fn test_find_by_id_or_name() {
        let ble = BleProtocol::new();
        assert_eq!(ble.find("1").map(|a| a.id), Some(AttackId(1)));
        assert_eq!(ble.find("Key-Size-Overflow").map(|a| a.id), Some(KEY_SIZE_OVERFLOW));
        assert!(ble.find("7").is_none());
        assert!(ble.find("jamming").is_none());
    }

    #[test]
    fn test_build() {
        let ble = BleProtocol::new();
        let strategy = ble.build("sequential-att", &AttackParams::new()).unwrap();
        assert_eq!(strategy.name(), "sequential-att");

        let strategy = ble.build("0", &AttackParams::new()).unwrap();
        assert_eq!(strategy.name(), "key-size-overflow");
    }

    #[test]
    fn test_build_errors() {
        let ble = BleProtocol::new();
        assert!(matches!(
            ble.build("jamming", &AttackParams::new()),
            Err(Error::NotFound(_))
        ));

        let params = AttackParams::parse_pairs(&["mtu=100"]).unwrap();
        assert!(matches!(
            ble.build("key-size-overflow", &params),
            Err(Error::InvalidParameter { .. })
        ));
    }
}

#[cfg(test)]
mod harness_tests {
    use crate::ble::protocol::BleProtocol;
    use bleshock_attack::testing::{MemorySink, MockTransport};
    use bleshock_attack::{ConnectionState, Harness, HarnessConfig, CRASH_TIMEOUT};
    use bleshock_core::AttackParams;
    use bleshock_packet::{
        AddressType, AdvPayload, AdvertisingPdu, BtlePacket, ControlPdu, DataPdu, LengthParams,
        PairingParams, SmPdu, VersionInd,
    };
    use std::time::{Duration, Instant};

    const AA: u32 = 0x9A32_8370;
    const CRC: u32 = 0x17_9A9C;

    fn advert() -> Vec<u8> {
        BtlePacket::advertising(
            AdvertisingPdu::new(AdvPayload::AdvInd {
                adv_a: HarnessConfig::default().peer_address,
                data: vec![0x02, 0x01, 0x06],
            })
            .with_tx_add(AddressType::Public),
        )
        .to_bytes(CRC)
    }

    fn negotiation(transport: &mut MockTransport) {
        transport.push_inbound(advert());
        transport.push_inbound(
            BtlePacket::control(AA, ControlPdu::FeatureRsp { features: 0x01 }).to_bytes(CRC),
        );
        transport.push_inbound(
            BtlePacket::control(AA, ControlPdu::VersionInd(VersionInd::v4_2())).to_bytes(CRC),
        );
        transport.push_inbound(
            BtlePacket::control(AA, ControlPdu::LengthRsp(LengthParams::symmetric(251)))
                .to_bytes(CRC),
        );
    }

    fn sent(harness: &Harness<MockTransport>) -> Vec<BtlePacket> {
        harness
            .transport()
            .sent()
            .iter()
            .filter_map(|raw| BtlePacket::from_bytes(raw))
            .collect()
    }

    fn names(packets: &[BtlePacket]) -> Vec<String> {
        packets
            .iter()
            .map(|p| p.summary().split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    fn build(attack: &str, transport: MockTransport) -> Harness<MockTransport> {
        let strategy = BleProtocol::new()
            .build(attack, &AttackParams::new())
            .unwrap();
        Harness::new(HarnessConfig::default(), transport, strategy).unwrap()
    }

    #[test]
    fn test_key_size_overflow_sequence() {
        let mut transport = MockTransport::new();
        negotiation(&mut transport);
        transport.push_inbound(
            BtlePacket::sm(
                AA,
                SmPdu::PairingResponse(PairingParams {
                    io_capability: 3,
                    oob_data_flag: 0,
                    auth_req: 0x01,
                    max_key_size: 16,
                    initiator_key_distribution: 0,
                    responder_key_distribution: 1,
                }),
            )
            .to_bytes(CRC),
        );

        let sink = MemorySink::new();
        let mut harness = build("key-size-overflow", transport).with_sink(Box::new(sink.clone()));
        let t0 = Instant::now();
        for i in 0..5 {
            harness.step(t0 + Duration::from_millis(i * 10)).unwrap();
        }
        assert_eq!(harness.session().state, ConnectionState::ResetPending);

        let packets = sent(&harness);
        assert_eq!(
            names(&packets),
            vec![
                "SCAN_REQ",
                "CONNECT_REQ",
                "LL_VERSION_IND",
                "LL_LENGTH_REQ",
                "SM_PAIRING_REQUEST",
                "LL_ENC_REQ"
            ]
        );
        let pairing = packets
            .iter()
            .filter_map(|p| match bleshock_attack::classify(p) {
                bleshock_attack::Event::Sm(SmPdu::PairingRequest(params)) => Some(params),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(pairing.len(), 1);
        assert!(pairing[0].max_key_size > 16);

        // The pairing request is the capture artifact
        assert_eq!(sink.len(), 1);
        let captured = BtlePacket::from_bytes(&sink.packets()[0].data).unwrap();
        assert_eq!(captured.summary(), "SM_PAIRING_REQUEST");

        // Next frame resets and arms crash detection
        harness
            .transport_mut()
            .push_inbound(BtlePacket::data(AA, DataPdu::empty()).to_bytes(CRC));
        harness.step(t0 + Duration::from_millis(60)).unwrap();
        assert_eq!(harness.session().state, ConnectionState::Scanning);
        assert_eq!(names(&sent(&harness)).last().map(String::as_str), Some("SCAN_REQ"));
        assert!(harness.timers().is_active(CRASH_TIMEOUT));
    }

    #[test]
    fn test_key_size_overflow_liveness_lost() {
        let mut transport = MockTransport::new();
        negotiation(&mut transport);
        transport.push_inbound(
            BtlePacket::sm(
                AA,
                SmPdu::PairingResponse(PairingParams {
                    io_capability: 3,
                    oob_data_flag: 0,
                    auth_req: 0,
                    max_key_size: 16,
                    initiator_key_distribution: 0,
                    responder_key_distribution: 0,
                }),
            )
            .to_bytes(CRC),
        );
        transport.push_inbound(BtlePacket::data(AA, DataPdu::empty()).to_bytes(CRC));

        let mut harness = build("key-size-overflow", transport);
        let t0 = Instant::now();
        for i in 0..6 {
            harness.step(t0 + Duration::from_millis(i * 10)).unwrap();
        }
        assert_eq!(harness.stats().resets, 1);

        // The peer stays silent; scanning continues past the crash timeout
        for second in 1..=10 {
            harness.step(t0 + Duration::from_secs(second)).unwrap();
        }
        assert_eq!(harness.stats().liveness_failures, 1);
        assert_eq!(harness.session().state, ConnectionState::Scanning);
        assert!(names(&sent(&harness)).ends_with(&["SCAN_REQ".to_string()]));
    }

    #[test]
    fn test_sequential_att_sequence() {
        let mut transport = MockTransport::new();
        negotiation(&mut transport);

        let mut harness = build("sequential-att", transport);
        let t0 = Instant::now();
        for i in 0..4 {
            harness.step(t0 + Duration::from_millis(i * 10)).unwrap();
        }

        let names = names(&sent(&harness));
        assert_eq!(
            names,
            vec![
                "SCAN_REQ",
                "CONNECT_REQ",
                "LL_VERSION_IND",
                "LL_LENGTH_REQ",
                "ATT_EXCHANGE_MTU_REQ",
                "ATT_EXCHANGE_MTU_REQ",
                "SCAN_REQ"
            ]
        );
        assert_eq!(harness.session().state, ConnectionState::Scanning);
        assert_eq!(harness.stats().resets, 1);
        assert!(harness.timers().is_active(CRASH_TIMEOUT));
    }

    #[test]
    fn test_sequential_att_repeats_after_readvertising() {
        let mut transport = MockTransport::new();
        negotiation(&mut transport);
        negotiation(&mut transport);

        let mut harness = build("sequential-att", transport);
        let t0 = Instant::now();
        for i in 0..8 {
            harness.step(t0 + Duration::from_millis(i * 10)).unwrap();
        }

        let mtu_requests = names(&sent(&harness))
            .iter()
            .filter(|n| n.as_str() == "ATT_EXCHANGE_MTU_REQ")
            .count();
        assert_eq!(mtu_requests, 4);
        assert_eq!(harness.stats().connection_attempts, 2);
        assert_eq!(harness.stats().resets, 2);
    }
}
