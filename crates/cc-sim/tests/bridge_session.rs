//! Integration tests for the serial link against the virtual bridge
//!
//! These tests drive a `Transport` end to end through a `VirtualBridge`:
//! - INIT delivers exactly the encoded register words
//! - Status replies decode into the bridge's status
//! - TX blocks are framed, echoed and recorded
//! - Silent and muted bridges exhaust the attempt budget
//! - A late reply to a timed-out request never answers the next one

use std::io;
use std::time::Duration;

use cc_link::{ByteStream, LinkError, Sleeper, Transport, TransportConfig};
use cc_protocol::{
    CommandType, DataRate, FsmState, Modulation, RadioLinkConfig, RegisterEncoder, StatusRecord,
    TxBlock,
};
use cc_sim::VirtualBridge;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Sleeper that records the requested sleeps instead of waiting
    #[derive(Default)]
    pub struct RecordingSleeper {
        pub sleeps: u32,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, _duration: Duration) {
            self.sleeps += 1;
        }
    }

    pub const ATTEMPTS: u32 = 50;

    /// Transport over a fresh bridge with a small attempt budget
    pub fn link() -> Transport<VirtualBridge, RecordingSleeper> {
        link_with(VirtualBridge::new())
    }

    pub fn link_with(bridge: VirtualBridge) -> Transport<VirtualBridge, RecordingSleeper> {
        link_over(bridge, ATTEMPTS)
    }

    /// Transport over any stream with its own INIT budget
    pub fn link_over<S: ByteStream>(
        stream: S,
        init_attempts: u32,
    ) -> Transport<S, RecordingSleeper> {
        let config = TransportConfig {
            poll_interval: Duration::from_micros(10),
            init_attempts,
            status_attempts: ATTEMPTS,
        };
        Transport::with_sleeper(
            stream,
            RegisterEncoder::new(),
            config,
            RecordingSleeper::default(),
        )
    }

    /// Bridge whose input cannot be flushed, so late replies stay queued
    pub struct Unflushable(pub VirtualBridge);

    impl ByteStream for Unflushable {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.write(data)
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }

        fn discard_input(&mut self) -> io::Result<usize> {
            Ok(0)
        }
    }
}

// ============================================================================
// INIT
// ============================================================================

#[test]
fn test_init_delivers_encoded_parms() {
    let mut link = helpers::link();
    let config = RadioLinkConfig {
        frequency_hz: 868_300_000,
        modulation: Modulation::Gfsk,
        rate: DataRate::Baud38400,
        fec: true,
        ..Default::default()
    };

    let ack = link.send_init(&config).unwrap();
    assert_eq!(ack, 2);

    let expected = RegisterEncoder::new().encode(&config);
    assert_eq!(link.get_ref().last_parms(), Some(&expected));
    assert_eq!(link.parms(), Some(&expected));
    assert!(link.get_ref().last_parms().unwrap().fec());
}

#[test]
fn test_reinit_replaces_parms() {
    let mut link = helpers::link();
    link.send_init(&RadioLinkConfig::default()).unwrap();

    let second = RadioLinkConfig {
        frequency_hz: 315_000_000,
        ..Default::default()
    };
    link.send_init(&second).unwrap();

    let expected = RegisterEncoder::new().encode(&second);
    assert_eq!(link.get_ref().last_parms(), Some(&expected));
    assert_eq!(link.stats().inits, 2);
    assert_eq!(link.get_ref().request_count(), 2);
}

#[test]
fn test_init_waits_through_delay() {
    let mut bridge = VirtualBridge::new();
    bridge.set_reply_delay(10);
    let mut link = helpers::link_with(bridge);

    link.send_init(&RadioLinkConfig::default()).unwrap();
    assert!(link.parms().is_some());
}

// ============================================================================
// STATUS_QUERY
// ============================================================================

#[test]
fn test_status_after_init() {
    let mut link = helpers::link();
    link.send_init(&RadioLinkConfig::default()).unwrap();

    let status = link.query_status().unwrap();
    assert_eq!(status.fsm_state, FsmState::Rx);
    assert_eq!(status.version, 0x14);
    assert_eq!(&status, link.get_ref().status());
}

#[test]
fn test_status_reports_configured_registers() {
    let mut bridge = VirtualBridge::new();
    let mut wanted: StatusRecord = *bridge.status();
    wanted.crc_ok = true;
    wanted.lqi = 0x2A;
    wanted.rssi_raw = 0x10;
    wanted.wor_time = 0xBEEF;
    wanted.carrier_sense = true;
    wanted.fsm_state = FsmState::Tx;
    wanted.tx_fifo_bytes = 17;
    bridge.set_status(wanted);

    let mut link = helpers::link_with(bridge);
    let status = link.query_status().unwrap();

    assert_eq!(status, wanted);
    assert_eq!(status.rssi_dbm(), -66.0);
    assert_eq!(link.stats().status_queries, 1);
}

// ============================================================================
// TX_BLOCK
// ============================================================================

#[test]
fn test_blocks_are_recorded_in_order() {
    let mut link = helpers::link();
    let packet: Vec<u8> = (0..=255u8).cycle().take(600).collect();
    let chunks: Vec<&[u8]> = packet.chunks(253).collect();

    for (i, chunk) in chunks.iter().enumerate() {
        let countdown = (chunks.len() - 1 - i) as u8;
        let block = TxBlock::new(countdown, chunk.to_vec()).unwrap();
        let echoed = link.send_block(&block, Duration::from_millis(1)).unwrap();
        assert_eq!(echoed, 4);
        assert_eq!(link.last_reply(echoed)[2], chunk.len() as u8);
    }

    let blocks = link.get_ref().blocks();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].countdown, 2);
    assert_eq!(blocks[2].countdown, 0);
    let reassembled: Vec<u8> = blocks.iter().flat_map(|b| b.data.clone()).collect();
    assert_eq!(reassembled, packet);
    assert_eq!(link.stats().blocks_sent, 3);
}

#[test]
fn test_block_timeout_sets_budget() {
    let mut bridge = VirtualBridge::new();
    bridge.set_reply_delay(20);
    let mut link = helpers::link_with(bridge);
    let block = TxBlock::new(0, vec![0x55; 8]).unwrap();

    // 10 polls of 10 us cannot outlast a 20-poll delay
    let err = link
        .send_block(&block, Duration::from_micros(100))
        .unwrap_err();
    assert!(matches!(err, LinkError::NoReply { attempts: 10 }));

    // The block still reached the radio
    assert_eq!(link.get_ref().blocks().len(), 1);

    // Its late echo is dropped rather than read as the status
    let status = link.query_status().unwrap();
    assert_eq!(&status, link.get_ref().status());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_muted_bridge_exhausts_budget() {
    let mut bridge = VirtualBridge::new();
    bridge.set_muted(true);
    let mut link = helpers::link_with(bridge);

    let err = link.send_init(&RadioLinkConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        LinkError::NoReply {
            attempts: helpers::ATTEMPTS
        }
    ));
    assert!(err.is_transport_failure());
    assert!(link.parms().is_none());
    assert_eq!(link.stats().failures, 1);
}

#[test]
fn test_recovers_after_unmute() {
    let mut bridge = VirtualBridge::new();
    bridge.set_muted(true);
    let mut link = helpers::link_with(bridge);

    assert!(link.query_status().is_err());

    link.get_mut().set_muted(false);
    assert!(link.query_status().is_ok());
}

#[test]
fn test_status_after_init_timeout() {
    let mut bridge = VirtualBridge::new();
    bridge.set_reply_delay(10);
    let mut link = helpers::link_over(bridge, 5);

    let err = link.send_init(&RadioLinkConfig::default()).unwrap_err();
    assert!(matches!(err, LinkError::NoReply { attempts: 5 }));

    let status = link.query_status().unwrap();
    assert_eq!(&status, link.get_ref().status());
    assert_eq!(status.version, 0x14);
    assert_eq!(status.fsm_state, FsmState::Rx);
    assert_eq!(link.stats().status_queries, 1);
}

#[test]
fn test_late_init_ack_rejected_as_status() {
    let mut bridge = VirtualBridge::new();
    bridge.set_reply_delay(10);
    let mut link = helpers::link_over(helpers::Unflushable(bridge), 5);

    assert!(link.send_init(&RadioLinkConfig::default()).is_err());

    let err = link.query_status().unwrap_err();
    assert!(matches!(
        err,
        LinkError::UnexpectedReply {
            expected: CommandType::StatusQuery,
            got: 0x00
        }
    ));
    assert!(err.is_transport_failure());
    assert_eq!(link.stats().status_queries, 0);
    assert_eq!(link.stats().failures, 2);
}

#[test]
fn test_fsk4_clamp_reaches_bridge() {
    let mut link = helpers::link();
    let config = RadioLinkConfig {
        modulation: Modulation::Fsk4,
        rate: DataRate::Baud500000,
        ..Default::default()
    };
    link.send_init(&config).unwrap();

    let encoder = link.encoder();
    let parms = link.get_ref().last_parms().unwrap();
    let rate = encoder.effective_rate(parms);
    assert!((rate - 300_000.0).abs() / 300_000.0 < 1.0 / 256.0);
}

// ============================================================================
// Property Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn modulation() -> impl Strategy<Value = Modulation> {
        prop_oneof![
            Just(Modulation::Fsk2),
            Just(Modulation::Gfsk),
            Just(Modulation::Ook),
            Just(Modulation::Fsk4),
            Just(Modulation::Msk),
        ]
    }

    fn data_rate() -> impl Strategy<Value = DataRate> {
        prop::sample::select(DataRate::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn init_round_trips_through_bridge(
            frequency_hz in 300_000_000u32..928_000_000u32,
            modulation in modulation(),
            rate in data_rate(),
            packet_length in 1u8..=255,
            whitening in any::<bool>(),
        ) {
            let mut link = helpers::link();
            let config = RadioLinkConfig {
                frequency_hz,
                modulation,
                rate,
                packet_length,
                whitening,
                ..Default::default()
            };

            link.send_init(&config).unwrap();

            let expected = RegisterEncoder::new().encode(&config);
            prop_assert_eq!(link.get_ref().last_parms(), Some(&expected));
        }

        #[test]
        fn any_block_is_echoed(countdown in any::<u8>(), data in prop::collection::vec(any::<u8>(), 0..=253)) {
            let mut link = helpers::link();
            let block = TxBlock::new(countdown, data.clone()).unwrap();

            let n = link.send_block(&block, Duration::from_millis(1)).unwrap();
            prop_assert_eq!(link.last_reply(n), &[0x02, 0x02, data.len() as u8, countdown][..]);
            prop_assert_eq!(&link.get_ref().blocks()[0], &block);
        }
    }
}
