//! Virtual bridge simulation
//!
//! Stands in for the microcontroller that sits between the serial port and
//! the CC1101. Envelopes written to it are parsed and answered the way the
//! bridge firmware answers them, and the replies are handed back through
//! non-blocking reads.

use std::collections::VecDeque;
use std::io;

use cc_link::ByteStream;
use cc_protocol::{
    CommandType, Envelope, EnvelopeCodec, FsmState, RadioRegisterParms, StatusRecord, TxBlock,
};
use tracing::{debug, warn};

/// CC1101 part number reported in the status registers
const PART_NUMBER: u8 = 0x00;
/// CC1101 silicon version reported in the status registers
const CHIP_VERSION: u8 = 0x14;

/// A simulated bridge that answers envelopes written to it
#[derive(Debug)]
pub struct VirtualBridge {
    /// Reassembles envelopes split across writes
    codec: EnvelopeCodec,
    /// Reply bytes waiting to be read
    pending_output: VecDeque<u8>,
    /// Register words from the last valid INIT
    last_parms: Option<RadioRegisterParms>,
    /// Status reported to STATUS_QUERY
    status: StatusRecord,
    /// Empty reads served before each new reply becomes visible
    reply_delay: u32,
    /// Empty reads left before the current reply becomes visible
    silent_polls: u32,
    /// Swallow requests without replying
    muted: bool,
    /// Every block received, in order
    blocks: Vec<TxBlock>,
    /// Number of complete envelopes handled
    requests: usize,
}

impl Default for VirtualBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualBridge {
    /// Create a bridge with an idle radio and immediate replies
    pub fn new() -> Self {
        Self {
            codec: EnvelopeCodec::new(),
            pending_output: VecDeque::new(),
            last_parms: None,
            status: idle_status(),
            reply_delay: 0,
            silent_polls: 0,
            muted: false,
            blocks: Vec::new(),
            requests: 0,
        }
    }

    /// Register words from the last INIT, if any
    pub fn last_parms(&self) -> Option<&RadioRegisterParms> {
        self.last_parms.as_ref()
    }

    /// Status reported to STATUS_QUERY
    pub fn status(&self) -> &StatusRecord {
        &self.status
    }

    /// Replace the status reported to STATUS_QUERY
    pub fn set_status(&mut self, status: StatusRecord) {
        self.status = status;
    }

    /// Serve `polls` empty reads before each reply
    pub fn set_reply_delay(&mut self, polls: u32) {
        self.reply_delay = polls;
    }

    /// Stop (or resume) answering requests
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Blocks received so far
    pub fn blocks(&self) -> &[TxBlock] {
        &self.blocks
    }

    /// Number of complete envelopes handled
    pub fn request_count(&self) -> usize {
        self.requests
    }

    /// Check if reply bytes are waiting
    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }

    /// Drop pending replies and any partial request
    pub fn clear(&mut self) {
        self.pending_output.clear();
        self.codec.clear();
        self.silent_polls = 0;
    }

    /// Handle one complete request envelope
    fn handle(&mut self, envelope: Envelope) {
        self.requests += 1;

        let reply = match envelope.command {
            CommandType::Init => match envelope.parms() {
                Ok(parms) => {
                    debug!("Bridge INIT, frequency word 0x{:06X}", parms.freq_word);
                    self.last_parms = Some(parms);
                    self.status.fsm_state = FsmState::Rx;
                    Envelope {
                        command: CommandType::Init,
                        payload: Vec::new(),
                    }
                }
                Err(e) => {
                    warn!("Bridge ignoring malformed INIT: {}", e);
                    return;
                }
            },
            CommandType::StatusQuery => Envelope {
                command: CommandType::StatusQuery,
                payload: self.status.encode().to_vec(),
            },
            CommandType::TxBlock => match TxBlock::from_payload(&envelope.payload) {
                Ok(block) => {
                    debug!(
                        "Bridge TX block of {} bytes, countdown {}",
                        block.data.len(),
                        block.countdown
                    );
                    let header = vec![block.data.len() as u8, block.countdown];
                    self.blocks.push(block);
                    Envelope {
                        command: CommandType::TxBlock,
                        payload: header,
                    }
                }
                Err(e) => {
                    warn!("Bridge ignoring malformed TX block: {}", e);
                    return;
                }
            },
        };

        if self.muted {
            debug!("Bridge muted, dropping {:?} reply", reply.command);
            return;
        }

        match reply.encode() {
            Ok(bytes) => {
                self.pending_output.extend(bytes);
                self.silent_polls = self.reply_delay;
            }
            Err(e) => warn!("Bridge could not encode reply: {}", e),
        }
    }
}

impl ByteStream for VirtualBridge {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.codec.push_bytes(data);
        while let Some(envelope) = self.codec.next_envelope() {
            self.handle(envelope);
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending_output.is_empty() {
            return Ok(0);
        }
        if self.silent_polls > 0 {
            self.silent_polls -= 1;
            return Ok(0);
        }

        let n = buf.len().min(self.pending_output.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending_output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    /// Drops every queued reply, including one still held back by the reply
    /// delay, the way clearing the port's input buffer would
    fn discard_input(&mut self) -> io::Result<usize> {
        let dropped = self.pending_output.len();
        self.pending_output.clear();
        self.silent_polls = 0;
        Ok(dropped)
    }
}

/// Status of a freshly powered radio sitting in IDLE
fn idle_status() -> StatusRecord {
    StatusRecord {
        part_number: PART_NUMBER,
        version: CHIP_VERSION,
        freq_offset: 0,
        crc_ok: false,
        lqi: 0,
        rssi_raw: 0x80,
        fsm_state: FsmState::Idle,
        wor_time: 0,
        carrier_sense: false,
        preamble_quality_reached: false,
        clear_channel: true,
        start_of_frame: false,
        gdo2: false,
        gdo0: false,
        vco_vc_dac: 0,
        tx_fifo_underflow: false,
        tx_fifo_bytes: 0,
        rx_fifo_overflow: false,
        rx_fifo_bytes: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_protocol::{RadioLinkConfig, RegisterEncoder, STATUS_LEN};

    fn read_all(bridge: &mut VirtualBridge) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let n = bridge.read(&mut buf).unwrap();
        buf[..n].to_vec()
    }

    #[test]
    fn test_new_bridge_is_idle() {
        let mut bridge = VirtualBridge::new();
        assert!(bridge.last_parms().is_none());
        assert_eq!(bridge.status().fsm_state, FsmState::Idle);
        assert!(!bridge.has_output());
        assert!(read_all(&mut bridge).is_empty());
    }

    #[test]
    fn test_init_is_recorded_and_acked() {
        let mut bridge = VirtualBridge::new();
        let parms = RegisterEncoder::new().encode(&RadioLinkConfig::default());
        let bytes = Envelope::init(&parms).encode().unwrap();

        assert_eq!(bridge.write(&bytes).unwrap(), bytes.len());
        assert_eq!(bridge.last_parms(), Some(&parms));
        assert_eq!(bridge.status().fsm_state, FsmState::Rx);
        assert_eq!(read_all(&mut bridge), vec![0x00, 0x00]);
    }

    #[test]
    fn test_split_write_is_reassembled() {
        let mut bridge = VirtualBridge::new();
        bridge.write(&[0x01]).unwrap();
        assert!(!bridge.has_output());

        bridge.write(&[0x00]).unwrap();
        let reply = read_all(&mut bridge);
        assert_eq!(reply.len(), 2 + STATUS_LEN);
        assert_eq!(&reply[..2], &[0x01, 0x0C]);
        assert_eq!(reply[3], CHIP_VERSION);
    }

    #[test]
    fn test_tx_block_echo() {
        let mut bridge = VirtualBridge::new();
        let block = TxBlock::new(4, vec![1, 2, 3]).unwrap();
        bridge
            .write(&Envelope::tx_block(&block).encode().unwrap())
            .unwrap();

        assert_eq!(read_all(&mut bridge), vec![0x02, 0x02, 3, 4]);
        assert_eq!(bridge.blocks(), &[block]);
    }

    #[test]
    fn test_reply_delay() {
        let mut bridge = VirtualBridge::new();
        bridge.set_reply_delay(2);
        bridge.write(&[0x01, 0x00]).unwrap();

        assert!(read_all(&mut bridge).is_empty());
        assert!(read_all(&mut bridge).is_empty());
        assert_eq!(read_all(&mut bridge).len(), 14);
    }

    #[test]
    fn test_muted_bridge_stays_silent() {
        let mut bridge = VirtualBridge::new();
        bridge.set_muted(true);
        bridge.write(&[0x01, 0x00]).unwrap();

        assert!(bridge.is_muted());
        assert!(!bridge.has_output());
        assert_eq!(bridge.request_count(), 1);
    }

    #[test]
    fn test_malformed_init_is_ignored() {
        let mut bridge = VirtualBridge::new();
        bridge.write(&[0x00, 0x02, 0xAA, 0xBB]).unwrap();

        assert!(bridge.last_parms().is_none());
        assert!(!bridge.has_output());
    }

    #[test]
    fn test_discard_drops_delayed_reply() {
        let mut bridge = VirtualBridge::new();
        bridge.set_reply_delay(5);
        bridge.write(&[0x01, 0x00]).unwrap();
        bridge.write(&[0x01]).unwrap();

        assert_eq!(bridge.discard_input().unwrap(), 2 + STATUS_LEN);
        assert!(!bridge.has_output());

        // The half-written request is still completed by the next write
        bridge.write(&[0x00]).unwrap();
        assert_eq!(bridge.request_count(), 2);
        assert!(bridge.has_output());
    }

    #[test]
    fn test_reads_are_chunked() {
        let mut bridge = VirtualBridge::new();
        bridge.write(&[0x01, 0x00]).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(bridge.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0x01, 0x0C, PART_NUMBER, CHIP_VERSION]);
        assert_eq!(read_all(&mut bridge).len(), 10);
    }
}
