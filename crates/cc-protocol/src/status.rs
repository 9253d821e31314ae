//! Radio status decoding
//!
//! The bridge answers a STATUS_QUERY with the twelve CC1101 status registers
//! read in one burst:
//!
//! ```text
//! offset  register     content
//!  0      PARTNUM      part number
//!  1      VERSION      chip version
//!  2      FREQEST      frequency offset estimate
//!  3      LQI          CRC_OK (bit 7) | LQI (bits 6-0)
//!  4      RSSI         raw signal strength
//!  5      MARCSTATE    FSM state (bits 4-0)
//!  6-7    WORTIME1/0   wake-on-radio timer, big-endian
//!  8      PKTSTATUS    CS | PQT | CCA | SFD | GDO2 | - | GDO0
//!  9      VCO_VC_DAC   PLL calibration value
//! 10      TXBYTES      underflow (bit 7) | count (bits 6-0)
//! 11      RXBYTES      overflow (bit 7) | count (bits 6-0)
//! ```

use crate::error::ProtocolError;

/// Length of the status payload
pub const STATUS_LEN: usize = 12;

/// PKTSTATUS bit flags
pub mod pkt_status {
    /// Carrier sense
    pub const CARRIER_SENSE: u8 = 0x40;
    /// Preamble quality threshold reached
    pub const PQT_REACHED: u8 = 0x20;
    /// Channel is clear
    pub const CLEAR_CHANNEL: u8 = 0x10;
    /// Start of frame delimiter seen
    pub const SFD: u8 = 0x08;
    /// GDO2 pin level
    pub const GDO2: u8 = 0x04;
    /// GDO0 pin level
    pub const GDO0: u8 = 0x01;
}

const FIFO_FLAG: u8 = 0x80;
const FIFO_COUNT_MASK: u8 = 0x7F;

/// Convert a raw RSSI register byte to dBm
///
/// The register holds a two's complement value in half-dB steps with a
/// 74 dB offset.
pub fn rssi_dbm(raw: u8) -> f32 {
    if raw < 128 {
        f32::from(raw) / 2.0 - 74.0
    } else {
        (f32::from(raw) - 256.0) / 2.0 - 74.0
    }
}

/// CC1101 main radio control state machine states (MARCSTATE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FsmState {
    Sleep,
    Idle,
    Xoff,
    VcoonMc,
    RegonMc,
    Mancal,
    Vcoon,
    Regon,
    Startcal,
    Bwboost,
    FsLock,
    Ifadcon,
    Endcal,
    Rx,
    RxEnd,
    RxRst,
    TxrxSwitch,
    RxfifoOverflow,
    Fstxon,
    Tx,
    TxEnd,
    RxtxSwitch,
    TxfifoUnderflow,
    /// Codes 23-31 have no assigned state
    Undefined(u8),
}

const FSM_STATES: [FsmState; 23] = [
    FsmState::Sleep,
    FsmState::Idle,
    FsmState::Xoff,
    FsmState::VcoonMc,
    FsmState::RegonMc,
    FsmState::Mancal,
    FsmState::Vcoon,
    FsmState::Regon,
    FsmState::Startcal,
    FsmState::Bwboost,
    FsmState::FsLock,
    FsmState::Ifadcon,
    FsmState::Endcal,
    FsmState::Rx,
    FsmState::RxEnd,
    FsmState::RxRst,
    FsmState::TxrxSwitch,
    FsmState::RxfifoOverflow,
    FsmState::Fstxon,
    FsmState::Tx,
    FsmState::TxEnd,
    FsmState::RxtxSwitch,
    FsmState::TxfifoUnderflow,
];

impl FsmState {
    /// Decode a MARCSTATE value; only the low 5 bits are significant
    pub fn from_code(code: u8) -> Self {
        let code = code & 0x1F;
        FSM_STATES
            .get(usize::from(code))
            .copied()
            .unwrap_or(FsmState::Undefined(code))
    }

    /// The 5-bit MARCSTATE code
    pub fn code(&self) -> u8 {
        match self {
            FsmState::Undefined(code) => *code & 0x1F,
            state => FSM_STATES
                .iter()
                .position(|s| s == state)
                .map_or(0, |i| i as u8),
        }
    }

    /// Datasheet name of the state
    pub fn name(&self) -> &'static str {
        match self {
            FsmState::Sleep => "SLEEP",
            FsmState::Idle => "IDLE",
            FsmState::Xoff => "XOFF",
            FsmState::VcoonMc => "VCOON_MC",
            FsmState::RegonMc => "REGON_MC",
            FsmState::Mancal => "MANCAL",
            FsmState::Vcoon => "VCOON",
            FsmState::Regon => "REGON",
            FsmState::Startcal => "STARTCAL",
            FsmState::Bwboost => "BWBOOST",
            FsmState::FsLock => "FS_LOCK",
            FsmState::Ifadcon => "IFADCON",
            FsmState::Endcal => "ENDCAL",
            FsmState::Rx => "RX",
            FsmState::RxEnd => "RX_END",
            FsmState::RxRst => "RX_RST",
            FsmState::TxrxSwitch => "TXRX_SWITCH",
            FsmState::RxfifoOverflow => "RXFIFO_OVERFLOW",
            FsmState::Fstxon => "FSTXON",
            FsmState::Tx => "TX",
            FsmState::TxEnd => "TX_END",
            FsmState::RxtxSwitch => "RXTX_SWITCH",
            FsmState::TxfifoUnderflow => "TXFIFO_UNDERFLOW",
            FsmState::Undefined(_) => "undefined",
        }
    }
}

/// Decoded radio status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusRecord {
    pub part_number: u8,
    pub version: u8,
    pub freq_offset: u8,
    pub crc_ok: bool,
    /// Link quality indicator (7 bits)
    pub lqi: u8,
    /// Raw RSSI register, see [`rssi_dbm`]
    pub rssi_raw: u8,
    pub fsm_state: FsmState,
    pub wor_time: u16,
    pub carrier_sense: bool,
    pub preamble_quality_reached: bool,
    pub clear_channel: bool,
    pub start_of_frame: bool,
    pub gdo2: bool,
    pub gdo0: bool,
    pub vco_vc_dac: u8,
    pub tx_fifo_underflow: bool,
    pub tx_fifo_bytes: u8,
    pub rx_fifo_overflow: bool,
    pub rx_fifo_bytes: u8,
}

impl StatusRecord {
    /// Decode the 12-byte status payload
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let Some(regs) = payload.get(..STATUS_LEN) else {
            return Err(ProtocolError::LengthMismatch {
                expected: STATUS_LEN,
                actual: payload.len(),
            });
        };

        let pkt = regs[8];

        Ok(Self {
            part_number: regs[0],
            version: regs[1],
            freq_offset: regs[2],
            crc_ok: regs[3] & 0x80 != 0,
            lqi: regs[3] & 0x7F,
            rssi_raw: regs[4],
            fsm_state: FsmState::from_code(regs[5]),
            wor_time: u16::from_be_bytes([regs[6], regs[7]]),
            carrier_sense: pkt & pkt_status::CARRIER_SENSE != 0,
            preamble_quality_reached: pkt & pkt_status::PQT_REACHED != 0,
            clear_channel: pkt & pkt_status::CLEAR_CHANNEL != 0,
            start_of_frame: pkt & pkt_status::SFD != 0,
            gdo2: pkt & pkt_status::GDO2 != 0,
            gdo0: pkt & pkt_status::GDO0 != 0,
            vco_vc_dac: regs[9],
            tx_fifo_underflow: regs[10] & FIFO_FLAG != 0,
            tx_fifo_bytes: regs[10] & FIFO_COUNT_MASK,
            rx_fifo_overflow: regs[11] & FIFO_FLAG != 0,
            rx_fifo_bytes: regs[11] & FIFO_COUNT_MASK,
        })
    }

    /// Encode back to the register layout (used by simulators)
    pub fn encode(&self) -> [u8; STATUS_LEN] {
        let flag = |set: bool, bit: u8| if set { bit } else { 0 };
        let pkt = flag(self.carrier_sense, pkt_status::CARRIER_SENSE)
            | flag(self.preamble_quality_reached, pkt_status::PQT_REACHED)
            | flag(self.clear_channel, pkt_status::CLEAR_CHANNEL)
            | flag(self.start_of_frame, pkt_status::SFD)
            | flag(self.gdo2, pkt_status::GDO2)
            | flag(self.gdo0, pkt_status::GDO0);
        let wor = self.wor_time.to_be_bytes();

        [
            self.part_number,
            self.version,
            self.freq_offset,
            flag(self.crc_ok, 0x80) | (self.lqi & 0x7F),
            self.rssi_raw,
            self.fsm_state.code(),
            wor[0],
            wor[1],
            pkt,
            self.vco_vc_dac,
            flag(self.tx_fifo_underflow, FIFO_FLAG) | (self.tx_fifo_bytes & FIFO_COUNT_MASK),
            flag(self.rx_fifo_overflow, FIFO_FLAG) | (self.rx_fifo_bytes & FIFO_COUNT_MASK),
        ]
    }

    /// Signal strength in dBm
    pub fn rssi_dbm(&self) -> f32 {
        rssi_dbm(self.rssi_raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rssi_conversion() {
        assert_eq!(rssi_dbm(0), -74.0);
        assert_eq!(rssi_dbm(127), -10.5);
        assert_eq!(rssi_dbm(128), -138.0);
        assert_eq!(rssi_dbm(255), -74.5);
    }

    #[test]
    fn test_fsm_names() {
        assert_eq!(FsmState::from_code(1), FsmState::Idle);
        assert_eq!(FsmState::from_code(13).name(), "RX");
        assert_eq!(FsmState::from_code(22), FsmState::TxfifoUnderflow);
        for code in 23..32u8 {
            let state = FsmState::from_code(code);
            assert_eq!(state, FsmState::Undefined(code));
            assert_eq!(state.name(), "undefined");
        }
        // upper bits ignored
        assert_eq!(FsmState::from_code(0xE1), FsmState::Idle);
    }

    #[test]
    fn test_fsm_code_round_trip() {
        for code in 0..32u8 {
            assert_eq!(FsmState::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_decode_status() {
        let payload = [
            0x00, 0x14, 0xF3, 0xAA, 0x40, 0x0D, 0x12, 0x34, 0x7D, 0x95, 0x85, 0x3F,
        ];
        let status = StatusRecord::decode(&payload).unwrap();

        assert_eq!(status.version, 0x14);
        assert_eq!(status.freq_offset, 0xF3);
        assert!(status.crc_ok);
        assert_eq!(status.lqi, 0x2A);
        assert_eq!(status.rssi_dbm(), -42.0);
        assert_eq!(status.fsm_state, FsmState::Rx);
        assert_eq!(status.wor_time, 0x1234);
        assert!(status.carrier_sense);
        assert!(status.preamble_quality_reached);
        assert!(status.clear_channel);
        assert!(status.start_of_frame);
        assert!(status.gdo2);
        assert!(status.gdo0);
        assert_eq!(status.vco_vc_dac, 0x95);
        assert!(status.tx_fifo_underflow);
        assert_eq!(status.tx_fifo_bytes, 5);
        assert!(!status.rx_fifo_overflow);
        assert_eq!(status.rx_fifo_bytes, 0x3F);

        assert_eq!(status.encode(), payload);
    }

    #[test]
    fn test_decode_short_payload() {
        assert!(matches!(
            StatusRecord::decode(&[0u8; 11]),
            Err(ProtocolError::LengthMismatch {
                expected: 12,
                actual: 11
            })
        ));
    }
}
