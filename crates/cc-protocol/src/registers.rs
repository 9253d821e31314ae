//! CC1101 register parameter encoding
//!
//! The bridge microcontroller programs the transceiver from a packed record of
//! register words. This module computes that record from a [`RadioLinkConfig`].
//!
//! # Register formulas
//! ```text
//! Fcarrier  = (Fxosc / 2^16) * FREQ[23..0]
//! Fif       = (Fxosc / 2^10) * FREQ_IF[4..0]
//! Rate      = (Fxosc / 2^28) * (256 + DRATE_M) * 2^DRATE_E
//! Deviation = (Fxosc / 2^17) * (8 + DEVIATION_M) * 2^DEVIATION_E
//! ChanBW    =  Fxosc / (8 * (4 + CHANBW_M) * 2^CHANBW_E)
//! ChanSpc   = (Fxosc / 2^18) * (256 + CHANSPC_M) * 2^CHANSPC_E
//! ```

use std::num::NonZeroU32;

use tracing::warn;

use crate::config::{DataRate, Modulation, Preamble, RadioLinkConfig, DEFAULT_CRYSTAL_HZ};
use crate::error::ProtocolError;

/// Serialized size of [`RadioRegisterParms`] on the wire
pub const PARMS_LEN: usize = 19;

/// 4-FSK symbol rate ceiling of the CC1101
pub const FSK4_MAX_RATE: f64 = 300_000.0;

const FREQ_WORD_MASK: u64 = 0x00FF_FFFF;

/// Channel filter bandwidth thresholds in Hz, indexed by `4 * exponent + mantissa`
const CHANBW_LIMITS: [f64; 16] = [
    812_000.0, 650_000.0, 541_000.0, 464_000.0, //
    406_000.0, 325_000.0, 270_000.0, 232_000.0, //
    203_000.0, 162_000.0, 135_000.0, 116_000.0, //
    102_000.0, 81_000.0, 68_000.0, 58_000.0,
];

/// Sync word qualifier modes (MDMCFG2.SYNC_MODE)
pub mod sync_mode {
    /// 30 of 32 sync word bits detected
    pub const SYNC_30_OF_32: u8 = 3;
}

/// Bits of the combined FEC/whitening byte
pub mod coding {
    /// Forward error correction enabled
    pub const FEC: u8 = 0x01;
    /// Data whitening enabled
    pub const WHITENING: u8 = 0x02;
}

/// Packet length handling (PKTCTRL0.LENGTH_CONFIG)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketLengthMode {
    /// Length is configured by the packet length register
    Fixed = 0,
    /// Length is given by the first byte after the sync word
    Variable = 1,
}

impl TryFrom<u8> for PacketLengthMode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Fixed),
            1 => Ok(Self::Variable),
            _ => Err(ProtocolError::InvalidField {
                field: "packet_config",
                value,
            }),
        }
    }
}

/// Channel filter bandwidth setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelBandwidth {
    /// CHANBW_E (2 bits)
    pub exponent: u8,
    /// CHANBW_M (2 bits)
    pub mantissa: u8,
}

impl ChannelBandwidth {
    /// Narrowest filter the transceiver offers
    pub const NARROWEST: Self = Self {
        exponent: 3,
        mantissa: 3,
    };

    /// Position in the threshold table (0 = widest)
    pub fn index(&self) -> usize {
        4 * usize::from(self.exponent & 0x03) + usize::from(self.mantissa & 0x03)
    }

    /// Rank by filter width (0 = narrowest, 15 = widest)
    pub fn ordinal(&self) -> usize {
        CHANBW_LIMITS.len() - 1 - self.index()
    }
}

/// Data rate, deviation and bandwidth words derived together
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateWords {
    /// Symbol rate actually requested after skew and clamping, in baud
    pub rate_baud: f64,
    /// Requested deviation in Hz
    pub deviation_hz: f64,
    /// Channel filter chosen by Carson's rule
    pub bandwidth: ChannelBandwidth,
    pub drate_m: u8,
    pub drate_e: u8,
    pub deviat_m: u8,
    pub deviat_e: u8,
}

/// Register words sent to the bridge in an INIT envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadioRegisterParms {
    /// FREQ[23..0]
    pub freq_word: u32,
    /// FREQ_IF[4..0]
    pub if_word: u8,
    /// SYNC_MODE, see [`sync_mode`]
    pub sync_word: u8,
    pub chanspc_m: u8,
    pub chanspc_e: u8,
    pub chanbw_m: u8,
    pub chanbw_e: u8,
    pub drate_m: u8,
    pub drate_e: u8,
    /// See [`coding`]
    pub fec_whitening: u8,
    /// MOD_FORMAT[2..0]
    pub mod_word: u8,
    pub packet_length: u8,
    pub packet_config: PacketLengthMode,
    /// NUM_PREAMBLE[2..0]
    pub preamble_word: u8,
    pub deviat_m: u8,
    pub deviat_e: u8,
}

impl RadioRegisterParms {
    /// Whether forward error correction is on
    pub fn fec(&self) -> bool {
        self.fec_whitening & coding::FEC != 0
    }

    /// Whether data whitening is on
    pub fn whitening(&self) -> bool {
        self.fec_whitening & coding::WHITENING != 0
    }

    /// Serialize in the bridge's packed little-endian layout
    pub fn to_bytes(&self) -> [u8; PARMS_LEN] {
        let freq = self.freq_word.to_le_bytes();
        [
            freq[0],
            freq[1],
            freq[2],
            freq[3],
            self.if_word,
            self.sync_word,
            self.chanspc_m,
            self.chanspc_e,
            self.chanbw_m,
            self.chanbw_e,
            self.drate_m,
            self.drate_e,
            self.fec_whitening,
            self.mod_word,
            self.packet_length,
            self.packet_config as u8,
            self.preamble_word,
            self.deviat_m,
            self.deviat_e,
        ]
    }

    /// Parse the packed layout produced by [`Self::to_bytes`]
    ///
    /// Every field is masked to its register width.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != PARMS_LEN {
            return Err(ProtocolError::LengthMismatch {
                expected: PARMS_LEN,
                actual: bytes.len(),
            });
        }

        let freq_word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

        Ok(Self {
            freq_word: freq_word & FREQ_WORD_MASK as u32,
            if_word: bytes[4] & 0x1F,
            sync_word: bytes[5] & 0x07,
            chanspc_m: bytes[6],
            chanspc_e: bytes[7] & 0x03,
            chanbw_m: bytes[8] & 0x03,
            chanbw_e: bytes[9] & 0x03,
            drate_m: bytes[10],
            drate_e: bytes[11] & 0x0F,
            fec_whitening: bytes[12] & (coding::FEC | coding::WHITENING),
            mod_word: bytes[13] & 0x07,
            packet_length: bytes[14],
            packet_config: PacketLengthMode::try_from(bytes[15])?,
            preamble_word: bytes[16] & 0x07,
            deviat_m: bytes[17] & 0x07,
            deviat_e: bytes[18] & 0x07,
        })
    }
}

/// Actual link parameters recovered from register words
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActualParameters {
    pub frequency_hz: f64,
    pub if_frequency_hz: f64,
    pub channel_spacing_hz: f64,
    pub channel_bandwidth_hz: f64,
    pub rate_baud: f64,
    pub deviation_hz: f64,
    pub modulation: Modulation,
    pub fec: bool,
    pub whitening: bool,
    pub packet_length: u8,
    pub preamble: Preamble,
    pub packet_time_us: f64,
    pub byte_time_us: f64,
}

/// Computes CC1101 register words for a given crystal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterEncoder {
    crystal_hz: NonZeroU32,
}

impl Default for RegisterEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterEncoder {
    /// Encoder for the reference 26 MHz crystal
    pub fn new() -> Self {
        Self {
            crystal_hz: NonZeroU32::new(DEFAULT_CRYSTAL_HZ).unwrap_or(NonZeroU32::MIN),
        }
    }

    /// Encoder for another crystal
    pub fn with_crystal(crystal_hz: NonZeroU32) -> Self {
        Self { crystal_hz }
    }

    /// Crystal frequency in Hz
    pub fn crystal_hz(&self) -> u32 {
        self.crystal_hz.get()
    }

    fn xtal(&self) -> f64 {
        f64::from(self.crystal_hz.get())
    }

    /// FREQ[23..0] for a carrier frequency
    pub fn frequency_word(&self, freq_hz: u32) -> u32 {
        let word = (u64::from(freq_hz) << 16) / u64::from(self.crystal_hz.get());
        (word & FREQ_WORD_MASK) as u32
    }

    /// FREQ_IF[4..0] for an intermediate frequency
    pub fn if_word(&self, if_hz: u32) -> u8 {
        let word = (u64::from(if_hz) << 10) / u64::from(self.crystal_hz.get());
        (word % 32) as u8
    }

    /// MOD_FORMAT word for a scheme
    ///
    /// `Modulation::None` encodes as 2-FSK (0) without complaint. The bridge
    /// has always received 0 for an unset scheme and relies on it.
    pub fn modulation_word(scheme: Modulation) -> u8 {
        match scheme {
            Modulation::Fsk2 => 0,
            Modulation::Gfsk => 1,
            Modulation::Ook => 3,
            Modulation::Fsk4 => 4,
            Modulation::Msk => 7,
            Modulation::None => 0,
        }
    }

    /// Scheme for a MOD_FORMAT word, `Modulation::None` if unmapped
    pub fn modulation_scheme(word: u8) -> Modulation {
        match word {
            0 => Modulation::Fsk2,
            1 => Modulation::Gfsk,
            3 => Modulation::Ook,
            4 => Modulation::Fsk4,
            7 => Modulation::Msk,
            _ => Modulation::None,
        }
    }

    /// Widest-first search for the first filter narrower than `required_hz`
    ///
    /// Falls back to [`ChannelBandwidth::NARROWEST`] when the requirement is
    /// below every tabulated filter.
    pub fn channel_bandwidth(required_hz: f64) -> ChannelBandwidth {
        for exponent in 0..4u8 {
            for mantissa in 0..4u8 {
                let index = 4 * usize::from(exponent) + usize::from(mantissa);
                if CHANBW_LIMITS
                    .get(index)
                    .is_some_and(|&limit| required_hz > limit)
                {
                    return ChannelBandwidth { exponent, mantissa };
                }
            }
        }

        ChannelBandwidth::NARROWEST
    }

    /// Data rate, deviation and channel bandwidth words
    ///
    /// 4-FSK rates above [`FSK4_MAX_RATE`] are clamped with a warning.
    pub fn data_rate_and_deviation(
        &self,
        base: DataRate,
        skew: f64,
        modulation_index: f64,
        scheme: Modulation,
    ) -> RateWords {
        let mut rate = f64::from(base.baud()) * skew;

        if scheme == Modulation::Fsk4 && rate > FSK4_MAX_RATE {
            warn!(
                "Forcibly setting data rate to {} baud for 4-FSK (requested {:.0})",
                FSK4_MAX_RATE, rate
            );
            rate = FSK4_MAX_RATE;
        }

        let deviation = rate * modulation_index;
        // Carson's rule
        let bandwidth = Self::channel_bandwidth(2.0 * (deviation + rate));

        let (drate_m, drate_e) = float_words(rate * f64::from(1u32 << 20) / self.xtal(), 8);
        let (deviat_m, deviat_e) =
            float_words(deviation * f64::from(1u32 << 14) / self.xtal(), 3);

        RateWords {
            rate_baud: rate,
            deviation_hz: deviation,
            bandwidth,
            drate_m: (drate_m & 0xFF) as u8,
            drate_e: (drate_e & 0x0F) as u8,
            deviat_m: (deviat_m & 0x07) as u8,
            deviat_e: (deviat_e & 0x07) as u8,
        }
    }

    /// Encode a full configuration
    pub fn encode(&self, config: &RadioLinkConfig) -> RadioRegisterParms {
        let rate = self.data_rate_and_deviation(
            config.rate,
            config.rate_skew,
            config.modulation_index,
            config.modulation,
        );

        let mut fec_whitening = 0;
        if config.fec {
            fec_whitening |= coding::FEC;
        }
        if config.whitening {
            fec_whitening |= coding::WHITENING;
        }

        RadioRegisterParms {
            freq_word: self.frequency_word(config.frequency_hz),
            if_word: self.if_word(config.if_frequency_hz),
            sync_word: sync_mode::SYNC_30_OF_32,
            // channel spacing is not used
            chanspc_m: 0,
            chanspc_e: 0,
            chanbw_m: rate.bandwidth.mantissa,
            chanbw_e: rate.bandwidth.exponent,
            drate_m: rate.drate_m,
            drate_e: rate.drate_e,
            fec_whitening,
            mod_word: Self::modulation_word(config.modulation),
            packet_length: config.packet_length,
            packet_config: if config.variable_length {
                PacketLengthMode::Variable
            } else {
                PacketLengthMode::Fixed
            },
            preamble_word: config.preamble.code(),
            deviat_m: rate.deviat_m,
            deviat_e: rate.deviat_e,
        }
    }

    /// Symbol rate programmed by the data rate words, in baud
    pub fn effective_rate(&self, parms: &RadioRegisterParms) -> f64 {
        self.xtal() / f64::from(1u32 << 28)
            * (256.0 + f64::from(parms.drate_m))
            * f64::from(1u32 << (parms.drate_e & 0x0F))
    }

    /// Time on air of one data byte in microseconds
    pub fn byte_time_us(&self, parms: &RadioRegisterParms) -> f64 {
        let bits_per_symbol = Self::modulation_scheme(parms.mod_word).bits_per_symbol();
        let mut time = 8_000_000.0 / (self.effective_rate(parms) * f64::from(bits_per_symbol));

        if parms.fec() {
            time *= 2.0;
        }

        time
    }

    /// Carrier frequency programmed by FREQ[23..0]
    pub fn operating_frequency_hz(&self, parms: &RadioRegisterParms) -> f64 {
        self.xtal() / f64::from(1u32 << 16) * f64::from(parms.freq_word)
    }

    /// Intermediate frequency programmed by FREQ_IF
    pub fn intermediate_frequency_hz(&self, parms: &RadioRegisterParms) -> f64 {
        self.xtal() / f64::from(1u32 << 10) * f64::from(parms.if_word)
    }

    pub fn channel_spacing_hz(&self, parms: &RadioRegisterParms) -> f64 {
        self.xtal() / f64::from(1u32 << 18)
            * (256.0 + f64::from(parms.chanspc_m))
            * f64::from(1u32 << (parms.chanspc_e & 0x03))
    }

    pub fn channel_bandwidth_hz(&self, parms: &RadioRegisterParms) -> f64 {
        self.xtal()
            / (8.0
                * (4.0 + f64::from(parms.chanbw_m & 0x03))
                * f64::from(1u32 << (parms.chanbw_e & 0x03)))
    }

    pub fn deviation_hz(&self, parms: &RadioRegisterParms) -> f64 {
        self.xtal() / f64::from(1u32 << 17)
            * (8.0 + f64::from(parms.deviat_m & 0x07))
            * f64::from(1u32 << (parms.deviat_e & 0x07))
    }

    /// Time on air of a full packet in microseconds
    pub fn packet_time_us(&self, parms: &RadioRegisterParms) -> f64 {
        f64::from(parms.packet_length) * self.byte_time_us(parms)
    }

    /// Everything the register words actually program, for diagnostics
    pub fn actual_parameters(&self, parms: &RadioRegisterParms) -> ActualParameters {
        ActualParameters {
            frequency_hz: self.operating_frequency_hz(parms),
            if_frequency_hz: self.intermediate_frequency_hz(parms),
            channel_spacing_hz: self.channel_spacing_hz(parms),
            channel_bandwidth_hz: self.channel_bandwidth_hz(parms),
            rate_baud: self.effective_rate(parms),
            deviation_hz: self.deviation_hz(parms),
            modulation: Self::modulation_scheme(parms.mod_word),
            fec: parms.fec(),
            whitening: parms.whitening(),
            packet_length: parms.packet_length,
            preamble: Preamble::from_code(parms.preamble_word),
            packet_time_us: self.packet_time_us(parms),
            byte_time_us: self.byte_time_us(parms),
        }
    }
}

/// Split a value normalized to the smallest exponent step into
/// `(mantissa, exponent)` with an implicit leading one above `mantissa_bits`
///
/// Values below the smallest step saturate at `(0, 0)`. A mantissa that rounds
/// up to the implicit bit carries into the exponent.
fn float_words(normalized: f64, mantissa_bits: u32) -> (u32, u32) {
    if !normalized.is_finite() || normalized <= 0.0 {
        return (0, 0);
    }

    let one = f64::from(1u32 << mantissa_bits);

    if normalized < 1.0 {
        let mantissa = (normalized * one).round() - one;
        return (mantissa.max(0.0) as u32, 0);
    }

    let mut exponent = normalized.log2().floor() as u32;
    let mut mantissa = (normalized / 2f64.powi(exponent as i32) * one).round() - one;

    if mantissa >= one {
        mantissa = 0.0;
        exponent += 1;
    }

    (mantissa.max(0.0) as u32, exponent)
}
