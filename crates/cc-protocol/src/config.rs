//! High-level radio link configuration
//!
//! [`RadioLinkConfig`] is what a user thinks in: carrier frequency, data rate,
//! modulation. The [`crate::registers`] module turns it into register words.

/// Crystal frequency of the reference CC1101 module (26 MHz)
pub const DEFAULT_CRYSTAL_HZ: u32 = 26_000_000;

/// Modulation schemes understood by the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Modulation {
    /// Binary frequency shift keying
    Fsk2,
    /// Gaussian-filtered FSK
    Gfsk,
    /// On-off keying
    Ook,
    /// Quaternary FSK (2 bits per symbol)
    Fsk4,
    /// Minimum shift keying
    Msk,
    /// No modulation selected, or a word that maps to no scheme
    None,
}

impl Modulation {
    /// Returns a human-readable name for the scheme
    pub fn name(&self) -> &'static str {
        match self {
            Modulation::Fsk2 => "2-FSK",
            Modulation::Gfsk => "GFSK",
            Modulation::Ook => "OOK",
            Modulation::Fsk4 => "4-FSK",
            Modulation::Msk => "MSK",
            Modulation::None => "None",
        }
    }

    /// Number of data bits carried by one symbol
    pub fn bits_per_symbol(&self) -> u32 {
        match self {
            Modulation::Fsk4 => 2,
            _ => 1,
        }
    }
}

/// Base data rates selectable on the link, in baud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataRate {
    Baud50,
    Baud110,
    Baud300,
    Baud600,
    Baud1200,
    Baud2400,
    Baud4800,
    Baud9600,
    Baud14400,
    Baud19200,
    Baud28800,
    Baud38400,
    Baud57600,
    Baud76800,
    Baud115200,
    Baud250000,
    Baud500000,
}

const RATE_VALUES: [u32; 17] = [
    50, 110, 300, 600, 1_200, 2_400, 4_800, 9_600, 14_400, 19_200, 28_800, 38_400, 57_600,
    76_800, 115_200, 250_000, 500_000,
];

impl DataRate {
    /// All selectable rates, slowest first
    pub const ALL: [DataRate; 17] = [
        DataRate::Baud50,
        DataRate::Baud110,
        DataRate::Baud300,
        DataRate::Baud600,
        DataRate::Baud1200,
        DataRate::Baud2400,
        DataRate::Baud4800,
        DataRate::Baud9600,
        DataRate::Baud14400,
        DataRate::Baud19200,
        DataRate::Baud28800,
        DataRate::Baud38400,
        DataRate::Baud57600,
        DataRate::Baud76800,
        DataRate::Baud115200,
        DataRate::Baud250000,
        DataRate::Baud500000,
    ];

    /// Rate in baud
    pub fn baud(&self) -> u32 {
        RATE_VALUES[*self as usize]
    }
}

/// Number of preamble bytes sent before the sync word
///
/// The discriminant is the 3-bit NUM_PREAMBLE code programmed into MDMCFG1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Preamble {
    Bytes2 = 0,
    Bytes3 = 1,
    Bytes4 = 2,
    Bytes6 = 3,
    Bytes8 = 4,
    Bytes12 = 5,
    Bytes16 = 6,
    Bytes24 = 7,
}

impl Preamble {
    /// Register code for this preamble length
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Preamble length in bytes
    pub fn bytes(&self) -> u8 {
        match self {
            Preamble::Bytes2 => 2,
            Preamble::Bytes3 => 3,
            Preamble::Bytes4 => 4,
            Preamble::Bytes6 => 6,
            Preamble::Bytes8 => 8,
            Preamble::Bytes12 => 12,
            Preamble::Bytes16 => 16,
            Preamble::Bytes24 => 24,
        }
    }

    /// Decode a register code; only the low 3 bits are significant
    pub fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => Preamble::Bytes2,
            1 => Preamble::Bytes3,
            2 => Preamble::Bytes4,
            3 => Preamble::Bytes6,
            4 => Preamble::Bytes8,
            5 => Preamble::Bytes12,
            6 => Preamble::Bytes16,
            _ => Preamble::Bytes24,
        }
    }
}

/// Radio link parameters as requested by the user
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RadioLinkConfig {
    /// Carrier frequency in Hz
    pub frequency_hz: u32,
    /// Intermediate frequency in Hz
    pub if_frequency_hz: u32,
    /// Modulation scheme
    pub modulation: Modulation,
    /// Base data rate
    pub rate: DataRate,
    /// Multiplier applied to the base rate (fine tuning against crystal error)
    pub rate_skew: f64,
    /// Deviation to data rate ratio
    pub modulation_index: f64,
    /// Radio packet length in bytes
    pub packet_length: u8,
    /// Use variable packet length instead of fixed
    pub variable_length: bool,
    /// Enable forward error correction
    pub fec: bool,
    /// Enable data whitening
    pub whitening: bool,
    /// Preamble length
    pub preamble: Preamble,
}

impl Default for RadioLinkConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 433_600_000,
            if_frequency_hz: 310_000,
            modulation: Modulation::Fsk2,
            rate: DataRate::Baud9600,
            rate_skew: 1.0,
            modulation_index: 0.5,
            packet_length: 250,
            variable_length: false,
            fec: false,
            whitening: false,
            preamble: Preamble::Bytes4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_table_is_ascending() {
        let bauds: Vec<u32> = DataRate::ALL.iter().map(|r| r.baud()).collect();
        assert!(bauds.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(DataRate::Baud9600.baud(), 9_600);
        assert_eq!(DataRate::Baud500000.baud(), 500_000);
    }

    #[test]
    fn test_preamble_codes() {
        for code in 0..8u8 {
            assert_eq!(Preamble::from_code(code).code(), code);
        }
        assert_eq!(Preamble::Bytes4.bytes(), 4);
        assert_eq!(Preamble::from_code(0x0F), Preamble::Bytes24);
    }

    #[test]
    fn test_fsk4_carries_two_bits() {
        assert_eq!(Modulation::Fsk4.bits_per_symbol(), 2);
        assert_eq!(Modulation::Gfsk.bits_per_symbol(), 1);
    }
}
