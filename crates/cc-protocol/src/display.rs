//! Human-readable reports for decoded parameters and status
//!
//! These only format; where the text ends up is the caller's business.

use std::fmt;

use crate::registers::{ActualParameters, RadioRegisterParms, RegisterEncoder};
use crate::status::StatusRecord;

/// Register words next to the values they program
pub struct ParmsReport<'a> {
    pub parms: &'a RadioRegisterParms,
    pub actual: ActualParameters,
}

impl<'a> ParmsReport<'a> {
    /// Report `parms` with values decoded by `encoder`
    pub fn new(parms: &'a RadioRegisterParms, encoder: &RegisterEncoder) -> Self {
        Self {
            parms,
            actual: encoder.actual_parameters(parms),
        }
    }
}

impl fmt::Display for ParmsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.parms;
        let a = &self.actual;
        let on_off = |b: bool| if b { "on" } else { "off" };

        writeln!(f, "--- Actual radio channel parameters ---")?;
        writeln!(
            f,
            "Operating frequency ....: {:.3} MHz (W={})",
            a.frequency_hz / 1e6,
            p.freq_word
        )?;
        writeln!(
            f,
            "Intermediate frequency .: {:.3} kHz (W={})",
            a.if_frequency_hz / 1e3,
            p.if_word
        )?;
        writeln!(
            f,
            "Channel spacing ........: {:.3} kHz (M={}, E={})",
            a.channel_spacing_hz / 1e3,
            p.chanspc_m,
            p.chanspc_e
        )?;
        writeln!(
            f,
            "Channel bandwidth.......: {:.3} kHz (M={}, E={})",
            a.channel_bandwidth_hz / 1e3,
            p.chanbw_m,
            p.chanbw_e
        )?;
        writeln!(
            f,
            "Data rate ..............: {:.1} Baud (M={}, E={})",
            a.rate_baud, p.drate_m, p.drate_e
        )?;
        writeln!(
            f,
            "Deviation ..............: {:.3} kHz (M={}, E={})",
            a.deviation_hz / 1e3,
            p.deviat_m,
            p.deviat_e
        )?;
        writeln!(
            f,
            "Modulation word ........: {} ({})",
            p.mod_word,
            a.modulation.name()
        )?;
        writeln!(f, "FEC ....................: {}", on_off(a.fec))?;
        writeln!(f, "Data whitening .........: {}", on_off(a.whitening))?;
        writeln!(f, "Packet length ..........: {} bytes", a.packet_length)?;
        writeln!(
            f,
            "Preamble ...............: {} bytes (W={})",
            a.preamble.bytes(),
            p.preamble_word
        )?;
        writeln!(f, "Packet time ............: {} us", a.packet_time_us as u32)?;
        write!(f, "Byte time ..............: {} us", a.byte_time_us as u32)
    }
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |b: bool| u8::from(b);

        writeln!(f, "Part number ...........: {}", self.part_number)?;
        writeln!(f, "Version ...............: {}", self.version)?;
        writeln!(f, "Freq offset estimate ..: {}", self.freq_offset)?;
        writeln!(f, "CRC OK ................: {}", bit(self.crc_ok))?;
        writeln!(f, "LQI ...................: {}", self.lqi)?;
        writeln!(f, "RSSI ..................: {:.1} dBm", self.rssi_dbm())?;
        writeln!(f, "Radio FSM state .......: {}", self.fsm_state.name())?;
        writeln!(f, "WOR time ..............: {}", self.wor_time)?;
        writeln!(f, "Carrier Sense .........: {}", bit(self.carrier_sense))?;
        writeln!(
            f,
            "Preamble Qual Reached .: {}",
            bit(self.preamble_quality_reached)
        )?;
        writeln!(f, "Clear channel .........: {}", bit(self.clear_channel))?;
        writeln!(f, "Start of frame delim ..: {}", bit(self.start_of_frame))?;
        writeln!(f, "GDO2 ..................: {}", bit(self.gdo2))?;
        writeln!(f, "GDO0 ..................: {}", bit(self.gdo0))?;
        writeln!(f, "VCO VC DAC ............: {}", self.vco_vc_dac)?;
        writeln!(f, "FIFO Tx underflow .....: {}", bit(self.tx_fifo_underflow))?;
        writeln!(f, "FIFO Tx bytes .........: {}", self.tx_fifo_bytes)?;
        writeln!(f, "FIFO Rx overflow ......: {}", bit(self.rx_fifo_overflow))?;
        write!(f, "FIFO Rx bytes .........: {}", self.rx_fifo_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Modulation, Preamble, RadioLinkConfig};

    #[test]
    fn test_parms_report() {
        let enc = RegisterEncoder::new();
        let parms = enc.encode(&RadioLinkConfig::default());
        let report = ParmsReport::new(&parms, &enc).to_string();

        assert!(report.contains("Operating frequency ....: 433.600 MHz"));
        assert!(report.contains("(M=131, E=8)"));
        assert!(report.contains("Modulation word ........: 0 (2-FSK)"));
        assert!(report.contains("FEC ....................: off"));
        assert!(report.contains("Preamble ...............: 4 bytes (W=2)"));
    }

    #[test]
    fn test_parms_report_fsk4_byte_time() {
        let enc = RegisterEncoder::new();
        let config = RadioLinkConfig {
            modulation: Modulation::Fsk4,
            preamble: Preamble::Bytes8,
            ..Default::default()
        };
        let parms = enc.encode(&config);
        let report = ParmsReport::new(&parms, &enc);

        assert_eq!(report.actual.preamble, Preamble::Bytes8);
        let two_fsk = 8_000_000.0 / report.actual.rate_baud;
        assert!((report.actual.byte_time_us - two_fsk / 2.0).abs() < 1e-6);
        assert!(report.to_string().contains("Preamble ...............: 8 bytes (W=4)"));
    }

    #[test]
    fn test_status_display() {
        let status = StatusRecord::decode(&[0, 20, 0, 0x85, 0, 1, 0, 7, 0x10, 0, 0, 0]).unwrap();
        let text = status.to_string();
        assert!(text.contains("CRC OK ................: 1"));
        assert!(text.contains("LQI ...................: 5"));
        assert!(text.contains("RSSI ..................: -74.0 dBm"));
        assert!(text.contains("Radio FSM state .......: IDLE"));
        assert!(text.contains("WOR time ..............: 7"));
        assert!(text.contains("Clear channel .........: 1"));
    }
}
