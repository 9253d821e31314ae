//! CC1101 Bridge Protocol Library
//!
//! This crate turns a high-level radio link configuration into the register
//! words of a CC1101 transceiver and frames them for the serial bridge
//! microcontroller that programs the chip:
//!
//! - **config**: the user-facing [`RadioLinkConfig`]
//! - **registers**: [`RegisterEncoder`], the closed-form register formulas and
//!   the packed [`RadioRegisterParms`] record
//! - **command**: `[TYPE][LEN][PAYLOAD]` envelopes (INIT, STATUS_QUERY, TX_BLOCK)
//! - **status**: decoding of the 12-byte status reply into a [`StatusRecord`]
//! - **display**: human-readable reports for both
//!
//! Nothing here performs I/O.
//!
//! # Example
//!
//! ```rust
//! use cc_protocol::{Envelope, RadioLinkConfig, RegisterEncoder};
//!
//! let encoder = RegisterEncoder::new();
//! let parms = encoder.encode(&RadioLinkConfig::default());
//! assert_eq!((parms.drate_m, parms.drate_e), (131, 8));
//!
//! let bytes = Envelope::init(&parms).encode().unwrap();
//! assert_eq!(Envelope::decode(&bytes).unwrap().parms().unwrap(), parms);
//! ```

pub mod command;
pub mod config;
pub mod display;
pub mod error;
pub mod registers;
pub mod status;

pub use command::{CommandType, Envelope, EnvelopeCodec, TxBlock};
pub use config::{DataRate, Modulation, Preamble, RadioLinkConfig, DEFAULT_CRYSTAL_HZ};
pub use display::ParmsReport;
pub use error::ProtocolError;
pub use registers::{
    ActualParameters, ChannelBandwidth, PacketLengthMode, RadioRegisterParms, RegisterEncoder,
};
pub use status::{rssi_dbm, FsmState, StatusRecord, STATUS_LEN};
