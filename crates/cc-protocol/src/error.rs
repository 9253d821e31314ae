//! Error types for envelope encoding and decoding

use thiserror::Error;

/// Errors that can occur while building or parsing bridge envelopes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is incomplete - need more data
    #[error("incomplete data: need {needed} more bytes")]
    Incomplete { needed: usize },

    /// Payload does not fit in the one-byte length field
    #[error("payload too long: {len} bytes (max {max})")]
    PayloadTooLong { len: usize, max: usize },

    /// Unknown command type byte
    #[error("unknown command type: 0x{0:02X}")]
    UnknownCommandType(u8),

    /// Field value outside its defined set
    #[error("invalid {field} value: {value}")]
    InvalidField { field: &'static str, value: u8 },

    /// Payload has the wrong size for its command type
    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}
