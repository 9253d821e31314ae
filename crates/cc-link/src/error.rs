//! Error types for the serial link

use cc_protocol::CommandType;
use thiserror::Error;

/// Errors that can occur while talking to the bridge
#[derive(Debug, Error)]
pub enum LinkError {
    /// The stream accepted fewer bytes than the envelope holds
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Polling ran out of attempts without any reply
    #[error("no reply after {attempts} polls")]
    NoReply { attempts: u32 },

    /// Status reply too short to hold the status registers
    #[error("short status reply: {got} bytes")]
    ShortStatus { got: usize },

    /// Reply header names a different command than the request
    #[error("expected {expected:?} reply, got type byte 0x{got:02X}")]
    UnexpectedReply { expected: CommandType, got: u8 },

    /// I/O error on the stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Envelope could not be built or parsed
    #[error("protocol error: {0}")]
    Protocol(#[from] cc_protocol::ProtocolError),

    /// Settings file could not be parsed or written
    #[error("settings error: {0}")]
    Settings(String),
}

impl LinkError {
    /// Whether the exchange failed on the wire rather than on bad input
    ///
    /// All of these are recovered the same way: retry the whole exchange or
    /// give up.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::ShortWrite { .. }
                | Self::NoReply { .. }
                | Self::ShortStatus { .. }
                | Self::UnexpectedReply { .. }
                | Self::Io(_)
                | Self::Serial(_)
        )
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(e: serde_json::Error) -> Self {
        Self::Settings(e.to_string())
    }
}
