//! Bridge command envelopes
//!
//! Every exchange with the bridge microcontroller is a single envelope:
//!
//! ```text
//! [TYPE] [LEN] [PAYLOAD ...]
//! ```
//!
//! - Byte 0: command type
//! - Byte 1: payload length (0-255)
//! - Bytes 2..: payload
//!
//! Replies from the bridge use the same two-byte header.

use crate::error::ProtocolError;
use crate::registers::{RadioRegisterParms, PARMS_LEN};

/// Envelope header length
pub const HEADER_LEN: usize = 2;

/// Largest payload the length byte can describe
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Scratch buffer size that holds any envelope
pub const BUFFER_LEN: usize = MAX_PAYLOAD + HEADER_LEN;

/// TX_BLOCK payload overhead: size byte and countdown byte
pub const BLOCK_HEADER_LEN: usize = 2;

/// Largest data block one TX_BLOCK envelope can carry
pub const MAX_BLOCK_DATA: usize = MAX_PAYLOAD - BLOCK_HEADER_LEN;

/// Command type codes understood by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandType {
    /// Program the radio registers (payload: [`RadioRegisterParms`])
    Init = 0x00,
    /// Read the radio status registers (no payload)
    StatusQuery = 0x01,
    /// Transmit one radio block (payload: [`TxBlock`])
    TxBlock = 0x02,
}

impl TryFrom<u8> for CommandType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Init),
            0x01 => Ok(Self::StatusQuery),
            0x02 => Ok(Self::TxBlock),
            _ => Err(ProtocolError::UnknownCommandType(value)),
        }
    }
}

/// One radio block queued for transmission
///
/// Splitting a packet into blocks is the caller's job; `countdown` is the
/// number of blocks still to follow this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxBlock {
    pub countdown: u8,
    pub data: Vec<u8>,
}

impl TxBlock {
    /// Create a block, rejecting data that does not fit one envelope
    pub fn new(countdown: u8, data: impl Into<Vec<u8>>) -> Result<Self, ProtocolError> {
        let data = data.into();
        if data.len() > MAX_BLOCK_DATA {
            return Err(ProtocolError::PayloadTooLong {
                len: data.len(),
                max: MAX_BLOCK_DATA,
            });
        }
        Ok(Self { countdown, data })
    }

    /// `[size][countdown][data...]`
    pub fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(BLOCK_HEADER_LEN + self.data.len());
        payload.push(self.data.len() as u8);
        payload.push(self.countdown);
        payload.extend_from_slice(&self.data);
        payload
    }

    /// Parse a TX_BLOCK payload
    pub fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        let [size, countdown, data @ ..] = payload else {
            return Err(ProtocolError::Incomplete {
                needed: BLOCK_HEADER_LEN - payload.len(),
            });
        };

        if data.len() != usize::from(*size) {
            return Err(ProtocolError::LengthMismatch {
                expected: usize::from(*size),
                actual: data.len(),
            });
        }

        Ok(Self {
            countdown: *countdown,
            data: data.to_vec(),
        })
    }
}

/// A framed command or reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub command: CommandType,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// INIT carrying the register words
    pub fn init(parms: &RadioRegisterParms) -> Self {
        Self {
            command: CommandType::Init,
            payload: parms.to_bytes().to_vec(),
        }
    }

    /// Zero-length STATUS_QUERY
    pub fn status_query() -> Self {
        Self {
            command: CommandType::StatusQuery,
            payload: Vec::new(),
        }
    }

    /// TX_BLOCK carrying one block
    pub fn tx_block(block: &TxBlock) -> Self {
        Self {
            command: CommandType::TxBlock,
            payload: block.to_payload(),
        }
    }

    /// Total encoded length
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Encode into `buf`, returning the number of bytes used
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLong {
                len: self.payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let len = self.wire_len();
        let Some(out) = buf.get_mut(..len) else {
            return Err(ProtocolError::Incomplete {
                needed: len - buf.len(),
            });
        };

        out[0] = self.command as u8;
        out[1] = self.payload.len() as u8;
        out[HEADER_LEN..].copy_from_slice(&self.payload);
        Ok(len)
    }

    /// Encode to a fresh buffer
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; self.wire_len()];
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Decode one complete envelope from the start of `bytes`
    ///
    /// Trailing bytes beyond the declared payload are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let [kind, len, rest @ ..] = bytes else {
            return Err(ProtocolError::Incomplete {
                needed: HEADER_LEN - bytes.len(),
            });
        };

        let command = CommandType::try_from(*kind)?;
        let len = usize::from(*len);
        let Some(payload) = rest.get(..len) else {
            return Err(ProtocolError::Incomplete {
                needed: len - rest.len(),
            });
        };

        Ok(Self {
            command,
            payload: payload.to_vec(),
        })
    }

    /// Register words of an INIT envelope
    pub fn parms(&self) -> Result<RadioRegisterParms, ProtocolError> {
        if self.command != CommandType::Init {
            return Err(ProtocolError::InvalidField {
                field: "command",
                value: self.command as u8,
            });
        }
        if self.payload.len() != PARMS_LEN {
            return Err(ProtocolError::LengthMismatch {
                expected: PARMS_LEN,
                actual: self.payload.len(),
            });
        }
        RadioRegisterParms::from_bytes(&self.payload)
    }
}

/// Streaming envelope parser for a byte stream that may split envelopes
#[derive(Debug)]
pub struct EnvelopeCodec {
    buffer: Vec<u8>,
}

impl EnvelopeCodec {
    /// Create an empty codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(BUFFER_LEN),
        }
    }

    /// Push raw bytes into the codec's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete envelope
    ///
    /// A byte that is not a known command type is dropped so the stream can
    /// resynchronise.
    pub fn next_envelope(&mut self) -> Option<Envelope> {
        self.next_envelope_with_bytes().map(|(env, _)| env)
    }

    /// Like [`Self::next_envelope`], also returning the raw bytes consumed
    pub fn next_envelope_with_bytes(&mut self) -> Option<(Envelope, Vec<u8>)> {
        loop {
            match Envelope::decode(&self.buffer) {
                Ok(env) => {
                    let bytes: Vec<u8> = self.buffer.drain(..env.wire_len()).collect();
                    return Some((env, bytes));
                }
                Err(ProtocolError::UnknownCommandType(kind)) => {
                    tracing::warn!("Dropping unknown envelope type 0x{:02X}", kind);
                    self.buffer.remove(0);
                }
                Err(_) => return None,
            }
        }
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}
