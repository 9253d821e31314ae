//! Request/response transport to the bridge microcontroller
//!
//! Each operation drops stale input, writes exactly one envelope and then
//! polls once for the reply. There is never more than one request in flight,
//! and the transport owns the only scratch buffer, so every method takes
//! `&mut self`. A reply whose type byte does not match the request is
//! rejected, so a late answer to an earlier request is never taken for the
//! current one.

use std::time::Duration;

use cc_protocol::command::BUFFER_LEN;
use cc_protocol::{Envelope, RadioLinkConfig, RadioRegisterParms, RegisterEncoder};
use cc_protocol::{ProtocolError, StatusRecord, TxBlock, STATUS_LEN};
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::poll::{PolledReader, ReadOutcome, Sleeper, ThreadSleeper, DEFAULT_POLL_INTERVAL};
use crate::stream::ByteStream;

/// Shortest pause between read attempts
pub const MIN_POLL_INTERVAL: Duration = Duration::from_micros(1);

/// Polling budgets for each exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Pause between read attempts
    pub poll_interval: Duration,
    /// Attempts while waiting for the INIT acknowledgement
    pub init_attempts: u32,
    /// Attempts while waiting for a status reply
    pub status_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            init_attempts: 10_000,
            status_attempts: 10_000,
        }
    }
}

/// Exchange counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub inits: u32,
    pub status_queries: u32,
    pub blocks_sent: u32,
    /// Exchanges that ended without a usable reply
    pub failures: u32,
}

/// Transport session over one byte stream
pub struct Transport<S, Z = ThreadSleeper> {
    stream: S,
    encoder: RegisterEncoder,
    config: TransportConfig,
    sleeper: Z,
    buffer: [u8; BUFFER_LEN],
    parms: Option<RadioRegisterParms>,
    stats: LinkStats,
}

impl<S: ByteStream> Transport<S, ThreadSleeper> {
    /// Create a transport with default budgets and a 26 MHz crystal
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, RegisterEncoder::new(), TransportConfig::default())
    }

    /// Create a transport with explicit encoder and budgets
    pub fn with_config(stream: S, encoder: RegisterEncoder, config: TransportConfig) -> Self {
        Self::with_sleeper(stream, encoder, config, ThreadSleeper)
    }
}

impl<S: ByteStream, Z: Sleeper> Transport<S, Z> {
    /// Create a transport with a custom sleeper
    pub fn with_sleeper(
        stream: S,
        encoder: RegisterEncoder,
        config: TransportConfig,
        sleeper: Z,
    ) -> Self {
        Self {
            stream,
            encoder,
            config,
            sleeper,
            buffer: [0; BUFFER_LEN],
            parms: None,
            stats: LinkStats::default(),
        }
    }

    /// Encode `config` and send it to the bridge in an INIT envelope
    ///
    /// Returns the number of acknowledgement bytes received.
    pub fn send_init(&mut self, config: &RadioLinkConfig) -> Result<usize, LinkError> {
        let parms = self.encoder.encode(config);
        info!("Initializing radio at {} Hz", config.frequency_hz);

        let received = self.exchange(&Envelope::init(&parms), self.config.init_attempts)?;
        self.parms = Some(parms);
        self.stats.inits += 1;

        Ok(received)
    }

    /// Ask the bridge for the radio status registers
    pub fn query_status(&mut self) -> Result<StatusRecord, LinkError> {
        let received = self.exchange(&Envelope::status_query(), self.config.status_attempts)?;

        let reply = match Envelope::decode(&self.buffer[..received]) {
            Ok(reply) if reply.payload.len() >= STATUS_LEN => reply,
            Ok(_) | Err(ProtocolError::Incomplete { .. }) => {
                warn!("Status reply too short: {} bytes", received);
                self.stats.failures += 1;
                return Err(LinkError::ShortStatus { got: received });
            }
            Err(e) => {
                self.stats.failures += 1;
                return Err(e.into());
            }
        };

        let status = StatusRecord::decode(&reply.payload)?;
        self.stats.status_queries += 1;

        Ok(status)
    }

    /// Send one radio block and wait up to `timeout` for the bridge's echo
    ///
    /// Returns the number of reply bytes received.
    pub fn send_block(&mut self, block: &TxBlock, timeout: Duration) -> Result<usize, LinkError> {
        let attempts = self.attempts_for(timeout);
        debug!(
            "Sending block of {} bytes (countdown {})",
            block.data.len(),
            block.countdown
        );

        let received = self.exchange(&Envelope::tx_block(block), attempts)?;
        self.stats.blocks_sent += 1;

        Ok(received)
    }

    /// Register words sent by the last successful INIT
    pub fn parms(&self) -> Option<&RadioRegisterParms> {
        self.parms.as_ref()
    }

    /// The encoder used for INIT
    pub fn encoder(&self) -> &RegisterEncoder {
        &self.encoder
    }

    /// Polling budgets
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Exchange counters
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Bytes of the last reply left in the scratch buffer
    pub fn last_reply(&self, len: usize) -> &[u8] {
        &self.buffer[..len.min(BUFFER_LEN)]
    }

    /// Borrow the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Give the stream back
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Attempt budget covering `timeout` at the configured interval
    fn attempts_for(&self, timeout: Duration) -> u32 {
        let per_attempt = self.poll_interval().as_nanos();
        (timeout.as_nanos() / per_attempt).clamp(1, u128::from(u32::MAX)) as u32
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval.max(MIN_POLL_INTERVAL)
    }

    /// Drop stale input, write one envelope, then poll once for its reply
    fn exchange(&mut self, envelope: &Envelope, attempts: u32) -> Result<usize, LinkError> {
        let len = envelope.encode_into(&mut self.buffer)?;

        let stale = self.stream.discard_input().inspect_err(|_| {
            self.stats.failures += 1;
        })?;
        if stale > 0 {
            debug!("Discarded {} stale bytes before {:?}", stale, envelope.command);
        }

        let written = self.stream.write(&self.buffer[..len]).inspect_err(|_| {
            self.stats.failures += 1;
        })?;
        debug!("{} bytes written to bridge", written);

        if written < len {
            warn!("Short write to bridge: {} of {} bytes", written, len);
            self.stats.failures += 1;
            return Err(LinkError::ShortWrite {
                written,
                expected: len,
            });
        }

        let interval = self.poll_interval();
        let mut reader = PolledReader::with_sleeper(interval, attempts, &mut self.sleeper);

        match reader.read_with_timeout(&mut self.stream, &mut self.buffer) {
            ReadOutcome::Data(_) if self.buffer[0] != envelope.command as u8 => {
                warn!(
                    "Reply type 0x{:02X} does not answer {:?}",
                    self.buffer[0], envelope.command
                );
                self.stats.failures += 1;
                Err(LinkError::UnexpectedReply {
                    expected: envelope.command,
                    got: self.buffer[0],
                })
            }
            ReadOutcome::Data(n) => {
                debug!("{} bytes read from bridge", n);
                Ok(n)
            }
            ReadOutcome::Empty => {
                warn!(
                    "No reply to {:?} after {} polls",
                    envelope.command,
                    reader.max_attempts()
                );
                self.stats.failures += 1;
                Err(LinkError::NoReply {
                    attempts: reader.max_attempts(),
                })
            }
            ReadOutcome::Failed(e) => {
                warn!("Read from bridge failed: {}", e);
                self.stats.failures += 1;
                Err(LinkError::Io(e))
            }
        }
    }
}
