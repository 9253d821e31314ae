//! Serial link to the CC1101 bridge
//!
//! Drives the request/response exchanges of `cc-protocol` over a byte
//! stream. The link is synchronous: every operation writes one envelope and
//! then polls the stream a bounded number of times for the reply.
//!
//! - **stream**: the [`ByteStream`] seam and the `serialport` adapter
//! - **poll**: attempt-bounded reads ([`PolledReader`])
//! - **transport**: INIT, status query and block transmission ([`Transport`])
//! - **settings**: JSON-persisted [`LinkSettings`]

pub mod error;
pub mod poll;
pub mod settings;
pub mod stream;
pub mod transport;

pub use error::LinkError;
pub use poll::{PolledReader, ReadOutcome, Sleeper, ThreadSleeper, DEFAULT_POLL_INTERVAL, READ_CHUNK};
pub use settings::LinkSettings;
pub use stream::{open_serial, ByteStream};
pub use transport::{LinkStats, Transport, TransportConfig, MIN_POLL_INTERVAL};
