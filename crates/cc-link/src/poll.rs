//! Attempt-bounded reads over a non-blocking stream
//!
//! The bridge link has no blocking read with a timeout, so a reply is
//! collected by polling: read, and if nothing came back, sleep one interval
//! and try again until the attempt budget is spent. The effective timeout is
//! `interval * max_attempts`.

use std::io;
use std::time::Duration;

use tracing::trace;

use crate::stream::{is_no_data, ByteStream};

/// Largest read issued per attempt
pub const READ_CHUNK: usize = 14;

/// Default pause between attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(10);

/// Something that can pause the current thread
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps with [`std::thread::sleep`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<Z: Sleeper + ?Sized> Sleeper for &mut Z {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Result of a polled read
#[derive(Debug)]
pub enum ReadOutcome {
    /// The first attempt that returned data read this many bytes
    Data(usize),
    /// Every attempt came back empty
    Empty,
    /// The last attempt failed with an I/O error
    Failed(io::Error),
}

impl ReadOutcome {
    /// Byte count in the non-positive-means-failure convention
    pub fn byte_count(&self) -> isize {
        match self {
            ReadOutcome::Data(n) => *n as isize,
            ReadOutcome::Empty => 0,
            ReadOutcome::Failed(_) => -1,
        }
    }
}

/// Polls a [`ByteStream`] a bounded number of times
#[derive(Debug, Clone)]
pub struct PolledReader<Z = ThreadSleeper> {
    interval: Duration,
    max_attempts: u32,
    sleeper: Z,
}

impl PolledReader<ThreadSleeper> {
    /// Reader that sleeps the calling thread between attempts
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self::with_sleeper(interval, max_attempts, ThreadSleeper)
    }
}

impl<Z: Sleeper> PolledReader<Z> {
    /// Reader with a custom sleeper
    ///
    /// A budget of zero attempts is treated as one.
    pub fn with_sleeper(interval: Duration, max_attempts: u32, sleeper: Z) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            sleeper,
        }
    }

    /// Attempt budget
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wall-clock upper bound of the sleeps in one read
    pub fn timeout(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }

    /// Read up to [`READ_CHUNK`] bytes into `buf`
    ///
    /// Returns on the first attempt yielding data. After exactly
    /// `max_attempts` empty or failed attempts, returns the last of them.
    pub fn read_with_timeout<S>(&mut self, stream: &mut S, buf: &mut [u8]) -> ReadOutcome
    where
        S: ByteStream + ?Sized,
    {
        let limit = buf.len().min(READ_CHUNK);
        let mut outcome = ReadOutcome::Empty;

        for attempt in 1..=self.max_attempts {
            outcome = match stream.read(&mut buf[..limit]) {
                Ok(n) if n > 0 => {
                    trace!("Read {} bytes on attempt {}", n, attempt);
                    return ReadOutcome::Data(n);
                }
                Ok(_) => ReadOutcome::Empty,
                Err(e) if is_no_data(&e) => ReadOutcome::Empty,
                Err(e) => {
                    trace!("Read error on attempt {}: {}", attempt, e);
                    ReadOutcome::Failed(e)
                }
            };

            self.sleeper.sleep(self.interval);
        }

        outcome
    }
}
