//! Byte stream seam between the transport and the serial device

use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::debug;

use crate::error::LinkError;

/// Reads spent draining stale input before giving up on reaching the end
const DRAIN_READS: usize = 64;

/// Raw byte stream to the bridge
///
/// `read` must not block: when nothing is pending it returns `Ok(0)` (or a
/// `WouldBlock`/`TimedOut` error, which callers treat the same way).
pub trait ByteStream {
    /// Write bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read whatever is pending, up to `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Drop input already waiting to be read, returning how many bytes went
    ///
    /// The default reads until the stream reports no data, for at most
    /// `DRAIN_READS` reads.
    fn discard_input(&mut self) -> io::Result<usize> {
        let mut scratch = [0u8; 64];
        let mut discarded = 0;
        for _ in 0..DRAIN_READS {
            match self.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => discarded += n,
                Err(e) if is_no_data(&e) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(discarded)
    }
}

impl<T: ByteStream + ?Sized> ByteStream for &mut T {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn discard_input(&mut self) -> io::Result<usize> {
        (**self).discard_input()
    }
}

impl ByteStream for Box<dyn SerialPort> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = Write::write(self, data)?;
        self.flush()?;
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match Read::read(self, buf) {
            Ok(n) => Ok(n),
            Err(e) if is_no_data(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn discard_input(&mut self) -> io::Result<usize> {
        let pending = self.bytes_to_read()?;
        self.clear(ClearBuffer::Input)?;
        Ok(pending as usize)
    }
}

/// Whether an I/O error only means "nothing to read right now"
pub(crate) fn is_no_data(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// Open a serial device for non-blocking use with the transport
pub fn open_serial(device: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, LinkError> {
    debug!("Opening {} at {} baud", device, baud_rate);

    let port = serialport::new(device, baud_rate)
        .timeout(Duration::ZERO)
        .open()?;

    Ok(port)
}
