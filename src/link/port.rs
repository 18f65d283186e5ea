//! Trait abstraction for polled serial reads to enable testing

use std::io::{self, Read};

/// Non-blocking read over the serial port.
///
/// Implementations return `TimedOut`/`WouldBlock` when no bytes are
/// available so a poll never stalls an acquisition tick.
pub trait PollRead: Send {
    /// Read whatever bytes are immediately available
    fn poll_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Wrapper around an opened serial port that implements PollRead
pub struct SerialPortLink {
    port: Box<dyn tokio_serial::SerialPort>,
}

impl SerialPortLink {
    /// The port must have been opened with a zero timeout
    pub fn new(port: Box<dyn tokio_serial::SerialPort>) -> Self {
        Self { port }
    }
}

impl PollRead for SerialPortLink {
    fn poll_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}
