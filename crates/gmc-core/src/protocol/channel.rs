//! Transport abstraction
//!
//! The exchange engine talks to the device through the [`Channel`]
//! trait rather than a concrete serial port, so tests can substitute a
//! scripted channel and alternative byte transports can be plugged in.

use serialport::SerialPort;
use std::io::{self, Read, Write};

/// A duplex byte channel to the device.
///
/// Beyond plain reads and writes the engine needs two primitives: a way
/// to discard stale unread input before issuing a command, and a
/// non-blocking count of available bytes so reads can poll under an
/// overall deadline.
pub trait Channel: Read + Write + Send {
    /// Discard any unread bytes in the input buffer.
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Number of bytes available to read without blocking.
    fn bytes_to_read(&mut self) -> io::Result<u32>;
}

/// Serial port wrapper implementing [`Channel`].
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an already-opened serial port.
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Channel for SerialChannel {
    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
