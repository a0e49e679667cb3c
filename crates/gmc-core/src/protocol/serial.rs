//! Serial port handling
//!
//! Low-level serial port access for GMC devices. GQ counters ship with
//! USB-serial bridges that enumerate as ordinary tty devices; the port
//! path is supplied by the caller (no discovery here).

use serialport::SerialPort;
use std::time::Duration;

use super::{ProtocolError, DEFAULT_BAUD_RATE};

/// Per-call read timeout on the port itself. The exchange engine polls
/// with its own overall deadline, so this only bounds individual
/// syscalls.
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Open a serial port for GMC communication.
pub fn open_port(name: &str, baud_rate: Option<u32>) -> Result<Box<dyn SerialPort>, ProtocolError> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);

    serialport::new(name, baud)
        .timeout(PORT_READ_TIMEOUT)
        .open()
        .map_err(|e| ProtocolError::ConnectionFailed(format!("{name}: {e}")))
}

/// Configure a serial port for GMC communication (8N1, no flow control).
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ProtocolError::Serial(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ProtocolError::Serial(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ProtocolError::Serial(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ProtocolError::Serial(e.to_string()))?;
    Ok(())
}

/// Clear both serial port buffers.
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::Serial(e.to_string()))
}
