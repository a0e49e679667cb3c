//! GQ-RFC1201 serial protocol
//!
//! Implements the command/response protocol spoken by GQ GMC Geiger
//! counters: ASCII `<NAME>>` command frames, fixed-length binary
//! responses, and the 0xAA terminator several response types carry.
//!
//! The protocol is stateless beyond the open channel: every accessor
//! is a single exchange with no handshake or session state.

pub mod channel;
pub mod commands;
pub mod decode;
mod device;
mod error;
pub mod serial;

pub use channel::{Channel, SerialChannel};
pub use commands::Command;
pub use decode::{GyroVector, ModelInfo, CONFIG_BLOCK_LEN};
pub use device::{Device, DeviceConfig, ReadingLimits};
pub use error::ProtocolError;
pub use serial::{clear_buffers, configure_port, open_port};

/// Default baud rate for GMC communication (GMC-300 V3.xx and later).
pub const DEFAULT_BAUD_RATE: u32 = 57600;

/// Default overall deadline for reading one response, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default settle delay between writing a command and reading its
/// response, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;

/// Sentinel byte closing temperature, date/time, gyroscope and
/// acknowledgment responses.
pub const RESPONSE_TERMINATOR: u8 = 0xAA;
