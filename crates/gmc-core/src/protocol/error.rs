//! Protocol errors

use thiserror::Error;

/// Errors that can occur during communication with a GMC device.
///
/// Variants fall into four groups: connection failures (fatal to setup),
/// timeouts and short reads (transient, retryable by the caller),
/// validation failures (terminator/range/calendar checks, pointing at a
/// protocol or firmware mismatch), and decode failures (malformed
/// payloads). The engine never converts any of these into a default
/// value; defaulting is caller policy.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to open serial port: {0}")]
    ConnectionFailed(String),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Device did not respond within the timeout")]
    Timeout,

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Response missing 0xAA terminator byte")]
    MissingTerminator,

    #[error("Reading out of plausible range: {reading} = {value}")]
    OutOfRange {
        /// Which reading failed validation (e.g. "cpm", "voltage").
        reading: &'static str,
        /// The decoded value that was rejected.
        value: f64,
    },

    #[error("Command not acknowledged: expected 0xAA, got {0:#04x}")]
    NotAcknowledged(u8),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ProtocolError {
    /// Whether this error indicates a transient link problem rather than
    /// a protocol/firmware mismatch. Callers typically retry these and
    /// log the rest.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProtocolError::Timeout | ProtocolError::ShortRead { .. } | ProtocolError::Serial(_)
        )
    }
}
