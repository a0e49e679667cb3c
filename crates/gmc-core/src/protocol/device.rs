//! Device handle and command execution
//!
//! Owns the serial channel and serializes command/response exchanges
//! with the counter. The protocol is strictly request/response with no
//! session state, so the handle carries nothing beyond the channel, its
//! lock, and the timing configuration.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{
    channel::{Channel, SerialChannel},
    decode,
    serial::{clear_buffers, configure_port, open_port},
    Command, GyroVector, ModelInfo, ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_SETTLE_DELAY_MS,
    DEFAULT_TIMEOUT_MS,
};

/// Interval between availability polls while waiting for response bytes.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Plausibility ceilings applied to decoded readings.
///
/// These are heuristic filters, not protocol constants: the RFC does
/// not define hardware maxima, so values beyond these are treated as
/// line noise rather than unusual-but-valid readings. Tune per
/// deployment if a detector legitimately exceeds them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingLimits {
    /// Highest CPM accepted as a real reading.
    pub max_cpm: u32,
    /// Highest battery voltage accepted, in volts.
    pub max_volts: f64,
}

impl Default for ReadingLimits {
    fn default() -> Self {
        Self {
            max_cpm: 1_000_000,
            max_volts: 10.0,
        }
    }
}

/// Device connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial port path, e.g. "/dev/ttyUSB0"
    pub port_name: String,
    /// Baud rate (57600 for GMC-300 V3.xx and most later units)
    pub baud_rate: u32,
    /// Overall deadline for reading one response, in milliseconds
    pub timeout_ms: u64,
    /// Fixed wait between writing a command and reading its response,
    /// giving the firmware time to start answering, in milliseconds
    pub settle_delay_ms: u64,
    /// Plausibility ceilings for decoded readings
    pub limits: ReadingLimits,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            limits: ReadingLimits::default(),
        }
    }
}

/// Handle to a connected GMC counter.
///
/// All accessors take `&self`; a mutex scoped to one full
/// command/response exchange keeps concurrent callers (a poller and a
/// setup routine, say) from interleaving bytes on the wire. The handle
/// performs no internal retry: any failed exchange surfaces as an
/// error and the caller decides whether to try again (see
/// [`crate::retry::RetryPolicy`]).
pub struct Device {
    config: DeviceConfig,
    channel: Mutex<Box<dyn Channel>>,
}

impl Device {
    /// Open the serial port named in `config` and return a connected
    /// handle.
    pub fn open(config: DeviceConfig) -> Result<Self, ProtocolError> {
        let mut port = open_port(&config.port_name, Some(config.baud_rate))?;
        configure_port(port.as_mut())?;
        clear_buffers(port.as_mut())?;
        debug!(
            port = %config.port_name,
            baud = config.baud_rate,
            "opened serial connection"
        );
        Ok(Self::from_channel(Box::new(SerialChannel::new(port)), config))
    }

    /// Build a handle over an already-open channel. Used by tests and
    /// by callers supplying their own transport.
    pub fn from_channel(channel: Box<dyn Channel>, config: DeviceConfig) -> Self {
        Self {
            config,
            channel: Mutex::new(channel),
        }
    }

    /// The configuration this handle was opened with.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Execute one command/response exchange.
    ///
    /// Holds the channel lock for the whole exchange: clears stale
    /// input so a previously timed-out response cannot be mistaken for
    /// this command's reply, writes the frame, waits the settle delay,
    /// then reads exactly the expected number of bytes under the
    /// configured deadline. A short read is a failure, never a
    /// truncated success. Commands with no expected response return an
    /// empty buffer immediately after the settle delay.
    pub fn execute(&self, command: &Command) -> Result<Vec<u8>, ProtocolError> {
        let frame = command.frame();
        let expected = command.response_len();

        let mut channel = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        channel
            .clear_input_buffer()
            .map_err(|e| ProtocolError::Serial(e.to_string()))?;
        channel
            .write_all(&frame)
            .map_err(|e| ProtocolError::Serial(e.to_string()))?;
        channel
            .flush()
            .map_err(|e| ProtocolError::Serial(e.to_string()))?;

        debug!(
            command = command.name(),
            tx = frame.len(),
            expected,
            "sent command frame"
        );

        std::thread::sleep(Duration::from_millis(self.config.settle_delay_ms));

        if expected == 0 {
            return Ok(Vec::new());
        }

        let mut response = vec![0u8; expected];
        let timeout = Duration::from_millis(self.config.timeout_ms);
        match read_exact_timeout(channel.as_mut(), &mut response, timeout) {
            Ok(()) => {
                debug!(command = command.name(), rx = expected, "response complete");
                Ok(response)
            }
            Err(err) => {
                debug!(command = command.name(), error = %err, "exchange failed");
                Err(err)
            }
        }
    }

    /// Hardware model and firmware revision.
    pub fn get_version(&self) -> Result<ModelInfo, ProtocolError> {
        let cmd = Command::GetVersion;
        let response = self.execute(&cmd)?;
        self.validated(&cmd, decode::decode_version(&to_array(response)?))
    }

    /// Current counts-per-minute reading.
    pub fn get_cpm(&self) -> Result<u16, ProtocolError> {
        let cmd = Command::GetCpm;
        let response = self.execute(&cmd)?;
        self.validated(
            &cmd,
            decode::decode_cpm(&to_array(response)?, &self.config.limits),
        )
    }

    /// Battery voltage in volts.
    pub fn get_voltage(&self) -> Result<f64, ProtocolError> {
        let cmd = Command::GetVoltage;
        let response = self.execute(&cmd)?;
        let raw: [u8; 1] = to_array(response)?;
        self.validated(&cmd, decode::decode_voltage(raw[0], &self.config.limits))
    }

    /// Device serial number as 14 uppercase hex digits.
    pub fn get_serial_number(&self) -> Result<String, ProtocolError> {
        let response = self.execute(&Command::GetSerial)?;
        Ok(decode::decode_serial_number(&to_array(response)?))
    }

    /// Temperature in degrees Celsius. Only supported by GMC-320
    /// Re.3.01 or later.
    pub fn get_temperature(&self) -> Result<f64, ProtocolError> {
        let cmd = Command::GetTemperature;
        let response = self.execute(&cmd)?;
        self.validated(&cmd, decode::decode_temperature(&to_array(response)?))
    }

    /// Device clock. Supported by GMC-280 and GMC-300 Re.3.00 or
    /// later.
    pub fn get_datetime(&self) -> Result<NaiveDateTime, ProtocolError> {
        let cmd = Command::GetDateTime;
        let response = self.execute(&cmd)?;
        self.validated(&cmd, decode::decode_datetime(&to_array(response)?))
    }

    /// Set the device clock. The protocol carries years as a single
    /// byte offset from 2000, so `dt` must fall in 2000..=2255.
    pub fn set_datetime(&self, dt: NaiveDateTime) -> Result<(), ProtocolError> {
        let year = dt.year();
        if !(2000..=2255).contains(&year) {
            return Err(ProtocolError::OutOfRange {
                reading: "year",
                value: f64::from(year),
            });
        }
        let cmd = Command::SetDateTime {
            year: (year - 2000) as u8,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        };
        let response = self.execute(&cmd)?;
        let ack: [u8; 1] = to_array(response)?;
        self.validated(&cmd, decode::decode_ack(ack[0]))
    }

    /// Gyroscope X/Y/Z positions. Only supported by GMC-320 Re.3.01
    /// or later.
    pub fn get_gyroscope(&self) -> Result<GyroVector, ProtocolError> {
        let cmd = Command::GetGyroscope;
        let response = self.execute(&cmd)?;
        self.validated(&cmd, decode::decode_gyroscope(&to_array(response)?))
    }

    /// Read the configuration block and derive the CPM-to-µSv/h
    /// conversion factor from its three calibration pairs.
    ///
    /// The factor is not cached here; callers compute it once at setup
    /// and keep it for the session.
    pub fn get_conversion_factor(&self) -> Result<f64, ProtocolError> {
        let cmd = Command::GetConfig;
        let response = self.execute(&cmd)?;
        self.validated(&cmd, decode::decode_calibration(&response))
    }

    /// Power the unit off. Fire-and-forget: the device sends no reply.
    pub fn power_off(&self) -> Result<(), ProtocolError> {
        self.execute(&Command::PowerOff).map(|_| ())
    }

    /// Power the unit on. Fire-and-forget.
    pub fn power_on(&self) -> Result<(), ProtocolError> {
        self.execute(&Command::PowerOn).map(|_| ())
    }

    /// Reboot the unit. Fire-and-forget.
    pub fn reboot(&self) -> Result<(), ProtocolError> {
        self.execute(&Command::Reboot).map(|_| ())
    }

    /// Reset the unit to factory defaults. Unlike the power commands
    /// this one is acknowledged with a single 0xAA byte.
    pub fn factory_reset(&self) -> Result<(), ProtocolError> {
        let cmd = Command::FactoryReset;
        let response = self.execute(&cmd)?;
        let ack: [u8; 1] = to_array(response)?;
        self.validated(&cmd, decode::decode_ack(ack[0]))
    }

    /// Enable heartbeat mode: the device pushes one CPS sample per
    /// second until disabled. Samples are read with
    /// [`Device::read_heartbeat`].
    pub fn enable_heartbeat(&self) -> Result<(), ProtocolError> {
        self.execute(&Command::HeartbeatOn).map(|_| ())
    }

    /// Disable heartbeat mode and discard any samples still buffered.
    pub fn disable_heartbeat(&self) -> Result<(), ProtocolError> {
        self.execute(&Command::HeartbeatOff)?;
        let mut channel = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        channel
            .clear_input_buffer()
            .map_err(|e| ProtocolError::Serial(e.to_string()))
    }

    /// Read one pushed heartbeat sample (counts per second, 14 bits).
    /// Only meaningful while heartbeat mode is enabled; no command is
    /// written and the input buffer is left intact between samples.
    pub fn read_heartbeat(&self) -> Result<u16, ProtocolError> {
        let mut channel = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut sample = [0u8; 2];
        let timeout = Duration::from_millis(self.config.timeout_ms);
        read_exact_timeout(channel.as_mut(), &mut sample, timeout)?;
        Ok(decode::decode_heartbeat(&sample))
    }

    /// Log validation failures distinctly from transient link errors:
    /// they indicate a protocol or firmware mismatch, not a flaky
    /// cable.
    fn validated<T>(
        &self,
        command: &Command,
        result: Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        if let Err(err) = &result {
            warn!(
                command = command.name(),
                error = %err,
                "response failed validation"
            );
        }
        result
    }
}

/// Convert an exchange result into the fixed-size array a decoder
/// expects. `execute` guarantees the length, so a mismatch here still
/// surfaces as a short read rather than a panic.
fn to_array<const N: usize>(response: Vec<u8>) -> Result<[u8; N], ProtocolError> {
    let actual = response.len();
    response.try_into().map_err(|_| ProtocolError::ShortRead {
        expected: N,
        actual,
    })
}

/// Read exactly `buf.len()` bytes under an overall deadline, polling
/// availability so a stalled device cannot block past the timeout.
fn read_exact_timeout(
    channel: &mut dyn Channel,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let start = Instant::now();
    let mut offset = 0;

    while offset < buf.len() {
        if start.elapsed() > timeout {
            return Err(if offset == 0 {
                ProtocolError::Timeout
            } else {
                ProtocolError::ShortRead {
                    expected: buf.len(),
                    actual: offset,
                }
            });
        }

        let available = channel
            .bytes_to_read()
            .map_err(|e| ProtocolError::Serial(e.to_string()))? as usize;
        if available == 0 {
            std::thread::sleep(POLL_INTERVAL);
            continue;
        }

        let to_read = available.min(buf.len() - offset);
        match channel.read(&mut buf[offset..offset + to_read]) {
            Ok(0) => {
                return Err(ProtocolError::ShortRead {
                    expected: buf.len(),
                    actual: offset,
                })
            }
            Ok(n) => offset += n,
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(e) => return Err(ProtocolError::Serial(e.to_string())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_config_default() {
        let config = DeviceConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
        assert_eq!(config.limits.max_cpm, 1_000_000);
        assert_eq!(config.limits.max_volts, 10.0);
    }

    #[test]
    fn test_to_array_length_mismatch() {
        let err = to_array::<4>(vec![1, 2]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortRead {
                expected: 4,
                actual: 2
            }
        ));
    }
}
