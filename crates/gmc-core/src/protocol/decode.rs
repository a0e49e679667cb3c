//! Response decoders
//!
//! Pure byte-level parsers for each GQ-RFC1201 response shape. Every
//! decoder takes the exact response returned by the exchange engine and
//! either produces a validated value or an error; no decoder ever
//! returns a truncated or partially-valid result.

use chrono::{NaiveDate, NaiveDateTime};

use super::{ProtocolError, ReadingLimits, RESPONSE_TERMINATOR};

/// Hardware model and firmware revision, split out of the 15-byte
/// `<GETVER>>` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Hardware model, e.g. "GMC-300E"
    pub model: String,
    /// Firmware revision, e.g. "Re 4.20"
    pub revision: String,
}

/// Gyroscope reading from the `<GETGYRO>>` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GyroVector {
    /// X position
    pub x: u16,
    /// Y position
    pub y: u16,
    /// Z position
    pub z: u16,
}

/// Size in bytes of the configuration block read by `<GETCFG>>`.
pub const CONFIG_BLOCK_LEN: usize = 256;

/// Offset pairs of the three calibration points within the config
/// block: (big-endian u16 CPM threshold, little-endian f32 µSv/h).
const CALIBRATION_OFFSETS: [(usize, usize); 3] = [(8, 10), (14, 16), (20, 22)];

/// Minimum config block length covering all calibration fields.
const CALIBRATION_MIN_LEN: usize = 26;

fn check_terminator(response: &[u8]) -> Result<(), ProtocolError> {
    match response.last() {
        Some(&RESPONSE_TERMINATOR) => Ok(()),
        _ => Err(ProtocolError::MissingTerminator),
    }
}

fn be_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Decode a 2-byte big-endian CPM response.
///
/// The ceiling is a plausibility filter, not a protocol constant; see
/// [`ReadingLimits::max_cpm`].
pub fn decode_cpm(response: &[u8; 2], limits: &ReadingLimits) -> Result<u16, ProtocolError> {
    let cpm = be_u16(response);
    if u32::from(cpm) > limits.max_cpm {
        return Err(ProtocolError::OutOfRange {
            reading: "cpm",
            value: f64::from(cpm),
        });
    }
    Ok(cpm)
}

/// Decode the 1-byte voltage response (raw tenths of a volt).
pub fn decode_voltage(raw: u8, limits: &ReadingLimits) -> Result<f64, ProtocolError> {
    let volts = f64::from(raw) / 10.0;
    if volts > limits.max_volts {
        return Err(ProtocolError::OutOfRange {
            reading: "voltage",
            value: volts,
        });
    }
    Ok(volts)
}

/// Decode the 15-byte ASCII version response into model (first 8
/// characters) and revision (remainder), both trimmed.
pub fn decode_version(response: &[u8; 15]) -> Result<ModelInfo, ProtocolError> {
    let (model_raw, revision_raw) = response.split_at(8);
    let as_text = |bytes: &[u8]| {
        std::str::from_utf8(bytes)
            .map(|s| s.trim().to_string())
            .map_err(|_| ProtocolError::Malformed("version response is not ASCII".into()))
    };
    let model = as_text(model_raw)?;
    let revision = as_text(revision_raw)?;
    if model.is_empty() || revision.is_empty() {
        return Err(ProtocolError::Malformed(format!(
            "empty model or revision in version response {response:02x?}"
        )));
    }
    Ok(ModelInfo { model, revision })
}

/// Decode the 7-byte serial number into 14 uppercase hex digits.
pub fn decode_serial_number(response: &[u8; 7]) -> String {
    response.iter().map(|b| format!("{b:02X}")).collect()
}

/// Decode the 4-byte temperature response: integer part, hundredths,
/// sign byte, 0xAA terminator.
pub fn decode_temperature(response: &[u8; 4]) -> Result<f64, ProtocolError> {
    check_terminator(response)?;
    let temp = f64::from(response[0]) + f64::from(response[1]) / 100.0;
    Ok(if response[2] != 0 { -temp } else { temp })
}

/// Decode the 7-byte date/time response (YY MM DD HH MM SS 0xAA, years
/// since 2000). Out-of-range calendar fields are rejected.
pub fn decode_datetime(response: &[u8; 7]) -> Result<NaiveDateTime, ProtocolError> {
    check_terminator(response)?;
    let [year, month, day, hour, minute, second, _] = *response;
    NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))
        .and_then(|d| d.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)))
        .ok_or_else(|| {
            ProtocolError::Malformed(format!(
                "invalid calendar fields: {:02}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ))
        })
}

/// Decode the 7-byte gyroscope response (three big-endian u16 values
/// plus terminator).
pub fn decode_gyroscope(response: &[u8; 7]) -> Result<GyroVector, ProtocolError> {
    check_terminator(response)?;
    Ok(GyroVector {
        x: be_u16(&response[0..2]),
        y: be_u16(&response[2..4]),
        z: be_u16(&response[4..6]),
    })
}

/// Extract the CPM-to-µSv/h conversion factor from a configuration
/// block.
///
/// The device stores three calibration points as (CPM threshold,
/// µSv/h) pairs; the factor is the arithmetic mean of the per-pair
/// ratios µSv/CPM. A zero threshold or non-finite float means the
/// block is corrupt and yields a decode failure, never a partial
/// result.
pub fn decode_calibration(config: &[u8]) -> Result<f64, ProtocolError> {
    if config.len() < CALIBRATION_MIN_LEN {
        return Err(ProtocolError::Malformed(format!(
            "configuration block too short: {} bytes, need at least {CALIBRATION_MIN_LEN}",
            config.len()
        )));
    }

    let mut sum = 0.0f64;
    for (cpm_at, usv_at) in CALIBRATION_OFFSETS {
        let cpm = be_u16(&config[cpm_at..cpm_at + 2]);
        let usv = f32::from_le_bytes([
            config[usv_at],
            config[usv_at + 1],
            config[usv_at + 2],
            config[usv_at + 3],
        ]);
        if cpm == 0 {
            return Err(ProtocolError::Malformed(format!(
                "zero CPM calibration threshold at offset {cpm_at}"
            )));
        }
        if !usv.is_finite() {
            return Err(ProtocolError::Malformed(format!(
                "non-finite µSv calibration value at offset {usv_at}"
            )));
        }
        sum += f64::from(usv) / f64::from(cpm);
    }
    Ok(sum / CALIBRATION_OFFSETS.len() as f64)
}

/// Decode a single acknowledgment byte (factory reset, set-date-time).
pub fn decode_ack(byte: u8) -> Result<(), ProtocolError> {
    if byte == RESPONSE_TERMINATOR {
        Ok(())
    } else {
        Err(ProtocolError::NotAcknowledged(byte))
    }
}

/// Decode a 2-byte heartbeat sample. The count-per-second value lives
/// in the low 14 bits.
pub fn decode_heartbeat(response: &[u8; 2]) -> u16 {
    be_u16(response) & 0x3FFF
}
