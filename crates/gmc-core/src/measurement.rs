//! Calibrated measurements
//!
//! Turns raw protocol readings into the dose-rate figures consumers
//! actually want. The conversion factor comes from the device's own
//! calibration pairs (see
//! [`Device::get_conversion_factor`](crate::protocol::Device::get_conversion_factor));
//! falling back to a model default when the device cannot supply one
//! is caller policy, not something this module does silently.

use serde::{Deserialize, Serialize};

use crate::protocol::{Device, ProtocolError};

/// Factory calibration factor for the GMC-300E Plus, in µSv/h per CPM.
/// A reasonable caller-side fallback when the configuration block
/// cannot be read.
pub const DEFAULT_CONVERSION_FACTOR: f64 = 0.0065;

/// Convert a CPM reading to a dose rate in µSv/h, rounded to three
/// decimal places.
pub fn dose_rate(cpm: u16, conversion_factor: f64) -> f64 {
    (f64::from(cpm) * conversion_factor * 1000.0).round() / 1000.0
}

/// One poll's worth of readings: raw CPM, battery voltage, and the
/// derived dose rate. Produced fresh per poll, never persisted here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Counts per minute
    pub cpm: u16,
    /// Battery voltage in volts
    pub voltage: f64,
    /// Derived dose rate in µSv/h
    pub usv_per_hour: f64,
}

impl Snapshot {
    /// Take one CPM and one voltage reading and derive the dose rate.
    ///
    /// If either reading fails, the whole snapshot fails; a dose rate
    /// is never derived from an absent or invalid CPM value.
    pub fn read(device: &Device, conversion_factor: f64) -> Result<Self, ProtocolError> {
        let cpm = device.get_cpm()?;
        let voltage = device.get_voltage()?;
        Ok(Self {
            cpm,
            voltage,
            usv_per_hour: dose_rate(cpm, conversion_factor),
        })
    }
}
