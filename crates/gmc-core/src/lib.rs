//! # gmc-core
//!
//! Protocol client for GQ GMC Geiger counters speaking GQ-RFC1201 over
//! a serial line.

#![warn(missing_docs)]

//!
//! This library provides:
//! - Command framing and response parsing for every RFC1201 operation
//!   (CPM, voltage, temperature, date/time, gyroscope, serial number,
//!   model/version, calibration, power control, heartbeat)
//! - A device handle that serializes exchanges on the shared serial
//!   channel and validates responses defensively
//! - Calibrated dose-rate derivation from the device's own
//!   configuration block
//! - A caller-side retry policy for setup and polling
//!
//! ## Example
//!
//! ```rust,ignore
//! use gmc_core::prelude::*;
//!
//! let device = Device::open(DeviceConfig {
//!     port_name: "/dev/ttyUSB0".into(),
//!     ..DeviceConfig::default()
//! })?;
//!
//! let factor = device
//!     .get_conversion_factor()
//!     .unwrap_or(DEFAULT_CONVERSION_FACTOR);
//! let snapshot = Snapshot::read(&device, factor)?;
//! println!("{} CPM = {} µSv/h", snapshot.cpm, snapshot.usv_per_hour);
//! ```

pub mod measurement;
pub mod protocol;
pub mod retry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::measurement::{dose_rate, Snapshot, DEFAULT_CONVERSION_FACTOR};
    pub use crate::protocol::{
        Command, Device, DeviceConfig, GyroVector, ModelInfo, ProtocolError, ReadingLimits,
    };
    pub use crate::retry::RetryPolicy;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
