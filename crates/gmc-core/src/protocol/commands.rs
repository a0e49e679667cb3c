//! Protocol commands
//!
//! Defines the GQ-RFC1201 command frames understood by GMC Geiger
//! counters. Every command is an ASCII string of the form `<NAME>>`;
//! `SetDateTime` additionally packs six binary bytes between the name
//! and the closing `>>` marker.

/// GQ-RFC1201 commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Hardware model and firmware revision (`<GETVER>>`)
    GetVersion,

    /// Current counts-per-minute reading (`<GETCPM>>`)
    GetCpm,

    /// Battery voltage (`<GETVOLT>>`)
    GetVoltage,

    /// Device serial number (`<GETSERIAL>>`)
    GetSerial,

    /// Temperature in Celsius (`<GETTEMP>>`, GMC-320 Re.3.01+)
    GetTemperature,

    /// Device clock (`<GETDATETIME>>`)
    GetDateTime,

    /// Gyroscope X/Y/Z (`<GETGYRO>>`, GMC-320 Re.3.01+)
    GetGyroscope,

    /// First 256 bytes of device configuration, containing the three
    /// calibration pairs (`<GETCFG>>`)
    GetConfig,

    /// Power the unit off (`<POWEROFF>>`)
    PowerOff,

    /// Power the unit on (`<POWERON>>`)
    PowerOn,

    /// Reboot the unit (`<REBOOT>>`)
    Reboot,

    /// Reset the unit to factory defaults (`<FACTORYRESET>>`)
    FactoryReset,

    /// Set the device clock. Fields are packed as six raw bytes:
    /// year-2000, month, day, hour, minute, second.
    SetDateTime {
        /// Years since 2000
        year: u8,
        /// Month (1-12)
        month: u8,
        /// Day of month (1-31)
        day: u8,
        /// Hour (0-23)
        hour: u8,
        /// Minute (0-59)
        minute: u8,
        /// Second (0-59)
        second: u8,
    },

    /// Enable heartbeat mode: the device pushes a CPS sample every
    /// second (`<HEARTBEAT1>>`)
    HeartbeatOn,

    /// Disable heartbeat mode (`<HEARTBEAT0>>`)
    HeartbeatOff,
}

impl Command {
    /// Build the wire frame for this command.
    pub fn frame(&self) -> Vec<u8> {
        match self {
            Command::GetVersion => b"<GETVER>>".to_vec(),
            Command::GetCpm => b"<GETCPM>>".to_vec(),
            Command::GetVoltage => b"<GETVOLT>>".to_vec(),
            Command::GetSerial => b"<GETSERIAL>>".to_vec(),
            Command::GetTemperature => b"<GETTEMP>>".to_vec(),
            Command::GetDateTime => b"<GETDATETIME>>".to_vec(),
            Command::GetGyroscope => b"<GETGYRO>>".to_vec(),
            Command::GetConfig => b"<GETCFG>>".to_vec(),
            Command::PowerOff => b"<POWEROFF>>".to_vec(),
            Command::PowerOn => b"<POWERON>>".to_vec(),
            Command::Reboot => b"<REBOOT>>".to_vec(),
            Command::FactoryReset => b"<FACTORYRESET>>".to_vec(),
            Command::SetDateTime {
                year,
                month,
                day,
                hour,
                minute,
                second,
            } => {
                let mut frame = b"<SETDATETIME".to_vec();
                frame.extend_from_slice(&[*year, *month, *day, *hour, *minute, *second]);
                frame.extend_from_slice(b">>");
                frame
            }
            Command::HeartbeatOn => b"<HEARTBEAT1>>".to_vec(),
            Command::HeartbeatOff => b"<HEARTBEAT0>>".to_vec(),
        }
    }

    /// Expected response length in bytes. Zero means fire-and-forget:
    /// the device sends no acknowledgment and none is waited for.
    pub fn response_len(&self) -> usize {
        match self {
            Command::GetVersion => 15,
            Command::GetCpm => 2,
            Command::GetVoltage => 1,
            Command::GetSerial => 7,
            Command::GetTemperature => 4,
            Command::GetDateTime => 7,
            Command::GetGyroscope => 7,
            Command::GetConfig => 256,
            Command::FactoryReset => 1,
            Command::SetDateTime { .. } => 1,
            Command::PowerOff
            | Command::PowerOn
            | Command::Reboot
            | Command::HeartbeatOn
            | Command::HeartbeatOff => 0,
        }
    }

    /// Check if this command expects a response.
    pub fn expects_response(&self) -> bool {
        self.response_len() > 0
    }

    /// Short name used in log messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetVersion => "GETVER",
            Command::GetCpm => "GETCPM",
            Command::GetVoltage => "GETVOLT",
            Command::GetSerial => "GETSERIAL",
            Command::GetTemperature => "GETTEMP",
            Command::GetDateTime => "GETDATETIME",
            Command::GetGyroscope => "GETGYRO",
            Command::GetConfig => "GETCFG",
            Command::PowerOff => "POWEROFF",
            Command::PowerOn => "POWERON",
            Command::Reboot => "REBOOT",
            Command::FactoryReset => "FACTORYRESET",
            Command::SetDateTime { .. } => "SETDATETIME",
            Command::HeartbeatOn => "HEARTBEAT1",
            Command::HeartbeatOff => "HEARTBEAT0",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_frames() {
        assert_eq!(Command::GetCpm.frame(), b"<GETCPM>>".to_vec());
        assert_eq!(Command::GetVersion.frame(), b"<GETVER>>".to_vec());
        assert_eq!(Command::PowerOff.frame(), b"<POWEROFF>>".to_vec());
        assert_eq!(Command::HeartbeatOn.frame(), b"<HEARTBEAT1>>".to_vec());
    }

    #[test]
    fn test_set_datetime_frame() {
        let cmd = Command::SetDateTime {
            year: 24,
            month: 6,
            day: 15,
            hour: 13,
            minute: 37,
            second: 0,
        };
        let frame = cmd.frame();
        assert_eq!(&frame[..12], b"<SETDATETIME");
        assert_eq!(&frame[12..18], &[24, 6, 15, 13, 37, 0]);
        assert_eq!(&frame[18..], b">>");
    }

    #[test]
    fn test_response_lengths() {
        assert_eq!(Command::GetVersion.response_len(), 15);
        assert_eq!(Command::GetCpm.response_len(), 2);
        assert_eq!(Command::GetConfig.response_len(), 256);
        assert_eq!(Command::Reboot.response_len(), 0);
    }

    #[test]
    fn test_expects_response() {
        assert!(Command::GetCpm.expects_response());
        assert!(Command::FactoryReset.expects_response());
        assert!(!Command::PowerOff.expects_response());
        assert!(!Command::HeartbeatOff.expects_response());
    }
}
