//! Exchange-engine tests against a scripted mock channel.
//!
//! The mock records every write as one atomic block and feeds back a
//! queued response per command, which lets these tests check wire-level
//! behavior (stale-buffer discard, short reads, frame atomicity under
//! concurrent callers) without hardware.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use gmc_core::prelude::*;
use gmc_core::protocol::{Channel, CONFIG_BLOCK_LEN};

#[derive(Default)]
struct MockState {
    /// Responses handed out one per written command frame.
    responses: VecDeque<Vec<u8>>,
    /// Bytes currently readable.
    read_buf: Vec<u8>,
    /// Every write call, recorded as one block.
    writes: Vec<Vec<u8>>,
    /// Number of input-buffer clears.
    clears: usize,
}

#[derive(Clone)]
struct MockChannel {
    state: Arc<Mutex<MockState>>,
}

impl MockChannel {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn push_response(&self, bytes: &[u8]) {
        self.state.lock().unwrap().responses.push_back(bytes.to_vec());
    }

    fn preload_input(&self, bytes: &[u8]) {
        self.state.lock().unwrap().read_buf.extend_from_slice(bytes);
    }

    fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    fn clears(&self) -> usize {
        self.state.lock().unwrap().clears
    }
}

impl Read for MockChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let n = buf.len().min(state.read_buf.len());
        buf[..n].copy_from_slice(&state.read_buf[..n]);
        state.read_buf.drain(..n);
        Ok(n)
    }
}

impl Write for MockChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(buf.to_vec());
        if let Some(response) = state.responses.pop_front() {
            state.read_buf.extend_from_slice(&response);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for MockChannel {
    fn clear_input_buffer(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.read_buf.clear();
        state.clears += 1;
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok(self.state.lock().unwrap().read_buf.len() as u32)
    }
}

fn test_config() -> DeviceConfig {
    DeviceConfig {
        settle_delay_ms: 0,
        timeout_ms: 100,
        ..DeviceConfig::default()
    }
}

fn test_device(mock: &MockChannel) -> Device {
    Device::from_channel(Box::new(mock.clone()), test_config())
}

#[test]
fn cpm_exchange_sends_frame_and_decodes() {
    let mock = MockChannel::new();
    mock.push_response(&[0x00, 0x35]);
    let device = test_device(&mock);

    assert_eq!(device.get_cpm().unwrap(), 53);
    assert_eq!(mock.writes(), vec![b"<GETCPM>>".to_vec()]);
}

#[test]
fn stale_input_is_discarded_before_each_command() {
    let mock = MockChannel::new();
    // Leftovers from a previous timed-out exchange
    mock.preload_input(&[0xDE, 0xAD, 0xBE, 0xEF]);
    mock.push_response(&[0x01, 0x00]);
    let device = test_device(&mock);

    // The stale bytes must not be mistaken for this command's reply
    assert_eq!(device.get_cpm().unwrap(), 256);
    assert_eq!(mock.clears(), 1);
}

#[test]
fn short_read_fails_instead_of_truncating() {
    let mock = MockChannel::new();
    // 10 of the 15 expected version bytes
    mock.push_response(b"GMC-300ERe");
    let device = test_device(&mock);

    let err = device.get_version().unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::ShortRead {
            expected: 15,
            actual: 10
        }
    ));
}

#[test]
fn no_response_times_out() {
    let mock = MockChannel::new();
    let device = test_device(&mock);

    let err = device.get_cpm().unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout));
}

#[test]
fn version_exchange_splits_model_and_revision() {
    let mock = MockChannel::new();
    mock.push_response(b"GMC-300ERe 4.54");
    let device = test_device(&mock);

    let info = device.get_version().unwrap();
    assert_eq!(info.model, "GMC-300E");
    assert_eq!(info.revision, "Re 4.54");
}

#[test]
fn serial_number_exchange() {
    let mock = MockChannel::new();
    mock.push_response(&[0xF4, 0x88, 0x00, 0x39, 0x0A, 0x1B, 0x2C]);
    let device = test_device(&mock);

    assert_eq!(device.get_serial_number().unwrap(), "F48800390A1B2C");
}

#[test]
fn temperature_without_terminator_is_rejected() {
    let mock = MockChannel::new();
    mock.push_response(&[22, 50, 0, 0x00]);
    let device = test_device(&mock);

    let err = device.get_temperature().unwrap_err();
    assert!(matches!(err, ProtocolError::MissingTerminator));
}

#[test]
fn datetime_round_trip_set_then_get() {
    let dt = NaiveDate::from_ymd_opt(2024, 6, 15)
        .unwrap()
        .and_hms_opt(13, 37, 42)
        .unwrap();

    let mock = MockChannel::new();
    mock.push_response(&[0xAA]);
    let device = test_device(&mock);
    device.set_datetime(dt).unwrap();

    // The six payload bytes the device would store, echoed back by a
    // subsequent GETDATETIME, must decode to the same timestamp.
    let writes = mock.writes();
    let frame = &writes[0];
    assert_eq!(&frame[..12], b"<SETDATETIME");
    assert_eq!(&frame[frame.len() - 2..], b">>");
    let payload = &frame[12..18];

    let mock2 = MockChannel::new();
    let mut echoed = payload.to_vec();
    echoed.push(0xAA);
    mock2.push_response(&echoed);
    let device2 = test_device(&mock2);
    assert_eq!(device2.get_datetime().unwrap(), dt);
}

#[test]
fn set_datetime_rejects_out_of_range_year() {
    let dt = NaiveDate::from_ymd_opt(1999, 12, 31)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mock = MockChannel::new();
    let device = test_device(&mock);

    let err = device.set_datetime(dt).unwrap_err();
    assert!(matches!(err, ProtocolError::OutOfRange { .. }));
    // Nothing reached the wire
    assert!(mock.writes().is_empty());
}

#[test]
fn power_commands_are_fire_and_forget() {
    let mock = MockChannel::new();
    let device = test_device(&mock);

    device.power_off().unwrap();
    device.power_on().unwrap();
    device.reboot().unwrap();
    assert_eq!(
        mock.writes(),
        vec![
            b"<POWEROFF>>".to_vec(),
            b"<POWERON>>".to_vec(),
            b"<REBOOT>>".to_vec(),
        ]
    );
}

#[test]
fn factory_reset_requires_ack() {
    let mock = MockChannel::new();
    mock.push_response(&[0xAA]);
    let device = test_device(&mock);
    device.factory_reset().unwrap();

    let mock2 = MockChannel::new();
    mock2.push_response(&[0x55]);
    let device2 = test_device(&mock2);
    let err = device2.factory_reset().unwrap_err();
    assert!(matches!(err, ProtocolError::NotAcknowledged(0x55)));
}

#[test]
fn conversion_factor_from_config_block() {
    let mut config = vec![0u8; CONFIG_BLOCK_LEN];
    for (i, (cpm, usv)) in [(60u16, 0.39f32), (240, 1.56), (1000, 6.5)]
        .iter()
        .enumerate()
    {
        let cpm_at = 8 + i * 6;
        config[cpm_at..cpm_at + 2].copy_from_slice(&cpm.to_be_bytes());
        config[cpm_at + 2..cpm_at + 6].copy_from_slice(&usv.to_le_bytes());
    }

    let mock = MockChannel::new();
    mock.push_response(&config);
    let device = test_device(&mock);

    let factor = device.get_conversion_factor().unwrap();
    assert!((factor - 0.0065).abs() < 1e-6);
    assert_eq!(mock.writes(), vec![b"<GETCFG>>".to_vec()]);
}

#[test]
fn snapshot_derives_dose_rate() {
    let mock = MockChannel::new();
    mock.push_response(&[0x00, 0x35]); // 53 CPM
    mock.push_response(&[41]); // 4.1 V
    let device = test_device(&mock);

    let snapshot = Snapshot::read(&device, DEFAULT_CONVERSION_FACTOR).unwrap();
    assert_eq!(
        snapshot,
        Snapshot {
            cpm: 53,
            voltage: 4.1,
            usv_per_hour: 0.345
        }
    );
}

#[test]
fn snapshot_fails_when_cpm_invalid() {
    let mock = MockChannel::new();
    let device = Device::from_channel(
        Box::new(mock.clone()),
        DeviceConfig {
            limits: ReadingLimits {
                max_cpm: 100,
                ..ReadingLimits::default()
            },
            ..test_config()
        },
    );
    mock.push_response(&[0x00, 0xFF]); // 255 CPM, above the ceiling
    mock.push_response(&[41]);

    let err = Snapshot::read(&device, DEFAULT_CONVERSION_FACTOR).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::OutOfRange { reading: "cpm", .. }
    ));
}

#[test]
fn heartbeat_samples_read_without_commands() {
    let mock = MockChannel::new();
    let device = test_device(&mock);

    device.enable_heartbeat().unwrap();
    assert_eq!(mock.writes(), vec![b"<HEARTBEAT1>>".to_vec()]);

    // Two pushed CPS samples; status bits above bit 13 are masked off
    mock.preload_input(&[0x80, 0x05, 0x00, 0x07]);
    assert_eq!(device.read_heartbeat().unwrap(), 5);
    assert_eq!(device.read_heartbeat().unwrap(), 7);

    device.disable_heartbeat().unwrap();
    assert_eq!(mock.writes().len(), 2);
}

#[test]
fn concurrent_accessors_never_interleave_frames() {
    let mock = MockChannel::new();
    const PER_THREAD: usize = 10;
    for _ in 0..PER_THREAD * 2 {
        mock.push_response(&[0x00, 0x01]);
    }
    let device = Arc::new(test_device(&mock));

    let spawn_poller = |device: Arc<Device>| {
        std::thread::spawn(move || {
            for _ in 0..PER_THREAD {
                device.get_cpm().unwrap();
            }
        })
    };
    let a = spawn_poller(Arc::clone(&device));
    let b = spawn_poller(Arc::clone(&device));
    a.join().unwrap();
    b.join().unwrap();

    // Every block the channel saw is one complete frame; the exchange
    // lock never let two callers interleave bytes on the wire.
    let writes = mock.writes();
    assert_eq!(writes.len(), PER_THREAD * 2);
    for block in writes {
        assert_eq!(block, b"<GETCPM>>".to_vec());
    }
}
