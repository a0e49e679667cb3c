//! Command-line client for GQ GMC Geiger counters.
//!
//! Reference consumer of `gmc-core`: connects with setup retries,
//! reads the device's calibration (falling back to the model default
//! when the config block cannot be read), and exposes the protocol
//! operations as subcommands.

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use gmc_core::prelude::*;

#[derive(Parser)]
#[command(name = "gmc", version, about = "Talk to a GQ GMC Geiger counter over serial")]
struct Cli {
    /// Serial port the counter is attached to
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Baud rate (57600 for GMC-300 V3.xx and most later units)
    #[arg(long, default_value_t = 57600)]
    baud: u32,

    /// Emit machine-readable JSON instead of plain text
    #[arg(long)]
    json: bool,

    /// Attempts for setup and per-poll retries
    #[arg(long, default_value_t = 3)]
    retries: u32,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print device identity, clock, environment readings and
    /// calibration
    Info,
    /// Poll CPM/voltage/dose-rate snapshots
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 30)]
        interval: u64,
        /// Stop after this many snapshots (default: run forever)
        #[arg(long)]
        count: Option<u64>,
    },
    /// Set the device clock from the host's local time
    SetClock,
    /// Switch the unit on or off
    Power {
        /// Target power state
        state: PowerState,
    },
    /// Reboot the unit
    Reboot,
    /// Reset the unit to factory defaults
    FactoryReset {
        /// Confirm the reset; refused otherwise
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PowerState {
    On,
    Off,
}

#[derive(Serialize)]
struct InfoReport {
    model: String,
    revision: String,
    serial_number: String,
    device_time: Option<String>,
    temperature_c: Option<f64>,
    gyroscope: Option<[u16; 3]>,
    voltage: f64,
    cpm: u16,
    usv_per_hour: f64,
    conversion_factor: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let retry = RetryPolicy {
        attempts: cli.retries,
        ..RetryPolicy::default()
    };

    let config = DeviceConfig {
        port_name: cli.port.clone(),
        baud_rate: cli.baud,
        ..DeviceConfig::default()
    };

    // Setup: open the port and probe with a CPM read, reconnecting on
    // failure. A stuck adapter often answers garbage on the first
    // exchange after plug-in.
    let device = retry
        .run(|| {
            let device = Device::open(config.clone())?;
            device.get_cpm()?;
            Ok(device)
        })
        .with_context(|| format!("could not connect to GMC device at {}", cli.port))?;

    match cli.command {
        Cmd::Info => info(&device, &retry, cli.json),
        Cmd::Watch { interval, count } => watch(&device, &retry, cli.json, interval, count),
        Cmd::SetClock => {
            let now = chrono::Local::now().naive_local();
            device
                .set_datetime(now)
                .context("device did not acknowledge SETDATETIME")?;
            println!("device clock set to {}", now.format("%Y-%m-%d %H:%M:%S"));
            Ok(())
        }
        Cmd::Power { state } => {
            match state {
                PowerState::On => device.power_on()?,
                PowerState::Off => device.power_off()?,
            }
            Ok(())
        }
        Cmd::Reboot => {
            device.reboot()?;
            Ok(())
        }
        Cmd::FactoryReset { yes } => {
            anyhow::ensure!(yes, "refusing factory reset without --yes");
            device
                .factory_reset()
                .context("device did not acknowledge FACTORYRESET")?;
            println!("factory reset acknowledged");
            Ok(())
        }
    }
}

/// Read the calibration from the device, falling back to the model
/// default when the config block cannot be read. Defaulting is a
/// deliberate caller-level policy; the core never substitutes values.
fn conversion_factor(device: &Device, retry: &RetryPolicy) -> f64 {
    match retry.run(|| device.get_conversion_factor()) {
        Ok(factor) => factor,
        Err(err) => {
            warn!(
                error = %err,
                default = DEFAULT_CONVERSION_FACTOR,
                "could not read calibration from device, using default"
            );
            DEFAULT_CONVERSION_FACTOR
        }
    }
}

fn info(device: &Device, retry: &RetryPolicy, json: bool) -> anyhow::Result<()> {
    let version = retry.run(|| device.get_version())?;
    let serial_number = retry.run(|| device.get_serial_number())?;
    let factor = conversion_factor(device, retry);
    let snapshot = retry.run(|| Snapshot::read(device, factor))?;

    // Clock, temperature and gyro are absent on older units; report
    // them as unavailable rather than failing the whole command.
    let device_time = device
        .get_datetime()
        .ok()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string());
    let temperature_c = device.get_temperature().ok();
    let gyroscope = device.get_gyroscope().ok().map(|g| [g.x, g.y, g.z]);

    let report = InfoReport {
        model: version.model,
        revision: version.revision,
        serial_number,
        device_time,
        temperature_c,
        gyroscope,
        voltage: snapshot.voltage,
        cpm: snapshot.cpm,
        usv_per_hour: snapshot.usv_per_hour,
        conversion_factor: factor,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("model:             {}", report.model);
        println!("revision:          {}", report.revision);
        println!("serial number:     {}", report.serial_number);
        println!(
            "device time:       {}",
            report.device_time.as_deref().unwrap_or("unavailable")
        );
        match report.temperature_c {
            Some(t) => println!("temperature:       {t} °C"),
            None => println!("temperature:       unavailable"),
        }
        match report.gyroscope {
            Some([x, y, z]) => println!("gyroscope:         x={x} y={y} z={z}"),
            None => println!("gyroscope:         unavailable"),
        }
        println!("battery voltage:   {} V", report.voltage);
        println!("cpm:               {}", report.cpm);
        println!("dose rate:         {} µSv/h", report.usv_per_hour);
        println!("conversion factor: {} µSv/h per CPM", report.conversion_factor);
    }
    Ok(())
}

fn watch(
    device: &Device,
    retry: &RetryPolicy,
    json: bool,
    interval: u64,
    count: Option<u64>,
) -> anyhow::Result<()> {
    let factor = conversion_factor(device, retry);
    let mut taken = 0u64;

    loop {
        match retry.run(|| Snapshot::read(device, factor)) {
            Ok(snapshot) => {
                if json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else {
                    println!(
                        "{}  cpm={:<6} dose={:.3} µSv/h  battery={:.1} V",
                        chrono::Local::now().format("%H:%M:%S"),
                        snapshot.cpm,
                        snapshot.usv_per_hour,
                        snapshot.voltage,
                    );
                }
            }
            Err(err) => warn!(error = %err, "poll failed"),
        }

        taken += 1;
        if count.is_some_and(|c| taken >= c) {
            return Ok(());
        }
        std::thread::sleep(Duration::from_secs(interval));
    }
}
