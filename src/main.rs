//! Smart EC Logger CLI
//!
//! A command-line interface (CLI) application for the BOQU IOT-485-EC4A
//! conductivity sensor over Modbus RTU (serial).
//!
//! This tool allows users to:
//! - Auto-discover the serial port the sensor is attached to.
//! - Read and display the diagnostic and calibration registers.
//! - Execute one of the guided calibration sequences (modes 1-3).
//! - Poll temperature and conductivity continuously, recomputing the
//!   temperature compensation host-side and printing each reading together
//!   with the sensor's own (firmware-compensated) value and the deviation
//!   between the two.
//!
//! The CLI leverages the `ec4a_lib` crate for protocol definitions and
//! client operations.

use anyhow::{Context, Result, bail};
use clap::Parser;
use dialoguer::Select;
use ec4a_lib::{
    acquisition::{Acquisition, Reading, ReadingSink},
    calibration,
    clock::SystemClock,
    protocol as proto, scanner,
    tokio_sync_client::Ec4a,
};
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::{panic, time::Duration};

mod commandline;

/// Handshake timeout used when auto-discovering the port.
const PROBE_TIMEOUT: Duration = Duration::from_millis(100);

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown_file>", 0, 0));

        let cause_str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at '{}': {}:{} - Cause: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause_str
        );
    }));
    log_handle
}

/// Resolves the device path: the `--device` argument if given, otherwise the
/// first responsive candidate from the port scan.
fn resolve_device(device: Option<String>) -> Result<String> {
    match device {
        Some(device) => Ok(device),
        None => scanner::discover(PROBE_TIMEOUT).with_context(|| {
            format!(
                "No responsive sensor found. Check: USB connection, slave ID (must be {}), baud rate ({})",
                proto::SLAVE_ADDRESS,
                proto::BAUD_RATE
            )
        }),
    }
}

/// Binds the working connection to the sensor.
fn connect(
    device: Option<String>,
    timeout: Duration,
) -> Result<(Ec4a<tokio_modbus::client::sync::Context>, String)> {
    let device = resolve_device(device)?;
    info!(
        "Connecting to {device} (slave {}, {} baud)...",
        proto::SLAVE_ADDRESS,
        proto::BAUD_RATE
    );
    let ctx = tokio_modbus::client::sync::rtu::connect_slave(
        &ec4a_lib::tokio_common::serial_port_builder(&device),
        tokio_modbus::Slave(proto::SLAVE_ADDRESS),
    )
    .with_context(|| format!("Cannot open serial port {device}"))?;

    let mut client = Ec4a::new(ctx);
    client.set_timeout(timeout);
    Ok((client, device))
}

/// Resolves the calibration mode from the command line or interactively.
///
/// An out-of-range `--mode` value falls back to the interactive prompt; a
/// failed prompt (e.g. no terminal attached) falls back to skipping
/// calibration.
fn resolve_calibration_mode(flag: Option<u8>) -> proto::CalibrationMode {
    if let Some(value) = flag {
        match proto::CalibrationMode::try_from(value) {
            Ok(mode) => {
                info!("Using calibration mode {mode} from command line");
                return mode;
            }
            Err(err) => warn!("{err}. Using interactive selection."),
        }
    }

    let items = [
        "0: Skip calibration (use existing sensor settings)",
        "1: Mode 1 - write register 13 = 2",
        "2: Mode 2 - write register 28 = 12880 (float) + register 13 = 3",
        "3: Mode 3 - TEST: write K=190 to register 16 (K x 10000 format)",
    ];
    match Select::new()
        .with_prompt("Select calibration mode")
        .items(&items)
        .default(0)
        .interact()
    {
        Ok(index) => proto::CalibrationMode::try_from(index as u8)
            .unwrap_or(proto::CalibrationMode::Skip),
        Err(err) => {
            warn!("Mode selection failed ({err}). Skipping calibration.");
            proto::CalibrationMode::Skip
        }
    }
}

/// Prints the diagnostic and calibration registers once.
///
/// Each register is read independently so a single failing read does not
/// hide the others.
fn print_diagnostics(client: &mut Ec4a<tokio_modbus::client::sync::Context>) {
    println!("Sensor registers:");
    for address in proto::DIAGNOSTIC_REGISTERS {
        match client.read_register(address) {
            Ok(value) => println!("  Register {address:2} = {value:5}  (0x{value:04X})"),
            Err(err) => println!("  Register {address:2} = [READ ERROR: {err}]"),
        }
    }
    match client.read_calibration_mode_register() {
        Ok(value) => {
            println!(
                "  Register {:2} = {value:5}  (0x{value:04X})  <- calibration mode",
                proto::CALIBRATION_MODE_REG_ADDR
            )
        }
        Err(err) => println!(
            "  Register {:2} = [READ ERROR: {err}]  <- calibration mode",
            proto::CALIBRATION_MODE_REG_ADDR
        ),
    }
    match client.read_calibration_coefficient() {
        Ok(coefficient) => println!(
            "  Register {:2} = {coefficient}  (hex {})  <- calibration coefficient",
            proto::CalibrationCoefficient::ADDRESS,
            coefficient.words()
        ),
        Err(err) => println!(
            "  Register {:2} = [READ ERROR: {err}]  <- calibration coefficient",
            proto::CalibrationCoefficient::ADDRESS
        ),
    }
}

/// Prints each reading as one console line, with the raw hex words of the
/// float registers for audit.
struct ConsoleSink {
    samples: u64,
}

impl ConsoleSink {
    fn new() -> Self {
        Self { samples: 0 }
    }
}

impl ReadingSink for ConsoleSink {
    fn emit(&mut self, reading: &Reading) {
        self.samples += 1;
        println!(
            "[{}] #{} temp {:6.2} °C (0x{}) | raw {:7.3} (0x{}) | sensor {:7.3} | smart {:7.3} | k {:.4} | deviation {:+.3}",
            reading.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.samples,
            reading.temperature,
            reading.temperature_words,
            reading.raw_ec,
            reading.raw_ec_words,
            reading.sensor_ec,
            reading.smart_ec,
            reading.coefficient,
            reading.deviation,
        );
    }
}

/// Executes a calibration sequence; a wire failure is reported but does not
/// terminate the caller, since the acquisition loop can still run with the
/// sensor's current settings.
fn run_calibration(
    client: &mut Ec4a<tokio_modbus::client::sync::Context>,
    mode: proto::CalibrationMode,
) -> bool {
    match calibration::execute(client, &mut SystemClock, mode) {
        Ok(()) => true,
        Err(err) => {
            error!("Calibration failed: {err}");
            false
        }
    }
}

fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());
    info!(
        "Smart EC logger started. Log level: {}",
        args.verbose.log_level_filter()
    );

    match args.command {
        commandline::CliCommands::Scan { probe_timeout } => {
            match scanner::discover(probe_timeout) {
                Some(port) => println!("Found sensor at: {port}"),
                None => bail!("No responsive sensor found on any candidate port."),
            }
        }
        commandline::CliCommands::Run {
            device,
            mode,
            poll_interval,
        } => {
            let (mut client, port) = connect(device, args.timeout)?;
            println!("Connected to sensor on {port}");

            print_diagnostics(&mut client);

            let mode = resolve_calibration_mode(mode);
            if !run_calibration(&mut client, mode) {
                eprintln!("Calibration failed! Continuing with sensor defaults.");
            }

            info!("Starting acquisition loop: interval={poll_interval:?}");
            let acquisition = Acquisition {
                poll_interval,
                max_cycles: None,
            };
            acquisition.run(&mut client, &mut SystemClock, &mut ConsoleSink::new())?;
        }
        commandline::CliCommands::Read { device } => {
            let (mut client, _port) = connect(device, args.timeout)?;
            let reading =
                Acquisition::sample(&mut client).with_context(|| "Cannot read sensor")?;
            ConsoleSink::new().emit(&reading);
        }
        commandline::CliCommands::Calibrate { mode, device } => {
            let (mut client, _port) = connect(device, args.timeout)?;
            let mode = resolve_calibration_mode(Some(mode));
            if !run_calibration(&mut client, mode) {
                bail!("Calibration failed.");
            }
            println!("Calibration mode {mode} completed.");
        }
        commandline::CliCommands::Diagnostics { device } => {
            let (mut client, port) = connect(device, args.timeout)?;
            println!("Connected to sensor on {port}");
            print_diagnostics(&mut client);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_sink_counts_samples() {
        let mut sink = ConsoleSink::new();
        let reading = Reading {
            timestamp: chrono::Local::now(),
            temperature: 25.0,
            temperature_words: proto::RegisterPair::new(0x41C8, 0x0000),
            raw_ec: 12.5,
            raw_ec_words: proto::RegisterPair::new(0x4148, 0x0000),
            sensor_ec: 12.88,
            smart_ec: 12.5,
            coefficient: 0.0190,
            deviation: 0.38,
        };
        sink.emit(&reading);
        sink.emit(&reading);
        assert_eq!(sink.samples, 2);
    }
}
