//! Serial-port auto-discovery for the IOT-485-EC4A.
//!
//! The sensor usually appears behind a USB-to-RS485 adapter whose device
//! path depends on the host setup: legacy/WSL1 setups map it to a `ttyS`
//! port, native Linux and WSL2 USB passthrough to `ttyUSB` or `ttyACM`.
//! Discovery walks a fixed candidate list in declared order and probes each
//! path with a short handshake read of the temperature registers; the first
//! responder wins.

#[cfg(feature = "tokio-rtu-sync")]
use crate::{protocol as proto, tokio_common, tokio_sync_client::Ec4a};
#[cfg(feature = "tokio-rtu-sync")]
use log::{debug, info};
#[cfg(feature = "tokio-rtu-sync")]
use std::time::Duration;

/// Number of legacy `ttyS` ports probed (`/dev/ttyS0` through `/dev/ttyS20`).
pub const TTYS_PORTS: u8 = 21;
/// Number of `ttyUSB` ports probed (`/dev/ttyUSB0` through `/dev/ttyUSB4`).
pub const TTYUSB_PORTS: u8 = 5;
/// Number of `ttyACM` ports probed (`/dev/ttyACM0` through `/dev/ttyACM4`).
pub const TTYACM_PORTS: u8 = 5;

/// The candidate device paths, in probe order.
pub fn candidate_ports() -> Vec<String> {
    let mut ports = Vec::new();
    for i in 0..TTYS_PORTS {
        ports.push(format!("/dev/ttyS{i}"));
    }
    for i in 0..TTYUSB_PORTS {
        ports.push(format!("/dev/ttyUSB{i}"));
    }
    for i in 0..TTYACM_PORTS {
        ports.push(format!("/dev/ttyACM{i}"));
    }
    ports
}

/// Walks `candidates` in order and returns the first entry `probe` accepts.
///
/// Candidates after the first responder are never probed. Returns `None`
/// when the list is exhausted.
pub fn discover_with<I, F>(candidates: I, mut probe: F) -> Option<String>
where
    I: IntoIterator<Item = String>,
    F: FnMut(&str) -> bool,
{
    candidates.into_iter().find(|port| probe(port))
}

/// Probes one device path: binds RTU at 9600 8N1 to slave 4 and attempts a
/// single read of the temperature register pair.
#[cfg(feature = "tokio-rtu-sync")]
pub fn probe_port(port: &str, timeout: Duration) -> bool {
    let builder = tokio_common::serial_port_builder(port);
    let ctx = match tokio_modbus::client::sync::rtu::connect_slave(
        &builder,
        tokio_modbus::Slave(proto::SLAVE_ADDRESS),
    ) {
        Ok(ctx) => ctx,
        Err(err) => {
            debug!("Cannot open {port}: {err}");
            return false;
        }
    };

    let mut client = Ec4a::new(ctx);
    client.set_timeout(timeout);
    match client.read_temperature() {
        Ok(temperature) => {
            info!("Found sensor at {port} (temperature {temperature} °C)");
            true
        }
        Err(err) => {
            debug!("No response from {port}: {err}");
            false
        }
    }
}

/// Scans the default candidate list for a responsive sensor.
///
/// `timeout` bounds each handshake read; 100 ms keeps a full scan of all 31
/// candidates within a few seconds. Returns the first responsive device
/// path, or `None` if every candidate failed.
#[cfg(feature = "tokio-rtu-sync")]
pub fn discover(timeout: Duration) -> Option<String> {
    info!(
        "Scanning ports for IOT-485-EC4A (slave {}, {} baud)...",
        proto::SLAVE_ADDRESS,
        proto::BAUD_RATE
    );
    discover_with(candidate_ports(), |port| probe_port(port, timeout))
}
