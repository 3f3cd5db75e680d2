//! A library for the BOQU IOT-485-EC4A electrical-conductivity sensor.
//!
//! The IOT-485-EC4A reports water temperature and EC over Modbus RTU
//! (RS-485, 9600 8N1, fixed slave ID 4). Its firmware compensates EC to
//! 25 °C with a fixed 2 %/°C coefficient, which over-compensates at low
//! temperatures; this crate reads the *raw* EC value and recomputes the
//! compensation host-side with a temperature-bucketed coefficient table.
//!
//! ## Features
//!
//! - **Protocol Implementation**: Register map, ABCD float codec and
//!   calibration commands of the IOT-485-EC4A ([`protocol`]).
//! - **Host-Side Compensation**: The dynamic-coefficient algorithm
//!   ([`compensation`]).
//! - **Synchronous Client**: Blocking Modbus RTU access through
//!   `tokio-modbus` ([`tokio_sync_client`]).
//! - **Port Discovery**: First-responder scan over the fixed candidate
//!   list of serial device paths ([`scanner`]).
//! - **Calibration Sequencer**: Guided register-write sequences with
//!   advisory read-back verification ([`calibration`]).
//! - **Acquisition Loop**: Poll, recompute, emit - with injectable pacing
//!   and retry bounds ([`acquisition`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use ec4a_lib::{
//!     acquisition::Acquisition, clock::SystemClock, protocol as proto,
//!     tokio_sync_client::Ec4a,
//! };
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = ec4a_lib::scanner::discover(Duration::from_millis(100))
//!         .ok_or("no responsive port")?;
//!     let ctx = tokio_modbus::client::sync::rtu::connect_slave(
//!         &ec4a_lib::tokio_common::serial_port_builder(&port),
//!         tokio_modbus::Slave(proto::SLAVE_ADDRESS),
//!     )?;
//!     let mut client = Ec4a::new(ctx);
//!     client.set_timeout(Duration::from_secs(1));
//!
//!     let reading = Acquisition::sample(&mut client)?;
//!     println!(
//!         "temp {:.2} °C, smart EC {:.3} mS/cm",
//!         reading.temperature, reading.smart_ec
//!     );
//!     Ok(())
//! }
//! ```

pub mod compensation;
pub mod protocol;

pub mod clock;
pub mod scanner;

#[cfg_attr(docsrs, doc(cfg(feature = "tokio-rtu-sync")))]
#[cfg(feature = "tokio-rtu-sync")]
pub mod tokio_common;

#[cfg_attr(docsrs, doc(cfg(feature = "tokio-rtu-sync")))]
#[cfg(feature = "tokio-rtu-sync")]
pub mod tokio_sync_client;

#[cfg_attr(docsrs, doc(cfg(feature = "tokio-rtu-sync")))]
#[cfg(feature = "tokio-rtu-sync")]
pub mod calibration;

#[cfg_attr(docsrs, doc(cfg(feature = "tokio-rtu-sync")))]
#[cfg(feature = "tokio-rtu-sync")]
pub mod acquisition;
