//! Synchronous `tokio-modbus` client for the IOT-485-EC4A conductivity
//! sensor.
//!
//! This module provides a high-level API (`Ec4a` struct) that maps the typed
//! register definitions from [`crate::protocol`] onto blocking Modbus RTU
//! transactions. The client is generic over [`RegisterIo`] so the calibration
//! and acquisition layers can be driven against scripted transports in tests;
//! production code uses `tokio_modbus::client::sync::Context`.
//!
//! # Examples
//!
//! ```no_run
//! use ec4a_lib::{protocol as proto, tokio_sync_client::Ec4a};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let builder = ec4a_lib::tokio_common::serial_port_builder("/dev/ttyUSB0");
//!     let ctx = tokio_modbus::client::sync::rtu::connect_slave(
//!         &builder,
//!         tokio_modbus::Slave(proto::SLAVE_ADDRESS),
//!     )?;
//!     let mut client = Ec4a::new(ctx);
//!     client.set_timeout(Duration::from_secs(1));
//!
//!     let temperature = client.read_temperature()?;
//!     println!("Water temperature: {temperature} °C");
//!     Ok(())
//! }
//! ```

use crate::{
    protocol as proto,
    tokio_common::{RegisterIo, Result},
};
use std::time::Duration;

/// Synchronous client for one IOT-485-EC4A sensor.
///
/// Owns the underlying transport exclusively; the sensor bus is not designed
/// for concurrent access, so exactly one `Ec4a` should be live per process.
/// All methods block the calling thread until the transport responds or the
/// configured timeout elapses.
#[derive(Debug)]
pub struct Ec4a<C> {
    io: C,
}

impl<C: RegisterIo> Ec4a<C> {
    /// Creates a new client over the given register transport.
    pub fn new(io: C) -> Self {
        Self { io }
    }

    /// Consumes the client, returning the underlying transport.
    pub fn into_inner(self) -> C {
        self.io
    }

    /// Reads the water temperature (registers 60-61) in °C.
    pub fn read_temperature(&mut self) -> Result<proto::Temperature> {
        let words = self
            .io
            .read_registers(proto::Temperature::ADDRESS, proto::Temperature::QUANTITY)?;
        Ok(proto::Temperature::decode_from_holding_registers(&words)?)
    }

    /// Reads the uncompensated conductivity (registers 45-46) in mS/cm.
    pub fn read_raw_ec(&mut self) -> Result<proto::RawEc> {
        let words = self
            .io
            .read_registers(proto::RawEc::ADDRESS, proto::RawEc::QUANTITY)?;
        Ok(proto::RawEc::decode_from_holding_registers(&words)?)
    }

    /// Reads the sensor's internally compensated conductivity
    /// (registers 41-42) in mS/cm.
    pub fn read_sensor_ec(&mut self) -> Result<proto::SensorEc> {
        let words = self
            .io
            .read_registers(proto::SensorEc::ADDRESS, proto::SensorEc::QUANTITY)?;
        Ok(proto::SensorEc::decode_from_holding_registers(&words)?)
    }

    /// Reads the calibration coefficient (registers 28-29).
    pub fn read_calibration_coefficient(&mut self) -> Result<proto::CalibrationCoefficient> {
        let words = self.io.read_registers(
            proto::CalibrationCoefficient::ADDRESS,
            proto::CalibrationCoefficient::QUANTITY,
        )?;
        Ok(proto::CalibrationCoefficient::decode_from_holding_registers(
            &words,
        )?)
    }

    /// Reads the calibration mode control register (13).
    pub fn read_calibration_mode_register(&mut self) -> Result<u16> {
        self.read_register(proto::CALIBRATION_MODE_REG_ADDR)
    }

    /// Reads a single holding register.
    ///
    /// Used for the diagnostic registers (1, 2, 16) and read-back
    /// verification after calibration writes.
    pub fn read_register(&mut self, address: u16) -> Result<u16> {
        let words = self.io.read_registers(address, 1)?;
        match *words.as_slice() {
            [word] => Ok(word),
            _ => Err(proto::Error::RegisterCountMismatch {
                expected: 1,
                actual: words.len(),
            }
            .into()),
        }
    }

    /// Writes a single holding register as one wire transaction.
    pub fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.io.write_register(address, value)
    }

    /// Writes a float to a register pair as one two-word wire transaction.
    ///
    /// Float registers must never be written one word at a time; the pair is
    /// the atomic unit.
    pub fn write_float_register(&mut self, address: u16, value: f32) -> Result<()> {
        let pair = proto::RegisterPair::from_f32(value);
        self.io.write_registers(address, &pair.to_words())
    }

    /// Reads back a register pair for verification, without decoding into a
    /// typed value.
    pub fn read_register_pair(&mut self, address: u16) -> Result<proto::RegisterPair> {
        let words = self.io.read_registers(address, 2)?;
        Ok(proto::RegisterPair::try_from(words.as_slice())?)
    }
}

impl Ec4a<tokio_modbus::client::sync::Context> {
    /// Sets the timeout for Modbus communication.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.io.set_timeout(timeout);
    }

    /// Retrieves the current Modbus communication timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.io.timeout()
    }
}
