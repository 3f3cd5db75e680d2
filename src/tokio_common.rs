//! Common error types and the register transport seam for the `tokio` based
//! client.
//!
//! The [`RegisterIo`] trait is the single point through which the calibration
//! engine, the port scanner and the acquisition loop touch the wire. The only
//! production implementation wraps `tokio_modbus::client::sync::Context`;
//! tests substitute scripted in-memory implementations.

use crate::protocol as proto;
use tokio_modbus::prelude::{SyncReader, SyncWriter};

/// A wire-level failure below the register abstraction.
#[derive(thiserror::Error, Debug)]
pub enum IoFailure {
    /// The device answered with a Modbus exception code.
    #[error(transparent)]
    Exception(#[from] tokio_modbus::ExceptionCode),

    /// Transport failure: timeout, serial error, malformed frame.
    #[error(transparent)]
    Transport(#[from] tokio_modbus::Error),
}

/// All errors that can occur while talking to the sensor.
///
/// Read and write failures carry the register address of the failing
/// transaction so callers can report exactly which access went wrong.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Wraps `proto::Error`.
    #[error(transparent)]
    Protocol(#[from] proto::Error),

    /// A register read failed at the wire level.
    #[error("Reading register {address} failed: {source}")]
    Read {
        address: u16,
        #[source]
        source: IoFailure,
    },

    /// A register write failed at the wire level.
    #[error("Writing register {address} failed: {source}")]
    Write {
        address: u16,
        #[source]
        source: IoFailure,
    },
}

impl Error {
    /// The register address of the failing wire transaction, if any.
    pub fn address(&self) -> Option<u16> {
        match self {
            Error::Read { address, .. } | Error::Write { address, .. } => Some(*address),
            Error::Protocol(_) => None,
        }
    }
}

/// The result type for sensor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Flattens the nested `tokio_modbus` result into an `IoFailure`.
fn map_tokio_result<T>(result: tokio_modbus::Result<T>) -> std::result::Result<T, IoFailure> {
    match result {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(exception)) => Err(exception.into()),
        Err(err) => Err(err.into()),
    }
}

/// Blocking holding-register access to one slave device.
///
/// Every call is a single wire transaction: reads either return all requested
/// words or fail, writes either take effect as one frame or fail. No retries
/// happen at this layer; retry policy belongs to callers.
pub trait RegisterIo {
    /// Reads `quantity` consecutive holding registers starting at `address`.
    fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>>;

    /// Writes a single holding register.
    fn write_register(&mut self, address: u16, value: u16) -> Result<()>;

    /// Writes consecutive holding registers as one transaction.
    fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()>;
}

impl RegisterIo for tokio_modbus::client::sync::Context {
    fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
        map_tokio_result(self.read_holding_registers(address, quantity))
            .map_err(|source| Error::Read { address, source })
    }

    fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        map_tokio_result(self.write_single_register(address, value))
            .map_err(|source| Error::Write { address, source })
    }

    fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        map_tokio_result(self.write_multiple_registers(address, values))
            .map_err(|source| Error::Write { address, source })
    }
}

/// The parity used for serial communication.
pub const PARITY: &tokio_serial::Parity = &tokio_serial::Parity::None;
/// The number of stop bits used for serial communication.
pub const STOP_BITS: &tokio_serial::StopBits = &tokio_serial::StopBits::One;
/// The number of data bits used for serial communication.
pub const DATA_BITS: &tokio_serial::DataBits = &tokio_serial::DataBits::Eight;

/// Creates a `tokio_serial::SerialPortBuilder` with the sensor's fixed
/// 9600 8N1 settings.
///
/// # Arguments
///
/// * `device` - The path to the serial port device (e.g. `/dev/ttyUSB0`).
pub fn serial_port_builder(device: &str) -> tokio_serial::SerialPortBuilder {
    tokio_serial::new(device, proto::BAUD_RATE)
        .parity(*PARITY)
        .stop_bits(*STOP_BITS)
        .data_bits(*DATA_BITS)
        .flow_control(tokio_serial::FlowControl::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn error_exposes_failing_address() {
        let err = Error::Read {
            address: 60,
            source: IoFailure::Transport(tokio_modbus::Error::Transport(std::io::Error::from(
                std::io::ErrorKind::TimedOut,
            ))),
        };
        assert_eq!(err.address(), Some(60));

        let err = Error::Write {
            address: 13,
            source: IoFailure::Transport(tokio_modbus::Error::Transport(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            ))),
        };
        assert_eq!(err.address(), Some(13));

        let err = Error::Protocol(proto::Error::CalibrationModeOutOfRange(9));
        assert_eq!(err.address(), None);
    }

    #[test]
    fn map_tokio_result_flattens_both_layers() {
        assert_matches!(map_tokio_result(Ok(Ok(7u16))), Ok(7));
        assert_matches!(
            map_tokio_result::<u16>(Ok(Err(tokio_modbus::ExceptionCode::IllegalDataAddress))),
            Err(IoFailure::Exception(
                tokio_modbus::ExceptionCode::IllegalDataAddress
            ))
        );
        assert_matches!(
            map_tokio_result::<u16>(Err(tokio_modbus::Error::Transport(std::io::Error::from(
                std::io::ErrorKind::TimedOut
            )))),
            Err(IoFailure::Transport(_))
        );
    }
}
