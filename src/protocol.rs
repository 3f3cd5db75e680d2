//! Protocol definitions for the BOQU IOT-485-EC4A conductivity sensor.
//!
//! This module is transport-agnostic: it only describes the register map of
//! the sensor and the encodings used on the wire. All multi-register float
//! values use the ABCD convention (high word first, reinterpreted as an
//! IEEE-754 single-precision value).

use std::fmt;

/// Errors produced while encoding or decoding protocol values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A calibration mode outside the supported `0..=3` range was requested.
    #[error("Calibration mode {0} is out of range (0-3)")]
    CalibrationModeOutOfRange(u8),
    /// The device returned a different number of registers than requested.
    #[error("Expected {expected} registers, got {actual}")]
    RegisterCountMismatch { expected: usize, actual: usize },
}

/// The fixed Modbus RTU slave address of the sensor.
///
/// The IOT-485-EC4A ships with slave ID 4, not the Modbus factory
/// default of 1.
pub const SLAVE_ADDRESS: u8 = 4;

/// The fixed serial baud rate of the sensor.
pub const BAUD_RATE: u32 = 9600;

/// Read-only registers shown for troubleshooting (registers 1, 2 and 16).
pub const DIAGNOSTIC_REGISTERS: [u16; 3] = [1, 2, 16];

/// Calibration mode control register.
pub const CALIBRATION_MODE_REG_ADDR: u16 = 13;
/// Value written to register 13 for calibration mode 1.
pub const CALIBRATION_MODE_1_COMMAND: u16 = 2;
/// Value written to register 13 for calibration mode 2.
pub const CALIBRATION_MODE_2_COMMAND: u16 = 3;

/// Experimental coefficient test register probed by calibration mode 3.
pub const TEST_K_REG_ADDR: u16 = 16;
/// Scaled coefficient written during mode 3: 0.0190 x 10000.
pub const TEST_K_SCALED_VALUE: u16 = 190;

/// Standard EC calibration coefficient written during mode 2.
pub const CALIBRATION_COEFFICIENT_VALUE: f32 = 12880.0;

/// Two consecutive holding registers interpreted as one IEEE-754 float.
///
/// The sensor stores every float value in ABCD order: the register at the
/// lower address carries the high 16 bits. `Display` renders the raw words
/// as an 8-digit uppercase hex string (e.g. `41351A86`), which is the form
/// used for audit columns and for cross-checking against IEEE-754 tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterPair {
    high: u16,
    low: u16,
}

impl RegisterPair {
    pub const fn new(high: u16, low: u16) -> Self {
        Self { high, low }
    }

    /// Reinterprets the two words as an IEEE-754 single-precision value.
    ///
    /// Any bit pattern is accepted; NaN and infinity pass through untouched
    /// since no arithmetic is performed.
    pub fn to_f32(self) -> f32 {
        f32::from_bits(((self.high as u32) << 16) | self.low as u32)
    }

    /// Splits a float into its (high, low) word representation.
    pub fn from_f32(value: f32) -> Self {
        let bits = value.to_bits();
        Self {
            high: (bits >> 16) as u16,
            low: bits as u16,
        }
    }

    /// The words in wire order, ready for a multi-register write.
    pub const fn to_words(self) -> [u16; 2] {
        [self.high, self.low]
    }
}

impl TryFrom<&[u16]> for RegisterPair {
    type Error = Error;

    fn try_from(words: &[u16]) -> Result<Self, Error> {
        match *words {
            [high, low] => Ok(Self { high, low }),
            _ => Err(Error::RegisterCountMismatch {
                expected: 2,
                actual: words.len(),
            }),
        }
    }
}

impl fmt::Display for RegisterPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}{:04X}", self.high, self.low)
    }
}

/// Water temperature in degrees Celsius (registers 60-61).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(RegisterPair);

impl Temperature {
    pub const ADDRESS: u16 = 60;
    pub const QUANTITY: u16 = 2;

    pub fn decode_from_holding_registers(words: &[u16]) -> Result<Self, Error> {
        Ok(Self(RegisterPair::try_from(words)?))
    }

    pub const fn from_pair(pair: RegisterPair) -> Self {
        Self(pair)
    }

    pub fn celsius(&self) -> f32 {
        self.0.to_f32()
    }

    pub fn words(&self) -> RegisterPair {
        self.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.2}", self.celsius())
    }
}

/// Uncompensated conductivity in mS/cm (registers 45-46).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEc(RegisterPair);

impl RawEc {
    pub const ADDRESS: u16 = 45;
    pub const QUANTITY: u16 = 2;

    pub fn decode_from_holding_registers(words: &[u16]) -> Result<Self, Error> {
        Ok(Self(RegisterPair::try_from(words)?))
    }

    pub const fn from_pair(pair: RegisterPair) -> Self {
        Self(pair)
    }

    pub fn value(&self) -> f32 {
        self.0.to_f32()
    }

    pub fn words(&self) -> RegisterPair {
        self.0
    }
}

impl fmt::Display for RawEc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}", self.value())
    }
}

/// The sensor's internally compensated conductivity in mS/cm
/// (registers 41-42).
///
/// The firmware applies a fixed 2% per degree coefficient, which
/// over-compensates at low temperatures. The acquisition loop reads this
/// value only to report its deviation from the host-side calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEc(RegisterPair);

impl SensorEc {
    pub const ADDRESS: u16 = 41;
    pub const QUANTITY: u16 = 2;

    pub fn decode_from_holding_registers(words: &[u16]) -> Result<Self, Error> {
        Ok(Self(RegisterPair::try_from(words)?))
    }

    pub const fn from_pair(pair: RegisterPair) -> Self {
        Self(pair)
    }

    pub fn value(&self) -> f32 {
        self.0.to_f32()
    }

    pub fn words(&self) -> RegisterPair {
        self.0
    }
}

impl fmt::Display for SensorEc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}", self.value())
    }
}

/// Calibration coefficient stored by the sensor (registers 28-29).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationCoefficient(RegisterPair);

impl CalibrationCoefficient {
    pub const ADDRESS: u16 = 28;
    pub const QUANTITY: u16 = 2;

    pub fn decode_from_holding_registers(words: &[u16]) -> Result<Self, Error> {
        Ok(Self(RegisterPair::try_from(words)?))
    }

    pub const fn from_pair(pair: RegisterPair) -> Self {
        Self(pair)
    }

    pub fn value(&self) -> f32 {
        self.0.to_f32()
    }

    pub fn words(&self) -> RegisterPair {
        self.0
    }
}

impl fmt::Display for CalibrationCoefficient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}", self.value())
    }
}

/// Calibration procedure selector.
///
/// Each mode maps to a fixed sequence of register writes, see the
/// `calibration` module. `Skip` performs no wire traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CalibrationMode {
    /// Skip calibration, keep the sensor's current settings.
    #[default]
    Skip = 0,
    /// Write value 2 to the mode register (13).
    Mode1 = 1,
    /// Write the standard coefficient 12880 to registers 28-29, then
    /// value 3 to the mode register (13).
    Mode2 = 2,
    /// Experimental: write the scaled coefficient 190 (0.0190 x 10000) to
    /// register 16 to probe whether the firmware accepts that encoding.
    Mode3 = 3,
}

impl TryFrom<u8> for CalibrationMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(CalibrationMode::Skip),
            1 => Ok(CalibrationMode::Mode1),
            2 => Ok(CalibrationMode::Mode2),
            3 => Ok(CalibrationMode::Mode3),
            _ => Err(Error::CalibrationModeOutOfRange(value)),
        }
    }
}

impl fmt::Display for CalibrationMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}
