//! Steady-state polling loop.
//!
//! Each cycle reads the three working register pairs (temperature, raw EC,
//! sensor EC), recomputes the compensation host-side and hands one
//! [`Reading`] to the sink. A failed read abandons the current cycle with a
//! warning; the loop waits one poll interval and starts the next cycle from
//! the temperature read again. By default this retries forever with no
//! backoff - a permanently unplugged sensor keeps the loop polling once per
//! interval until the process is interrupted.

use crate::{
    clock::Clock,
    compensation, protocol as proto,
    tokio_common::{RegisterIo, Result},
    tokio_sync_client::Ec4a,
};
use chrono::{DateTime, Local};
use log::{debug, warn};
use std::time::Duration;

/// One complete acquisition sample.
///
/// The raw register words of the temperature and raw-EC reads are retained
/// so the IEEE-754 decoding can be audited downstream (CSV columns,
/// external converters). Readings are immutable; the loop keeps no history.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Local>,
    /// Water temperature in °C.
    pub temperature: f64,
    /// Wire words of the temperature read, for audit.
    pub temperature_words: proto::RegisterPair,
    /// Uncompensated conductivity in mS/cm.
    pub raw_ec: f64,
    /// Wire words of the raw-EC read, for audit.
    pub raw_ec_words: proto::RegisterPair,
    /// The sensor's own compensated conductivity in mS/cm.
    pub sensor_ec: f64,
    /// Host-side compensated conductivity in mS/cm.
    pub smart_ec: f64,
    /// The dynamic coefficient used for `smart_ec`.
    pub coefficient: f64,
    /// `sensor_ec - smart_ec`.
    pub deviation: f64,
}

/// Consumer of acquisition samples (console printer, CSV writer, ...).
pub trait ReadingSink {
    fn emit(&mut self, reading: &Reading);
}

/// Polling loop configuration.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Pause between cycles, and after a failed cycle before the retry.
    pub poll_interval: Duration,
    /// Upper bound on the number of cycles; `None` runs until the process
    /// is interrupted. Meant for tests and one-shot reads.
    pub max_cycles: Option<u64>,
}

impl Default for Acquisition {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_cycles: None,
        }
    }
}

impl Acquisition {
    /// Performs a single acquisition cycle: three register-pair reads in
    /// fixed order, then the host-side compensation.
    ///
    /// Fails with the wire error of the first failing read; in that case no
    /// EC registers are touched until the temperature read succeeds in a
    /// later cycle.
    pub fn sample<C: RegisterIo>(client: &mut Ec4a<C>) -> Result<Reading> {
        let temperature = client.read_temperature()?;
        let raw_ec = client.read_raw_ec()?;
        let sensor_ec = client.read_sensor_ec()?;

        let temp = f64::from(temperature.celsius());
        let raw = f64::from(raw_ec.value());
        let sensor = f64::from(sensor_ec.value());
        let smart = compensation::compensate(raw, temp);
        let coefficient = compensation::coefficient(temp);

        debug!(
            "Sampled temp={temp:.2} °C (hex {}), raw={raw:.3}, sensor={sensor:.3}, smart={smart:.3}",
            temperature.words()
        );

        Ok(Reading {
            timestamp: Local::now(),
            temperature: temp,
            temperature_words: temperature.words(),
            raw_ec: raw,
            raw_ec_words: raw_ec.words(),
            sensor_ec: sensor,
            smart_ec: smart,
            coefficient,
            deviation: sensor - smart,
        })
    }

    /// Runs the polling loop.
    ///
    /// Emits one `Reading` per successful cycle. Returns `Ok(())` only when
    /// `max_cycles` is reached; with the default unbounded configuration the
    /// call never returns and the process is expected to be interrupted
    /// externally between cycles.
    pub fn run<C, K, S>(&self, client: &mut Ec4a<C>, clock: &mut K, sink: &mut S) -> Result<()>
    where
        C: RegisterIo,
        K: Clock,
        S: ReadingSink,
    {
        let mut cycles: u64 = 0;
        loop {
            if let Some(max) = self.max_cycles {
                if cycles >= max {
                    return Ok(());
                }
            }
            cycles += 1;

            match Self::sample(client) {
                Ok(reading) => sink.emit(&reading),
                Err(err) => warn!("Acquisition cycle abandoned: {err}"),
            }
            clock.wait(self.poll_interval);
        }
    }
}
