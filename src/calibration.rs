//! Calibration command sequencer.
//!
//! Each calibration mode expands to a fixed, ordered list of register writes
//! ([`command_for`]). [`execute`] walks the list over one [`Ec4a`] client:
//! a failed *write* aborts the whole sequence with the wire error, while a
//! read-back verification mismatch is advisory only: it is logged as a
//! warning to show the operator whether the write "took", and the sequence
//! continues.

use crate::{
    clock::Clock,
    protocol as proto,
    tokio_common::{RegisterIo, Result},
    tokio_sync_client::Ec4a,
};
use log::{debug, info, warn};
use std::time::Duration;

/// Absolute tolerance for float read-back verification.
pub const FLOAT_VERIFY_TOLERANCE: f32 = 1e-3;

/// Pause after each write before read-back, so the firmware can apply the
/// new setting.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Pause after the full sequence before any further register access.
pub const APPLY_DELAY: Duration = Duration::from_secs(1);

/// The value written by one calibration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepValue {
    /// A single 16-bit register write.
    Word(u16),
    /// A two-register ABCD float write.
    Float(f32),
}

/// One write (plus optional read-back verification) in a calibration
/// sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub address: u16,
    pub value: StepValue,
    pub verify: bool,
}

/// Builds the write sequence for a calibration mode.
///
/// Mode 0 produces an empty sequence (no wire traffic).
pub fn command_for(mode: proto::CalibrationMode) -> Vec<Step> {
    match mode {
        proto::CalibrationMode::Skip => Vec::new(),
        proto::CalibrationMode::Mode1 => vec![Step {
            address: proto::CALIBRATION_MODE_REG_ADDR,
            value: StepValue::Word(proto::CALIBRATION_MODE_1_COMMAND),
            verify: true,
        }],
        proto::CalibrationMode::Mode2 => vec![
            Step {
                address: proto::CalibrationCoefficient::ADDRESS,
                value: StepValue::Float(proto::CALIBRATION_COEFFICIENT_VALUE),
                verify: true,
            },
            Step {
                address: proto::CALIBRATION_MODE_REG_ADDR,
                value: StepValue::Word(proto::CALIBRATION_MODE_2_COMMAND),
                verify: true,
            },
        ],
        proto::CalibrationMode::Mode3 => vec![Step {
            address: proto::TEST_K_REG_ADDR,
            value: StepValue::Word(proto::TEST_K_SCALED_VALUE),
            verify: true,
        }],
    }
}

/// Executes the calibration sequence for `mode`.
///
/// Returns the wire error of the first failing *write*; the remaining steps
/// are not attempted. Verification mismatches and verification read failures
/// never abort - they surface as `warn!` events only.
pub fn execute<C, K>(
    client: &mut Ec4a<C>,
    clock: &mut K,
    mode: proto::CalibrationMode,
) -> Result<()>
where
    C: RegisterIo,
    K: Clock,
{
    let steps = command_for(mode);
    if steps.is_empty() {
        info!("Calibration skipped (mode 0)");
        return Ok(());
    }

    info!("Executing calibration mode {mode}");
    for step in &steps {
        run_step(client, clock, step)?;
    }

    // Give the firmware time to apply the new settings before the
    // acquisition loop starts hitting the working registers.
    clock.wait(APPLY_DELAY);
    info!("Calibration mode {mode} completed");
    Ok(())
}

fn run_step<C, K>(client: &mut Ec4a<C>, clock: &mut K, step: &Step) -> Result<()>
where
    C: RegisterIo,
    K: Clock,
{
    match step.value {
        StepValue::Word(value) => {
            debug!(
                "Writing register {}: {value} (0x{value:04X})",
                step.address
            );
            client.write_register(step.address, value)?;
            clock.wait(SETTLE_DELAY);
            if step.verify {
                verify_word(client, step.address, value);
            }
        }
        StepValue::Float(value) => {
            let pair = proto::RegisterPair::from_f32(value);
            debug!(
                "Writing float {value:.3} to registers {}-{} (hex {pair})",
                step.address,
                step.address + 1
            );
            client.write_float_register(step.address, value)?;
            clock.wait(SETTLE_DELAY);
            if step.verify {
                verify_float(client, step.address, value);
            }
        }
    }
    Ok(())
}

fn verify_word<C: RegisterIo>(client: &mut Ec4a<C>, address: u16, expected: u16) {
    match client.read_register(address) {
        Ok(actual) if actual == expected => {
            debug!("Register {address} verified: {actual}");
        }
        Ok(actual) => {
            warn!("Register {address} read back {actual}, expected {expected}");
        }
        Err(err) => {
            warn!("Could not verify register {address}: {err}");
        }
    }
}

fn verify_float<C: RegisterIo>(client: &mut Ec4a<C>, address: u16, expected: f32) {
    match client.read_register_pair(address) {
        Ok(pair) => {
            let actual = pair.to_f32();
            if (actual - expected).abs() < FLOAT_VERIFY_TOLERANCE {
                debug!("Registers {address}-{} verified: {actual:.3} (hex {pair})", address + 1);
            } else {
                warn!(
                    "Registers {address}-{} read back {actual:.3}, expected {expected:.3}",
                    address + 1
                );
            }
        }
        Err(err) => {
            warn!("Could not verify registers {address}-{}: {err}", address + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokio_common::{Error, IoFailure};
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Clone)]
    enum Op {
        Read(u16, u16),
        Write(u16, u16),
        WriteMany(u16, Vec<u16>),
    }

    /// Scripted transport recording every wire transaction.
    struct ScriptedIo {
        ops: Vec<Op>,
        registers: HashMap<u16, u16>,
        /// Writes to this address fail at the wire level.
        fail_write_at: Option<u16>,
        /// When set, writes do not change the register file, so read-back
        /// verification sees stale values.
        drop_writes: bool,
    }

    impl ScriptedIo {
        fn new() -> Self {
            Self {
                ops: Vec::new(),
                registers: HashMap::new(),
                fail_write_at: None,
                drop_writes: false,
            }
        }

        fn wire_error(address: u16) -> Error {
            Error::Write {
                address,
                source: IoFailure::Transport(tokio_modbus::Error::Transport(
                    std::io::Error::from(std::io::ErrorKind::TimedOut),
                )),
            }
        }
    }

    impl RegisterIo for ScriptedIo {
        fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
            self.ops.push(Op::Read(address, quantity));
            Ok((address..address + quantity)
                .map(|addr| self.registers.get(&addr).copied().unwrap_or(0))
                .collect())
        }

        fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
            self.ops.push(Op::Write(address, value));
            if self.fail_write_at == Some(address) {
                return Err(Self::wire_error(address));
            }
            if !self.drop_writes {
                self.registers.insert(address, value);
            }
            Ok(())
        }

        fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
            self.ops.push(Op::WriteMany(address, values.to_vec()));
            if self.fail_write_at == Some(address) {
                return Err(Self::wire_error(address));
            }
            if !self.drop_writes {
                for (offset, value) in values.iter().enumerate() {
                    self.registers.insert(address + offset as u16, *value);
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeClock {
        waits: Vec<Duration>,
    }

    impl Clock for FakeClock {
        fn wait(&mut self, duration: Duration) {
            self.waits.push(duration);
        }
    }

    fn writes_to(ops: &[Op], address: u16) -> usize {
        ops.iter()
            .filter(|op| {
                matches!(op, Op::Write(addr, _) if *addr == address)
                    || matches!(op, Op::WriteMany(addr, _) if *addr == address)
            })
            .count()
    }

    #[test]
    fn command_plans_per_mode() {
        assert!(command_for(proto::CalibrationMode::Skip).is_empty());

        let mode1 = command_for(proto::CalibrationMode::Mode1);
        assert_eq!(
            mode1,
            vec![Step {
                address: 13,
                value: StepValue::Word(2),
                verify: true
            }]
        );

        let mode2 = command_for(proto::CalibrationMode::Mode2);
        assert_eq!(mode2.len(), 2);
        assert_eq!(mode2[0].address, 28);
        assert_eq!(mode2[0].value, StepValue::Float(12880.0));
        assert_eq!(mode2[1].address, 13);
        assert_eq!(mode2[1].value, StepValue::Word(3));

        let mode3 = command_for(proto::CalibrationMode::Mode3);
        assert_eq!(
            mode3,
            vec![Step {
                address: 16,
                value: StepValue::Word(190),
                verify: true
            }]
        );
    }

    #[test]
    fn skip_performs_no_wire_traffic() {
        let mut client = Ec4a::new(ScriptedIo::new());
        let mut clock = FakeClock::default();
        execute(&mut client, &mut clock, proto::CalibrationMode::Skip).unwrap();
        assert!(client.into_inner().ops.is_empty());
        assert!(clock.waits.is_empty());
    }

    #[test]
    fn mode1_writes_and_verifies() {
        let mut client = Ec4a::new(ScriptedIo::new());
        let mut clock = FakeClock::default();
        execute(&mut client, &mut clock, proto::CalibrationMode::Mode1).unwrap();

        let ops = client.into_inner().ops;
        assert_eq!(ops, vec![Op::Write(13, 2), Op::Read(13, 1)]);
        assert_eq!(clock.waits, vec![SETTLE_DELAY, APPLY_DELAY]);
    }

    #[test]
    fn mode2_full_sequence() {
        let mut client = Ec4a::new(ScriptedIo::new());
        let mut clock = FakeClock::default();
        execute(&mut client, &mut clock, proto::CalibrationMode::Mode2).unwrap();

        let ops = client.into_inner().ops;
        assert_eq!(
            ops,
            vec![
                Op::WriteMany(28, vec![0x4649, 0x4000]),
                Op::Read(28, 2),
                Op::Write(13, 3),
                Op::Read(13, 1),
            ]
        );
    }

    #[test]
    fn mode2_aborts_on_coefficient_wire_failure() {
        let mut io = ScriptedIo::new();
        io.fail_write_at = Some(28);
        let mut client = Ec4a::new(io);
        let mut clock = FakeClock::default();

        let result = execute(&mut client, &mut clock, proto::CalibrationMode::Mode2);
        assert_matches!(result, Err(Error::Write { address: 28, .. }));

        // The mode register write must never be attempted.
        let ops = client.into_inner().ops;
        assert_eq!(writes_to(&ops, 13), 0);
    }

    #[test]
    fn mode2_continues_past_verification_mismatch() {
        let mut io = ScriptedIo::new();
        // Writes succeed on the wire but the register file keeps stale
        // values, so every read-back mismatches.
        io.drop_writes = true;
        io.registers.insert(28, 0x0000);
        io.registers.insert(29, 0x0000);
        let mut client = Ec4a::new(io);
        let mut clock = FakeClock::default();

        let result = execute(&mut client, &mut clock, proto::CalibrationMode::Mode2);
        assert_matches!(result, Ok(()));

        // The mode register write is still attempted after the mismatch.
        let ops = client.into_inner().ops;
        assert_eq!(writes_to(&ops, 13), 1);
    }

    #[test]
    fn mode3_writes_scaled_coefficient() {
        let mut client = Ec4a::new(ScriptedIo::new());
        let mut clock = FakeClock::default();
        execute(&mut client, &mut clock, proto::CalibrationMode::Mode3).unwrap();

        let ops = client.into_inner().ops;
        assert_eq!(ops[0], Op::Write(16, 190));
    }

    #[test]
    fn verification_read_failure_is_advisory() {
        // Reads fail (empty register file would still answer zeros, so fail
        // the read path explicitly through a custom transport).
        struct WriteOnly {
            wrote_13: bool,
        }
        impl RegisterIo for WriteOnly {
            fn read_registers(&mut self, address: u16, _quantity: u16) -> Result<Vec<u16>> {
                Err(Error::Read {
                    address,
                    source: IoFailure::Transport(tokio_modbus::Error::Transport(
                        std::io::Error::from(std::io::ErrorKind::TimedOut),
                    )),
                })
            }
            fn write_register(&mut self, address: u16, _value: u16) -> Result<()> {
                if address == 13 {
                    self.wrote_13 = true;
                }
                Ok(())
            }
            fn write_registers(&mut self, _address: u16, _values: &[u16]) -> Result<()> {
                Ok(())
            }
        }

        let mut client = Ec4a::new(WriteOnly { wrote_13: false });
        let mut clock = FakeClock::default();
        let result = execute(&mut client, &mut clock, proto::CalibrationMode::Mode2);
        assert_matches!(result, Ok(()));
        assert!(client.into_inner().wrote_13);
    }
}
