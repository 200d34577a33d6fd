//! Clock-signal seed search.
//!
//! Some programs only produce the alternating 0, 1, 0, 1, ... signal for
//! particular initial register values. A violating output aborts that attempt;
//! the search restarts a fresh machine with the next seed.

use super::{Machine, MachineConfig, Outcome, OutputMode, RegisterFile};
use crate::debug;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::Register;
use crate::virtual_machine::program::Program;
use std::ops::Range;

/// Search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSearch {
    /// Initial registers of every attempt, before the seed is written.
    pub registers: RegisterFile,
    /// Register that receives each candidate seed.
    pub register: Register,
    /// Seeds to try, in order.
    pub seeds: Range<i64>,
    /// Valid outputs needed before a seed is accepted.
    pub target: usize,
    /// Step budget per attempt; attempts that exhaust it are rejected.
    pub max_steps: Option<u64>,
}

/// Returns the first seed whose run emits `target` alternating values.
///
/// Attempts that halt, block, violate the signal or run out of steps are
/// rejected. Other errors abort the search.
pub fn search_signal_seed(program: &Program, search: &SignalSearch) -> Result<Option<i64>, VMError> {
    let config = MachineConfig {
        output: OutputMode::Alternating {
            target: search.target,
        },
        max_steps: search.max_steps,
    };

    for seed in search.seeds.clone() {
        let mut machine = Machine::with_config(program.clone(), config)
            .with_registers(search.registers)
            .with_register(search.register, seed);
        match machine.run() {
            Ok(Outcome::Signal(_)) => return Ok(Some(seed)),
            Ok(Outcome::OutputViolation { value, trace }) => {
                debug!(
                    "seed {seed}: output {value} broke the signal after {} value(s)",
                    trace.len()
                );
            }
            Ok(other) => debug!("seed {seed}: stopped without a signal ({other:?})"),
            Err(VMError::StepLimitExceeded { limit }) => {
                debug!("seed {seed}: no signal within {limit} steps");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}
