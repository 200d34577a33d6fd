//! Dual runner: two machines joined by a [`ChannelPair`].
//!
//! Both machines run the same program, each on its own copy, with the id
//! register preset to 0 and 1. Each runs on its own tokio task. `SND` pushes
//! to the peer's inbox and `RCV` awaits this side's inbox. The run ends when
//! both machines have either halted or failed a receive that could never
//! complete.

use crate::debug;
use crate::virtual_machine::channel::{ChannelPair, Side};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::Register;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::vm::{Machine, MachineConfig, RegisterFile, Step};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;

/// Register holding the machine id unless configured otherwise.
pub const DEFAULT_ID_REGISTER: Register = Register::letter('p');

/// Dual runner settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuetConfig {
    /// Initial registers of both machines, before the id is written.
    pub registers: RegisterFile,
    /// Register preset to the machine id (0 or 1).
    pub id_register: Register,
    /// Applied to both machines.
    pub machine: MachineConfig,
    /// When set, each task yields to the scheduler at random points between
    /// instructions, using an RNG seeded from this value and its side.
    pub jitter: Option<u64>,
}

impl Default for DuetConfig {
    fn default() -> Self {
        Self {
            registers: RegisterFile::new(),
            id_register: DEFAULT_ID_REGISTER,
            machine: MachineConfig::default(),
            jitter: None,
        }
    }
}

/// How one machine of the pair stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The program counter left the program.
    Halted,
    /// A `RCV` could never be satisfied.
    Deadlock,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Halted => write!(f, "halted"),
            Termination::Deadlock => write!(f, "deadlock"),
        }
    }
}

/// Final state of both machines, indexed by machine id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuetReport {
    /// Values each machine sent.
    pub sends: [u64; 2],
    pub terminations: [Termination; 2],
    pub registers: [RegisterFile; 2],
}

impl DuetReport {
    /// True when both machines ended blocked on each other.
    pub fn is_deadlock(&self) -> bool {
        self.terminations == [Termination::Deadlock; 2]
    }
}

struct SideReport {
    sends: u64,
    termination: Termination,
    registers: RegisterFile,
}

/// Runs a program on two concurrently scheduled machines.
pub struct DualRunner {
    program: Program,
    config: DuetConfig,
}

impl DualRunner {
    pub fn new(program: Program) -> Self {
        Self::with_config(program, DuetConfig::default())
    }

    pub fn with_config(program: Program, config: DuetConfig) -> Self {
        Self { program, config }
    }

    /// Runs both machines to termination.
    ///
    /// A run-time error in either machine (for example a step limit) is
    /// returned once both tasks have stopped.
    pub async fn run(&self) -> Result<DuetReport, VMError> {
        let channels = Arc::new(ChannelPair::new());

        let handles = Side::BOTH.map(|side| {
            let machine = Machine::with_config(self.program.clone(), self.config.machine)
                .with_registers(self.config.registers)
                .with_register(self.config.id_register, side.index() as i64);
            let channels = channels.clone();
            let jitter = self.config.jitter;
            tokio::spawn(async move { drive(machine, side, &channels, jitter).await })
        });

        let [a, b] = handles;
        let (a, b) = (a.await, b.await);
        let a = a.map_err(|e| VMError::TaskFailed {
            reason: e.to_string(),
        })??;
        let b = b.map_err(|e| VMError::TaskFailed {
            reason: e.to_string(),
        })??;

        Ok(DuetReport {
            sends: [a.sends, b.sends],
            terminations: [a.termination, b.termination],
            registers: [a.registers, b.registers],
        })
    }
}

/// Steps one machine until it halts or a receive fails.
///
/// The side is always marked finished on exit so the peer cannot wait on it
/// forever, including when the machine fails.
async fn drive(
    mut machine: Machine,
    side: Side,
    channels: &ChannelPair,
    jitter: Option<u64>,
) -> Result<SideReport, VMError> {
    debug!("machine {} starting", side.index());
    let result = drive_inner(&mut machine, side, channels, jitter).await;
    channels.finish(side);

    let (sends, termination) = result?;
    debug!(
        "machine {} stopped ({termination}) after {sends} send(s)",
        side.index()
    );
    Ok(SideReport {
        sends,
        termination,
        registers: *machine.registers(),
    })
}

async fn drive_inner(
    machine: &mut Machine,
    side: Side,
    channels: &ChannelPair,
    jitter: Option<u64>,
) -> Result<(u64, Termination), VMError> {
    let mut rng = jitter.map(|seed| StdRng::seed_from_u64(seed.wrapping_add(side.index() as u64)));
    let mut sends = 0u64;

    loop {
        if let Some(rng) = rng.as_mut()
            && rng.gen_bool(0.5)
        {
            tokio::task::yield_now().await;
        }

        match machine.step()? {
            Step::Executed | Step::Output(_) => {}
            Step::Halted => return Ok((sends, Termination::Halted)),
            Step::Send(value) => {
                channels.send(side, value);
                sends += 1;
            }
            Step::Receive(_) => match channels.receive(side).await {
                Ok(value) => machine.deliver(value)?,
                Err(_) => return Ok((sends, Termination::Deadlock)),
            },
        }
    }
}
