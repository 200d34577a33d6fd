//! Sequential register machine.
//!
//! A [`Machine`] owns its own copy of a [`Program`], a [`RegisterFile`] and a
//! program counter. [`Machine::step`] executes exactly one instruction and
//! reports what happened; the `run*` drivers loop over `step` until a stopping
//! condition. Execution halts the moment the program counter leaves
//! `[0, len)`. All arithmetic wraps on overflow.
//!
//! `RCV` is the only instruction that can suspend: `step` returns
//! [`Step::Receive`] without advancing, and the caller either completes it with
//! [`Machine::deliver`] or abandons it.

mod registers;
pub mod signal;
#[cfg(test)]
mod tests;

pub use registers::RegisterFile;

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::operand::Register;
use crate::virtual_machine::program::{Instruction, Program};

/// How `OUT` values are treated by [`Machine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Record every value; outputs never stop the run.
    #[default]
    Trace,
    /// Require the clock signal 0, 1, 0, 1, ... and stop once `target`
    /// values have been emitted.
    Alternating { target: usize },
}

/// Machine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineConfig {
    pub output: OutputMode,
    /// Upper bound on executed instructions; `None` runs unbounded.
    pub max_steps: Option<u64>,
}

/// Effect of a single [`Machine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction ran with no externally visible effect.
    Executed,
    /// The program counter is outside the program.
    Halted,
    /// `OUT` emitted a value.
    Output(i64),
    /// `SND` produced a value for the peer.
    Send(i64),
    /// `RCV` is waiting for a value for this register.
    Receive(Register),
}

/// How a `run*` call stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Normal halt with the final registers.
    Halted(RegisterFile),
    /// `RCV` was reached with nothing to receive from.
    Blocked { pc: i64 },
    /// The alternating signal reached its target length.
    Signal(Vec<i64>),
    /// An `OUT` value broke the alternating signal. `trace` holds the valid
    /// values emitted before it.
    OutputViolation { value: i64, trace: Vec<i64> },
    /// `RCV` with a non-zero operand recovered the last sent value
    /// (0 if nothing was sent).
    Recovered(i64),
}

/// Execution counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecStats {
    steps: u64,
    skipped: u64,
    per_opcode: [u64; Opcode::COUNT],
}

impl ExecStats {
    fn new() -> Self {
        Self {
            steps: 0,
            skipped: 0,
            per_opcode: [0; Opcode::COUNT],
        }
    }

    /// Instructions dispatched, including skipped ones.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Instructions skipped because a toggle left them with a literal destination.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// How many times `opcode` was dispatched.
    pub fn count(&self, opcode: Opcode) -> u64 {
        self.per_opcode[opcode.index()]
    }

    /// Per-opcode counts in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Opcode, u64)> + '_ {
        Opcode::ALL.iter().copied().zip(self.per_opcode.iter().copied())
    }
}

/// Register machine.
///
/// Executes one program sequentially from pc 0 until halt, block or a
/// driver-specific stop.
pub struct Machine {
    /// Program copy; `TGL` rewrites it in place.
    program: Program,
    registers: RegisterFile,
    /// Index of the next instruction.
    pc: i64,
    config: MachineConfig,
    stats: ExecStats,
    /// Every value emitted by `OUT`.
    outputs: Vec<i64>,
    /// Most recent `SND` value.
    last_sent: Option<i64>,
    /// Destination of a `RCV` that has not completed.
    pending_receive: Option<Register>,
}

impl Machine {
    /// Creates a machine with default configuration and zeroed registers.
    pub fn new(program: Program) -> Self {
        Self::with_config(program, MachineConfig::default())
    }

    pub fn with_config(program: Program, config: MachineConfig) -> Self {
        Self {
            program,
            registers: RegisterFile::new(),
            pc: 0,
            config,
            stats: ExecStats::new(),
            outputs: Vec::new(),
            last_sent: None,
            pending_receive: None,
        }
    }

    /// Replaces the initial register file.
    pub fn with_registers(mut self, registers: RegisterFile) -> Self {
        self.registers = registers;
        self
    }

    /// Presets a single register.
    pub fn with_register(mut self, r: Register, value: i64) -> Self {
        self.registers.set(r, value);
        self
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn pc(&self) -> i64 {
        self.pc
    }

    /// Current program, including any toggles applied so far.
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn stats(&self) -> &ExecStats {
        &self.stats
    }

    /// Values emitted by `OUT`, in order.
    pub fn outputs(&self) -> &[i64] {
        &self.outputs
    }

    pub fn last_sent(&self) -> Option<i64> {
        self.last_sent
    }

    pub fn is_halted(&self) -> bool {
        self.program.fetch(self.pc).is_none()
    }

    /// Executes one instruction.
    ///
    /// While a receive is pending this keeps returning [`Step::Receive`]
    /// without doing anything else.
    pub fn step(&mut self) -> Result<Step, VMError> {
        if let Some(r) = self.pending_receive {
            return Ok(Step::Receive(r));
        }
        let Some(instr) = self.program.fetch(self.pc).copied() else {
            return Ok(Step::Halted);
        };
        if let Some(limit) = self.config.max_steps
            && self.stats.steps >= limit
        {
            return Err(VMError::StepLimitExceeded { limit });
        }

        self.stats.steps += 1;
        self.stats.per_opcode[instr.opcode().index()] += 1;
        self.exec(instr)
    }

    /// Completes a pending `RCV` by storing `value` and advancing.
    ///
    /// Returns [`VMError::NoPendingReceive`] if no `RCV` is waiting.
    pub fn deliver(&mut self, value: i64) -> Result<(), VMError> {
        let r = self
            .pending_receive
            .take()
            .ok_or(VMError::NoPendingReceive { pc: self.pc })?;
        self.registers.set(r, value);
        self.pc += 1;
        Ok(())
    }

    /// Abandons a pending `RCV`, advancing past it without writing.
    pub fn skip_receive(&mut self) -> Result<(), VMError> {
        self.pending_receive
            .take()
            .ok_or(VMError::NoPendingReceive { pc: self.pc })?;
        self.pc += 1;
        Ok(())
    }

    /// Runs until halt, a blocking `RCV`, or an output-mode stop.
    ///
    /// `SND` values are dropped (the last one stays visible through
    /// [`Machine::last_sent`]).
    pub fn run(&mut self) -> Result<Outcome, VMError> {
        self.drive(|machine, _| Ok(Some(Outcome::Blocked { pc: machine.pc })))
    }

    /// Runs with sound-card semantics: `SND x` plays `x`, and `RCV x` recovers
    /// the last played value when `x` is non-zero and is skipped otherwise.
    pub fn run_recover(&mut self) -> Result<Outcome, VMError> {
        self.drive(|machine, r| {
            if machine.registers.get(r) != 0 {
                return Ok(Some(Outcome::Recovered(machine.last_sent.unwrap_or(0))));
            }
            machine.skip_receive()?;
            Ok(None)
        })
    }

    fn drive<F>(&mut self, mut on_receive: F) -> Result<Outcome, VMError>
    where
        F: FnMut(&mut Machine, Register) -> Result<Option<Outcome>, VMError>,
    {
        loop {
            let stop = match self.step()? {
                Step::Executed | Step::Send(_) => None,
                Step::Halted => Some(Outcome::Halted(self.registers)),
                Step::Output(value) => self.check_output(value),
                Step::Receive(r) => on_receive(self, r)?,
            };
            if let Some(outcome) = stop {
                return Ok(outcome);
            }
        }
    }

    /// Applies the output mode to the value just appended to `outputs`.
    fn check_output(&self, value: i64) -> Option<Outcome> {
        let OutputMode::Alternating { target } = self.config.output else {
            return None;
        };
        let (_, before) = self.outputs.split_last()?;
        let expected = before.last().map_or(0, |prev| 1 - prev);
        if value != expected {
            return Some(Outcome::OutputViolation {
                value,
                trace: before.to_vec(),
            });
        }
        (self.outputs.len() >= target).then(|| Outcome::Signal(self.outputs.clone()))
    }

    fn exec(&mut self, instr: Instruction) -> Result<Step, VMError> {
        let [first, second] = instr.operands;
        let x = self.registers.resolve(&first);
        let y = self.registers.resolve(&second);

        match (instr.opcode(), first.register()) {
            (Opcode::Set, Some(dst)) => Ok(self.op_set(dst, y)),
            (Opcode::Add, Some(dst)) => Ok(self.op_update(dst, |v| v.wrapping_add(y))),
            (Opcode::Sub, Some(dst)) => Ok(self.op_update(dst, |v| v.wrapping_sub(y))),
            (Opcode::Mul, Some(dst)) => Ok(self.op_update(dst, |v| v.wrapping_mul(y))),
            (Opcode::Mod, Some(dst)) => self.op_mod(dst, y),
            (Opcode::Inc, Some(dst)) => Ok(self.op_update(dst, |v| v.wrapping_add(1))),
            (Opcode::Dec, Some(dst)) => Ok(self.op_update(dst, |v| v.wrapping_sub(1))),
            (Opcode::Rcv, Some(dst)) => Ok(self.op_rcv(dst)),
            (Opcode::Jnz, _) => Ok(self.op_jump_if(x != 0, y)),
            (Opcode::Jgz, _) => Ok(self.op_jump_if(x > 0, y)),
            (Opcode::Tgl, _) => Ok(self.op_tgl(x)),
            (Opcode::Out, _) => Ok(self.op_out(x)),
            (Opcode::Snd, _) => Ok(self.op_snd(x)),
            (
                Opcode::Set
                | Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Mod
                | Opcode::Inc
                | Opcode::Dec
                | Opcode::Rcv,
                None,
            ) => Ok(self.skip()),
        }
    }

    /// Invalid instruction (literal destination): advance and do nothing else.
    fn skip(&mut self) -> Step {
        self.stats.skipped += 1;
        self.advance()
    }

    fn advance(&mut self) -> Step {
        self.pc += 1;
        Step::Executed
    }

    fn op_set(&mut self, dst: Register, value: i64) -> Step {
        self.registers.set(dst, value);
        self.advance()
    }

    fn op_update(&mut self, dst: Register, f: impl FnOnce(i64) -> i64) -> Step {
        let slot = self.registers.slot(dst);
        *slot = f(*slot);
        self.advance()
    }

    /// Remainder of integer division; the result takes the dividend's sign.
    fn op_mod(&mut self, dst: Register, divisor: i64) -> Result<Step, VMError> {
        if divisor == 0 {
            return Err(VMError::DivisionByZero { pc: self.pc });
        }
        Ok(self.op_update(dst, |v| v.wrapping_rem(divisor)))
    }

    /// Relative jump; the only handler that sets pc itself.
    fn op_jump_if(&mut self, taken: bool, offset: i64) -> Step {
        if taken {
            self.pc = self.pc.wrapping_add(offset);
            Step::Executed
        } else {
            self.advance()
        }
    }

    fn op_tgl(&mut self, offset: i64) -> Step {
        self.program.toggle(self.pc.wrapping_add(offset));
        self.advance()
    }

    fn op_out(&mut self, value: i64) -> Step {
        self.outputs.push(value);
        self.pc += 1;
        Step::Output(value)
    }

    fn op_snd(&mut self, value: i64) -> Step {
        self.last_sent = Some(value);
        self.pc += 1;
        Step::Send(value)
    }

    fn op_rcv(&mut self, dst: Register) -> Step {
        self.pending_receive = Some(dst);
        Step::Receive(dst)
    }
}
