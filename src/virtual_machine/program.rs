//! Decoded program representation.
//!
//! A [`Program`] is an index-addressable list of [`Instruction`]s. Its length
//! never changes after loading; only the opcode of an instruction can be
//! rewritten at run time, by the toggle unit (see [`toggle`](super::toggle)).
//! Machines running concurrently each hold their own clone.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::operand::Operand;
use std::fmt;

/// Largest operand count of any opcode.
pub const MAX_OPERANDS: usize = 2;

/// Opcode plus a fixed-size operand list.
///
/// Slots past the opcode's arity are unused and hold `Literal(0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub(crate) opcode: Opcode,
    pub(crate) operands: [Operand; MAX_OPERANDS],
}

impl Instruction {
    /// Builds an instruction, checking the operand count against the opcode.
    ///
    /// Destination positions are not checked here; a literal destination is
    /// legal in a decoded program (toggling can produce one) and executes as a
    /// no-op.
    pub fn new(opcode: Opcode, operands: &[Operand]) -> Result<Instruction, VMError> {
        if operands.len() != opcode.arity() {
            return Err(VMError::ArityMismatch {
                instruction: opcode.mnemonic(),
                expected: opcode.arity(),
                actual: operands.len(),
            });
        }
        let mut slots = [Operand::Literal(0); MAX_OPERANDS];
        slots[..operands.len()].copy_from_slice(operands);
        Ok(Instruction {
            opcode,
            operands: slots,
        })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Operands actually used by the current opcode.
    pub fn operands(&self) -> &[Operand] {
        &self.operands[..self.opcode.arity()]
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        for (i, op) in self.operands().iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{op}")?;
        }
        Ok(())
    }
}

/// Ordered, fixed-length instruction list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    pub(crate) instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Program {
        Program { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Converts a signed program counter into an index, if it is in bounds.
    pub fn index_of(&self, pc: i64) -> Option<usize> {
        usize::try_from(pc).ok().filter(|&i| i < self.len())
    }

    /// Returns the instruction at `pc`, or `None` when `pc` is out of bounds.
    pub fn fetch(&self, pc: i64) -> Option<&Instruction> {
        self.index_of(pc).map(|i| &self.instructions[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        Program::new(iter.into_iter().collect())
    }
}

/// Renders the program back to canonical assembly, one instruction per line.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instr in &self.instructions {
            writeln!(f, "{instr}")?;
        }
        Ok(())
    }
}
