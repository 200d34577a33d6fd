//! Self-modification support for `TGL`.
//!
//! Toggling rewrites the opcode at a program index through a fixed table that
//! only pairs opcodes of equal arity:
//!
//! | before | after |
//! |--------|-------|
//! | `SET`  | `JNZ` |
//! | `JNZ`  | `SET` |
//! | `INC`  | `DEC` |
//! | `DEC`  | `INC` |
//! | `TGL`  | `INC` |
//!
//! Every other opcode is left alone. `SET` stores its destination first while
//! `JNZ` tests its first operand, so the pair also swaps operands: `cpy x y`
//! (loaded as `SET y, x`) toggles to `JNZ x, y` and back again.
//! The swap follows the copy-source-first reading, so a destination-first
//! `set a 5` toggles to `JNZ 5, a`.

use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::program::Program;

impl Opcode {
    /// Returns the opcode this one becomes when toggled.
    pub const fn toggled(self) -> Opcode {
        match self {
            Opcode::Set => Opcode::Jnz,
            Opcode::Jnz => Opcode::Set,
            Opcode::Inc => Opcode::Dec,
            Opcode::Dec => Opcode::Inc,
            Opcode::Tgl => Opcode::Inc,
            other => other,
        }
    }
}

/// Result of a toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleEffect {
    /// The instruction at `index` changed opcode.
    Applied {
        index: usize,
        from: Opcode,
        to: Opcode,
    },
    /// The target exists but its opcode has no toggle mapping.
    Unchanged { index: usize },
    /// The target lies outside the program.
    OutOfRange,
}

impl Program {
    /// Toggles the instruction at `target`.
    ///
    /// Out-of-range targets leave the program untouched. Only future fetches of
    /// the target see the change.
    pub fn toggle(&mut self, target: i64) -> ToggleEffect {
        let Some(index) = self.index_of(target) else {
            return ToggleEffect::OutOfRange;
        };

        let instr = &mut self.instructions[index];
        let from = instr.opcode;
        let to = from.toggled();
        if from == to {
            return ToggleEffect::Unchanged { index };
        }

        if matches!((from, to), (Opcode::Set, Opcode::Jnz) | (Opcode::Jnz, Opcode::Set)) {
            instr.operands.swap(0, 1);
        }
        instr.opcode = to;
        ToggleEffect::Applied { index, from, to }
    }
}
