use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::{Operand, Register};
use std::fmt;
use std::ops::Index;

/// Register file holding one machine's registers.
///
/// Fixed-size array indexed by `letter - 'a'`; every slot starts at zero, so
/// a register never written reads as 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegisterFile {
    regs: [i64; Register::COUNT],
}

impl RegisterFile {
    /// Creates a register file with every register set to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a register file from `(name, value)` pairs.
    ///
    /// Returns [`VMError::InvalidRegister`] for names outside `a..=z`.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, VMError>
    where
        I: IntoIterator<Item = (char, i64)>,
    {
        let mut file = Self::new();
        for (name, value) in pairs {
            file.set(Register::new(name)?, value);
        }
        Ok(file)
    }

    pub fn get(&self, r: Register) -> i64 {
        self.regs[r.index()]
    }

    pub fn set(&mut self, r: Register, v: i64) {
        self.regs[r.index()] = v;
    }

    /// Returns a mutable slot for read-modify-write opcodes.
    pub(super) fn slot(&mut self, r: Register) -> &mut i64 {
        &mut self.regs[r.index()]
    }

    /// Resolves an operand: literals evaluate to themselves, registers to their contents.
    pub fn resolve(&self, operand: &Operand) -> i64 {
        match operand {
            Operand::Literal(v) => *v,
            Operand::Register(r) => self.get(*r),
        }
    }

    /// Looks a register up by letter.
    pub fn value_of(&self, name: char) -> Result<i64, VMError> {
        Ok(self.get(Register::new(name)?))
    }

    /// Iterates over the registers holding a non-zero value.
    pub fn non_zero(&self) -> impl Iterator<Item = (Register, i64)> + '_ {
        self.regs
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0)
            .map(|(i, v)| (register_at(i), *v))
    }
}

impl Index<Register> for RegisterFile {
    type Output = i64;

    fn index(&self, r: Register) -> &i64 {
        &self.regs[r.index()]
    }
}

/// Registers always listed by `Display`, zero or not.
const ALWAYS_SHOWN: usize = 8;

fn register_at(index: usize) -> Register {
    Register::letter((b'a' + index as u8) as char)
}

/// Shows registers `a` through `h` plus any other non-zero register.
impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.regs[..ALWAYS_SHOWN].iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={}", register_at(i), v)?;
        }
        for (r, v) in self.non_zero().filter(|(r, _)| r.index() >= ALWAYS_SHOWN) {
            write!(f, " {r}={v}")?;
        }
        Ok(())
    }
}
