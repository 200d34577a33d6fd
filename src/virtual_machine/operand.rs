use crate::virtual_machine::errors::VMError;
use std::fmt;

/// Single-letter register name, `a` through `z`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(u8);

impl Register {
    /// Number of addressable registers.
    pub const COUNT: usize = 26;

    /// Returns the register named by `name`.
    ///
    /// Returns [`VMError::InvalidRegister`] for anything outside `a..=z`.
    pub fn new(name: char) -> Result<Register, VMError> {
        if name.is_ascii_lowercase() {
            Ok(Register(name as u8 - b'a'))
        } else {
            Err(VMError::InvalidRegister {
                name: name.to_string(),
            })
        }
    }

    /// Const counterpart of [`Register::new`] for names known at compile time.
    ///
    /// Panics on a name outside `a..=z`, which fails the build when used in a
    /// `const` item.
    pub const fn letter(name: char) -> Register {
        assert!(name.is_ascii_lowercase(), "register names are a..=z");
        Register(name as u8 - b'a')
    }

    /// Slot in the register file.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn name(self) -> char {
        (b'a' + self.0) as char
    }
}

impl TryFrom<char> for Register {
    type Error = VMError;

    fn try_from(name: char) -> Result<Self, Self::Error> {
        Register::new(name)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Value reference used by an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Signed integer literal.
    Literal(i64),
    /// Named register.
    Register(Register),
}

impl Operand {
    /// Returns the register if this operand names one.
    pub const fn register(&self) -> Option<Register> {
        match self {
            Operand::Register(r) => Some(*r),
            Operand::Literal(_) => None,
        }
    }
}

impl From<Register> for Operand {
    fn from(r: Register) -> Self {
        Operand::Register(r)
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Literal(v)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{v}"),
            Operand::Register(r) => write!(f, "{r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_bounds() {
        assert_eq!(Register::new('a').unwrap().index(), 0);
        assert_eq!(Register::new('z').unwrap().index(), 25);
        assert_eq!(Register::new('p').unwrap().name(), 'p');
    }

    #[test]
    fn letter_matches_new() {
        const P: Register = Register::letter('p');
        assert_eq!(P, Register::new('p').unwrap());
    }

    #[test]
    fn register_rejects_non_lowercase() {
        for name in ['A', '1', '_', 'é'] {
            let err = Register::new(name).unwrap_err();
            assert!(matches!(err, VMError::InvalidRegister { .. }));
        }
    }

    #[test]
    fn operand_register_accessor() {
        let r = Register::new('c').unwrap();
        assert_eq!(Operand::from(r).register(), Some(r));
        assert_eq!(Operand::from(-4).register(), None);
    }

    #[test]
    fn operand_display() {
        assert_eq!(Operand::Literal(-7).to_string(), "-7");
        assert_eq!(Operand::Register(Register::new('d').unwrap()).to_string(), "d");
    }
}
