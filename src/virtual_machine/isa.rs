//! Instruction set definitions.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode table and hands it to a callback macro, so several modules can
//! generate opcode-related code without restating the table.
//!
//! This module generates:
//! - The [`Opcode`] enum, in table order
//! - [`Opcode::from_mnemonic`] for assembly
//! - Arity and operand-kind tables used by the assembler and the toggle unit
//!
//! # Operand kinds
//!
//! - `Reg`: destination; must be written as a register in source
//! - `Val`: read-only; register or signed integer literal

/// Role of an operand position within an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Written by the instruction.
    Reg,
    /// Only read.
    Val,
}

/// Invokes a callback macro with the complete opcode definition list.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Data movement
            // =========================
            /// SET x, y ; x = y
            Set, "SET" => [dst: Reg, src: Val],
            // =========================
            // Arithmetic
            // =========================
            /// ADD x, y ; x += y
            Add, "ADD" => [dst: Reg, src: Val],
            /// SUB x, y ; x -= y
            Sub, "SUB" => [dst: Reg, src: Val],
            /// MUL x, y ; x *= y
            Mul, "MUL" => [dst: Reg, src: Val],
            /// MOD x, y ; x = remainder of x / y
            Mod, "MOD" => [dst: Reg, src: Val],
            /// INC x ; x += 1
            Inc, "INC" => [dst: Reg],
            /// DEC x ; x -= 1
            Dec, "DEC" => [dst: Reg],
            // =========================
            // Control flow
            // =========================
            /// JNZ x, y ; if x != 0 then pc += y
            Jnz, "JNZ" => [cond: Val, offset: Val],
            /// JGZ x, y ; if x > 0 then pc += y
            Jgz, "JGZ" => [cond: Val, offset: Val],
            /// TGL x ; toggle the opcode at pc + x
            Tgl, "TGL" => [offset: Val],
            // =========================
            // Output and channels
            // =========================
            /// OUT x ; emit x
            Out, "OUT" => [value: Val],
            /// SND x ; send x to the peer machine
            Snd, "SND" => [value: Val],
            /// RCV x ; x = next value from the inbox (blocks)
            Rcv, "RCV" => [dst: Reg],
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        /// Operation tag of an instruction.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name,
            )*
        }

        impl Opcode {
            /// Every opcode in table order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Number of opcodes in the instruction set.
            pub const COUNT: usize = Self::ALL.len();

            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the operand kinds, one per operand position.
            pub const fn operand_kinds(&self) -> &'static [OperandKind] {
                match self {
                    $( Opcode::$name => &[ $( OperandKind::$kind, )* ], )*
                }
            }

            /// Returns the number of operands this opcode takes.
            pub const fn arity(&self) -> usize {
                self.operand_kinds().len()
            }

            /// Position of this opcode in [`Opcode::ALL`].
            pub const fn index(&self) -> usize {
                match self {
                    $( Opcode::$name => Opcode::$name as usize, )*
                }
            }

            /// Looks up an opcode by mnemonic, ignoring ASCII case.
            pub fn from_mnemonic(name: &str) -> Option<Opcode> {
                $(
                    if name.eq_ignore_ascii_case($mnemonic) {
                        return Some(Opcode::$name);
                    }
                )*
                None
            }
        }
    };
}

for_each_opcode!(define_opcodes);

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    const EXPECTED_ISA_HASH: u64 = 12365951471003622111;

    fn fnv1a64(mut h: u64, bytes: &[u8]) -> u64 {
        for b in bytes {
            h ^= *b as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        h
    }

    macro_rules! hash_isa {
        (
            $( $(#[$doc:meta])* $name:ident, $mnemonic:literal => [ $( $field:ident : $kind:ident ),* $(,)? ] ),* $(,)?
        ) => {{
            let mut h = FNV_OFFSET;
            $(
                h = fnv1a64(h, stringify!($name).as_bytes());
                h = fnv1a64(h, $mnemonic.as_bytes());
                $( h = fnv1a64(h, stringify!($kind).as_bytes()); )*
            )*
            h
        }};
    }

    fn current_isa_hash() -> u64 {
        crate::for_each_opcode!(hash_isa)
    }

    #[test]
    #[ignore]
    fn print_isa_hash() {
        println!("ISA_HASH=0x{:016x}", current_isa_hash());
    }

    #[test]
    fn isa_hash_unchanged() {
        assert_eq!(current_isa_hash(), EXPECTED_ISA_HASH);
    }

    #[test]
    fn from_mnemonic_ignores_case() {
        assert_eq!(Opcode::from_mnemonic("jnz"), Some(Opcode::Jnz));
        assert_eq!(Opcode::from_mnemonic("Tgl"), Some(Opcode::Tgl));
        assert_eq!(Opcode::from_mnemonic("cpy"), None);
    }

    #[test]
    fn arities() {
        assert_eq!(Opcode::Set.arity(), 2);
        assert_eq!(Opcode::Inc.arity(), 1);
        assert_eq!(Opcode::Jnz.arity(), 2);
        assert_eq!(Opcode::Tgl.arity(), 1);
        assert_eq!(Opcode::Rcv.arity(), 1);
    }

    #[test]
    fn index_matches_table_position() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.index(), i);
        }
        assert_eq!(Opcode::COUNT, 13);
    }
}
