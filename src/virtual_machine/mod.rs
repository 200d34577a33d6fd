//! Register machine interpreter.
//!
//! Programs are lists of two-operand instructions over 26 signed 64-bit
//! registers named `a` through `z`. Three execution flavours share one
//! decode-execute loop:
//!
//! - **Sequential**: [`vm::Machine::run`] runs until the program counter
//!   leaves the program
//! - **Self-modifying**: `TGL` rewrites opcodes of the machine's own program
//!   copy at run time (see [`toggle`])
//! - **Dual**: [`duet::DualRunner`] runs two machines concurrently, joined by a
//!   [`channel::ChannelPair`] with deterministic deadlock detection
//!
//! # Modules
//!
//! - [`assembler`]: Text parsing and diagnostics
//! - [`channel`]: Queues and blocked-flag protocol between two machines
//! - [`duet`]: Concurrent two-machine runner
//! - [`errors`]: Load and run-time error types
//! - [`isa`]: Opcode table
//! - [`operand`]: Registers and operands
//! - [`program`]: Decoded instructions
//! - [`toggle`]: Opcode rewriting for `TGL`
//! - [`vm`]: The machine, its drivers and the signal search

pub mod assembler;
pub mod channel;
pub mod duet;
pub mod errors;
pub mod isa;
pub mod operand;
pub mod program;
pub mod toggle;
pub mod vm;
