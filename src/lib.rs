//! Register machine library.
//!
//! Provides an assembler, a sequential interpreter with self-modification
//! support, and a concurrent two-machine runner.

pub mod utils;
pub mod virtual_machine;
