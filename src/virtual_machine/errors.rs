use regvm_derive::Error;

/// Errors raised while loading or executing a register machine program.
///
/// Load-time variants reject a malformed program before it runs. Run-time
/// variants are genuine failures; expected stopping conditions such as an
/// output violation or a deadlock are reported as outcomes instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    /// Unrecognized mnemonic in assembly source.
    #[error("invalid instruction name: {name}")]
    InvalidInstructionName { name: String },
    /// Wrong number of operands for an instruction.
    #[error("{instruction} expects {expected} operand(s), got {actual}")]
    ArityMismatch {
        instruction: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A destination operand was given a literal.
    #[error("{instruction} expects a register as operand {arg_index}, got {actual}")]
    ExpectedRegister {
        instruction: &'static str,
        arg_index: usize,
        actual: String,
    },
    /// Register name outside `a..=z`.
    #[error("invalid register {name:?}")]
    InvalidRegister { name: String },
    /// Token that is neither a register nor an integer literal.
    #[error("invalid operand {token:?}")]
    InvalidOperand { token: String },
    /// Assembly error with line and column context.
    #[error("line {line}: {source}")]
    AssemblyError {
        line: usize,
        offset: usize,
        source: String,
    },
    /// File I/O error during assembly.
    #[error("io error: {reason}")]
    IoError { reason: String },
    /// `MOD` with a zero divisor.
    #[error("division by zero at pc {pc}")]
    DivisionByZero { pc: i64 },
    /// The configured step budget ran out before the machine stopped.
    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: u64 },
    /// `deliver` called while the machine was not waiting on `RCV`.
    #[error("no receive pending at pc {pc}")]
    NoPendingReceive { pc: i64 },
    /// A dual-runner task panicked or was cancelled.
    #[error("machine task failed: {reason}")]
    TaskFailed { reason: String },
}

impl From<std::io::Error> for VMError {
    fn from(err: std::io::Error) -> Self {
        VMError::IoError {
            reason: err.to_string(),
        }
    }
}
