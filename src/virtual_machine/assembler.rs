//! Assembly parser.
//!
//! Turns source text into a [`Program`], one instruction per line. The
//! opcode table from [`isa`](super::isa) drives mnemonic lookup, arity and
//! destination checks, so the parser needs no per-opcode code.
//!
//! # Syntax
//!
//! ```text
//! MNEMONIC operand1, operand2  # optional comment
//! ```
//!
//! - Mnemonics are case-insensitive (`set`, `JNZ`, `Tgl`)
//! - Registers are single lowercase letters (`a`..`z`)
//! - Literals are signed decimal integers (`42`, `-1`, `+3`)
//! - Comments start with `#`; commas between operands are optional
//! - `cpy x y` is accepted as an alias for `set y x`

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{OperandKind, Opcode};
use crate::virtual_machine::operand::{Operand, Register};
use crate::virtual_machine::program::{Instruction, Program};
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';

/// Mnemonics that decode to a table opcode with reordered operands.
///
/// Each entry is `(alias, opcode, order)`, where `order[i]` is the source
/// position that fills operand slot `i`.
const ALIASES: &[(&str, Opcode, [usize; 2])] = &[("cpy", Opcode::Set, [1, 0])];

/// Return the line/column/message triple for assembly-related errors.
fn assembly_error_location(err: &VMError) -> Option<(usize, usize, String)> {
    match err {
        VMError::AssemblyError {
            line,
            offset,
            source,
        } => Some((*line, *offset, source.clone())),
        _ => None,
    }
}

/// Formats a compiler-style diagnostic for an assembly failure.
///
/// Errors without a source location render as a single `error:` line.
pub fn render_assembly_diagnostic(file: &str, source: &str, err: &VMError) -> String {
    let Some((line, offset, message)) = assembly_error_location(err) else {
        return format!("error: {err}");
    };

    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{offset}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(offset.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "  | {}^", underline);
    }

    diag
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column in the line.
    offset: usize,
}

/// Splits one line into tokens, dropping comments, commas and whitespace.
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let code = match line.find(COMMENT_CHAR) {
        Some(i) => &line[..i],
        None => line,
    };

    let mut out = Vec::with_capacity(3);
    let mut start: Option<usize> = None;
    for (i, c) in code.char_indices() {
        let separator = c == ',' || c.is_whitespace();
        match (separator, start) {
            (true, Some(s)) => {
                out.push(Token {
                    text: &code[s..i],
                    offset: s + 1,
                });
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(Token {
            text: &code[s..],
            offset: s + 1,
        });
    }
    out
}

/// Parses a register token (`a`..`z`).
pub(crate) fn parse_reg(tok: &str) -> Result<Register, VMError> {
    let mut chars = tok.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Register::new(c),
        _ => Err(VMError::InvalidRegister {
            name: tok.to_string(),
        }),
    }
}

/// Parses a signed decimal literal.
pub(crate) fn parse_i64(tok: &str) -> Result<i64, VMError> {
    tok.parse::<i64>().map_err(|_| VMError::InvalidOperand {
        token: tok.to_string(),
    })
}

/// Parses a register or a literal.
pub(crate) fn parse_operand(tok: &str) -> Result<Operand, VMError> {
    if tok.starts_with(|c: char| c.is_ascii_alphabetic()) {
        parse_reg(tok).map(Operand::Register)
    } else {
        parse_i64(tok).map(Operand::Literal)
    }
}

/// Parses a register assignment such as `c=1` or `a = -3`.
pub fn parse_reg_value(text: &str) -> Result<(Register, i64), VMError> {
    let (name, value) = text.split_once('=').ok_or_else(|| VMError::InvalidOperand {
        token: text.to_string(),
    })?;
    Ok((parse_reg(name.trim())?, parse_i64(value.trim())?))
}

/// Resolves a mnemonic to its opcode and source-to-slot operand order.
fn lookup_mnemonic(name: &str) -> Result<(Opcode, [usize; 2]), VMError> {
    if let Some(opcode) = Opcode::from_mnemonic(name) {
        return Ok((opcode, [0, 1]));
    }
    ALIASES
        .iter()
        .find(|(alias, _, _)| name.eq_ignore_ascii_case(alias))
        .map(|(_, opcode, order)| (*opcode, *order))
        .ok_or_else(|| VMError::InvalidInstructionName {
            name: name.to_string(),
        })
}

/// Wraps an error with the line and column it was raised at.
fn at(line: usize, offset: usize, err: VMError) -> VMError {
    VMError::AssemblyError {
        line,
        offset,
        source: err.to_string(),
    }
}

/// Parses one tokenized line. `tokens` must not be empty.
fn parse_instruction(line_no: usize, tokens: &[Token<'_>]) -> Result<Instruction, VMError> {
    let (head, args) = tokens
        .split_first()
        .ok_or_else(|| at(line_no, 1, VMError::InvalidInstructionName { name: String::new() }))?;
    let (opcode, order) = lookup_mnemonic(head.text).map_err(|e| at(line_no, head.offset, e))?;

    if args.len() != opcode.arity() {
        let offset = args.get(opcode.arity()).map_or(head.offset, |t| t.offset);
        return Err(at(
            line_no,
            offset,
            VMError::ArityMismatch {
                instruction: opcode.mnemonic(),
                expected: opcode.arity(),
                actual: args.len(),
            },
        ));
    }

    let mut operands = Vec::with_capacity(args.len());
    for (slot, kind) in opcode.operand_kinds().iter().enumerate() {
        let tok = &args[order[slot]];
        let operand = parse_operand(tok.text).map_err(|e| at(line_no, tok.offset, e))?;
        if *kind == OperandKind::Reg && operand.register().is_none() {
            return Err(at(
                line_no,
                tok.offset,
                VMError::ExpectedRegister {
                    instruction: opcode.mnemonic(),
                    arg_index: order[slot],
                    actual: tok.text.to_string(),
                },
            ));
        }
        operands.push(operand);
    }

    Instruction::new(opcode, &operands).map_err(|e| at(line_no, head.offset, e))
}

/// Assembles a full source string.
pub fn assemble_source(source: &str) -> Result<Program, VMError> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let tokens = tokenize(line);
            (!tokens.is_empty()).then(|| parse_instruction(i + 1, &tokens))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Program::new)
}

/// Assembles a file, logging a diagnostic with source context on failure.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Program, VMError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)?;
    assemble_source(&source).inspect_err(|err| {
        crate::error!(
            "{}",
            render_assembly_diagnostic(&path.display().to_string(), &source, err).trim_end()
        );
    })
}
