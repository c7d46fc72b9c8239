//! Error types for the assembler.

use thiserror::Error;

/// Errors produced while assembling text into a program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// An unrecognized opcode mnemonic was encountered.
    #[error("line {line}: unknown opcode '{token}'")]
    UnknownOpcode { line: usize, token: String },

    #[error("line {line}: unknown directive '.{token}'")]
    UnknownDirective { line: usize, token: String },

    /// An opcode or directive did not have enough arguments.
    #[error("line {line}: {opcode} expects {expected} argument(s)")]
    MissingArgument {
        line: usize,
        opcode: &'static str,
        expected: usize,
    },

    /// A numeric literal could not be parsed or is out of range.
    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    /// A token appeared where it was not expected.
    #[error("line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },

    #[error("line {line}: unknown label '{label}'")]
    UnknownLabel { line: usize, label: String },

    #[error("line {line}: label '{label}' is already defined")]
    DuplicateLabel { line: usize, label: String },

    #[error("line {line}: unknown variable '{name}'")]
    UnknownVariable { line: usize, name: String },

    #[error("line {line}: variable '{name}' is already declared")]
    DuplicateVariable { line: usize, name: String },

    #[error("line {line}: variable name is {len} bytes (max {max})", max = actorvm_common::program::MAX_NAME_LEN)]
    NameTooLong { line: usize, len: usize },

    #[error("line {line}: unknown scope '{token}'")]
    UnknownScope { line: usize, token: String },

    #[error("line {line}: actor {kind} is already declared")]
    DuplicateActor { line: usize, kind: i32 },

    #[error("line {line}: event {id} is already declared")]
    DuplicateEvent { line: usize, id: i32 },

    /// An entry offset resolved to a negative value.
    #[error("line {line}: invalid entry offset {value}")]
    InvalidOffset { line: usize, value: i32 },
}
