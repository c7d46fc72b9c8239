//! Fatal runtime errors.
//!
//! These indicate corrupted or misauthored program content. Recoverable
//! faults (unknown opcodes, depth and step limits, invalid handles) never
//! show up here: they are logged and turned into entity deletion or no-ops.
//! Every variant carries the word offset of the offending instruction,
//! except a bad action record, which is found outside any instruction.

use actorvm_common::DecodeError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Divide by a zero literal or a variable holding zero.
    #[error("division by zero at offset {at}")]
    DivisionByZero { at: usize },

    /// Modulo by a zero literal or a variable holding zero.
    #[error("modulo by zero at offset {at}")]
    ModuloByZero { at: usize },

    /// The cursor left the instruction stream.
    #[error("cursor {at} is outside the instruction stream (length {len})")]
    CursorOutOfRange { at: usize, len: usize },

    /// A branch, call or switch target points outside the stream.
    #[error("target {target} of instruction at offset {at} is outside the instruction stream")]
    BadTarget { at: usize, target: i32 },

    /// A data record operand points outside the stream.
    #[error("record at {offset} referenced from offset {at} is out of range")]
    RecordOutOfRange { at: usize, offset: i32 },

    /// The action register of a ticking entity names a record that does not
    /// fit in the stream.
    #[error("action record at {offset} is out of range")]
    BadActionRecord { offset: i32 },

    /// An instruction could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
