//! Verification errors.
//!
//! Every error that concerns a single instruction carries its word offset
//! (`at`). The verifier collects ALL errors, not just the first.

use std::fmt;

use actorvm_common::{DecodeError, RecordKind};
use thiserror::Error;

/// A program entry offset, named by the table it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// Tick script of an actor kind.
    Tick(i32),
    /// Load script of an actor kind.
    Load(i32),
    /// Handler of an event id.
    Event(i32),
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Tick(kind) => write!(f, "tick script of actor {kind}"),
            Entry::Load(kind) => write!(f, "load script of actor {kind}"),
            Entry::Event(id) => write!(f, "handler of event {id}"),
        }
    }
}

/// Errors found during static verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    // --- Entry points ---
    #[error("{entry} starts at offset {offset}, outside the stream")]
    EntryOutOfRange { entry: Entry, offset: usize },

    #[error("event id {id} is negative")]
    InvalidEventId { id: i32 },

    // --- Control flow ---
    /// A reached instruction failed to decode.
    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("jump target {target} at offset {at} is outside the stream")]
    DanglingTarget { at: usize, target: i32 },

    /// Execution falls through past the last word.
    #[error("instruction at offset {at} runs off the end of the stream")]
    RunsOffEnd { at: usize },

    /// A target lands on an operand word of another instruction.
    #[error("jump target {target} at offset {at} lands inside the instruction at {within}")]
    MisalignedTarget {
        at: usize,
        target: usize,
        within: usize,
    },

    // --- Records ---
    #[error("{} record at {offset} referenced from offset {at} is outside the stream", .kind.name())]
    RecordOutOfRange {
        at: usize,
        offset: i32,
        kind: RecordKind,
    },

    #[error("{} record at {offset} referenced from offset {at} overlaps code", .kind.name())]
    RecordOverlapsCode {
        at: usize,
        offset: i32,
        kind: RecordKind,
    },

    // --- Variables ---
    #[error("unknown variable {id} at offset {at}")]
    UnknownVariable { at: usize, id: i32 },

    #[error("variable {id} used as an actor variable at offset {at} is not actor-scoped")]
    NotActorScoped { at: usize, id: i32 },

    #[error("variable `{name}` is declared more than once")]
    DuplicateVariable { name: String },

    // --- Limits ---
    #[error("program too large: {size} words (max {max})", max = crate::limits::MAX_PROGRAM_WORDS)]
    ProgramTooLarge { size: usize },

    #[error("too many variables: {count} (max {max})", max = crate::limits::MAX_VARIABLES)]
    TooManyVariables { count: usize },

    #[error("name of variable {id} is {len} bytes (max {max})", max = actorvm_common::program::MAX_NAME_LEN)]
    NameTooLong { id: usize, len: usize },

    #[error("switch at offset {at} has {count} cases (max {max})", max = crate::limits::MAX_SWITCH_CASES)]
    SwitchTooLarge { at: usize, count: usize },
}
