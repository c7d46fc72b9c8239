//! Shared types for the actor behavior VM.
//!
//! - [`Opcode`]: the closed instruction set and its operand table
//! - [`Instruction`]: a decoded view into the word stream
//! - [`Program`]: the stream plus variable, actor and event tables, and the
//!   binary image format
//! - [`VarDecl`] and [`Scope`]: variable declarations
//! - [`flow`]: control-flow tracing shared by the verifier and disassembler
//! - [`DecodeError`] and [`EncodeError`]: errors from decoding instructions
//!   or images and from writing images

pub mod error;
pub mod flow;
pub mod instruction;
pub mod opcode;
pub mod program;
pub mod var;

pub use error::{DecodeError, EncodeError};
pub use instruction::Instruction;
pub use opcode::{Opcode, Operand, RecordKind, SELF_HANDLE};
pub use program::{ActorScripts, Program};
pub use var::{Scope, VarDecl};
