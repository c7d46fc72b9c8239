//! Instruction decoding over the shared word stream.
//!
//! An instruction is an opcode word followed by the operand words listed in
//! [`Opcode::operands`]. A `switch` additionally carries `2 * count` case
//! words after its fixed header:
//! ```text
//! [switch, var, end, count, default, lit0, target0, lit1, target1, ...]
//! ```
//! Decoding borrows the operands straight out of the stream; nothing is
//! copied.

use crate::error::DecodeError;
use crate::opcode::{Opcode, SWITCH_HEADER};

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    /// The operation to perform.
    pub opcode: Opcode,
    /// Offset of the opcode word.
    pub at: usize,
    /// Operand words, excluding the opcode word.
    pub operands: &'a [i32],
}

impl<'a> Instruction<'a> {
    /// Decode the instruction whose opcode word sits at `at`.
    pub fn decode(code: &'a [i32], at: usize) -> Result<Self, DecodeError> {
        let word = *code.get(at).ok_or(DecodeError::OffsetOutOfRange { at })?;
        let opcode =
            Opcode::try_from(word).map_err(|_| DecodeError::UnknownOpcode { at, word })?;

        let start = at + 1;
        let mut count = opcode.operands().len();
        if opcode == Opcode::Switch {
            let cases = *code
                .get(start + 2)
                .ok_or(DecodeError::Truncated { at, opcode })?;
            if cases < 0 {
                return Err(DecodeError::NegativeCaseCount { at, count: cases });
            }
            count = (cases as usize)
                .checked_mul(2)
                .and_then(|n| n.checked_add(SWITCH_HEADER))
                .ok_or(DecodeError::Truncated { at, opcode })?;
        }

        let end = start
            .checked_add(count)
            .ok_or(DecodeError::Truncated { at, opcode })?;
        let operands = code
            .get(start..end)
            .ok_or(DecodeError::Truncated { at, opcode })?;

        Ok(Self {
            opcode,
            at,
            operands,
        })
    }

    /// Total length in words, including the opcode word.
    pub fn len(&self) -> usize {
        self.operands.len() + 1
    }

    /// Instructions always contain their opcode word.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Offset of the word following this instruction.
    pub fn next(&self) -> usize {
        self.at + self.len()
    }

    /// Operand `index`, or 0 when absent.
    pub fn operand(&self, index: usize) -> i32 {
        self.operands.get(index).copied().unwrap_or(0)
    }

    /// The false-branch target of a conditional.
    pub fn false_target(&self) -> Option<i32> {
        if self.opcode.is_conditional() {
            self.operands.last().copied()
        } else {
            None
        }
    }

    /// `(literal, target)` pairs of a switch case table, in table order.
    pub fn switch_cases(&self) -> impl Iterator<Item = (i32, i32)> + 'a {
        let table: &'a [i32] = if self.opcode == Opcode::Switch {
            &self.operands[SWITCH_HEADER.min(self.operands.len())..]
        } else {
            &[]
        };
        table.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }
}
