//! Structural checks over the traced code.
//!
//! Targets must land on instruction boundaries, data records must lie
//! inside the stream without overlapping code, and switch tables must stay
//! within the case limit.

use std::collections::BTreeMap;

use crate::error::VerifyError;
use crate::limits::MAX_SWITCH_CASES;
use crate::reachability::ProgramContext;
use actorvm_common::flow::successors;
use actorvm_common::opcode::SWITCH_HEADER;
use actorvm_common::{Instruction, Opcode};

/// Run the structural pass.
pub fn check_structural(code: &[i32], ctx: &ProgramContext) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    let starts = &ctx.trace.starts;

    for &at in starts.keys() {
        let Ok(instr) = Instruction::decode(code, at) else {
            continue;
        };

        if instr.opcode == Opcode::Switch {
            let count = (instr.len() - 1 - SWITCH_HEADER) / 2;
            if count > MAX_SWITCH_CASES {
                errors.push(VerifyError::SwitchTooLarge { at, count });
            }
        }

        for target in successors(code, &instr) {
            let Ok(target) = usize::try_from(target) else {
                continue;
            };
            if let Some(within) = enclosing(starts, target) {
                errors.push(VerifyError::MisalignedTarget { at, target, within });
            }
        }
    }

    for record in &ctx.trace.records {
        let range = usize::try_from(record.offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(record.kind.len())?))
            .filter(|r| r.end <= code.len());
        let Some(range) = range else {
            errors.push(VerifyError::RecordOutOfRange {
                at: record.from,
                offset: record.offset,
                kind: record.kind,
            });
            continue;
        };
        let overlaps = starts
            .range(..range.end)
            .next_back()
            .is_some_and(|(&s, &n)| s + n > range.start);
        if overlaps {
            errors.push(VerifyError::RecordOverlapsCode {
                at: record.from,
                offset: record.offset,
                kind: record.kind,
            });
        }
    }

    errors
}

/// The instruction whose operand words contain `target`, if any.
fn enclosing(starts: &BTreeMap<usize, usize>, target: usize) -> Option<usize> {
    let (&s, &n) = starts.range(..target).next_back()?;
    (s + n > target).then_some(s)
}
