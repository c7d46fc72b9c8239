//! Control-flow tracing over the word stream.
//!
//! Instructions and data records share one stream, so the only way to tell
//! them apart is to follow control flow from the program's entry offsets.
//! The verifier uses the trace to check jump boundaries; the disassembler
//! uses it to decide what to print as code.

use std::collections::BTreeMap;

use crate::error::DecodeError;
use crate::instruction::Instruction;
use crate::opcode::{Opcode, Operand, RecordKind};

/// A data record referenced from an instruction or from an `ai` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRef {
    /// Offset of the referencing instruction or record.
    pub from: usize,
    /// Offset of the record.
    pub offset: i32,
    pub kind: RecordKind,
}

/// Result of tracing a program from its entry offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    /// Reached instruction offsets and their lengths in words.
    pub starts: BTreeMap<usize, usize>,
    /// Instructions that failed to decode.
    pub faults: Vec<DecodeError>,
    /// `(instruction, target)` for targets outside the stream.
    pub dangling: Vec<(usize, i32)>,
    /// Every non-zero record operand of a reached instruction.
    pub records: Vec<RecordRef>,
}

impl Trace {
    pub fn is_instruction(&self, at: usize) -> bool {
        self.starts.contains_key(&at)
    }
}

/// Offsets execution may continue at after `instr`.
///
/// Targets are returned raw, so out-of-range values are visible to the
/// caller.
pub fn successors(code: &[i32], instr: &Instruction<'_>) -> Vec<i32> {
    let next = instr.next() as i32;
    match instr.opcode {
        Opcode::Else => vec![instr.operand(0)],
        Opcode::State => vec![next, instr.operand(0)],
        Opcode::Switch => {
            let mut out = vec![instr.operand(1)];
            let default = instr.operand(3);
            if default != 0 {
                out.push(default);
            }
            out.extend(instr.switch_cases().map(|(_, target)| target));
            out
        }
        Opcode::RightBrace => vec![next],
        op if op.is_terminal() => Vec::new(),
        op if op.is_conditional() => {
            let mut out = vec![next];
            if let Some(target) = instr.false_target() {
                out.push(target);
                if else_marker_at(code, target) {
                    out.push(target + 2);
                }
            }
            out
        }
        _ => vec![next],
    }
}

/// True if `target` is in range and holds an `else` opcode word.
pub fn else_marker_at(code: &[i32], target: i32) -> bool {
    usize::try_from(target)
        .ok()
        .and_then(|t| code.get(t))
        .is_some_and(|&word| word == Opcode::Else as i32)
}

/// Record operands of `instr` with a non-zero offset.
pub fn record_operands(instr: &Instruction<'_>) -> Vec<(i32, RecordKind)> {
    instr
        .opcode
        .operands()
        .iter()
        .zip(instr.operands)
        .filter_map(|(kind, &word)| match kind {
            Operand::Record(record) if word != 0 => Some((word, *record)),
            _ => None,
        })
        .collect()
}

/// Follow control flow from `roots`.
pub fn trace(code: &[i32], roots: &[usize]) -> Trace {
    let mut out = Trace::default();
    let mut work: Vec<usize> = roots.to_vec();

    while let Some(at) = work.pop() {
        if out.starts.contains_key(&at) {
            continue;
        }
        let instr = match Instruction::decode(code, at) {
            Ok(instr) => instr,
            Err(err) => {
                if !out.faults.contains(&err) {
                    out.faults.push(err);
                }
                continue;
            }
        };
        out.starts.insert(at, instr.len());

        for (offset, kind) in record_operands(&instr) {
            out.records.push(RecordRef {
                from: at,
                offset,
                kind,
            });
            if kind == RecordKind::Ai {
                out.records.extend(ai_record_refs(code, offset));
            }
        }

        for target in successors(code, &instr) {
            match usize::try_from(target) {
                Ok(t) if t < code.len() => work.push(t),
                _ => out.dangling.push((at, target)),
            }
        }
    }

    out
}

/// The action and move records named inside an `ai` record.
fn ai_record_refs(code: &[i32], ai: i32) -> Vec<RecordRef> {
    let Ok(base) = usize::try_from(ai) else {
        return Vec::new();
    };
    let Some(record) = code.get(base..base.saturating_add(RecordKind::Ai.len())) else {
        return Vec::new();
    };
    [(record[0], RecordKind::Action), (record[1], RecordKind::Move)]
        .into_iter()
        .filter(|(offset, _)| *offset != 0)
        .map(|(offset, kind)| RecordRef {
            from: base,
            offset,
            kind,
        })
        .collect()
}
