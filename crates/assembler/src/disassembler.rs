//! Disassembler: program → canonical assembly text.
//!
//! Words reached by tracing control flow from the program's entries print
//! as instructions; everything else prints as `.data`. Every offset that
//! something refers to and that starts a line gets an `L<offset>:` label.

use std::collections::{BTreeMap, BTreeSet};

use actorvm_common::flow::{self, Trace};
use actorvm_common::{Instruction, Opcode, Operand, Program, SELF_HANDLE};

use crate::lexer::is_identifier;

/// Data words per `.data` line.
const DATA_WIDTH: usize = 8;

/// Disassemble a program into canonical assembly text.
///
/// Reassembling the output yields the same program as long as every
/// variable name is a plain identifier.
pub fn disassemble(program: &Program) -> String {
    let code = &program.code;
    let roots: Vec<usize> = program
        .entry_points()
        .into_iter()
        .filter(|&at| at < code.len())
        .collect();
    let trace = flow::trace(code, &roots);
    let layout = layout(code, &trace);
    let labels = labels(program, &trace, &layout);
    let names = Names::new(program);

    let mut lines = Vec::new();

    for var in &program.vars {
        let mut line = format!(".var {} {}", var.name, var.scope.name());
        if var.default != 0 {
            line.push_str(&format!(" default {}", var.default));
        }
        if var.read_only {
            line.push_str(" readonly");
        }
        if var.zero_when_invalid {
            line.push_str(" zero");
        }
        lines.push(line);
    }
    for (kind, scripts) in &program.actors {
        let mut line = format!(".actor {kind}");
        if let Some(tick) = scripts.tick {
            line.push_str(&format!(" tick {}", entry(tick, &labels)));
        }
        if let Some(load) = scripts.load {
            line.push_str(&format!(" load {}", entry(load, &labels)));
        }
        lines.push(line);
    }
    for (id, offset) in &program.events {
        lines.push(format!(".event {id} {}", entry(*offset, &labels)));
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }

    let mut at = 0;
    while at < code.len() {
        if labels.contains(&at) {
            lines.push(format!("L{at}:"));
        }
        if let Some(&len) = layout.get(&at) {
            // Every laid-out offset decoded during the trace.
            if let Ok(instr) = Instruction::decode(code, at) {
                lines.push(format!("    {}", render(&instr, &labels, &names)));
            }
            at += len;
            continue;
        }

        let mut end = at + 1;
        while end < code.len()
            && end - at < DATA_WIDTH
            && !labels.contains(&end)
            && !layout.contains_key(&end)
        {
            end += 1;
        }
        let words: Vec<String> = code[at..end].iter().map(|w| w.to_string()).collect();
        lines.push(format!("    .data {}", words.join(" ")));
        at = end;
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Traced instructions that can be printed without overlapping.
///
/// A jump into the middle of another instruction traces a second decoding
/// of the same words. Only the first one encountered walking forward is
/// printed.
fn layout(code: &[i32], trace: &Trace) -> BTreeMap<usize, usize> {
    let mut out = BTreeMap::new();
    let mut at = 0;
    while at < code.len() {
        match trace.starts.get(&at) {
            Some(&len) => {
                out.insert(at, len);
                at += len;
            }
            None => at += 1,
        }
    }
    out
}

/// Offsets that get a label line.
fn labels(program: &Program, trace: &Trace, layout: &BTreeMap<usize, usize>) -> BTreeSet<usize> {
    let code = &program.code;
    let mut refs: Vec<i32> = program.entry_points().into_iter().map(|at| at as i32).collect();

    for &at in layout.keys() {
        let Ok(instr) = Instruction::decode(code, at) else {
            continue;
        };
        if instr.opcode == Opcode::Switch {
            refs.push(instr.operand(1));
            refs.push(instr.operand(3));
            refs.extend(instr.switch_cases().map(|(_, target)| target));
            continue;
        }
        for (kind, &word) in instr.opcode.operands().iter().zip(instr.operands) {
            if matches!(kind, Operand::Target | Operand::Record(_)) {
                refs.push(word);
            }
        }
    }
    refs.extend(trace.records.iter().map(|r| r.offset));

    refs.into_iter()
        .filter_map(|word| usize::try_from(word).ok())
        .filter(|&at| at < code.len() && !interior(layout, at))
        .collect()
}

/// True if `at` falls inside a printed instruction's operands.
fn interior(layout: &BTreeMap<usize, usize>, at: usize) -> bool {
    layout
        .range(..at)
        .next_back()
        .is_some_and(|(&start, &len)| at < start + len)
}

fn entry(offset: usize, labels: &BTreeSet<usize>) -> String {
    if labels.contains(&offset) {
        format!("@L{offset}")
    } else {
        offset.to_string()
    }
}

fn target(word: i32, labels: &BTreeSet<usize>) -> String {
    match usize::try_from(word) {
        Ok(at) if labels.contains(&at) => format!("@L{at}"),
        _ => word.to_string(),
    }
}

/// Like [`target`], but 0 means "none" and stays numeric.
fn optional_target(word: i32, labels: &BTreeSet<usize>) -> String {
    if word == 0 {
        "0".to_string()
    } else {
        target(word, labels)
    }
}

/// Variable names usable as operands.
struct Names<'a> {
    vars: Vec<Option<&'a str>>,
}

impl<'a> Names<'a> {
    fn new(program: &'a Program) -> Self {
        let vars = program
            .vars
            .iter()
            .enumerate()
            .map(|(id, v)| {
                let name = v.name.as_str();
                let usable = is_identifier(name)
                    && !name.eq_ignore_ascii_case("self")
                    && program.var_id(name) == Some(id);
                usable.then_some(name)
            })
            .collect();
        Self { vars }
    }

    fn var(&self, word: i32) -> String {
        usize::try_from(word)
            .ok()
            .and_then(|id| self.vars.get(id).copied().flatten())
            .map_or_else(|| word.to_string(), str::to_string)
    }

    fn handle(&self, word: i32) -> String {
        if word == SELF_HANDLE {
            "self".to_string()
        } else {
            self.var(word)
        }
    }
}

fn render(instr: &Instruction<'_>, labels: &BTreeSet<usize>, names: &Names<'_>) -> String {
    let mut parts = vec![instr.opcode.mnemonic().to_string()];

    if instr.opcode == Opcode::Switch {
        parts.push(names.var(instr.operand(0)));
        parts.push(target(instr.operand(1), labels));
        parts.push(optional_target(instr.operand(3), labels));
        for (literal, case) in instr.switch_cases() {
            parts.push(literal.to_string());
            parts.push(target(case, labels));
        }
        return parts.join(" ");
    }

    for (kind, &word) in instr.opcode.operands().iter().zip(instr.operands) {
        parts.push(match kind {
            Operand::Literal | Operand::Field => word.to_string(),
            Operand::Var => names.var(word),
            Operand::Handle => names.handle(word),
            Operand::Target => target(word, labels),
            Operand::Record(_) => optional_target(word, labels),
        });
    }
    parts.join(" ")
}
