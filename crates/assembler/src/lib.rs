//! Actor VM assembler: bidirectional text ↔ program translation.
//!
//! One mnemonic per instruction, operands in table order. Labels name
//! offsets; directives declare variables, actor scripts, events and raw
//! data words.
//!
//! # Usage
//!
//! ```
//! use actorvm_assembler::{assemble, disassemble};
//!
//! let text = "\
//! .var hp actor default 100
//! .actor 1400 tick @idle
//!
//! idle:
//!     ifvarl hp 10 @done
//!     killit
//! done:
//!     enda
//! ";
//! let program = assemble(text).unwrap();
//! assert_eq!(program.code.len(), 6);
//! assert_eq!(assemble(&disassemble(&program)).unwrap(), program);
//! ```
//!
//! # Syntax
//!
//! ```text
//! ; comment
//! label:
//!     mnemonic operand...
//! .var NAME global|actor|player [default N] [readonly] [zero]
//! .actor KIND [tick TARGET] [load TARGET]
//! .event ID TARGET
//! .data WORD...
//! ```
//!
//! Targets and records are numbers or `@label`. Variable operands are
//! numbers or declared names; handle operands also accept `self`. A
//! `switch` is written `switch VAR END DEFAULT [LITERAL TARGET]...` and the
//! case count word is filled in.
//!
//! # Roundtrip Guarantee
//!
//! `assemble(disassemble(program)) == program` holds whenever every
//! variable name is a plain identifier other than `self`.

pub mod error;

mod disassembler;
mod lexer;
mod parser;

pub use error::AsmError;

use std::collections::HashMap;

use actorvm_common::{ActorScripts, Program, SELF_HANDLE};
use lexer::tokenize_line;
use parser::{parse_line, Arg, Item, ParsedLine};

/// Assemble text into a program.
///
/// Returns the first error encountered. Fix one error at a time.
pub fn assemble(text: &str) -> Result<Program, AsmError> {
    let mut lines: Vec<(usize, ParsedLine)> = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let tokens = tokenize_line(line, line_num)?;
        if let Some(parsed) = parse_line(&tokens, line_num)? {
            lines.push((line_num, parsed));
        }
    }

    // Pass 1: label offsets and the variable table.
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut program = Program::new(Vec::new());
    let mut offset = 0;
    for (line_num, parsed) in &lines {
        if let Some(label) = &parsed.label {
            if labels.insert(label.clone(), offset).is_some() {
                return Err(AsmError::DuplicateLabel {
                    line: *line_num,
                    label: label.clone(),
                });
            }
        }
        match &parsed.item {
            Some(Item::Var(decl)) => {
                if program.var_id(&decl.name).is_some() {
                    return Err(AsmError::DuplicateVariable {
                        line: *line_num,
                        name: decl.name.clone(),
                    });
                }
                program.vars.push(decl.clone());
            }
            Some(item) => offset += item.len(),
            None => {}
        }
    }

    // Pass 2: emit words and entry tables.
    let resolver = Resolver {
        labels: &labels,
        program: &program,
    };
    let mut code = Vec::with_capacity(offset);
    let mut actors = Vec::new();
    let mut events = Vec::new();
    for (line_num, parsed) in &lines {
        let line = *line_num;
        match &parsed.item {
            Some(Item::Instruction { opcode, args }) => {
                code.push(*opcode as i32);
                for arg in args {
                    code.push(resolver.word(arg, line)?);
                }
            }
            Some(Item::Data(words)) => {
                for arg in words {
                    code.push(resolver.word(arg, line)?);
                }
            }
            Some(Item::Actor { kind, tick, load }) => {
                let scripts = ActorScripts {
                    tick: tick.as_ref().map(|t| resolver.entry(t, line)).transpose()?,
                    load: load.as_ref().map(|t| resolver.entry(t, line)).transpose()?,
                };
                actors.push((line, *kind, scripts));
            }
            Some(Item::Event { id, target }) => {
                events.push((line, *id, resolver.entry(target, line)?));
            }
            Some(Item::Var(_)) | None => {}
        }
    }

    program.code = code;
    for (line, kind, scripts) in actors {
        if program.actors.insert(kind, scripts).is_some() {
            return Err(AsmError::DuplicateActor { line, kind });
        }
    }
    for (line, id, offset) in events {
        if program.events.insert(id, offset).is_some() {
            return Err(AsmError::DuplicateEvent { line, id });
        }
    }
    Ok(program)
}

/// Disassemble a program into canonical assembly text.
///
/// Traced code prints one instruction per line, indented under its label.
/// Words no entry reaches print as `.data`.
pub fn disassemble(program: &Program) -> String {
    disassembler::disassemble(program)
}

struct Resolver<'a> {
    labels: &'a HashMap<String, usize>,
    program: &'a Program,
}

impl Resolver<'_> {
    fn word(&self, arg: &Arg, line: usize) -> Result<i32, AsmError> {
        match arg {
            Arg::Number(n) => Ok(*n),
            Arg::SelfHandle => Ok(SELF_HANDLE),
            Arg::Label(label) => {
                let offset = self.labels.get(label).ok_or_else(|| AsmError::UnknownLabel {
                    line,
                    label: label.clone(),
                })?;
                Ok(*offset as i32)
            }
            Arg::Name(name) => {
                let id = self
                    .program
                    .var_id(name)
                    .ok_or_else(|| AsmError::UnknownVariable {
                        line,
                        name: name.clone(),
                    })?;
                Ok(id as i32)
            }
        }
    }

    fn entry(&self, arg: &Arg, line: usize) -> Result<usize, AsmError> {
        let value = self.word(arg, line)?;
        usize::try_from(value).map_err(|_| AsmError::InvalidOffset { line, value })
    }
}
