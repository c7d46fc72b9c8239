//! Parser for assembly tokens.
//!
//! Each line is an optional `label:` followed by an instruction, a
//! directive, or nothing. Operands are checked against the opcode's operand
//! table; labels and variable names stay symbolic until the assembler
//! resolves them.

use std::fmt;

use crate::error::AsmError;
use crate::lexer::Token;
use actorvm_common::program::MAX_NAME_LEN;
use actorvm_common::{Opcode, Operand, Scope, VarDecl};

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{s}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::LabelDef(s) => write!(f, "{s}:"),
            Token::LabelRef(s) => write!(f, "@{s}"),
            Token::Directive(s) => write!(f, ".{s}"),
        }
    }
}

/// A word whose value may not be known until every line has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Arg {
    Number(i32),
    Label(String),
    /// A variable name.
    Name(String),
    /// The `self` handle.
    SelfHandle,
}

/// The content of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Item {
    /// An opcode and its operand words. For `switch` the case count word is
    /// included.
    Instruction { opcode: Opcode, args: Vec<Arg> },
    /// Raw words.
    Data(Vec<Arg>),
    Var(VarDecl),
    Actor {
        kind: i32,
        tick: Option<Arg>,
        load: Option<Arg>,
    },
    Event { id: i32, target: Arg },
}

impl Item {
    /// Words this item occupies in the stream.
    pub(crate) fn len(&self) -> usize {
        match self {
            Item::Instruction { args, .. } => 1 + args.len(),
            Item::Data(words) => words.len(),
            Item::Var(_) | Item::Actor { .. } | Item::Event { .. } => 0,
        }
    }
}

/// A parsed, non-blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedLine {
    pub label: Option<String>,
    pub item: Option<Item>,
}

/// Parse the tokens of a single line.
///
/// Returns `Ok(None)` for blank lines (empty token list).
pub(crate) fn parse_line(tokens: &[Token], line_num: usize) -> Result<Option<ParsedLine>, AsmError> {
    let (label, rest) = match tokens.split_first() {
        None => return Ok(None),
        Some((Token::LabelDef(name), rest)) => (Some(name.clone()), rest),
        Some(_) => (None, tokens),
    };

    let item = match rest.split_first() {
        None => None,
        Some((Token::Directive(name), args)) => Some(parse_directive(name, args, line_num)?),
        Some((Token::Ident(mnemonic), args)) => {
            let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| AsmError::UnknownOpcode {
                line: line_num,
                token: mnemonic.clone(),
            })?;
            Some(parse_instruction(opcode, args, line_num)?)
        }
        Some((other, _)) => {
            return Err(AsmError::UnexpectedToken {
                line: line_num,
                token: other.to_string(),
            })
        }
    };

    Ok(Some(ParsedLine { label, item }))
}

fn parse_instruction(opcode: Opcode, args: &[Token], line_num: usize) -> Result<Item, AsmError> {
    if opcode == Opcode::Switch {
        return parse_switch(args, line_num);
    }

    let kinds = opcode.operands();
    if args.len() < kinds.len() {
        return Err(AsmError::MissingArgument {
            line: line_num,
            opcode: opcode.mnemonic(),
            expected: kinds.len(),
        });
    }
    expect_end(&args[kinds.len()..], line_num)?;

    let args = kinds
        .iter()
        .zip(args)
        .map(|(&kind, token)| operand(kind, token, line_num))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Item::Instruction { opcode, args })
}

/// `switch VAR END DEFAULT [LITERAL TARGET]...`
///
/// The case count is implied by the number of pairs.
fn parse_switch(args: &[Token], line_num: usize) -> Result<Item, AsmError> {
    if args.len() < 3 || (args.len() - 3) % 2 != 0 {
        return Err(AsmError::MissingArgument {
            line: line_num,
            opcode: Opcode::Switch.mnemonic(),
            expected: if args.len() < 3 { 3 } else { args.len() + 1 },
        });
    }
    let cases = &args[3..];
    let count = i32::try_from(cases.len() / 2).map_err(|_| AsmError::UnexpectedToken {
        line: line_num,
        token: args[0].to_string(),
    })?;

    let mut out = vec![
        operand(Operand::Var, &args[0], line_num)?,
        operand(Operand::Target, &args[1], line_num)?,
        Arg::Number(count),
        operand(Operand::Target, &args[2], line_num)?,
    ];
    for pair in cases.chunks_exact(2) {
        out.push(operand(Operand::Literal, &pair[0], line_num)?);
        out.push(operand(Operand::Target, &pair[1], line_num)?);
    }
    Ok(Item::Instruction {
        opcode: Opcode::Switch,
        args: out,
    })
}

fn operand(kind: Operand, token: &Token, line_num: usize) -> Result<Arg, AsmError> {
    let arg = match (kind, token) {
        (_, Token::Number(n)) => Some(Arg::Number(*n)),
        (Operand::Target | Operand::Record(_), Token::LabelRef(label)) => {
            Some(Arg::Label(label.clone()))
        }
        (Operand::Handle, Token::Ident(name)) if name.eq_ignore_ascii_case("self") => {
            Some(Arg::SelfHandle)
        }
        (Operand::Var | Operand::Handle, Token::Ident(name)) => Some(Arg::Name(name.clone())),
        _ => None,
    };
    arg.ok_or_else(|| AsmError::UnexpectedToken {
        line: line_num,
        token: token.to_string(),
    })
}

fn parse_directive(name: &str, args: &[Token], line_num: usize) -> Result<Item, AsmError> {
    match name {
        "var" => parse_var(args, line_num),
        "actor" => {
            let kind = expect_number(args, 0, line_num, ".actor", 1)?;
            let mut tick = None;
            let mut load = None;
            let mut rest = &args[1..];
            while let Some((keyword, after)) = rest.split_first() {
                let slot = match keyword {
                    Token::Ident(k) if k.eq_ignore_ascii_case("tick") => &mut tick,
                    Token::Ident(k) if k.eq_ignore_ascii_case("load") => &mut load,
                    other => {
                        return Err(AsmError::UnexpectedToken {
                            line: line_num,
                            token: other.to_string(),
                        })
                    }
                };
                let target = after.first().ok_or(AsmError::MissingArgument {
                    line: line_num,
                    opcode: ".actor",
                    expected: args.len() + 1,
                })?;
                *slot = Some(operand(Operand::Target, target, line_num)?);
                rest = &after[1..];
            }
            Ok(Item::Actor { kind, tick, load })
        }
        "event" => {
            let id = expect_number(args, 0, line_num, ".event", 2)?;
            let target = args.get(1).ok_or(AsmError::MissingArgument {
                line: line_num,
                opcode: ".event",
                expected: 2,
            })?;
            expect_end(&args[2..], line_num)?;
            Ok(Item::Event {
                id,
                target: operand(Operand::Target, target, line_num)?,
            })
        }
        "data" => {
            let words = args
                .iter()
                .map(|token| operand(Operand::Target, token, line_num))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Item::Data(words))
        }
        other => Err(AsmError::UnknownDirective {
            line: line_num,
            token: other.to_string(),
        }),
    }
}

/// `.var NAME SCOPE [default N] [readonly] [zero]`
fn parse_var(args: &[Token], line_num: usize) -> Result<Item, AsmError> {
    let missing = AsmError::MissingArgument {
        line: line_num,
        opcode: ".var",
        expected: 2,
    };
    let name = match args.first() {
        Some(Token::Ident(name)) if name.len() > MAX_NAME_LEN => {
            return Err(AsmError::NameTooLong {
                line: line_num,
                len: name.len(),
            })
        }
        Some(Token::Ident(name)) if !name.eq_ignore_ascii_case("self") => name.clone(),
        Some(other) => {
            return Err(AsmError::UnexpectedToken {
                line: line_num,
                token: other.to_string(),
            })
        }
        None => return Err(missing),
    };
    let scope = match args.get(1) {
        Some(Token::Ident(word)) => {
            Scope::from_name(&word.to_lowercase()).ok_or_else(|| AsmError::UnknownScope {
                line: line_num,
                token: word.clone(),
            })?
        }
        Some(other) => {
            return Err(AsmError::UnknownScope {
                line: line_num,
                token: other.to_string(),
            })
        }
        None => return Err(missing),
    };

    let mut decl = VarDecl::new(name, scope, 0);
    let mut i = 2;
    while let Some(token) = args.get(i) {
        match token {
            Token::Ident(word) if word.eq_ignore_ascii_case("default") => {
                decl.default = expect_number(args, i + 1, line_num, ".var", i + 2)?;
                i += 2;
            }
            Token::Ident(word) if word.eq_ignore_ascii_case("readonly") => {
                decl.read_only = true;
                i += 1;
            }
            Token::Ident(word) if word.eq_ignore_ascii_case("zero") => {
                decl.zero_when_invalid = true;
                i += 1;
            }
            other => {
                return Err(AsmError::UnexpectedToken {
                    line: line_num,
                    token: other.to_string(),
                })
            }
        }
    }
    Ok(Item::Var(decl))
}

fn expect_number(
    args: &[Token],
    index: usize,
    line_num: usize,
    directive: &'static str,
    expected: usize,
) -> Result<i32, AsmError> {
    match args.get(index) {
        Some(Token::Number(n)) => Ok(*n),
        Some(other) => Err(AsmError::InvalidNumber {
            line: line_num,
            token: other.to_string(),
        }),
        None => Err(AsmError::MissingArgument {
            line: line_num,
            opcode: directive,
            expected,
        }),
    }
}

fn expect_end(args: &[Token], line_num: usize) -> Result<(), AsmError> {
    match args.first() {
        Some(extra) => Err(AsmError::UnexpectedToken {
            line: line_num,
            token: extra.to_string(),
        }),
        None => Ok(()),
    }
}
