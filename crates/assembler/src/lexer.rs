//! Tokenizer for assembly text.

use crate::error::AsmError;

/// A single token from an assembly line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// A bare word: mnemonic, brace, variable name, scope, keyword.
    Ident(String),
    /// A numeric literal (decimal, optionally negative, or hex).
    Number(i32),
    /// `name:` defines a label at the current offset.
    LabelDef(String),
    /// `@name` refers to a label.
    LabelRef(String),
    /// `.name` starts a directive. Always lowercase.
    Directive(String),
}

/// Tokenize a single line of assembly text.
///
/// Returns an empty Vec for blank lines and comment-only lines.
/// Comments start with `;` and extend to end of line.
pub(crate) fn tokenize_line(line: &str, line_num: usize) -> Result<Vec<Token>, AsmError> {
    let line = match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    };

    let mut tokens = Vec::new();
    for word in line.split_whitespace() {
        let token = if word == "{" || word == "}" {
            Token::Ident(word.to_string())
        } else if let Some(name) = word.strip_prefix('@') {
            Token::LabelRef(identifier(name, word, line_num)?)
        } else if let Some(name) = word.strip_prefix('.') {
            Token::Directive(identifier(name, word, line_num)?.to_lowercase())
        } else if let Some(name) = word.strip_suffix(':') {
            Token::LabelDef(identifier(name, word, line_num)?)
        } else if looks_numeric(word) {
            Token::Number(parse_number(word).ok_or_else(|| AsmError::InvalidNumber {
                line: line_num,
                token: word.to_string(),
            })?)
        } else {
            Token::Ident(identifier(word, word, line_num)?)
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/// True if `name` can be used as a label or variable name.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn identifier(name: &str, word: &str, line_num: usize) -> Result<String, AsmError> {
    if is_identifier(name) {
        Ok(name.to_string())
    } else {
        Err(AsmError::UnexpectedToken {
            line: line_num,
            token: word.to_string(),
        })
    }
}

fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    digits.as_bytes().first().is_some_and(|b| b.is_ascii_digit())
}

/// Parse a decimal or `0x` hex word. Hex covers the full 32-bit pattern,
/// so `0xffffffff` is `-1`.
fn parse_number(word: &str) -> Option<i32> {
    let (negative, digits) = match word.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, word),
    };
    let magnitude: i64 = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from(u32::from_str_radix(hex, 16).ok()? as i32),
        None => digits.parse().ok()?,
    };
    let value = if negative { magnitude.checked_neg()? } else { magnitude };
    i32::try_from(value).ok()
}
