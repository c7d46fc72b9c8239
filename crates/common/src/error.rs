//! Errors from decoding instruction streams and from reading or writing
//! program images.

use thiserror::Error;

use crate::opcode::Opcode;

/// Errors that occur while decoding instructions or binary program images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A word that does not name any opcode.
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(i32),

    /// Decoding started outside the instruction stream.
    #[error("offset {at} is outside the instruction stream")]
    OffsetOutOfRange { at: usize },

    /// The word at an instruction position does not name any opcode.
    #[error("unknown opcode {word:#x} at offset {at}")]
    UnknownOpcode { at: usize, word: i32 },

    /// The operands of an instruction run past the end of the stream.
    #[error("{} at offset {at} is truncated", opcode.mnemonic())]
    Truncated { at: usize, opcode: Opcode },

    /// A switch whose case count is negative.
    #[error("switch at offset {at} has negative case count {count}")]
    NegativeCaseCount { at: usize, count: i32 },

    /// Image does not start with the `AVM1` magic.
    #[error("bad magic: expected \"AVM1\"")]
    BadMagic,

    /// Image ends in the middle of a field.
    #[error("unexpected end of image at byte {at}")]
    UnexpectedEof { at: usize },

    /// Bytes left over between the code section and the digest.
    #[error("{count} trailing bytes after code section")]
    TrailingBytes { count: usize },

    /// Variable scope byte is not 0, 1 or 2.
    #[error("invalid variable scope: {0}")]
    InvalidScope(u8),

    /// Variable flag byte has bits outside the known set.
    #[error("invalid variable flags: {0:#04x}")]
    InvalidFlags(u8),

    /// Variable name is not valid UTF-8.
    #[error("variable name at byte {at} is not valid UTF-8")]
    InvalidUtf8 { at: usize },

    /// Table offset stored as a negative number other than the -1 sentinel.
    #[error("invalid offset {value} at byte {at}")]
    InvalidOffset { at: usize, value: i32 },

    /// The trailing blake3 digest does not match the image contents.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// A table lists the same actor kind or event id twice.
    #[error("{table} table lists key {key} twice")]
    DuplicateKey { table: &'static str, key: i32 },
}

/// Errors that occur while writing a program to a binary image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A variable name does not fit the 16-bit length prefix.
    #[error("name of variable {index} is {len} bytes (max {max})", max = crate::program::MAX_NAME_LEN)]
    NameTooLong { index: usize, len: usize },

    /// A table or the code section has more entries than a 32-bit count holds.
    #[error("{section} section has {len} entries")]
    SectionTooLarge { section: &'static str, len: usize },

    /// An entry offset does not fit a non-negative 32-bit word.
    #[error("entry offset {offset} does not fit in an image")]
    OffsetTooLarge { offset: usize },
}
