//! Variable declarations carried by a program.

use crate::error::DecodeError;

/// Storage class of a variable.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One value for the whole session.
    Global = 0,
    /// One value per entity.
    Actor = 1,
    /// One value per player slot.
    Player = 2,
}

impl Scope {
    pub fn name(self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Actor => "actor",
            Scope::Player => "player",
        }
    }

    pub fn from_name(name: &str) -> Option<Scope> {
        match name {
            "global" => Some(Scope::Global),
            "actor" => Some(Scope::Actor),
            "player" => Some(Scope::Player),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Scope {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Scope::Global),
            1 => Ok(Scope::Actor),
            2 => Ok(Scope::Player),
            _ => Err(DecodeError::InvalidScope(value)),
        }
    }
}

/// Flag bit: writes are ignored.
pub const FLAG_READ_ONLY: u8 = 0x01;
/// Flag bit: reads addressed to an invalid entity or player yield 0.
pub const FLAG_ZERO_WHEN_INVALID: u8 = 0x02;

const KNOWN_FLAGS: u8 = FLAG_READ_ONLY | FLAG_ZERO_WHEN_INVALID;

/// A declared variable. Its id is its index in [`crate::Program::vars`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: String,
    pub scope: Scope,
    /// Initial value, and the value of every per-entity or per-player cell
    /// that has not been written yet.
    pub default: i32,
    pub read_only: bool,
    pub zero_when_invalid: bool,
}

impl VarDecl {
    pub fn new(name: impl Into<String>, scope: Scope, default: i32) -> Self {
        Self {
            name: name.into(),
            scope,
            default,
            read_only: false,
            zero_when_invalid: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn zero_when_invalid(mut self) -> Self {
        self.zero_when_invalid = true;
        self
    }

    /// Pack the boolean flags into the image flag byte.
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.read_only {
            flags |= FLAG_READ_ONLY;
        }
        if self.zero_when_invalid {
            flags |= FLAG_ZERO_WHEN_INVALID;
        }
        flags
    }

    /// Apply an image flag byte, rejecting unknown bits.
    pub fn with_flags(mut self, flags: u8) -> Result<Self, DecodeError> {
        if flags & !KNOWN_FLAGS != 0 {
            return Err(DecodeError::InvalidFlags(flags));
        }
        self.read_only = flags & FLAG_READ_ONLY != 0;
        self.zero_when_invalid = flags & FLAG_ZERO_WHEN_INVALID != 0;
        Ok(self)
    }
}
