//! Opaque handles into host-owned tables.

use std::fmt;

/// A generation-checked entity handle.
///
/// Scripts only ever see `index`; the generation lets the host and the
/// variable registry tell a reused slot apart from the entity that used to
/// live there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub index: u32,
    pub generation: u32,
}

impl EntityId {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The integer scripts use to name this entity.
    pub fn script_handle(self) -> i32 {
        self.index as i32
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u16);

impl PlayerId {
    /// Interpret a script value as a player slot.
    pub fn from_script(value: i32) -> Option<Self> {
        u16::try_from(value).ok().map(PlayerId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorId(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WallId(pub i32);
