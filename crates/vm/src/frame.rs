//! Per-invocation execution context.

use crate::handle::{EntityId, PlayerId};
use crate::host::FrameContext;

/// Whether a frame should keep running and what happens to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Running,
    /// Delete the entity once the frame unwinds.
    Deleted,
    /// The host already removed the entity; just stop.
    DeletedQuiet,
}

/// What the entry point must do after a frame finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Normal,
    Delete,
    DeleteQuiet,
}

/// One run of the interpreter against an entity/player pair.
///
/// Scratch registers are not stored here: they belong to the entity and are
/// reached through [`crate::Host::actor_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub entity: Option<EntityId>,
    pub player: Option<PlayerId>,
    /// Caller-defined parameter, e.g. distance to the nearest player.
    pub extra: i32,
    /// Offset of the next instruction.
    pub cursor: usize,
    termination: Termination,
    pub(crate) depth: usize,
    pub(crate) steps: u64,
}

impl Frame {
    pub fn new(
        entity: Option<EntityId>,
        player: Option<PlayerId>,
        extra: i32,
        cursor: usize,
    ) -> Self {
        Self {
            entity,
            player,
            extra,
            cursor,
            termination: Termination::Running,
            depth: 0,
            steps: 0,
        }
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    pub fn is_running(&self) -> bool {
        self.termination == Termination::Running
    }

    /// Current nesting depth of brace blocks, state calls and switch branches.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Flag the entity for deletion after the frame unwinds. The first
    /// request wins.
    pub fn request_delete(&mut self) {
        if self.is_running() {
            self.termination = Termination::Deleted;
        }
    }

    /// Stop the frame because the entity is already gone.
    pub fn request_quiet_delete(&mut self) {
        if self.is_running() {
            self.termination = Termination::DeletedQuiet;
        }
    }

    pub fn context(&self) -> FrameContext {
        FrameContext {
            entity: self.entity,
            player: self.player,
            extra: self.extra,
        }
    }

    /// Consume the frame and report what the entry point must apply.
    pub fn finish(self) -> FrameOutcome {
        match self.termination {
            Termination::Running => FrameOutcome::Normal,
            Termination::Deleted => FrameOutcome::Delete,
            Termination::DeletedQuiet => FrameOutcome::DeleteQuiet,
        }
    }
}
