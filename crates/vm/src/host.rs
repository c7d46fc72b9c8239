//! The capability surface the VM calls out through.
//!
//! The VM owns no world data. Entities, players, sectors and walls live in
//! host tables and are re-resolved through this trait on every access, so a
//! handle that goes stale mid-frame is caught by the host rather than by
//! the interpreter.

use crate::handle::{EntityId, PlayerId, SectorId, WallId};

/// Number of per-entity scratch registers.
pub const REGISTER_COUNT: usize = 6;

/// Register holding the general-purpose counter.
pub const REG_COUNT: usize = 0;
/// Register holding the current move record offset.
pub const REG_MOVE: usize = 1;
/// Register counting completed animation steps of the current action.
pub const REG_ACTION_COUNT: usize = 2;
/// Register holding the current animation frame offset.
pub const REG_ACTION_FRAME: usize = 3;
/// Register holding the current action record offset.
pub const REG_ACTION: usize = 4;
/// Register holding the current ai record offset.
pub const REG_AI: usize = 5;

/// Script state persisted on each entity between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActorState {
    pub regs: [i32; REGISTER_COUNT],
    /// Tics accumulated toward the next animation step.
    pub anim_clock: i32,
    /// Ticks until the entity goes dormant. 0 means not counting down.
    pub sleep_timer: i32,
    pub move_flags: i32,
}

/// Status category of an entity, which also drives tick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Active,
    Dormant,
    Standable,
    Other(i32),
}

/// Which host table a field accessor addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Actor,
    Player,
    Sector,
    Wall,
    UserDef,
}

/// How a host exposes a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
    Unknown,
}

/// A resolved field accessor handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRef {
    Actor(EntityId),
    Player(PlayerId),
    Sector(SectorId),
    Wall(WallId),
    UserDef,
}

impl FieldRef {
    pub fn target(&self) -> Target {
        match self {
            FieldRef::Actor(_) => Target::Actor,
            FieldRef::Player(_) => Target::Player,
            FieldRef::Sector(_) => Target::Sector,
            FieldRef::Wall(_) => Target::Wall,
            FieldRef::UserDef => Target::UserDef,
        }
    }
}

/// The frame a probe or effect is issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    pub entity: Option<EntityId>,
    pub player: Option<PlayerId>,
    pub extra: i32,
}

/// World queries behind the perception conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    CanSee,
    CanSeeTarget,
    CanShootTarget,
    HitWeapon,
    Squished,
    Dead,
    /// `ifprobe` with two host-defined arguments.
    Custom(i32, i32),
}

/// Game actions the VM sequences but does not define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Spawn { kind: i32 },
    ESpawn { kind: i32 },
    Shoot { kind: i32 },
    Sound { id: i32 },
    GlobalSound { id: i32 },
    StopSound { id: i32 },
    Damage { target: EntityId, amount: i32 },
    HitRadius { radius: i32, damage: [i32; 4] },
    MoveEntity { target: EntityId, dx: i32, dy: i32, dz: i32 },
    ChangeStat { status: i32 },
    GiveItem { item: i32, amount: i32 },
}

/// Result of an [`Effect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectOutcome {
    Value(i32),
    /// The host removed the frame's entity while applying the effect.
    Removed,
}

/// Everything the interpreter needs from the embedding simulation.
pub trait Host {
    /// Resolve a script-visible entity integer to a live entity.
    fn entity_at(&self, handle: i32) -> Option<EntityId>;

    fn is_alive(&self, entity: EntityId) -> bool;

    /// Kind used to select the entity's scripts.
    fn actor_kind(&self, entity: EntityId) -> Option<i32>;

    /// Location of the entity, or `None` when it is outside the world.
    fn sector_of(&self, entity: EntityId) -> Option<SectorId>;

    fn status(&self, entity: EntityId) -> Option<Status>;

    fn actor_state(&mut self, entity: EntityId) -> Option<&mut ActorState>;

    /// Closest player and its distance.
    fn nearest_player(&self, entity: EntityId) -> Option<(PlayerId, i32)>;

    fn field_access(&self, target: Target, field: i32) -> Access;

    /// Read a field. `None` when the handle is stale or the field unknown.
    fn get_field(&self, at: FieldRef, field: i32, param: i32) -> Option<i32>;

    /// Write a field. Only called for fields tagged [`Access::ReadWrite`].
    fn set_field(&mut self, at: FieldRef, field: i32, param: i32, value: i32);

    fn probe(&mut self, ctx: &FrameContext, probe: Probe) -> bool;

    fn effect(&mut self, ctx: &FrameContext, effect: Effect) -> EffectOutcome;

    /// Movement and physics step after a tick frame finished normally.
    fn advance_motion(&mut self, entity: EntityId);

    /// Whether an active entity may count its sleep timer down this tick.
    fn may_sleep(&self, _entity: EntityId) -> bool {
        true
    }

    fn set_status(&mut self, entity: EntityId, status: Status);

    /// Sleep handling for standable entities.
    fn check_standable_sleep(&mut self, _entity: EntityId) {}

    /// Drop player references to an entity about to be deleted.
    fn release_player_refs(&mut self, entity: EntityId);

    fn delete_entity(&mut self, entity: EntityId);

    /// Entities to tick this pass: status category order, then creation
    /// order.
    fn tick_order(&self) -> Vec<EntityId>;
}
