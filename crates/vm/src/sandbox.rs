//! An in-memory host for tests and the command line runner.
//!
//! Entities live in a generational arena: deleting an entity frees its slot
//! and bumps the slot generation, so stale [`EntityId`]s stop resolving.
//! Probes answer from a scripted table, effects are recorded, and field
//! tables are plain maps with per-field access tags.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};

use crate::handle::{EntityId, PlayerId, SectorId, WallId};
use crate::host::{
    Access, ActorState, Effect, EffectOutcome, FieldRef, FrameContext, Host, Probe, Status,
    Target, REG_COUNT,
};

/// `changestat` argument that removes the entity on the spot.
pub const STAT_REMOVED: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxEntity {
    pub kind: i32,
    pub sector: Option<SectorId>,
    pub status: Status,
    pub state: ActorState,
    /// Distance reported to scripts as the frame's `extra`.
    pub player_distance: i32,
    pub position: [i32; 3],
    pub fields: BTreeMap<i32, i32>,
    serial: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxPlayer {
    pub fields: BTreeMap<i32, i32>,
    /// Entity currently squishing this player.
    pub squished_by: Option<EntityId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entity: Option<SandboxEntity>,
}

/// One recorded effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectRecord {
    pub entity: Option<EntityId>,
    pub effect: Effect,
}

#[derive(Debug, Clone, Default)]
pub struct SandboxWorld {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_serial: u64,
    pub players: Vec<SandboxPlayer>,
    pub sector_count: i32,
    pub wall_count: i32,
    sector_fields: BTreeMap<(i32, i32), i32>,
    wall_fields: BTreeMap<(i32, i32), i32>,
    userdef: BTreeMap<i32, i32>,
    access: BTreeMap<(Target, i32), Access>,
    probes: HashMap<Probe, bool>,
    /// Every effect issued by a script, in order.
    pub effects: Vec<EffectRecord>,
    /// Every entity deleted through [`Host::delete_entity`], in order.
    pub deletions: Vec<EntityId>,
    /// Number of `advance_motion` calls.
    pub motions: usize,
    /// Entities passed to `check_standable_sleep`, in order.
    pub standable_checks: Vec<EntityId>,
    field_reads: Cell<usize>,
    field_writes: usize,
}

impl SandboxWorld {
    pub fn new(sector_count: i32, wall_count: i32) -> Self {
        Self {
            sector_count,
            wall_count,
            ..Self::default()
        }
    }

    /// Create an active entity. Freed slots are reused with a new generation.
    pub fn spawn(&mut self, kind: i32, sector: Option<SectorId>) -> EntityId {
        let entity = SandboxEntity {
            kind,
            sector,
            status: Status::Active,
            state: ActorState::default(),
            player_distance: 0,
            position: [0; 3],
            fields: BTreeMap::new(),
            serial: self.next_serial,
        };
        self.next_serial += 1;

        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entity = Some(entity);
                EntityId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entity: Some(entity),
                });
                EntityId::new(self.slots.len() as u32 - 1, 0)
            }
        }
    }

    pub fn add_player(&mut self) -> PlayerId {
        self.players.push(SandboxPlayer::default());
        PlayerId(self.players.len() as u16 - 1)
    }

    pub fn entity(&self, id: EntityId) -> Option<&SandboxEntity> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entity.as_ref())
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut SandboxEntity> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entity.as_mut())
    }

    /// Live entities in creation order.
    pub fn live(&self) -> Vec<EntityId> {
        let mut live: Vec<(u64, EntityId)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.entity
                    .as_ref()
                    .map(|e| (e.serial, EntityId::new(index as u32, slot.generation)))
            })
            .collect();
        live.sort_unstable();
        live.into_iter().map(|(_, id)| id).collect()
    }

    pub fn declare_field(&mut self, target: Target, field: i32, access: Access) {
        self.access.insert((target, field), access);
    }

    pub fn set_sector_field(&mut self, sector: i32, field: i32, value: i32) {
        self.sector_fields.insert((sector, field), value);
    }

    pub fn sector_field(&self, sector: i32, field: i32) -> i32 {
        self.sector_fields.get(&(sector, field)).copied().unwrap_or(0)
    }

    pub fn set_userdef(&mut self, field: i32, value: i32) {
        self.userdef.insert(field, value);
    }

    pub fn userdef(&self, field: i32) -> i32 {
        self.userdef.get(&field).copied().unwrap_or(0)
    }

    /// Script the answer for a probe. Unscripted probes answer false.
    pub fn set_probe(&mut self, probe: Probe, answer: bool) {
        self.probes.insert(probe, answer);
    }

    /// Field reads and writes that reached a table.
    pub fn field_calls(&self) -> usize {
        self.field_reads.get() + self.field_writes
    }

    fn remove(&mut self, id: EntityId) -> bool {
        let Some(slot) = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.entity.is_some())
        else {
            return false;
        };
        slot.entity = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        true
    }

    fn status_rank(status: Status) -> Option<u8> {
        match status {
            Status::Active => Some(0),
            Status::Standable => Some(1),
            Status::Other(_) => Some(2),
            Status::Dormant => None,
        }
    }
}

impl Host for SandboxWorld {
    fn entity_at(&self, handle: i32) -> Option<EntityId> {
        let index = u32::try_from(handle).ok()?;
        let slot = self.slots.get(index as usize)?;
        slot.entity
            .as_ref()
            .map(|_| EntityId::new(index, slot.generation))
    }

    fn is_alive(&self, entity: EntityId) -> bool {
        self.entity(entity).is_some()
    }

    fn actor_kind(&self, entity: EntityId) -> Option<i32> {
        self.entity(entity).map(|e| e.kind)
    }

    fn sector_of(&self, entity: EntityId) -> Option<SectorId> {
        self.entity(entity)
            .and_then(|e| e.sector)
            .filter(|s| s.0 >= 0 && s.0 < self.sector_count)
    }

    fn status(&self, entity: EntityId) -> Option<Status> {
        self.entity(entity).map(|e| e.status)
    }

    fn actor_state(&mut self, entity: EntityId) -> Option<&mut ActorState> {
        self.entity_mut(entity).map(|e| &mut e.state)
    }

    fn nearest_player(&self, entity: EntityId) -> Option<(PlayerId, i32)> {
        if self.players.is_empty() {
            return None;
        }
        self.entity(entity)
            .map(|e| (PlayerId(0), e.player_distance))
    }

    fn field_access(&self, target: Target, field: i32) -> Access {
        self.access
            .get(&(target, field))
            .copied()
            .unwrap_or(Access::Unknown)
    }

    fn get_field(&self, at: FieldRef, field: i32, _param: i32) -> Option<i32> {
        self.field_reads.set(self.field_reads.get() + 1);
        match at {
            FieldRef::Actor(e) => self
                .entity(e)
                .map(|e| e.fields.get(&field).copied().unwrap_or(0)),
            FieldRef::Player(p) => self
                .players
                .get(usize::from(p.0))
                .map(|p| p.fields.get(&field).copied().unwrap_or(0)),
            FieldRef::Sector(SectorId(s)) if (0..self.sector_count).contains(&s) => Some(self.sector_field(s, field)),
            FieldRef::Wall(WallId(w)) if (0..self.wall_count).contains(&w) => {
                Some(self.wall_fields.get(&(w, field)).copied().unwrap_or(0))
            }
            FieldRef::UserDef => Some(self.userdef(field)),
            FieldRef::Sector(_) | FieldRef::Wall(_) => None,
        }
    }

    fn set_field(&mut self, at: FieldRef, field: i32, _param: i32, value: i32) {
        self.field_writes += 1;
        match at {
            FieldRef::Actor(e) => {
                if let Some(e) = self.entity_mut(e) {
                    e.fields.insert(field, value);
                }
            }
            FieldRef::Player(p) => {
                if let Some(p) = self.players.get_mut(usize::from(p.0)) {
                    p.fields.insert(field, value);
                }
            }
            FieldRef::Sector(SectorId(s)) if (0..self.sector_count).contains(&s) => {
                self.sector_fields.insert((s, field), value);
            }
            FieldRef::Wall(WallId(w)) if (0..self.wall_count).contains(&w) => {
                self.wall_fields.insert((w, field), value);
            }
            FieldRef::UserDef => {
                self.userdef.insert(field, value);
            }
            FieldRef::Sector(_) | FieldRef::Wall(_) => {}
        }
    }

    fn probe(&mut self, _ctx: &FrameContext, probe: Probe) -> bool {
        self.probes.get(&probe).copied().unwrap_or(false)
    }

    fn effect(&mut self, ctx: &FrameContext, effect: Effect) -> EffectOutcome {
        self.effects.push(EffectRecord {
            entity: ctx.entity,
            effect,
        });
        match effect {
            Effect::Spawn { kind } | Effect::ESpawn { kind } => {
                let sector = ctx.entity.and_then(|e| self.sector_of(e));
                let spawned = self.spawn(kind, sector);
                EffectOutcome::Value(spawned.script_handle())
            }
            Effect::MoveEntity { target, dx, dy, dz } => {
                if let Some(e) = self.entity_mut(target) {
                    e.position[0] = e.position[0].wrapping_add(dx);
                    e.position[1] = e.position[1].wrapping_add(dy);
                    e.position[2] = e.position[2].wrapping_add(dz);
                }
                EffectOutcome::Value(0)
            }
            Effect::ChangeStat { status } => {
                let Some(entity) = ctx.entity else {
                    return EffectOutcome::Value(-1);
                };
                if status == STAT_REMOVED {
                    self.remove(entity);
                    return EffectOutcome::Removed;
                }
                if let Some(e) = self.entity_mut(entity) {
                    e.status = match status {
                        0 => Status::Active,
                        1 => Status::Dormant,
                        2 => Status::Standable,
                        other => Status::Other(other),
                    };
                }
                EffectOutcome::Value(0)
            }
            _ => EffectOutcome::Value(0),
        }
    }

    fn advance_motion(&mut self, entity: EntityId) {
        self.motions += 1;
        if let Some(e) = self.entity_mut(entity) {
            e.state.regs[REG_COUNT] = e.state.regs[REG_COUNT].wrapping_add(1);
        }
    }

    fn check_standable_sleep(&mut self, entity: EntityId) {
        self.standable_checks.push(entity);
    }

    fn set_status(&mut self, entity: EntityId, status: Status) {
        if let Some(e) = self.entity_mut(entity) {
            e.status = status;
        }
    }

    fn release_player_refs(&mut self, entity: EntityId) {
        for player in &mut self.players {
            if player.squished_by == Some(entity) {
                player.squished_by = None;
            }
        }
    }

    fn delete_entity(&mut self, entity: EntityId) {
        if self.remove(entity) {
            self.deletions.push(entity);
        }
    }

    fn tick_order(&self) -> Vec<EntityId> {
        let mut order: Vec<(u8, EntityId)> = self
            .live()
            .into_iter()
            .filter_map(|id| {
                let status = self.entity(id)?.status;
                Self::status_rank(status).map(|rank| (rank, id))
            })
            .collect();
        // Stable sort keeps creation order within a status category.
        order.sort_by_key(|(rank, _)| *rank);
        order.into_iter().map(|(_, id)| id).collect()
    }
}
