//! Scoped variable storage.
//!
//! Variables are declared once by the program and addressed by id. Global
//! variables have one value. Player variables have one value per player
//! slot. Actor variables are allocated lazily per entity slot and remember
//! the generation they were written for, so a reused slot reads the default
//! again. Each slot also keeps a watermark below which every generation is
//! dead; handles under it are invalid for reads and writes.

use actorvm_common::{Scope, VarDecl};

use crate::handle::{EntityId, PlayerId};

/// A scope-qualified storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Global(usize),
    Actor(usize, EntityId),
    Player(usize, PlayerId),
}

#[derive(Debug, Clone, Copy)]
struct ActorCell {
    generation: u32,
    value: i32,
}

enum Storage {
    Global(i32),
    Player(Vec<i32>),
    Actor(Vec<Option<ActorCell>>),
}

/// Variable values for every scope.
pub struct VarRegistry {
    decls: Vec<VarDecl>,
    storage: Vec<Storage>,
    /// Per entity slot, the lowest generation not yet forgotten.
    retired: Vec<u32>,
    max_players: usize,
}

impl VarRegistry {
    pub fn new(decls: &[VarDecl], max_players: usize) -> Self {
        let storage = decls
            .iter()
            .map(|decl| match decl.scope {
                Scope::Global => Storage::Global(decl.default),
                Scope::Player => Storage::Player(vec![decl.default; max_players]),
                Scope::Actor => Storage::Actor(Vec::new()),
            })
            .collect();
        Self {
            decls: decls.to_vec(),
            storage,
            retired: Vec::new(),
            max_players,
        }
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn decl(&self, id: i32) -> Option<&VarDecl> {
        usize::try_from(id).ok().and_then(|i| self.decls.get(i))
    }

    pub fn id_of(&self, name: &str) -> Option<i32> {
        self.decls
            .iter()
            .position(|d| d.name == name)
            .map(|i| i as i32)
    }

    /// Storage slot addressed by `id` for the given entity and player.
    pub fn resolve(
        &self,
        id: i32,
        entity: Option<EntityId>,
        player: Option<PlayerId>,
    ) -> Option<Cell> {
        let index = usize::try_from(id).ok()?;
        match self.decls.get(index)?.scope {
            Scope::Global => Some(Cell::Global(index)),
            Scope::Actor => entity
                .filter(|&e| !self.is_retired(e))
                .map(|e| Cell::Actor(index, e)),
            Scope::Player => player
                .filter(|p| usize::from(p.0) < self.max_players)
                .map(|p| Cell::Player(index, p)),
        }
    }

    fn is_retired(&self, entity: EntityId) -> bool {
        self.retired
            .get(entity.index as usize)
            .is_some_and(|&watermark| entity.generation < watermark)
    }

    pub fn get(&self, id: i32, entity: Option<EntityId>, player: Option<PlayerId>) -> i32 {
        let Some(decl) = self.decl(id) else {
            log::error!("read of unknown variable id {id}");
            return 0;
        };
        let Some(cell) = self.resolve(id, entity, player) else {
            return invalid_read(decl);
        };
        match (cell, &self.storage[cell_index(cell)]) {
            (Cell::Global(_), Storage::Global(value)) => *value,
            (Cell::Player(_, p), Storage::Player(values)) => values[usize::from(p.0)],
            (Cell::Actor(_, e), Storage::Actor(cells)) => {
                match cells.get(e.index as usize).copied().flatten() {
                    Some(c) if c.generation == e.generation => c.value,
                    // A later occupant of the slot has written it.
                    Some(c) if c.generation > e.generation => invalid_read(decl),
                    _ => decl.default,
                }
            }
            _ => decl.default,
        }
    }

    /// Store a value. Read-only variables and unresolvable cells ignore it.
    pub fn set(&mut self, id: i32, entity: Option<EntityId>, player: Option<PlayerId>, value: i32) {
        let Some(decl) = self.decl(id) else {
            log::error!("write of unknown variable id {id}");
            return;
        };
        if decl.read_only {
            log::trace!("ignored write to read-only variable {}", decl.name);
            return;
        }
        let Some(cell) = self.resolve(id, entity, player) else {
            return;
        };
        match (cell, &mut self.storage[cell_index(cell)]) {
            (Cell::Global(_), Storage::Global(slot)) => *slot = value,
            (Cell::Player(_, p), Storage::Player(values)) => values[usize::from(p.0)] = value,
            (Cell::Actor(_, e), Storage::Actor(cells)) => {
                let index = e.index as usize;
                if cells.len() <= index {
                    cells.resize(index + 1, None);
                }
                if cells[index].is_some_and(|c| c.generation > e.generation) {
                    return;
                }
                cells[index] = Some(ActorCell {
                    generation: e.generation,
                    value,
                });
            }
            _ => {}
        }
    }

    /// Destroy every actor-scoped value belonging to `entity` and mark its
    /// handle, and any older one for the same slot, invalid.
    pub fn forget_entity(&mut self, entity: EntityId) {
        let index = entity.index as usize;
        if self.retired.len() <= index {
            self.retired.resize(index + 1, 0);
        }
        let watermark = entity.generation.saturating_add(1);
        self.retired[index] = self.retired[index].max(watermark);

        for storage in &mut self.storage {
            if let Storage::Actor(cells) = storage {
                if let Some(slot) = cells.get_mut(entity.index as usize) {
                    if slot.is_some_and(|c| c.generation == entity.generation) {
                        *slot = None;
                    }
                }
            }
        }
    }
}

fn invalid_read(decl: &VarDecl) -> i32 {
    if decl.zero_when_invalid {
        0
    } else {
        decl.default
    }
}

fn cell_index(cell: Cell) -> usize {
    match cell {
        Cell::Global(i) | Cell::Actor(i, _) | Cell::Player(i, _) => i,
    }
}
