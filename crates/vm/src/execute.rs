//! Fetch-decode-execute loop and opcode dispatch.
//!
//! Control flow is structured as nested runs. A brace block, a state call
//! and a switch branch each run the loop recursively until a terminal
//! opcode. `}` and `endswitch` step past themselves, so only the innermost
//! run ends. `enda`, `ends`, `endevent` and `break` leave the cursor on
//! themselves, so every enclosing brace block reads them again and ends as
//! well, until a state call, a switch or the entry point repositions the
//! cursor.

use actorvm_common::flow::else_marker_at;
use actorvm_common::{DecodeError, Instruction, Opcode, Program, RecordKind, SELF_HANDLE};
use rand::Rng;

use crate::error::RuntimeError;
use crate::frame::Frame;
use crate::handle::{EntityId, PlayerId, SectorId, WallId};
use crate::host::{
    Access, ActorState, Effect, EffectOutcome, FieldRef, Host, Probe, Target, REG_ACTION,
    REG_ACTION_COUNT, REG_ACTION_FRAME, REG_AI, REG_COUNT, REG_MOVE,
};
use crate::machine::VM;

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The current run reached a terminal opcode or the frame stopped.
    Done,
}

/// Where the right-hand side of a variable operation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rhs {
    Literal,
    Var,
}

impl<'a> VM<'a> {
    /// Execute the instruction at the frame's cursor.
    pub fn step<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        frame: &mut Frame,
    ) -> Result<Flow, RuntimeError> {
        if !frame.is_running() {
            return Ok(Flow::Done);
        }
        let budget = self.config.max_steps;
        if budget != 0 && frame.steps >= budget {
            log::error!(
                "step budget of {budget} exhausted at offset {}, deleting entity",
                frame.cursor
            );
            frame.request_delete();
            return Ok(Flow::Done);
        }
        frame.steps += 1;

        let program: &'a Program = self.program;
        let at = frame.cursor;
        if at >= program.code.len() {
            return Err(RuntimeError::CursorOutOfRange {
                at,
                len: program.code.len(),
            });
        }

        let instr = match Instruction::decode(&program.code, at) {
            Ok(instr) => instr,
            Err(DecodeError::UnknownOpcode { word, .. }) => {
                log::error!("unrecognized opcode {word:#x} at offset {at}, deleting entity");
                frame.request_delete();
                return Ok(Flow::Done);
            }
            Err(err) => return Err(err.into()),
        };

        log::trace!("{at:>6}: {}", instr.opcode.mnemonic());
        frame.cursor = instr.next();
        self.execute(host, frame, &instr)
    }

    /// Step until the current run ends.
    pub fn run_block<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        frame: &mut Frame,
    ) -> Result<(), RuntimeError> {
        while self.step(host, frame)? == Flow::Continue {}
        Ok(())
    }

    /// Run a nested invocation starting at `start`.
    fn invoke<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        frame: &mut Frame,
        start: usize,
    ) -> Result<(), RuntimeError> {
        if frame.depth >= self.config.max_call_depth {
            log::error!(
                "call depth limit {} exceeded entering offset {start}, deleting entity",
                self.config.max_call_depth
            );
            frame.request_delete();
            return Ok(());
        }
        frame.depth += 1;
        frame.cursor = start;
        let result = self.run_block(host, frame);
        frame.depth -= 1;
        result
    }

    fn execute<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        frame: &mut Frame,
        instr: &Instruction<'a>,
    ) -> Result<Flow, RuntimeError> {
        let at = instr.at;
        let arg = |i: usize| instr.operand(i);

        match instr.opcode {
            // Control
            Opcode::LeftBrace => {
                let start = frame.cursor;
                self.invoke(host, frame, start)?;
            }
            Opcode::RightBrace | Opcode::EndSwitch => return Ok(Flow::Done),
            Opcode::EndActor | Opcode::EndState | Opcode::EndEvent | Opcode::Break => {
                frame.cursor = at;
                return Ok(Flow::Done);
            }
            Opcode::Else => frame.cursor = self.target(instr, arg(0))?,
            Opcode::State => {
                let start = self.target(instr, arg(0))?;
                let resume = frame.cursor;
                self.invoke(host, frame, start)?;
                frame.cursor = resume;
            }
            Opcode::Switch => self.exec_switch(host, frame, instr)?,
            Opcode::NullOp => {}
            Opcode::KillIt => frame.request_delete(),

            // Conditionals on the entity's registers
            Opcode::IfRnd => {
                let roll: i32 = self.rng.gen_range(0..=255);
                self.branch(frame, instr, roll >= 255i32.saturating_sub(arg(0)))?;
            }
            Opcode::IfCount => {
                let state = snapshot(host, frame);
                self.branch(frame, instr, state.regs[REG_COUNT] >= arg(0))?;
            }
            Opcode::IfActionCount => {
                let state = snapshot(host, frame);
                self.branch(frame, instr, state.regs[REG_ACTION_COUNT] >= arg(0))?;
            }
            Opcode::IfAction => {
                let state = snapshot(host, frame);
                self.branch(frame, instr, state.regs[REG_ACTION] == arg(0))?;
            }
            Opcode::IfAi => {
                let state = snapshot(host, frame);
                self.branch(frame, instr, state.regs[REG_AI] == arg(0))?;
            }
            Opcode::IfMove => {
                let state = snapshot(host, frame);
                self.branch(frame, instr, state.regs[REG_MOVE] == arg(0))?;
            }
            Opcode::IfPDistL | Opcode::IfPDistG => {
                let condition = if instr.opcode == Opcode::IfPDistL {
                    frame.extra < arg(0)
                } else {
                    frame.extra > arg(0)
                };
                self.branch(frame, instr, condition)?;
                if frame.extra > self.config.max_sleep_distance {
                    if let Some(state) = actor(host, frame) {
                        if state.sleep_timer == 0 {
                            state.sleep_timer = self.config.sleep_time;
                        }
                    }
                }
            }

            // Conditionals on variables
            Opcode::IfVarE => self.exec_if_var(frame, instr, Rhs::Literal, |a, b| a == b)?,
            Opcode::IfVarN => self.exec_if_var(frame, instr, Rhs::Literal, |a, b| a != b)?,
            Opcode::IfVarG => self.exec_if_var(frame, instr, Rhs::Literal, |a, b| a > b)?,
            Opcode::IfVarL => self.exec_if_var(frame, instr, Rhs::Literal, |a, b| a < b)?,
            Opcode::IfVarAnd => self.exec_if_var(frame, instr, Rhs::Literal, |a, b| a & b != 0)?,
            Opcode::IfVarVarE => self.exec_if_var(frame, instr, Rhs::Var, |a, b| a == b)?,
            Opcode::IfVarVarN => self.exec_if_var(frame, instr, Rhs::Var, |a, b| a != b)?,
            Opcode::IfVarVarG => self.exec_if_var(frame, instr, Rhs::Var, |a, b| a > b)?,
            Opcode::IfVarVarL => self.exec_if_var(frame, instr, Rhs::Var, |a, b| a < b)?,
            Opcode::IfVarVarAnd => self.exec_if_var(frame, instr, Rhs::Var, |a, b| a & b != 0)?,

            // Conditionals answered by the host
            Opcode::IfCanSee => self.exec_probe(host, frame, instr, Probe::CanSee)?,
            Opcode::IfCanSeeTarget => {
                let seen = host.probe(&frame.context(), Probe::CanSeeTarget);
                self.branch(frame, instr, seen)?;
                if seen {
                    if let Some(state) = actor(host, frame) {
                        state.sleep_timer = self.config.sleep_time;
                    }
                }
            }
            Opcode::IfCanShootTarget => {
                self.exec_probe(host, frame, instr, Probe::CanShootTarget)?
            }
            Opcode::IfHitWeapon => self.exec_probe(host, frame, instr, Probe::HitWeapon)?,
            Opcode::IfSquished => self.exec_probe(host, frame, instr, Probe::Squished)?,
            Opcode::IfDead => self.exec_probe(host, frame, instr, Probe::Dead)?,
            Opcode::IfProbe => self.exec_probe(host, frame, instr, Probe::Custom(arg(0), arg(1)))?,

            // Actor state
            Opcode::Ai => {
                let ai = arg(0);
                let (action, movement, flags) = if ai == 0 {
                    (0, 0, 0)
                } else {
                    let record = self.record(at, ai, RecordKind::Ai)?;
                    (record[0], record[1], record[2])
                };
                if let Some(state) = actor(host, frame) {
                    state.regs[REG_AI] = ai;
                    state.regs[REG_ACTION] = action;
                    state.regs[REG_MOVE] = movement;
                    state.move_flags = flags;
                    state.regs[REG_COUNT] = 0;
                    state.regs[REG_ACTION_COUNT] = 0;
                    state.regs[REG_ACTION_FRAME] = 0;
                }
            }
            Opcode::Action => {
                if let Some(state) = actor(host, frame) {
                    state.regs[REG_ACTION_COUNT] = 0;
                    state.regs[REG_ACTION_FRAME] = 0;
                    state.regs[REG_ACTION] = arg(0);
                }
            }
            Opcode::Move => {
                if let Some(state) = actor(host, frame) {
                    state.regs[REG_COUNT] = 0;
                    state.regs[REG_MOVE] = arg(0);
                    state.move_flags = arg(1);
                }
            }
            Opcode::Count => {
                if let Some(state) = actor(host, frame) {
                    state.regs[REG_COUNT] = arg(0);
                }
            }
            Opcode::ResetCount => {
                if let Some(state) = actor(host, frame) {
                    state.regs[REG_COUNT] = 0;
                }
            }
            Opcode::ResetActionCount => {
                if let Some(state) = actor(host, frame) {
                    state.regs[REG_ACTION_COUNT] = 0;
                }
            }
            Opcode::SleepTime => {
                if let Some(state) = actor(host, frame) {
                    state.sleep_timer = arg(0);
                }
            }

            // Variables
            Opcode::SetVar => self.exec_arith(frame, instr, Rhs::Literal, |_, b| Ok(b))?,
            Opcode::SetVarVar => self.exec_arith(frame, instr, Rhs::Var, |_, b| Ok(b))?,
            Opcode::AddVar => {
                self.exec_arith(frame, instr, Rhs::Literal, |a, b| Ok(a.wrapping_add(b)))?
            }
            Opcode::AddVarVar => {
                self.exec_arith(frame, instr, Rhs::Var, |a, b| Ok(a.wrapping_add(b)))?
            }
            Opcode::SubVar => {
                self.exec_arith(frame, instr, Rhs::Literal, |a, b| Ok(a.wrapping_sub(b)))?
            }
            Opcode::SubVarVar => {
                self.exec_arith(frame, instr, Rhs::Var, |a, b| Ok(a.wrapping_sub(b)))?
            }
            Opcode::MulVar => {
                self.exec_arith(frame, instr, Rhs::Literal, |a, b| Ok(a.wrapping_mul(b)))?
            }
            Opcode::MulVarVar => {
                self.exec_arith(frame, instr, Rhs::Var, |a, b| Ok(a.wrapping_mul(b)))?
            }
            Opcode::DivVar => self.exec_arith(frame, instr, Rhs::Literal, |a, b| divide(a, b, at))?,
            Opcode::DivVarVar => self.exec_arith(frame, instr, Rhs::Var, |a, b| divide(a, b, at))?,
            Opcode::ModVar => self.exec_arith(frame, instr, Rhs::Literal, |a, b| modulo(a, b, at))?,
            Opcode::ModVarVar => self.exec_arith(frame, instr, Rhs::Var, |a, b| modulo(a, b, at))?,
            Opcode::AndVar => self.exec_arith(frame, instr, Rhs::Literal, |a, b| Ok(a & b))?,
            Opcode::AndVarVar => self.exec_arith(frame, instr, Rhs::Var, |a, b| Ok(a & b))?,
            Opcode::OrVar => self.exec_arith(frame, instr, Rhs::Literal, |a, b| Ok(a | b))?,
            Opcode::OrVarVar => self.exec_arith(frame, instr, Rhs::Var, |a, b| Ok(a | b))?,
            Opcode::XorVar => self.exec_arith(frame, instr, Rhs::Literal, |a, b| Ok(a ^ b))?,
            Opcode::XorVarVar => self.exec_arith(frame, instr, Rhs::Var, |a, b| Ok(a ^ b))?,
            Opcode::RandVar | Opcode::RandVarVar => {
                let scale = if instr.opcode == Opcode::RandVar {
                    arg(1)
                } else {
                    self.var(frame, arg(1))
                };
                let roll: i64 = self.rng.gen_range(0..32768);
                self.set_var(frame, arg(0), ((roll * i64::from(scale)) >> 15) as i32);
            }
            Opcode::DisplayRand => {
                let roll = self.display_rng.gen_range(0..32768);
                self.set_var(frame, arg(0), roll);
            }

            // Cross-entity variables
            Opcode::GetActorVar => {
                if let Some(other) = self.resolve_entity(host, frame, arg(0)) {
                    let value = self.vars.get(arg(1), Some(other), frame.player);
                    self.set_var(frame, arg(2), value);
                }
            }
            Opcode::SetActorVar => {
                if let Some(other) = self.resolve_entity(host, frame, arg(0)) {
                    let value = self.var(frame, arg(2));
                    self.vars.set(arg(1), Some(other), frame.player, value);
                }
            }

            // Field accessors
            Opcode::GetActor => self.exec_get_field(host, frame, instr, Target::Actor),
            Opcode::SetActor => self.exec_set_field(host, frame, instr, Target::Actor),
            Opcode::GetPlayer => self.exec_get_field(host, frame, instr, Target::Player),
            Opcode::SetPlayer => self.exec_set_field(host, frame, instr, Target::Player),
            Opcode::GetSector => self.exec_get_field(host, frame, instr, Target::Sector),
            Opcode::SetSector => self.exec_set_field(host, frame, instr, Target::Sector),
            Opcode::GetWall => self.exec_get_field(host, frame, instr, Target::Wall),
            Opcode::SetWall => self.exec_set_field(host, frame, instr, Target::Wall),
            Opcode::GetUserDef => self.exec_get_field(host, frame, instr, Target::UserDef),
            Opcode::SetUserDef => self.exec_set_field(host, frame, instr, Target::UserDef),

            // Effects
            Opcode::Spawn => {
                apply_effect(host, frame, Effect::Spawn { kind: arg(0) });
            }
            Opcode::ESpawn => {
                if let Some(spawned) = apply_effect(host, frame, Effect::ESpawn { kind: arg(0) }) {
                    self.set_var(frame, arg(1), spawned);
                }
            }
            Opcode::Shoot => {
                apply_effect(host, frame, Effect::Shoot { kind: arg(0) });
            }
            Opcode::Sound => {
                apply_effect(host, frame, Effect::Sound { id: arg(0) });
            }
            Opcode::GlobalSound => {
                apply_effect(host, frame, Effect::GlobalSound { id: arg(0) });
            }
            Opcode::StopSound => {
                apply_effect(host, frame, Effect::StopSound { id: arg(0) });
            }
            Opcode::Damage => {
                if let Some(target) = self.entity_operand(host, frame, arg(0)) {
                    apply_effect(host, frame, Effect::Damage { target, amount: arg(1) });
                }
            }
            Opcode::HitRadius => {
                let effect = Effect::HitRadius {
                    radius: arg(0),
                    damage: [arg(1), arg(2), arg(3), arg(4)],
                };
                apply_effect(host, frame, effect);
            }
            Opcode::MoveEntity => {
                if let Some(target) = self.entity_operand(host, frame, arg(0)) {
                    let effect = Effect::MoveEntity {
                        target,
                        dx: self.var(frame, arg(1)),
                        dy: self.var(frame, arg(2)),
                        dz: self.var(frame, arg(3)),
                    };
                    apply_effect(host, frame, effect);
                }
            }
            Opcode::ChangeStat => {
                apply_effect(host, frame, Effect::ChangeStat { status: arg(0) });
            }
            Opcode::GiveItem => {
                apply_effect(host, frame, Effect::GiveItem { item: arg(0), amount: arg(1) });
            }
            Opcode::Debug => log::info!("debug {} at offset {at}", arg(0)),
        }

        Ok(Flow::Continue)
    }

    /// Branch-or-fall-through. On true the cursor already sits past the
    /// false-target slot. On false it moves to the target, stepping over an
    /// `else` marker found there.
    fn branch(
        &self,
        frame: &mut Frame,
        instr: &Instruction<'a>,
        condition: bool,
    ) -> Result<(), RuntimeError> {
        if condition {
            return Ok(());
        }
        let raw = instr.false_target().unwrap_or_default();
        let target = self.target(instr, raw)?;
        frame.cursor = if else_marker_at(&self.program.code, raw) {
            target + 2
        } else {
            target
        };
        Ok(())
    }

    fn exec_switch<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        frame: &mut Frame,
        instr: &Instruction<'a>,
    ) -> Result<(), RuntimeError> {
        let value = self.var(frame, instr.operand(0));
        let end = self.target(instr, instr.operand(1))?;
        let default = instr.operand(3);

        let chosen = instr
            .switch_cases()
            .find(|&(literal, _)| literal == value)
            .map(|(_, target)| target)
            .or((default != 0).then_some(default));

        if let Some(raw) = chosen {
            let start = self.target(instr, raw)?;
            self.invoke(host, frame, start)?;
        }
        frame.cursor = end;
        Ok(())
    }

    fn exec_if_var(
        &self,
        frame: &mut Frame,
        instr: &Instruction<'a>,
        rhs: Rhs,
        compare: impl FnOnce(i32, i32) -> bool,
    ) -> Result<(), RuntimeError> {
        let lhs = self.var(frame, instr.operand(0));
        let rhs = self.rhs(frame, instr, rhs);
        self.branch(frame, instr, compare(lhs, rhs))
    }

    fn exec_probe<H: Host + ?Sized>(
        &self,
        host: &mut H,
        frame: &mut Frame,
        instr: &Instruction<'a>,
        probe: Probe,
    ) -> Result<(), RuntimeError> {
        let condition = host.probe(&frame.context(), probe);
        self.branch(frame, instr, condition)
    }

    fn exec_arith(
        &mut self,
        frame: &Frame,
        instr: &Instruction<'a>,
        rhs: Rhs,
        op: impl FnOnce(i32, i32) -> Result<i32, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let id = instr.operand(0);
        let lhs = self.var(frame, id);
        let rhs = self.rhs(frame, instr, rhs);
        let value = op(lhs, rhs)?;
        self.set_var(frame, id, value);
        Ok(())
    }

    fn exec_get_field<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        frame: &Frame,
        instr: &Instruction<'a>,
        target: Target,
    ) {
        let field = instr.operand(1);
        let param = instr.operand(2);
        let value = match host.field_access(target, field) {
            Access::Unknown => 0,
            Access::ReadOnly | Access::ReadWrite => self
                .field_ref(host, frame, target, instr.operand(0))
                .and_then(|at| host.get_field(at, field, param))
                .unwrap_or(0),
        };
        self.set_var(frame, instr.operand(3), value);
    }

    fn exec_set_field<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        frame: &Frame,
        instr: &Instruction<'a>,
        target: Target,
    ) {
        let field = instr.operand(1);
        if host.field_access(target, field) != Access::ReadWrite {
            return;
        }
        let value = self.var(frame, instr.operand(3));
        if let Some(at) = self.field_ref(host, frame, target, instr.operand(0)) {
            host.set_field(at, field, instr.operand(2), value);
        }
    }

    /// Resolve a handle operand (`-1` or a variable id) for a field table.
    fn field_ref<H: Host + ?Sized>(
        &self,
        host: &H,
        frame: &Frame,
        target: Target,
        handle: i32,
    ) -> Option<FieldRef> {
        let is_self = handle == SELF_HANDLE;
        match target {
            Target::UserDef => Some(FieldRef::UserDef),
            Target::Actor => self.entity_operand(host, frame, handle).map(FieldRef::Actor),
            Target::Player => {
                let player = if is_self {
                    frame.player
                } else {
                    PlayerId::from_script(self.var(frame, handle))
                };
                player.map(FieldRef::Player)
            }
            Target::Sector => {
                let sector = if is_self {
                    frame.entity.and_then(|e| host.sector_of(e))
                } else {
                    Some(SectorId(self.var(frame, handle))).filter(|s| s.0 >= 0)
                };
                sector.map(FieldRef::Sector)
            }
            Target::Wall => {
                // Walls have no "self"; the frame is never bound to one.
                let wall = Some(WallId(self.var(frame, handle))).filter(|w| !is_self && w.0 >= 0);
                wall.map(FieldRef::Wall)
            }
        }
    }

    /// An entity named by a handle operand: `-1` for the frame's own
    /// entity, otherwise a variable holding an entity handle.
    fn entity_operand<H: Host + ?Sized>(
        &self,
        host: &H,
        frame: &Frame,
        handle: i32,
    ) -> Option<EntityId> {
        if handle == SELF_HANDLE {
            frame.entity
        } else {
            self.resolve_entity(host, frame, handle)
        }
    }

    /// The live entity whose handle is stored in variable `id`.
    fn resolve_entity<H: Host + ?Sized>(&self, host: &H, frame: &Frame, id: i32) -> Option<EntityId> {
        let handle = self.var(frame, id);
        if handle < 0 {
            return None;
        }
        host.entity_at(handle)
    }

    fn rhs(&self, frame: &Frame, instr: &Instruction<'a>, rhs: Rhs) -> i32 {
        match rhs {
            Rhs::Literal => instr.operand(1),
            Rhs::Var => self.var(frame, instr.operand(1)),
        }
    }

    fn var(&self, frame: &Frame, id: i32) -> i32 {
        self.vars.get(id, frame.entity, frame.player)
    }

    fn set_var(&mut self, frame: &Frame, id: i32, value: i32) {
        self.vars.set(id, frame.entity, frame.player, value);
    }

    /// Validate a jump target.
    fn target(&self, instr: &Instruction<'a>, target: i32) -> Result<usize, RuntimeError> {
        usize::try_from(target)
            .ok()
            .filter(|&t| t < self.program.code.len())
            .ok_or(RuntimeError::BadTarget {
                at: instr.at,
                target,
            })
    }
}

fn actor<'h, H: Host + ?Sized>(host: &'h mut H, frame: &Frame) -> Option<&'h mut ActorState> {
    match frame.entity {
        Some(entity) => host.actor_state(entity),
        None => None,
    }
}

/// Copy of the frame entity's registers, zeroed when there is none.
fn snapshot<H: Host + ?Sized>(host: &mut H, frame: &Frame) -> ActorState {
    actor(host, frame).map(|s| *s).unwrap_or_default()
}

fn apply_effect<H: Host + ?Sized>(host: &mut H, frame: &mut Frame, effect: Effect) -> Option<i32> {
    match host.effect(&frame.context(), effect) {
        EffectOutcome::Value(value) => Some(value),
        EffectOutcome::Removed => {
            log::debug!("entity removed by {effect:?}, ending frame");
            frame.request_quiet_delete();
            None
        }
    }
}

fn divide(a: i32, b: i32, at: usize) -> Result<i32, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero { at });
    }
    Ok(a.wrapping_div(b))
}

fn modulo(a: i32, b: i32, at: usize) -> Result<i32, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::ModuloByZero { at });
    }
    Ok(a.wrapping_rem(b))
}
