//! The ways a host starts a frame.
//!
//! Every entry point builds a fresh [`Frame`], drives it to completion,
//! consumes its [`FrameOutcome`] exactly once and only then applies any
//! deletion the script asked for.

use actorvm_common::RecordKind;

use crate::error::RuntimeError;
use crate::frame::{Frame, FrameOutcome};
use crate::handle::{EntityId, PlayerId};
use crate::host::{Host, Status, REG_ACTION, REG_ACTION_COUNT, REG_ACTION_FRAME};
use crate::machine::VM;

/// Which entry point a settle follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settle {
    Tick,
    Load,
}

impl<'a> VM<'a> {
    /// Run an entity's per-tick script.
    ///
    /// Returns `Ok(None)` when no frame was started: the entity is dead or
    /// its kind has no tick script.
    pub fn run_tick<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        entity: EntityId,
    ) -> Result<Option<FrameOutcome>, RuntimeError> {
        if !host.is_alive(entity) {
            return Ok(None);
        }
        let Some(start) = self.script_for(host, entity, |s| s.tick) else {
            return Ok(None);
        };
        if host.sector_of(entity).is_none() {
            log::debug!("entity {entity} is outside the world, deleting");
            self.apply_outcome(host, entity, FrameOutcome::Delete);
            return Ok(Some(FrameOutcome::Delete));
        }
        let (player, extra) = match host.nearest_player(entity) {
            Some((player, distance)) => (Some(player), distance),
            None => (None, 0),
        };

        self.advance_animation(host, entity)?;

        let mut frame = Frame::new(Some(entity), player, extra, start);
        self.run_block(host, &mut frame)?;
        let outcome = frame.finish();

        match outcome {
            FrameOutcome::Normal => self.settle(host, entity, Settle::Tick),
            _ => self.apply_outcome(host, entity, outcome),
        }
        Ok(Some(outcome))
    }

    /// Run an entity's load script once it has been materialized.
    pub fn run_load<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        entity: EntityId,
        player: Option<PlayerId>,
        extra: i32,
    ) -> Result<Option<FrameOutcome>, RuntimeError> {
        if !host.is_alive(entity) {
            return Ok(None);
        }
        let Some(start) = self.script_for(host, entity, |s| s.load) else {
            return Ok(None);
        };
        if host.sector_of(entity).is_none() {
            log::debug!("entity {entity} loaded outside the world, deleting");
            self.apply_outcome(host, entity, FrameOutcome::Delete);
            return Ok(Some(FrameOutcome::Delete));
        }

        let mut frame = Frame::new(Some(entity), player, extra, start);
        self.run_block(host, &mut frame)?;
        let outcome = frame.finish();

        match outcome {
            FrameOutcome::Normal => self.settle(host, entity, Settle::Load),
            _ => self.apply_outcome(host, entity, outcome),
        }
        Ok(Some(outcome))
    }

    /// Run the handler mapped to `event`, if any.
    ///
    /// Events may fire without an entity; deletion requests then have
    /// nothing to apply to.
    pub fn dispatch_event<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        event: i32,
        entity: Option<EntityId>,
        player: Option<PlayerId>,
        extra: i32,
    ) -> Result<Option<FrameOutcome>, RuntimeError> {
        if event < 0 {
            log::warn!("invalid event id {event}");
            return Ok(None);
        }
        let Some(start) = self.program.event(event) else {
            return Ok(None);
        };
        let entity = entity.filter(|&e| host.is_alive(e));

        let mut frame = Frame::new(entity, player, extra, start);
        self.run_block(host, &mut frame)?;
        let outcome = frame.finish();

        if let Some(entity) = entity {
            self.apply_outcome(host, entity, outcome);
        }
        Ok(Some(outcome))
    }

    /// Tick every entity once, in the host's traversal order.
    ///
    /// Entities deleted earlier in the same pass are skipped. Each frame,
    /// deletion included, completes before the next one starts.
    pub fn run_all<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> Result<Vec<(EntityId, FrameOutcome)>, RuntimeError> {
        let mut report = Vec::new();
        for entity in host.tick_order() {
            if !host.is_alive(entity) {
                continue;
            }
            if let Some(outcome) = self.run_tick(host, entity)? {
                report.push((entity, outcome));
            }
        }
        Ok(report)
    }

    fn script_for<H: Host + ?Sized>(
        &self,
        host: &H,
        entity: EntityId,
        pick: impl FnOnce(&actorvm_common::ActorScripts) -> Option<usize>,
    ) -> Option<usize> {
        let kind = host.actor_kind(entity)?;
        self.program.actor(kind).and_then(pick)
    }

    /// Step the animation of the entity's current action record.
    fn advance_animation<H: Host + ?Sized>(
        &self,
        host: &mut H,
        entity: EntityId,
    ) -> Result<(), RuntimeError> {
        let tics = self.config.tics_per_frame;
        let Some(state) = host.actor_state(entity) else {
            return Ok(());
        };
        let action = state.regs[REG_ACTION];
        if action == 0 {
            return Ok(());
        }
        let record = self
            .record(0, action, RecordKind::Action)
            .map_err(|_| RuntimeError::BadActionRecord { offset: action })?;
        let (frames, increment, delay) = (record[1], record[3], record[4]);

        state.anim_clock = state.anim_clock.wrapping_add(tics);
        if state.anim_clock > delay {
            state.regs[REG_ACTION_COUNT] = state.regs[REG_ACTION_COUNT].wrapping_add(1);
            state.anim_clock = 0;
            state.regs[REG_ACTION_FRAME] = state.regs[REG_ACTION_FRAME].wrapping_add(increment);
        }
        if state.regs[REG_ACTION_FRAME].unsigned_abs() >= frames.wrapping_mul(increment).unsigned_abs() {
            state.regs[REG_ACTION_FRAME] = 0;
        }
        Ok(())
    }

    /// Post-run processing for a frame that ended normally: movement, then
    /// the sleep countdown. Standable entities are only checked after ticks.
    fn settle<H: Host + ?Sized>(&mut self, host: &mut H, entity: EntityId, after: Settle) {
        host.advance_motion(entity);
        match host.status(entity) {
            Some(Status::Active) if host.may_sleep(entity) => {
                let expired = match host.actor_state(entity) {
                    Some(state) if state.sleep_timer > 1 => {
                        state.sleep_timer -= 1;
                        false
                    }
                    Some(state) => state.sleep_timer == 1,
                    None => false,
                };
                if expired {
                    log::debug!("entity {entity} going dormant");
                    host.set_status(entity, Status::Dormant);
                }
            }
            Some(Status::Standable) if after == Settle::Tick => host.check_standable_sleep(entity),
            _ => {}
        }
    }

    /// Apply a deletion outcome once the frame has fully unwound.
    fn apply_outcome<H: Host + ?Sized>(&mut self, host: &mut H, entity: EntityId, outcome: FrameOutcome) {
        match outcome {
            FrameOutcome::Normal => {}
            FrameOutcome::Delete => {
                log::debug!("deleting entity {entity}");
                host.release_player_refs(entity);
                host.delete_entity(entity);
                self.vars.forget_entity(entity);
            }
            FrameOutcome::DeleteQuiet => self.vars.forget_entity(entity),
        }
    }
}
