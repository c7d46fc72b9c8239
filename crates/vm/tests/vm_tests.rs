//! Integration tests for the actor VM, driven through the sandbox host.
//!
//! Programs are written as raw word streams so every offset in a test is
//! visible in the test itself.

use actorvm_common::{ActorScripts, Opcode, Program, Scope, VarDecl};
use actorvm_vm::host::{REG_ACTION, REG_ACTION_COUNT, REG_ACTION_FRAME, REG_AI, REG_COUNT, REG_MOVE};
use actorvm_vm::sandbox::{SandboxWorld, STAT_REMOVED};
use actorvm_vm::{
    Access, Effect, EntityId, Flow, Frame, FrameOutcome, Host, Probe, RuntimeError, SectorId,
    Status, Target, Termination, VmConfig, VM,
};
use proptest::prelude::*;

// ============================================================
// Helper functions
// ============================================================

const KIND: i32 = 1400;

fn op(o: Opcode) -> i32 {
    o as i32
}

/// A program whose actor kind runs `code` from `tick` and `load`.
fn program(code: Vec<i32>, vars: Vec<VarDecl>, tick: Option<usize>, load: Option<usize>) -> Program {
    let mut program = Program::new(code);
    program.vars = vars;
    program.actors.insert(KIND, ActorScripts { tick, load });
    program
}

/// Program with a tick script at offset 0.
fn tick_program(code: Vec<i32>, vars: Vec<VarDecl>) -> Program {
    program(code, vars, Some(0), None)
}

/// A world with four sectors, four walls and one player.
fn world() -> SandboxWorld {
    let mut world = SandboxWorld::new(4, 4);
    world.add_player();
    world
}

fn spawn(world: &mut SandboxWorld) -> EntityId {
    world.spawn(KIND, Some(SectorId(0)))
}

fn global(name: &str) -> VarDecl {
    VarDecl::new(name, Scope::Global, 0)
}

fn actor_var(name: &str, default: i32) -> VarDecl {
    VarDecl::new(name, Scope::Actor, default)
}

fn set_count(world: &mut SandboxWorld, entity: EntityId, count: i32) {
    world.entity_mut(entity).unwrap().state.regs[REG_COUNT] = count;
}

// ============================================================
// Variable registry
// ============================================================

#[test]
fn read_only_variable_keeps_its_value() {
    let code = vec![
        op(Opcode::SetVar), 0, 5,
        op(Opcode::AddVar), 0, 3,
        op(Opcode::SetVar), 0, -9,
        op(Opcode::EndActor),
    ];
    let program = tick_program(code, vec![VarDecl::new("lock", Scope::Global, 12).read_only()]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(0, None, None), 12);
}

#[test]
fn entity_variables_are_independent() {
    let code = vec![op(Opcode::AddVar), 0, 7, op(Opcode::EndActor)];
    let program = tick_program(code, vec![actor_var("hp", 100)]);
    let mut world = world();
    let a = spawn(&mut world);
    let b = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, a).unwrap();
    vm.run_tick(&mut world, a).unwrap();
    assert_eq!(vm.vars().get(0, Some(a), None), 114);
    assert_eq!(vm.vars().get(0, Some(b), None), 100);
}

#[test]
fn deleted_entity_slot_reuse_reads_default() {
    let code = vec![op(Opcode::SetVar), 0, 1, op(Opcode::KillIt), op(Opcode::EndActor)];
    let program = tick_program(code, vec![actor_var("mark", 50)]);
    let mut world = world();
    let a = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(vm.run_tick(&mut world, a).unwrap(), Some(FrameOutcome::Delete));
    let b = spawn(&mut world);
    assert_eq!(a.index, b.index);
    assert_eq!(vm.vars().get(0, Some(b), None), 50);
}

#[test]
fn deleted_entity_reads_zero_when_flagged() {
    let code = vec![op(Opcode::SetVar), 0, 4, op(Opcode::KillIt), op(Opcode::EndActor)];
    let vars = vec![
        VarDecl::new("z", Scope::Actor, 9).zero_when_invalid(),
        actor_var("plain", 9),
    ];
    let program = tick_program(code, vars);
    let mut world = world();
    let killed = spawn(&mut world);
    let removed = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(vm.run_tick(&mut world, killed).unwrap(), Some(FrameOutcome::Delete));
    assert_eq!(vm.vars().get(0, Some(killed), None), 0);
    assert_eq!(vm.vars().get(1, Some(killed), None), 9);

    // Deletions made by the host itself are reported to the registry.
    world.delete_entity(removed);
    vm.vars_mut().forget_entity(removed);
    assert!(world.entity(removed).is_none());
    assert_eq!(vm.vars().get(0, Some(removed), None), 0);

    let reused = spawn(&mut world);
    assert_eq!(reused.index, removed.index);
    assert_eq!(vm.vars().get(0, Some(reused), None), 9);
}

#[test]
fn cross_entity_variable_access() {
    // other = handle of b, set in the test
    // 0: setactorvar other hp src
    // 4: getactorvar other hp dst
    // 8: enda
    let code = vec![
        op(Opcode::SetActorVar), 0, 1, 2,
        op(Opcode::GetActorVar), 0, 1, 3,
        op(Opcode::EndActor),
    ];
    let vars = vec![
        global("other"),
        actor_var("hp", 100),
        VarDecl::new("src", Scope::Global, 33),
        actor_var("dst", 0),
    ];
    let program = tick_program(code, vars);
    let mut world = world();
    let a = spawn(&mut world);
    let b = spawn(&mut world);
    let mut vm = VM::new(&program);
    vm.vars_mut().set(0, None, None, b.script_handle());

    vm.run_tick(&mut world, a).unwrap();
    assert_eq!(vm.vars().get(1, Some(b), None), 33);
    assert_eq!(vm.vars().get(1, Some(a), None), 100);
    assert_eq!(vm.vars().get(3, Some(a), None), 33);
}

#[test]
fn negative_cross_entity_handle_is_ignored() {
    let code = vec![op(Opcode::GetActorVar), 0, 1, 2, op(Opcode::EndActor)];
    let vars = vec![
        VarDecl::new("other", Scope::Global, -1),
        actor_var("hp", 100),
        VarDecl::new("dst", Scope::Global, 8),
    ];
    let program = tick_program(code, vars);
    let mut world = world();
    let a = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, a).unwrap();
    assert_eq!(vm.vars().get(2, None, None), 8);
}

// ============================================================
// Conditionals
// ============================================================

/// 0: ifcount 5 @7
/// 3: setvar X 1
/// 6: enda
/// 7: setvar X 2
/// 10: enda
fn count_check_program() -> Program {
    let code = vec![
        op(Opcode::IfCount), 5, 7,
        op(Opcode::SetVar), 0, 1,
        op(Opcode::EndActor),
        op(Opcode::SetVar), 0, 2,
        op(Opcode::EndActor),
    ];
    tick_program(code, vec![global("X")])
}

#[test]
fn count_check_end_to_end() {
    let program = count_check_program();

    let mut world = world();
    let e = spawn(&mut world);
    set_count(&mut world, e, 3);
    let mut vm = VM::new(&program);
    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(0, None, None), 2);

    let mut world = self::world();
    let e = spawn(&mut world);
    set_count(&mut world, e, 7);
    let mut vm = VM::new(&program);
    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(0, None, None), 1);
}

#[test]
fn conditional_cursor_positions() {
    let program = count_check_program();
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    set_count(&mut world, e, 7);
    let mut frame = Frame::new(Some(e), None, 0, 0);
    assert_eq!(vm.step(&mut world, &mut frame).unwrap(), Flow::Continue);
    assert_eq!(frame.cursor, 3);

    set_count(&mut world, e, 3);
    let mut frame = Frame::new(Some(e), None, 0, 0);
    vm.step(&mut world, &mut frame).unwrap();
    assert_eq!(frame.cursor, 7);
}

fn if_else_program() -> Program {
    // 0: ifvare X 1 @7
    // 4: setvar Y 10
    // 7: else @12
    // 9: setvar Y 20
    // 12: enda
    let code = vec![
        op(Opcode::IfVarE), 0, 1, 7,
        op(Opcode::SetVar), 1, 10,
        op(Opcode::Else), 12,
        op(Opcode::SetVar), 1, 20,
        op(Opcode::EndActor),
    ];
    tick_program(code, vec![global("X"), global("Y")])
}

#[test]
fn false_branch_skips_else_marker() {
    let program = if_else_program();
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    let mut frame = Frame::new(Some(e), None, 0, 0);
    vm.step(&mut world, &mut frame).unwrap();
    assert_eq!(frame.cursor, 9);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(1, None, None), 20);
}

#[test]
fn true_branch_jumps_over_else_body() {
    let program = if_else_program();
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);
    vm.vars_mut().set(0, None, None, 1);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(1, None, None), 10);
}

#[test]
fn variable_comparisons() {
    // Each conditional guards an orvar of a distinct bit into R.
    // 0: ifvarg A 4 @8        A = 5 -> true
    // 4: orvar R 1
    // 7: nullop
    // 8: ifvarl A 4 @16       false
    // 12: orvar R 2
    // 15: nullop
    // 16: ifvarvarn A B @24   A=5, B=5 -> false
    // 20: orvar R 4
    // 23: nullop
    // 24: ifvarand A 4 @32    5 & 4 -> true
    // 28: orvar R 8
    // 31: nullop
    // 32: enda
    let code = vec![
        op(Opcode::IfVarG), 0, 4, 8,
        op(Opcode::OrVar), 2, 1,
        op(Opcode::NullOp),
        op(Opcode::IfVarL), 0, 4, 16,
        op(Opcode::OrVar), 2, 2,
        op(Opcode::NullOp),
        op(Opcode::IfVarVarN), 0, 1, 24,
        op(Opcode::OrVar), 2, 4,
        op(Opcode::NullOp),
        op(Opcode::IfVarAnd), 0, 4, 32,
        op(Opcode::OrVar), 2, 8,
        op(Opcode::NullOp),
        op(Opcode::EndActor),
    ];
    let vars = vec![
        VarDecl::new("A", Scope::Global, 5),
        VarDecl::new("B", Scope::Global, 5),
        global("R"),
    ];
    let program = tick_program(code, vars);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(2, None, None), 1 | 8);
}

#[test]
fn probes_are_answered_by_the_host() {
    // 0: ifcansee @5
    // 2: setvar S 1
    // 5: ifprobe 3 4 @12
    // 9: setvar P 1
    // 12: enda
    let code = vec![
        op(Opcode::IfCanSee), 5,
        op(Opcode::SetVar), 0, 1,
        op(Opcode::IfProbe), 3, 4, 12,
        op(Opcode::SetVar), 1, 1,
        op(Opcode::EndActor),
    ];
    let program = tick_program(code, vec![global("S"), global("P")]);
    let mut world = world();
    world.set_probe(Probe::Custom(3, 4), true);
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(0, None, None), 0);
    assert_eq!(vm.vars().get(1, None, None), 1);
}

#[test]
fn ifrnd_full_chance_always_passes() {
    let code = vec![
        op(Opcode::IfRnd), 255, 6,
        op(Opcode::AddVar), 0, 1,
        op(Opcode::EndActor),
    ];
    let program = tick_program(code, vec![global("hits")]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    for _ in 0..20 {
        vm.run_tick(&mut world, e).unwrap();
    }
    assert_eq!(vm.vars().get(0, None, None), 20);
}

// ============================================================
// Switch
// ============================================================

/// 0: switch sel @27 3 default (3 @11) (5 @15) (3 @19)
/// 11: setvar out 100, endswitch
/// 15: setvar out 200, endswitch
/// 19: setvar out 300, endswitch
/// 23: setvar out 900, endswitch
/// 27: enda
fn switch_program(default: i32) -> Program {
    let code = vec![
        op(Opcode::Switch), 0, 27, 3, default, 3, 11, 5, 15, 3, 19,
        op(Opcode::SetVar), 1, 100, op(Opcode::EndSwitch),
        op(Opcode::SetVar), 1, 200, op(Opcode::EndSwitch),
        op(Opcode::SetVar), 1, 300, op(Opcode::EndSwitch),
        op(Opcode::SetVar), 1, 900, op(Opcode::EndSwitch),
        op(Opcode::EndActor),
    ];
    tick_program(code, vec![global("sel"), VarDecl::new("out", Scope::Global, -1)])
}

fn run_switch(default: i32, value: i32) -> (i32, usize) {
    let program = switch_program(default);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);
    vm.vars_mut().set(0, None, None, value);

    let mut frame = Frame::new(Some(e), None, 0, 0);
    assert_eq!(vm.step(&mut world, &mut frame).unwrap(), Flow::Continue);
    (vm.vars().get(1, None, None), frame.cursor)
}

#[test]
fn switch_takes_first_match() {
    assert_eq!(run_switch(23, 3), (100, 27));
    assert_eq!(run_switch(23, 5), (200, 27));
}

#[test]
fn switch_falls_back_to_default() {
    assert_eq!(run_switch(23, 9), (900, 27));
}

#[test]
fn switch_without_default_runs_nothing() {
    assert_eq!(run_switch(0, 9), (-1, 27));
}

// ============================================================
// Nested runs
// ============================================================

/// 0: state @6
/// 2: addvar N 1
/// 5: enda
/// 6: addvar N 10
/// 9: state @12
/// 11: ends
/// 12: addvar N 100
/// 15: {
/// 16: break
/// 17: }
/// 18: addvar N 1000
/// 21: ends
fn nested_program() -> Program {
    let code = vec![
        op(Opcode::State), 6,
        op(Opcode::AddVar), 0, 1,
        op(Opcode::EndActor),
        op(Opcode::AddVar), 0, 10,
        op(Opcode::State), 12,
        op(Opcode::EndState),
        op(Opcode::AddVar), 0, 100,
        op(Opcode::LeftBrace),
        op(Opcode::Break),
        op(Opcode::RightBrace),
        op(Opcode::AddVar), 0, 1000,
        op(Opcode::EndState),
    ];
    tick_program(code, vec![global("N")])
}

#[test]
fn state_call_restores_cursor() {
    let program = nested_program();
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    let mut frame = Frame::new(Some(e), None, 0, 0);
    vm.step(&mut world, &mut frame).unwrap();
    assert_eq!(frame.cursor, 2);
    assert_eq!(frame.depth(), 0);
}

#[test]
fn break_in_block_ends_enclosing_state() {
    let program = nested_program();
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(0, None, None), 111);
}

#[test]
fn closing_brace_ends_only_the_block() {
    // 0: {
    // 1: addvar N 1
    // 4: }
    // 5: addvar N 10
    // 8: enda
    let code = vec![
        op(Opcode::LeftBrace),
        op(Opcode::AddVar), 0, 1,
        op(Opcode::RightBrace),
        op(Opcode::AddVar), 0, 10,
        op(Opcode::EndActor),
    ];
    let program = tick_program(code, vec![global("N")]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(0, None, None), 11);
}

#[test]
fn depth_overflow_deletes_entity() {
    let code = vec![op(Opcode::State), 0, op(Opcode::EndActor)];
    let program = tick_program(code, vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    let config = VmConfig {
        max_call_depth: 8,
        ..VmConfig::default()
    };
    let mut vm = VM::with_config(&program, config);

    assert_eq!(vm.run_tick(&mut world, e).unwrap(), Some(FrameOutcome::Delete));
    assert_eq!(world.deletions, vec![e]);
}

#[test]
fn step_budget_deletes_entity() {
    // 0: addvar N 1
    // 3: else @0      loops forever
    let code = vec![op(Opcode::AddVar), 0, 1, op(Opcode::Else), 0];
    let program = tick_program(code, vec![global("N")]);
    let mut world = world();
    let e = spawn(&mut world);
    let config = VmConfig {
        max_steps: 100,
        ..VmConfig::default()
    };
    let mut vm = VM::with_config(&program, config);

    assert_eq!(vm.run_tick(&mut world, e).unwrap(), Some(FrameOutcome::Delete));
    assert_eq!(vm.vars().get(0, None, None), 50);
    assert_eq!(world.deletions, vec![e]);
}

// ============================================================
// Faults
// ============================================================

#[test]
fn unknown_opcode_deletes_entity() {
    let code = vec![op(Opcode::NullOp), 0x5A, op(Opcode::EndActor)];
    let program = tick_program(code, vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(vm.run_tick(&mut world, e).unwrap(), Some(FrameOutcome::Delete));
    assert!(!world.is_alive(e));
}

#[test]
fn division_by_zero_is_fatal() {
    let code = vec![op(Opcode::DivVar), 0, 0, op(Opcode::EndActor)];
    let program = tick_program(code, vec![global("X")]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(
        vm.run_tick(&mut world, e),
        Err(RuntimeError::DivisionByZero { at: 0 })
    );
    assert!(world.deletions.is_empty());
}

#[test]
fn modulo_by_zero_variable_is_fatal() {
    let code = vec![op(Opcode::NullOp), op(Opcode::ModVarVar), 0, 1, op(Opcode::EndActor)];
    let program = tick_program(code, vec![VarDecl::new("X", Scope::Global, 9), global("Z")]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(
        vm.run_tick(&mut world, e),
        Err(RuntimeError::ModuloByZero { at: 1 })
    );
}

#[test]
fn running_off_the_stream_is_fatal() {
    let code = vec![op(Opcode::NullOp)];
    let program = tick_program(code, vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(
        vm.run_tick(&mut world, e),
        Err(RuntimeError::CursorOutOfRange { at: 1, len: 1 })
    );
}

#[test]
fn arithmetic_wraps() {
    let code = vec![op(Opcode::AddVar), 0, 1, op(Opcode::MulVar), 1, 2, op(Opcode::EndActor)];
    let vars = vec![
        VarDecl::new("a", Scope::Global, i32::MAX),
        VarDecl::new("b", Scope::Global, i32::MIN),
    ];
    let program = tick_program(code, vars);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(vm.vars().get(0, None, None), i32::MIN);
    assert_eq!(vm.vars().get(1, None, None), 0);
}

// ============================================================
// Deferred deletion
// ============================================================

#[test]
fn deletion_waits_for_the_frame_to_unwind() {
    // 0: killit  1: killit  2: setvar X 1  5: enda
    let code = vec![
        op(Opcode::KillIt),
        op(Opcode::KillIt),
        op(Opcode::SetVar), 0, 1,
        op(Opcode::EndActor),
    ];
    let program = tick_program(code, vec![global("X")]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    let mut frame = Frame::new(Some(e), None, 0, 0);
    assert_eq!(vm.step(&mut world, &mut frame).unwrap(), Flow::Continue);
    assert_eq!(frame.termination(), Termination::Deleted);
    assert!(world.is_alive(e));
    assert_eq!(vm.step(&mut world, &mut frame).unwrap(), Flow::Done);
    assert_eq!(frame.finish(), FrameOutcome::Delete);
    assert!(world.is_alive(e));

    assert_eq!(vm.run_tick(&mut world, e).unwrap(), Some(FrameOutcome::Delete));
    assert_eq!(world.deletions, vec![e]);
    assert_eq!(vm.vars().get(0, None, None), 0);
    assert_eq!(world.motions, 0);
}

#[test]
fn deletion_inside_nested_state_unwinds_everything() {
    // 0: state @5  2: setvar X 1  5: killit  6: addvar X 5  9: ends
    let code = vec![
        op(Opcode::State), 5,
        op(Opcode::SetVar), 0, 1,
        op(Opcode::KillIt),
        op(Opcode::AddVar), 0, 5,
        op(Opcode::EndState),
    ];
    let program = tick_program(code, vec![global("X")]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(vm.run_tick(&mut world, e).unwrap(), Some(FrameOutcome::Delete));
    assert_eq!(vm.vars().get(0, None, None), 0);
    assert_eq!(world.deletions.len(), 1);
}

#[test]
fn deletion_clears_squish_reference() {
    let code = vec![op(Opcode::KillIt), op(Opcode::EndActor)];
    let program = tick_program(code, vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    world.players[0].squished_by = Some(e);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.players[0].squished_by, None);
}

#[test]
fn removal_by_host_ends_quietly() {
    // 0: changestat -1  2: setvar X 1  5: enda
    let code = vec![
        op(Opcode::ChangeStat), STAT_REMOVED,
        op(Opcode::SetVar), 0, 1,
        op(Opcode::EndActor),
    ];
    let program = tick_program(code, vec![global("X")]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(vm.run_tick(&mut world, e).unwrap(), Some(FrameOutcome::DeleteQuiet));
    assert!(!world.is_alive(e));
    assert!(world.deletions.is_empty());
    assert_eq!(vm.vars().get(0, None, None), 0);
}

// ============================================================
// Entry points
// ============================================================

#[test]
fn load_with_invalid_location_deletes_without_running() {
    // load: setvar X 1, getactor self 10 0 Y, sound 3, enda
    let code = vec![
        op(Opcode::SetVar), 0, 1,
        op(Opcode::GetActor), -1, 10, 0, 1,
        op(Opcode::Sound), 3,
        op(Opcode::EndActor),
    ];
    let program = program(code, vec![global("X"), global("Y")], None, Some(0));
    let mut world = world();
    world.declare_field(Target::Actor, 10, Access::ReadWrite);
    let e = world.spawn(KIND, Some(SectorId(-1)));
    let mut vm = VM::new(&program);

    let outcome = vm.run_load(&mut world, e, None, 0).unwrap();
    assert_eq!(outcome, Some(FrameOutcome::Delete));
    assert_eq!(world.deletions, vec![e]);
    assert_eq!(world.field_calls(), 0);
    assert!(world.effects.is_empty());
    assert_eq!(vm.vars().get(0, None, None), 0);
}

#[test]
fn tick_with_invalid_location_deletes_without_running() {
    let code = vec![op(Opcode::SetVar), 0, 1, op(Opcode::EndActor)];
    let program = tick_program(code, vec![global("X")]);
    let mut world = world();
    let e = world.spawn(KIND, None);
    let mut vm = VM::new(&program);

    assert_eq!(vm.run_tick(&mut world, e).unwrap(), Some(FrameOutcome::Delete));
    assert_eq!(vm.vars().get(0, None, None), 0);
    assert_eq!(world.deletions, vec![e]);
}

#[test]
fn missing_scripts_start_no_frame() {
    let program = tick_program(vec![op(Opcode::EndActor)], vec![]);
    let mut world = world();
    let stranger = world.spawn(KIND + 1, Some(SectorId(0)));
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(vm.run_tick(&mut world, stranger).unwrap(), None);
    assert_eq!(vm.run_load(&mut world, e, None, 0).unwrap(), None);
}

#[test]
fn load_runs_once_then_settles() {
    // load at 0: setvar X 4, enda   tick at 4: enda
    let code = vec![op(Opcode::SetVar), 0, 4, op(Opcode::EndActor), op(Opcode::EndActor)];
    let program = program(code, vec![global("X")], Some(4), Some(0));
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(
        vm.run_load(&mut world, e, None, 0).unwrap(),
        Some(FrameOutcome::Normal)
    );
    assert_eq!(vm.vars().get(0, None, None), 4);
    assert_eq!(world.motions, 1);
}

#[test]
fn events_dispatch_by_id() {
    // 0: addvar X 1  3: endevent
    let code = vec![op(Opcode::AddVar), 0, 1, op(Opcode::EndEvent)];
    let mut program = Program::new(code);
    program.vars.push(global("X"));
    program.events.insert(12, 0);
    let mut world = world();
    let mut vm = VM::new(&program);

    assert_eq!(
        vm.dispatch_event(&mut world, 12, None, None, 0).unwrap(),
        Some(FrameOutcome::Normal)
    );
    assert_eq!(vm.dispatch_event(&mut world, 13, None, None, 0).unwrap(), None);
    assert_eq!(vm.dispatch_event(&mut world, -4, None, None, 0).unwrap(), None);
    assert_eq!(vm.vars().get(0, None, None), 1);
}

#[test]
fn event_killit_deletes_bound_entity() {
    let code = vec![op(Opcode::KillIt), op(Opcode::EndEvent)];
    let mut program = Program::new(code);
    program.events.insert(1, 0);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    assert_eq!(
        vm.dispatch_event(&mut world, 1, Some(e), None, 0).unwrap(),
        Some(FrameOutcome::Delete)
    );
    assert_eq!(world.deletions, vec![e]);
}

#[test]
fn run_all_follows_tick_order() {
    // 0: ifvare seen 0 @8 -> first entity to run sets marker and dies
    // 4: setvar seen 1
    // 7: killit
    // 8: addvar runs 1
    // 11: enda
    let code = vec![
        op(Opcode::IfVarE), 0, 0, 8,
        op(Opcode::SetVar), 0, 1,
        op(Opcode::KillIt),
        op(Opcode::AddVar), 1, 1,
        op(Opcode::EndActor),
    ];
    let program = tick_program(code, vec![global("seen"), global("runs")]);
    let mut world = world();
    let standable = spawn(&mut world);
    let active = spawn(&mut world);
    let dormant = spawn(&mut world);
    world.set_status(standable, Status::Standable);
    world.set_status(dormant, Status::Dormant);
    let mut vm = VM::new(&program);

    let report = vm.run_all(&mut world).unwrap();
    assert_eq!(
        report,
        vec![(active, FrameOutcome::Delete), (standable, FrameOutcome::Normal)]
    );
    assert_eq!(world.deletions, vec![active]);
    assert_eq!(vm.vars().get(1, None, None), 1);
}

// ============================================================
// Tick post-processing
// ============================================================

#[test]
fn sleep_timer_counts_down_to_dormancy() {
    let program = tick_program(vec![op(Opcode::EndActor)], vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    world.entity_mut(e).unwrap().state.sleep_timer = 3;
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.entity(e).unwrap().state.sleep_timer, 2);
    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.entity(e).unwrap().state.sleep_timer, 1);
    assert_eq!(world.status(e), Some(Status::Active));
    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.status(e), Some(Status::Dormant));
    assert_eq!(world.motions, 3);
}

#[test]
fn standable_check_follows_ticks_only() {
    let program = program(vec![op(Opcode::EndActor)], vec![], Some(0), Some(0));
    let mut world = world();
    let e = spawn(&mut world);
    world.set_status(e, Status::Standable);
    let mut vm = VM::new(&program);

    vm.run_load(&mut world, e, None, 0).unwrap();
    assert_eq!(world.motions, 1);
    assert!(world.standable_checks.is_empty());

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.standable_checks, vec![e]);
}

#[test]
fn standable_entities_do_not_count_down() {
    let program = tick_program(vec![op(Opcode::EndActor)], vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    world.set_status(e, Status::Standable);
    world.entity_mut(e).unwrap().state.sleep_timer = 2;
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.entity(e).unwrap().state.sleep_timer, 2);
}

#[test]
fn distant_player_arms_sleep_timer() {
    // 0: ifpdistl 1000 @4  3: nullop  4: enda
    let code = vec![op(Opcode::IfPDistL), 1000, 4, op(Opcode::NullOp), op(Opcode::EndActor)];
    let program = tick_program(code, vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    world.entity_mut(e).unwrap().player_distance = 30_000;
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.entity(e).unwrap().state.sleep_timer, 299);
}

#[test]
fn seeing_the_target_resets_sleep_timer() {
    let code = vec![op(Opcode::IfCanSeeTarget), 2, op(Opcode::EndActor)];
    let program = tick_program(code, vec![]);
    let mut world = world();
    world.set_probe(Probe::CanSeeTarget, true);
    let e = spawn(&mut world);
    world.entity_mut(e).unwrap().state.sleep_timer = 5;
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.entity(e).unwrap().state.sleep_timer, 299);
}

#[test]
fn count_advances_with_motion() {
    let program = tick_program(vec![op(Opcode::EndActor)], vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    for _ in 0..4 {
        vm.run_tick(&mut world, e).unwrap();
    }
    assert_eq!(world.entity(e).unwrap().state.regs[REG_COUNT], 4);
}

// ============================================================
// Actor state
// ============================================================

#[test]
fn action_animation_advances_each_tick() {
    // load 0: action @4  2: enda   tick 3: enda   4: action record
    let code = vec![
        op(Opcode::Action), 4,
        op(Opcode::EndActor),
        op(Opcode::EndActor),
        0, 3, 1, 1, 0,
    ];
    let program = program(code, vec![], Some(3), Some(0));
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_load(&mut world, e, None, 0).unwrap();
    let regs = |world: &SandboxWorld| {
        let s = world.entity(e).unwrap().state;
        (s.regs[REG_ACTION], s.regs[REG_ACTION_COUNT], s.regs[REG_ACTION_FRAME])
    };
    assert_eq!(regs(&world), (4, 0, 0));

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(regs(&world), (4, 1, 1));
    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(regs(&world), (4, 2, 2));
    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(regs(&world), (4, 3, 0));
}

#[test]
fn bad_action_record_names_the_record() {
    let program = tick_program(vec![op(Opcode::EndActor), 0, 0], vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    world.entity_mut(e).unwrap().state.regs[REG_ACTION] = 2;
    let mut vm = VM::new(&program);

    assert_eq!(
        vm.run_tick(&mut world, e),
        Err(RuntimeError::BadActionRecord { offset: 2 })
    );
}

#[test]
fn ai_loads_action_move_and_flags() {
    // 0: ai @3  2: enda  3: ai record [6, 11, 9]  6: action record  11: move record
    let mut code = vec![op(Opcode::Ai), 3, op(Opcode::EndActor), 6, 11, 9];
    code.extend([0, 2, 1, 1, 8]);
    code.extend([120, 0]);
    let program = tick_program(code, vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    world.entity_mut(e).unwrap().state.regs = [5, 0, 3, 3, 0, 0];
    let mut vm = VM::new(&program);

    let mut frame = Frame::new(Some(e), None, 0, 0);
    vm.step(&mut world, &mut frame).unwrap();
    let state = world.entity(e).unwrap().state;
    assert_eq!(state.regs[REG_AI], 3);
    assert_eq!(state.regs[REG_ACTION], 6);
    assert_eq!(state.regs[REG_MOVE], 11);
    assert_eq!(state.move_flags, 9);
    assert_eq!(state.regs[REG_COUNT], 0);
    assert_eq!(state.regs[REG_ACTION_COUNT], 0);
    assert_eq!(state.regs[REG_ACTION_FRAME], 0);
}

#[test]
fn move_and_count_set_registers() {
    // 0: count 9  2: move @6 5  5: enda  6: move record
    let code = vec![
        op(Opcode::Count), 9,
        op(Opcode::Move), 6, 5,
        op(Opcode::EndActor),
        0, 0,
    ];
    let program = tick_program(code, vec![]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    let mut frame = Frame::new(Some(e), None, 0, 0);
    vm.step(&mut world, &mut frame).unwrap();
    assert_eq!(world.entity(e).unwrap().state.regs[REG_COUNT], 9);
    vm.step(&mut world, &mut frame).unwrap();
    let state = world.entity(e).unwrap().state;
    assert_eq!(state.regs[REG_COUNT], 0);
    assert_eq!(state.regs[REG_MOVE], 6);
    assert_eq!(state.move_flags, 5);
}

// ============================================================
// Fields and effects
// ============================================================

#[test]
fn field_access_rules() {
    // 0: setactor self 10 0 src
    // 5: getactor self 10 0 a
    // 10: setsector self 3 0 src      (read-only: ignored)
    // 15: getsector self 3 0 b
    // 20: getactor bad 10 0 c         (invalid handle: writes 0)
    // 25: getuserdef self 99 0 d      (unknown field: reads 0)
    // 30: enda
    let code = vec![
        op(Opcode::SetActor), -1, 10, 0, 0,
        op(Opcode::GetActor), -1, 10, 0, 1,
        op(Opcode::SetSector), -1, 3, 0, 0,
        op(Opcode::GetSector), -1, 3, 0, 2,
        op(Opcode::GetActor), 5, 10, 0, 3,
        op(Opcode::GetUserDef), -1, 99, 0, 4,
        op(Opcode::EndActor),
    ];
    let vars = vec![
        VarDecl::new("src", Scope::Global, 41),
        global("a"),
        global("b"),
        VarDecl::new("c", Scope::Global, 6),
        VarDecl::new("d", Scope::Global, 6),
        VarDecl::new("bad", Scope::Global, 999),
    ];
    let program = tick_program(code, vars);
    let mut world = world();
    world.declare_field(Target::Actor, 10, Access::ReadWrite);
    world.declare_field(Target::Sector, 3, Access::ReadOnly);
    world.set_sector_field(0, 3, 77);
    world.set_userdef(99, 5);
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.entity(e).unwrap().fields.get(&10), Some(&41));
    assert_eq!(vm.vars().get(1, None, None), 41);
    assert_eq!(world.sector_field(0, 3), 77);
    assert_eq!(vm.vars().get(2, None, None), 77);
    assert_eq!(vm.vars().get(3, None, None), 0);
    assert_eq!(vm.vars().get(4, None, None), 0);
}

#[test]
fn effects_reach_the_host() {
    // 0: espawn 2 child  3: sound 8  5: damage self 4  8: enda
    let code = vec![
        op(Opcode::ESpawn), 2, 0,
        op(Opcode::Sound), 8,
        op(Opcode::Damage), -1, 4,
        op(Opcode::EndActor),
    ];
    let program = tick_program(code, vec![actor_var("child", -1)]);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    let child = vm.vars().get(0, Some(e), None);
    let spawned = world.entity_at(child).unwrap();
    assert_eq!(world.actor_kind(spawned), Some(2));
    let effects: Vec<Effect> = world.effects.iter().map(|r| r.effect).collect();
    assert_eq!(
        effects,
        vec![
            Effect::ESpawn { kind: 2 },
            Effect::Sound { id: 8 },
            Effect::Damage { target: e, amount: 4 },
        ]
    );
}

#[test]
fn move_entity_reads_variables() {
    let code = vec![op(Opcode::MoveEntity), -1, 0, 1, 2, op(Opcode::EndActor)];
    let vars = vec![
        VarDecl::new("dx", Scope::Global, 3),
        VarDecl::new("dy", Scope::Global, -4),
        VarDecl::new("dz", Scope::Global, 5),
    ];
    let program = tick_program(code, vars);
    let mut world = world();
    let e = spawn(&mut world);
    let mut vm = VM::new(&program);

    vm.run_tick(&mut world, e).unwrap();
    assert_eq!(world.entity(e).unwrap().position, [3, -4, 5]);
}

// ============================================================
// Properties
// ============================================================

proptest! {
    /// Writes addressed to one entity never show up on another.
    #[test]
    fn entity_writes_stay_local(values in prop::collection::vec(any::<i32>(), 1..20)) {
        let code = vec![op(Opcode::SetVarVar), 0, 1, op(Opcode::EndActor)];
        let vars = vec![actor_var("v", -7), global("input")];
        let program = tick_program(code, vars);
        let mut world = world();
        let a = spawn(&mut world);
        let b = spawn(&mut world);
        let mut vm = VM::new(&program);

        for value in values {
            vm.vars_mut().set(1, None, None, value);
            vm.run_tick(&mut world, b).unwrap();
            prop_assert_eq!(vm.vars().get(0, Some(a), None), -7);
            prop_assert_eq!(vm.vars().get(0, Some(b), None), value);
        }
    }

    /// Any sequence of writes leaves a read-only variable untouched.
    #[test]
    fn read_only_survives_any_writes(writes in prop::collection::vec(any::<i32>(), 0..32)) {
        let program = tick_program(vec![op(Opcode::EndActor)], vec![
            VarDecl::new("ro", Scope::Actor, 3).read_only(),
        ]);
        let mut world = world();
        let e = spawn(&mut world);
        let mut vm = VM::new(&program);
        for value in writes {
            vm.vars_mut().set(0, Some(e), None, value);
        }
        prop_assert_eq!(vm.vars().get(0, Some(e), None), 3);
    }

    /// Switch picks the first table entry equal to the selector.
    #[test]
    fn switch_first_match(value in 0i32..8) {
        let (out, cursor) = run_switch(23, value);
        let expected = match value {
            3 => 100,
            5 => 200,
            _ => 900,
        };
        prop_assert_eq!(out, expected);
        prop_assert_eq!(cursor, 27);
    }
}
