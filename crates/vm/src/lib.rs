//! Actor behavior virtual machine.
//!
//! The VM executes a shared word stream on behalf of many entities. Each
//! invocation gets a fresh [`Frame`] bound to an entity and player; the
//! dispatch loop reads and writes scoped variables through the
//! [`VarRegistry`] and reaches everything else through the [`Host`] trait.
//! Entities never disappear mid-frame: deletion requests are recorded on the
//! frame and applied by the entry point after it unwinds.
//!
//! # Usage
//!
//! ```
//! use actorvm_common::{ActorScripts, Opcode, Program, Scope, VarDecl};
//! use actorvm_vm::handle::SectorId;
//! use actorvm_vm::sandbox::SandboxWorld;
//! use actorvm_vm::{FrameOutcome, VM};
//!
//! let mut program = Program::new(vec![
//!     Opcode::SetVar as i32, 0, 42,
//!     Opcode::EndActor as i32,
//! ]);
//! program.vars.push(VarDecl::new("answer", Scope::Actor, 0));
//! program.actors.insert(7, ActorScripts { tick: Some(0), load: None });
//!
//! let mut world = SandboxWorld::new(1, 0);
//! let entity = world.spawn(7, Some(SectorId(0)));
//!
//! let mut vm = VM::new(&program);
//! let outcome = vm.run_tick(&mut world, entity).unwrap();
//! assert_eq!(outcome, Some(FrameOutcome::Normal));
//! assert_eq!(vm.vars().get(0, Some(entity), None), 42);
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod execute;
pub mod frame;
pub mod handle;
pub mod host;
pub mod machine;
pub mod sandbox;
pub mod vars;

pub use config::VmConfig;
pub use error::RuntimeError;
pub use execute::Flow;
pub use frame::{Frame, FrameOutcome, Termination};
pub use handle::{EntityId, PlayerId, SectorId, WallId};
pub use host::{
    Access, ActorState, Effect, EffectOutcome, FieldRef, FrameContext, Host, Probe, Status,
    Target,
};
pub use machine::VM;
pub use vars::{Cell, VarRegistry};
