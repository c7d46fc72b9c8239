//! Entry validation and control-flow tracing.
//!
//! Every offset in the actor and event tables must land inside the stream.
//! Control flow is then followed from those offsets; what is reached is
//! code, everything else is data. The resulting [`ProgramContext`] feeds the
//! later passes.

use crate::error::{Entry, VerifyError};
use actorvm_common::flow::{self, Trace};
use actorvm_common::Program;

/// Context built by the reachability pass, consumed by later passes.
#[derive(Debug, Clone, Default)]
pub struct ProgramContext {
    /// Valid entry offsets, sorted and deduplicated.
    pub roots: Vec<usize>,
    /// Everything reached from `roots`.
    pub trace: Trace,
}

/// Run the reachability pass.
pub fn check_reachability(program: &Program) -> (ProgramContext, Vec<VerifyError>) {
    let mut errors = Vec::new();
    let len = program.code.len();

    let mut entries: Vec<(Entry, usize)> = Vec::new();
    for (&kind, scripts) in &program.actors {
        entries.extend(scripts.tick.map(|at| (Entry::Tick(kind), at)));
        entries.extend(scripts.load.map(|at| (Entry::Load(kind), at)));
    }
    for (&id, &at) in &program.events {
        if id < 0 {
            errors.push(VerifyError::InvalidEventId { id });
        }
        entries.push((Entry::Event(id), at));
    }

    let mut roots = Vec::with_capacity(entries.len());
    for (entry, offset) in entries {
        if offset < len {
            roots.push(offset);
        } else {
            errors.push(VerifyError::EntryOutOfRange { entry, offset });
        }
    }
    roots.sort_unstable();
    roots.dedup();

    let trace = flow::trace(&program.code, &roots);

    errors.extend(trace.faults.iter().cloned().map(VerifyError::Decode));
    for &(at, target) in &trace.dangling {
        let falls_through = trace
            .starts
            .get(&at)
            .is_some_and(|&n| at + n == len && target == len as i32);
        if falls_through {
            errors.push(VerifyError::RunsOffEnd { at });
        } else {
            errors.push(VerifyError::DanglingTarget { at, target });
        }
    }

    (ProgramContext { roots, trace }, errors)
}
