//! Variable checks.
//!
//! Every variable operand of reached code must name a declared variable.
//! Handle operands may also be `-1` (self). The second operand of
//! `getactorvar`/`setactorvar` addresses another entity's storage and so
//! must be actor-scoped.

use std::collections::HashSet;

use crate::error::VerifyError;
use crate::reachability::ProgramContext;
use actorvm_common::{Instruction, Opcode, Operand, Program, Scope, SELF_HANDLE};

/// Run the variable pass.
pub fn check_variables(program: &Program, ctx: &ProgramContext) -> Vec<VerifyError> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for decl in &program.vars {
        if !seen.insert(decl.name.as_str()) {
            errors.push(VerifyError::DuplicateVariable {
                name: decl.name.clone(),
            });
        }
    }

    let scope_of = |id: i32| {
        usize::try_from(id)
            .ok()
            .and_then(|i| program.vars.get(i))
            .map(|decl| decl.scope)
    };

    for &at in ctx.trace.starts.keys() {
        let Ok(instr) = Instruction::decode(&program.code, at) else {
            continue;
        };

        for (kind, &id) in instr.opcode.operands().iter().zip(instr.operands) {
            let checked = match kind {
                Operand::Var => true,
                Operand::Handle => id != SELF_HANDLE,
                _ => false,
            };
            if checked && scope_of(id).is_none() {
                errors.push(VerifyError::UnknownVariable { at, id });
            }
        }

        if matches!(instr.opcode, Opcode::GetActorVar | Opcode::SetActorVar) {
            let id = instr.operand(1);
            if scope_of(id).is_some_and(|scope| scope != Scope::Actor) {
                errors.push(VerifyError::NotActorScoped { at, id });
            }
        }
    }

    errors
}
