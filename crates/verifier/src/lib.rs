//! Static validation of actor behavior programs.
//!
//! The verifier checks a [`Program`] BEFORE any entity runs it. It collects
//! ALL errors (not just the first) and returns them.
//!
//! # Usage
//!
//! ```
//! use actorvm_common::{ActorScripts, Opcode, Program};
//! use actorvm_verifier::verify;
//!
//! let mut program = Program::new(vec![Opcode::NullOp as i32, Opcode::EndActor as i32]);
//! program.actors.insert(1, ActorScripts { tick: Some(0), load: None });
//!
//! assert!(verify(&program).is_ok());
//! ```
//!
//! # Passes
//!
//! 1. **Limits**: stream size, variable count
//! 2. **Reachability**: entry offsets, decoding, dangling targets
//! 3. **Structural**: instruction boundaries, record ranges, switch size
//! 4. **Variables**: declared ids, actor scope for cross-entity access

pub mod error;
pub mod limits;
pub mod reachability;
pub mod structural;
pub mod variables;

pub use error::{Entry, VerifyError};

use actorvm_common::Program;

/// Verify a program for correctness.
///
/// Returns `Ok(())` if the program passes all checks, or
/// `Err(Vec<VerifyError>)` with all errors found.
pub fn verify(program: &Program) -> Result<(), Vec<VerifyError>> {
    let mut all_errors = Vec::new();

    // Pass 1: Limits (independent)
    all_errors.extend(limits::check_limits(program));

    // Pass 2: Reachability (builds ProgramContext)
    let (ctx, reach_errors) = reachability::check_reachability(program);
    all_errors.extend(reach_errors);

    // Pass 3: Structural
    all_errors.extend(structural::check_structural(&program.code, &ctx));

    // Pass 4: Variables
    all_errors.extend(variables::check_variables(program, &ctx));

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actorvm_common::{ActorScripts, Opcode, Scope, VarDecl};

    fn op(o: Opcode) -> i32 {
        o as i32
    }

    fn with_tick(code: Vec<i32>) -> Program {
        let mut program = Program::new(code);
        program.actors.insert(
            1,
            ActorScripts {
                tick: Some(0),
                load: None,
            },
        );
        program
    }

    #[test]
    fn minimal_valid_program() {
        assert!(verify(&with_tick(vec![op(Opcode::EndActor)])).is_ok());
    }

    #[test]
    fn program_without_entries_is_valid() {
        assert!(verify(&Program::new(vec![])).is_ok());
    }

    #[test]
    fn multiple_errors_collected() {
        // unknown variable + jump outside the stream
        let mut program = with_tick(vec![op(Opcode::SetVar), 3, 1, op(Opcode::Else), 99]);
        program.vars.push(VarDecl::new("x", Scope::Global, 0));
        let errors = verify(&program).unwrap_err();
        assert!(errors.len() >= 2, "expected multiple errors, got: {errors:?}");
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::UnknownVariable { id: 3, .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::DanglingTarget { target: 99, .. })));
    }

    #[test]
    fn unknown_opcode_reported() {
        let errors = verify(&with_tick(vec![op(Opcode::NullOp), 0x5A])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::Decode(_))));
    }
}
