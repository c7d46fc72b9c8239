//! Hard size limits.

use crate::error::VerifyError;
use actorvm_common::program::MAX_NAME_LEN;
use actorvm_common::Program;

/// Maximum stream length in words.
pub const MAX_PROGRAM_WORDS: usize = 1 << 20;

/// Maximum number of declared variables.
pub const MAX_VARIABLES: usize = 1 << 16;

/// Maximum number of cases in one switch table.
pub const MAX_SWITCH_CASES: usize = 4_096;

/// Run the limits check.
pub fn check_limits(program: &Program) -> Vec<VerifyError> {
    let mut errors = Vec::new();

    if program.code.len() > MAX_PROGRAM_WORDS {
        errors.push(VerifyError::ProgramTooLarge {
            size: program.code.len(),
        });
    }
    if program.vars.len() > MAX_VARIABLES {
        errors.push(VerifyError::TooManyVariables {
            count: program.vars.len(),
        });
    }
    for (id, var) in program.vars.iter().enumerate() {
        if var.name.len() > MAX_NAME_LEN {
            errors.push(VerifyError::NameTooLong {
                id,
                len: var.name.len(),
            });
        }
    }

    errors
}
