//! VM state: the shared program, variable storage and random sources.

use actorvm_common::{Program, RecordKind};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::VmConfig;
use crate::error::RuntimeError;
use crate::vars::VarRegistry;

/// Seed offset for the display-only random stream.
const DISPLAY_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// The actor behavior virtual machine.
///
/// One VM serves every entity in a session. Frames are created per
/// invocation by the entry points in [`crate::entry`], and only one is ever
/// active at a time.
pub struct VM<'a> {
    /// The program being executed.
    pub(crate) program: &'a Program,
    pub(crate) vars: VarRegistry,
    /// Random stream for gameplay decisions (`ifrnd`, `randvar`).
    pub(crate) rng: SmallRng,
    /// Random stream for `displayrand`, kept apart so cosmetic rolls do not
    /// shift gameplay rolls.
    pub(crate) display_rng: SmallRng,
    pub(crate) config: VmConfig,
}

impl<'a> VM<'a> {
    /// Create a VM with the default configuration.
    pub fn new(program: &'a Program) -> Self {
        Self::with_config(program, VmConfig::default())
    }

    pub fn with_config(program: &'a Program, config: VmConfig) -> Self {
        Self {
            program,
            vars: VarRegistry::new(&program.vars, config.max_players),
            rng: SmallRng::seed_from_u64(config.seed),
            display_rng: SmallRng::seed_from_u64(config.seed ^ DISPLAY_SEED_SALT),
            config,
        }
    }

    pub fn program(&self) -> &'a Program {
        self.program
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn vars(&self) -> &VarRegistry {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VarRegistry {
        &mut self.vars
    }

    /// The words of a data record. `from` is the referencing offset, used
    /// for error reporting.
    pub(crate) fn record(
        &self,
        from: usize,
        offset: i32,
        kind: RecordKind,
    ) -> Result<&'a [i32], RuntimeError> {
        let program: &'a Program = self.program;
        usize::try_from(offset)
            .ok()
            .and_then(|start| program.code.get(start..start.checked_add(kind.len())?))
            .ok_or(RuntimeError::RecordOutOfRange { at: from, offset })
    }
}
