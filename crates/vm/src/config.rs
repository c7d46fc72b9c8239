//! Interpreter limits and timing constants.

use serde::{Deserialize, Serialize};

/// Runtime configuration for [`crate::VM`].
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Deepest allowed nesting of brace blocks, state calls and switch
    /// branches within one frame.
    pub max_call_depth: usize,
    /// Instructions one frame may execute before it is aborted. 0 disables
    /// the budget.
    pub max_steps: u64,
    /// Number of player slots for player-scoped variables.
    pub max_players: usize,
    /// Animation clock increment per tick.
    pub tics_per_frame: i32,
    /// Sleep timer value armed by distance and visibility checks.
    pub sleep_time: i32,
    /// Player distance past which an entity starts its sleep countdown.
    pub max_sleep_distance: i32,
    /// Seed for the script random number generator.
    pub seed: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            max_steps: 1_000_000,
            max_players: 16,
            tics_per_frame: 4,
            sleep_time: 300,
            max_sleep_distance: 24_000,
            seed: 0x5eed,
        }
    }
}
