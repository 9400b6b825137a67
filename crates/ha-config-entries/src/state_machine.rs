//! Config Entry lifecycle transitions
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (after reauth)
//!                            ↘ SetupRetry → SetupInProgress (remote not ready)
//!                            ↘ MigrationError (terminal)
//!
//! Loaded/SetupError/SetupRetry → UnloadInProgress → NotLoaded
//!                                                 ↘ FailedUnload (terminal)
//! ```

use std::time::Duration;

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
    pub reason: &'static str,
}

impl ConfigEntryState {
    /// Validate a transition, returning the target state
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        let reason = match (self, to) {
            (NotLoaded, SetupInProgress)
            | (SetupInProgress, Loaded | SetupError | SetupRetry | MigrationError)
            | (SetupError | SetupRetry, SetupInProgress | UnloadInProgress)
            | (Loaded, UnloadInProgress)
            | (UnloadInProgress, NotLoaded | FailedUnload) => return Ok(to),

            (MigrationError | FailedUnload, _) => "terminal state",
            (Loaded, SetupInProgress) => "already loaded, unload first",
            (SetupInProgress, _) => "setup still running",
            (UnloadInProgress, _) => "unload still running",
            (NotLoaded, _) => "setup has not started",
            _ => "not part of the lifecycle",
        };

        Err(InvalidTransition {
            from: self,
            to,
            reason,
        })
    }

    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.try_transition(to).is_ok()
    }
}

/// Delay before the next setup attempt of an entry that was not ready
///
/// `2^min(tries, 4) * 5` seconds plus up to 100 ms of jitter: 5s, 10s, 20s,
/// 40s, then 80s.
pub fn retry_delay(tries: u32) -> Duration {
    let base = Duration::from_secs(u64::from(2_u32.pow(tries.min(4)) * 5));
    let jitter = Duration::from_millis(rand::random::<u64>() % 100);
    base + jitter
}
