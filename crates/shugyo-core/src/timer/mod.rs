mod accounting;
mod controller;
mod deferred;
mod phase;

use serde::{Deserialize, Serialize};

pub use accounting::{RestAccounting, SessionAccountant, SessionSummary};
pub use controller::{ControllerConfig, CycleController, FinishOutcome};
pub use deferred::DeferredQueue;
pub use phase::{ExpireCallback, PhaseTimer, DEFAULT_GUARD_MS, MAX_GUARD_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Active work interval; counts toward net active time.
    Practice,
    /// Recovery interval between practices.
    Rest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    #[default]
    Idle,
    Practicing,
    Resting,
    /// Transient: reported while a finish is being processed, then folds
    /// back to `Idle`.
    Finished,
}

impl CycleState {
    /// The phase whose timer drives this state, if any.
    pub fn active_phase(self) -> Option<Phase> {
        match self {
            CycleState::Practicing => Some(Phase::Practice),
            CycleState::Resting => Some(Phase::Rest),
            CycleState::Idle | CycleState::Finished => None,
        }
    }
}
