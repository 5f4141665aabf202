use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::{CycleState, Phase, SessionSummary};

/// Every state change of the cycle controller produces an Event.
/// The CLI prints them; a GUI would poll or subscribe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        session_id: Uuid,
        practice_secs: u64,
        rest_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseStarted {
        phase: Phase,
        /// 1-based number of the practice round this phase belongs to.
        round: u32,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseCompleted {
        phase: Phase,
        completed_cycles: u32,
        at: DateTime<Utc>,
    },
    Paused {
        phase: Phase,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    Resumed {
        phase: Phase,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    SessionFinished {
        session_id: Option<Uuid>,
        summary: SessionSummary,
        /// Id assigned by the history store, if a record was written.
        record_id: Option<i64>,
        /// Non-fatal problem while persisting the record.
        warning: Option<String>,
        at: DateTime<Utc>,
    },
    SessionReset {
        session_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: CycleState,
        paused: bool,
        remaining_ms: u64,
        phase_duration_secs: u64,
        completed_cycles: u32,
        elapsed_session_secs: u64,
        net_active_secs: f64,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_in_snake_case() {
        let event = Event::PhaseCompleted {
            phase: Phase::Practice,
            completed_cycles: 1,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "phase_completed");
        assert_eq!(json["phase"], "practice");
    }
}
