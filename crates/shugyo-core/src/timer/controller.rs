//! Cycle controller: the practice/rest state machine.
//!
//! The controller owns two [`PhaseTimer`]s and a [`SessionAccountant`]. Like
//! the timers it has no thread of its own; the host calls [`tick`] on a short
//! interval and issues commands in between.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Practicing --expiry--> Resting --expiry--> Practicing ...
//!   ^                                                           |
//!   +---------------- finish (via Finished) / reset ------------+
//! ```
//!
//! Phase expiries are delivered through the timers' callbacks into a
//! channel that `tick()` drains after every timer has been recomputed, so
//! handler code never runs inside a timer's own tick.
//!
//! The incoming phase starts at the instant the outgoing one ran out, not at
//! the tick that noticed it. A tick that spans several phase boundaries
//! (a coarse host interval, or a host that was suspended) walks through each
//! of them in order.
//!
//! [`tick`]: CycleController::tick

use std::sync::mpsc::{self, Receiver};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::accounting::{RestAccounting, SessionAccountant, SessionSummary};
use super::deferred::DeferredQueue;
use super::phase::{PhaseTimer, DEFAULT_GUARD_MS, MAX_GUARD_MS};
use super::{CycleState, Phase};
use crate::clock::SharedClock;
use crate::error::TimerError;
use crate::events::Event;
use crate::history::{BodyPart, HistoryRecord, HistoryStore, NewHistoryRecord};
use crate::notify::PhaseNotifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub practice_secs: u64,
    pub rest_secs: u64,
    /// Callback suppression window after a reset or finish.
    pub guard_ms: u64,
    pub rest_accounting: RestAccounting,
    pub body_part: BodyPart,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            practice_secs: 60,
            rest_secs: 30,
            guard_ms: DEFAULT_GUARD_MS,
            rest_accounting: RestAccounting::default(),
            body_part: BodyPart::default(),
        }
    }
}

/// Result of [`CycleController::finish_session`].
#[derive(Debug, Clone)]
pub struct FinishOutcome {
    pub summary: SessionSummary,
    /// The record handed to the store, if one was written.
    pub record: Option<HistoryRecord>,
    /// Set when the store rejected the record. The session ended anyway.
    pub warning: Option<String>,
    /// Phase changes that were due when finish was called, in order.
    pub settled: Vec<Event>,
    pub event: Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    EnableCallbacks,
}

pub struct CycleController {
    config: ControllerConfig,
    clock: SharedClock,
    state: CycleState,
    practice: PhaseTimer,
    rest: PhaseTimer,
    accountant: SessionAccountant,
    deferred: DeferredQueue<Task>,
    expired: Receiver<Phase>,
    store: Box<dyn HistoryStore>,
    notifier: Box<dyn PhaseNotifier>,
    session_id: Option<Uuid>,
}

impl CycleController {
    /// # Errors
    /// Returns [`TimerError::InvalidDuration`] if either duration is zero and
    /// [`TimerError::InvalidGuard`] if the guard window would outlast the
    /// shortest phase.
    pub fn new(
        config: ControllerConfig,
        clock: SharedClock,
        store: Box<dyn HistoryStore>,
        notifier: Box<dyn PhaseNotifier>,
    ) -> Result<Self, TimerError> {
        if config.guard_ms > MAX_GUARD_MS {
            return Err(TimerError::InvalidGuard(config.guard_ms));
        }
        let mut practice =
            PhaseTimer::new(config.practice_secs, clock.clone())?.with_guard_ms(config.guard_ms);
        let mut rest =
            PhaseTimer::new(config.rest_secs, clock.clone())?.with_guard_ms(config.guard_ms);

        let (tx, expired) = mpsc::channel();
        let practice_tx = tx.clone();
        practice.set_on_expire(move || {
            let _ = practice_tx.send(Phase::Practice);
        });
        rest.set_on_expire(move || {
            let _ = tx.send(Phase::Rest);
        });

        let accountant = SessionAccountant::new(config.rest_secs, config.rest_accounting);

        Ok(Self {
            config,
            clock,
            state: CycleState::Idle,
            practice,
            rest,
            accountant,
            deferred: DeferredQueue::new(),
            expired,
            store,
            notifier,
            session_id: None,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn is_paused(&self) -> bool {
        self.active_timer().is_some_and(PhaseTimer::is_paused)
    }

    pub fn completed_cycles(&self) -> u32 {
        self.accountant.completed_cycles()
    }

    pub fn elapsed_session_secs(&self) -> u64 {
        self.accountant.elapsed_session_secs()
    }

    /// Net active time right now, including a partially spent rest.
    pub fn net_active_secs(&self) -> f64 {
        self.accountant.net_active_secs(self.partial_rest_secs())
    }

    /// Remaining time of the active phase; the practice length while idle.
    pub fn remaining_ms(&self) -> u64 {
        self.active_timer()
            .unwrap_or(&self.practice)
            .remaining_ms()
    }

    /// Sub-second remaining time of the active phase.
    pub fn remaining_secs(&self) -> f64 {
        self.remaining_ms() as f64 / 1000.0
    }

    pub fn practice_timer(&self) -> &PhaseTimer {
        &self.practice
    }

    pub fn rest_timer(&self) -> &PhaseTimer {
        &self.rest
    }

    pub fn accountant(&self) -> &SessionAccountant {
        &self.accountant
    }

    pub fn store(&self) -> &dyn HistoryStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn HistoryStore {
        self.store.as_mut()
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let timer = self.active_timer().unwrap_or(&self.practice);
        Event::StateSnapshot {
            state: self.state,
            paused: self.is_paused(),
            remaining_ms: timer.remaining_ms(),
            phase_duration_secs: timer.duration_secs(),
            completed_cycles: self.completed_cycles(),
            elapsed_session_secs: self.elapsed_session_secs(),
            net_active_secs: self.net_active_secs(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Change the phase lengths between sessions.
    ///
    /// # Errors
    /// [`TimerError::SessionActive`] unless idle; [`TimerError::InvalidDuration`]
    /// for zero. Nothing changes on error.
    pub fn configure(&mut self, practice_secs: u64, rest_secs: u64) -> Result<(), TimerError> {
        if self.state != CycleState::Idle {
            return Err(TimerError::SessionActive);
        }
        for secs in [practice_secs, rest_secs] {
            if secs == 0 {
                return Err(TimerError::InvalidDuration(secs));
            }
        }
        self.practice.set_duration(practice_secs)?;
        self.rest.set_duration(rest_secs)?;
        self.accountant.set_rest_secs(rest_secs);
        self.config.practice_secs = practice_secs;
        self.config.rest_secs = rest_secs;
        Ok(())
    }

    pub fn set_rest_accounting(&mut self, policy: RestAccounting) {
        self.accountant.set_policy(policy);
        self.config.rest_accounting = policy;
    }

    /// `Idle -> Practicing`.
    ///
    /// # Errors
    /// [`TimerError::SessionActive`] if a session is already running.
    pub fn start_session(&mut self) -> Result<Event, TimerError> {
        if self.state != CycleState::Idle {
            return Err(TimerError::SessionActive);
        }
        if let Err(e) = self.notifier.unlock() {
            debug!(error = %e, "notifier unlock failed");
        }

        let now = self.clock.now_ms();
        let session_id = Uuid::new_v4();
        self.drain_stale_expiries();
        self.rest.reset();
        self.practice.reset();
        self.practice.start();
        self.accountant.begin(now);
        self.state = CycleState::Practicing;
        self.session_id = Some(session_id);

        info!(
            %session_id,
            practice_secs = self.config.practice_secs,
            rest_secs = self.config.rest_secs,
            "session started"
        );
        Ok(Event::SessionStarted {
            session_id,
            practice_secs: self.config.practice_secs,
            rest_secs: self.config.rest_secs,
            at: Utc::now(),
        })
    }

    /// Pause the active phase. `None` if idle or already paused.
    pub fn pause(&mut self) -> Option<Event> {
        let phase = self.state.active_phase()?;
        let now = self.clock.now_ms();
        let timer = self.timer_mut(phase);
        if !timer.pause() {
            return None;
        }
        let remaining_ms = timer.remaining_ms();
        self.accountant.suspend(now);
        debug!(?phase, remaining_ms, "paused");
        Some(Event::Paused {
            phase,
            remaining_ms,
            at: Utc::now(),
        })
    }

    /// Resume the active phase. `None` if idle or not paused.
    pub fn resume(&mut self) -> Option<Event> {
        let phase = self.state.active_phase()?;
        let now = self.clock.now_ms();
        let timer = self.timer_mut(phase);
        if !timer.is_paused() {
            return None;
        }
        timer.start();
        let remaining_ms = timer.remaining_ms();
        self.accountant.resume(now);
        debug!(?phase, remaining_ms, "resumed");
        Some(Event::Resumed {
            phase,
            remaining_ms,
            at: Utc::now(),
        })
    }

    /// One cooperative scheduling turn.
    ///
    /// Runs due deferred work, accrues session time, recomputes both timers
    /// and only then delivers expiries and performs phase changes.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        for task in self.deferred.take_due(now) {
            match task {
                Task::EnableCallbacks => {
                    self.practice.enable_callbacks();
                    self.rest.enable_callbacks();
                    debug!("phase callbacks re-enabled");
                }
            }
        }

        let mut events = Vec::new();
        if self.state.active_phase().is_none() {
            return events;
        }

        self.accountant.accrue(now);
        loop {
            self.practice.tick();
            self.rest.tick();

            self.practice.run_pending();
            self.rest.run_pending();
            let mut changed = false;
            while let Ok(phase) = self.expired.try_recv() {
                let handled = self.handle_expiry(phase);
                changed |= !handled.is_empty();
                events.extend(handled);
            }
            // Each hand-off moves the phase start forward by at least one
            // second, so this ends once the new phase is still running.
            if !changed {
                break;
            }
        }
        events
    }

    /// End the session and hand its summary to the history store.
    ///
    /// Expiries that fell due since the last tick are handled first and
    /// returned in [`FinishOutcome::settled`]. Persistence failures are logged and reported in the outcome; the
    /// controller is back in `Idle` either way.
    pub fn finish_session(&mut self) -> FinishOutcome {
        // A phase that ran out since the last tick still counts.
        let settled = self.tick();
        let now = self.clock.now_ms();

        self.practice.disable_callbacks();
        self.rest.disable_callbacks();

        let was_resting = self.state == CycleState::Resting;
        if self.state.active_phase().is_some() {
            self.accountant.accrue(now);
            self.practice.pause();
            self.rest.pause();
            self.accountant.suspend(now);
        }

        let partial = if was_resting {
            self.rest.elapsed_ms() as f64 / 1000.0
        } else {
            0.0
        };
        let summary = self.accountant.summary(partial);
        let session_id = self.session_id;
        self.state = CycleState::Finished;

        let mut record = None;
        let mut warning = None;
        if summary.completed_cycles > 0 && summary.net_active_secs > 0.0 {
            let new_record = NewHistoryRecord {
                date: Utc::now(),
                body_part: self.config.body_part,
                sets: summary.completed_cycles,
                total_time_secs: summary.total_time_secs(),
            };
            match self.store.create(&new_record) {
                Ok(stored) => {
                    info!(
                        session_id = ?session_id,
                        id = stored.id,
                        sets = stored.sets,
                        total_time_secs = stored.total_time_secs,
                        "session saved to history"
                    );
                    record = Some(stored);
                }
                Err(e) => {
                    warn!(session_id = ?session_id, error = %e, "failed to save session history");
                    warning = Some(format!(
                        "History could not be saved, but the session ended normally: {e}"
                    ));
                }
            }
        } else {
            debug!(session_id = ?session_id, "nothing to record");
        }

        self.return_to_idle(now);

        let event = Event::SessionFinished {
            session_id,
            summary: summary.clone(),
            record_id: record.as_ref().map(|r| r.id),
            warning: warning.clone(),
            at: Utc::now(),
        };
        FinishOutcome {
            summary,
            record,
            warning,
            settled,
            event,
        }
    }

    /// Abandon the session without writing history.
    pub fn reset_session(&mut self) -> Event {
        let now = self.clock.now_ms();
        self.practice.disable_callbacks();
        self.rest.disable_callbacks();
        let session_id = self.session_id;
        self.return_to_idle(now);
        info!(session_id = ?session_id, "session reset");
        Event::SessionReset {
            session_id,
            at: Utc::now(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn active_timer(&self) -> Option<&PhaseTimer> {
        self.state.active_phase().map(|phase| match phase {
            Phase::Practice => &self.practice,
            Phase::Rest => &self.rest,
        })
    }

    fn timer_mut(&mut self, phase: Phase) -> &mut PhaseTimer {
        match phase {
            Phase::Practice => &mut self.practice,
            Phase::Rest => &mut self.rest,
        }
    }

    fn partial_rest_secs(&self) -> f64 {
        if self.state == CycleState::Resting {
            self.rest.elapsed_ms() as f64 / 1000.0
        } else {
            0.0
        }
    }

    fn handle_expiry(&mut self, phase: Phase) -> Vec<Event> {
        if self.state.active_phase() != Some(phase) {
            debug!(?phase, state = ?self.state, "ignoring expiry for inactive phase");
            return Vec::new();
        }
        if let Err(e) = self.notifier.notify_phase_end(phase) {
            debug!(error = %e, "phase-end notification failed");
        }

        let completed = Event::PhaseCompleted {
            phase,
            completed_cycles: match phase {
                Phase::Practice => self.accountant.completed_cycles() + 1,
                Phase::Rest => self.accountant.completed_cycles(),
            },
            at: Utc::now(),
        };

        let (next, round) = match phase {
            Phase::Practice => {
                self.accountant.record_cycle_complete();
                self.state = CycleState::Resting;
                (Phase::Rest, self.accountant.completed_cycles())
            }
            Phase::Rest => {
                self.accountant.record_rest_complete();
                self.state = CycleState::Practicing;
                (Phase::Practice, self.accountant.completed_cycles() + 1)
            }
        };
        let now = self.clock.now_ms();
        let ran_out_at = self.timer_mut(phase).expired_at_ms().unwrap_or(now);
        let timer = self.timer_mut(next);
        timer.start_at(ran_out_at);
        let duration_secs = timer.duration_secs();
        debug!(?phase, ?next, round, ran_out_at, "phase changed");

        vec![
            completed,
            Event::PhaseStarted {
                phase: next,
                round,
                duration_secs,
                at: Utc::now(),
            },
        ]
    }

    fn return_to_idle(&mut self, now: u64) {
        self.practice.reset();
        self.rest.reset();
        self.accountant.clear();
        self.drain_stale_expiries();
        self.state = CycleState::Idle;
        self.session_id = None;

        self.deferred.cancel_where(|t| *t == Task::EnableCallbacks);
        self.deferred
            .schedule_after(now, self.config.guard_ms, Task::EnableCallbacks);
    }

    fn drain_stale_expiries(&mut self) {
        while self.expired.try_recv().is_ok() {}
    }
}
