//! Single countdown clock for one phase (practice or rest).
//!
//! Remaining time is never accumulated tick by tick. While running it is
//! recomputed from the start timestamp and the configured duration, so the
//! sampling frequency has no influence on accuracy.
//!
//! ## Expiry delivery
//!
//! ```text
//! tick()        -> remaining reaches 0, timer stops, expiry marked pending
//! run_pending() -> (next turn) notify_expired() -> callback unless suppressed
//! ```
//!
//! Suppression is checked when the callback is about to fire, not when the
//! expiry is detected. `reset()` opens a short guard window during which
//! in-flight expiries are swallowed. A phase hand-off re-arms through
//! [`PhaseTimer::start_at`] instead, which opens no window.

use std::fmt;

use tracing::debug;

use crate::clock::SharedClock;
use crate::error::TimerError;
use crate::input::MIN_DURATION_SECS;

/// Guard window opened by [`PhaseTimer::reset`].
pub const DEFAULT_GUARD_MS: u64 = 150;

/// The guard window must close before the shortest phase can run out.
pub const MAX_GUARD_MS: u64 = MIN_DURATION_SECS * 1000 - 1;

pub type ExpireCallback = Box<dyn FnMut() + Send>;

pub struct PhaseTimer {
    clock: SharedClock,
    duration_secs: u64,
    /// Last computed remaining time; authoritative while stopped.
    remaining_ms: u64,
    running: bool,
    /// Signed because a resume rewinds the start into the past.
    start_wall_ms: Option<i64>,
    paused_remaining_ms: Option<u64>,
    callbacks_disabled: bool,
    suppressed_until_ms: Option<u64>,
    guard_ms: u64,
    expiry_pending: bool,
    /// Clock reading at which the last run reached zero.
    expired_at_ms: Option<u64>,
    on_expire: Option<ExpireCallback>,
}

impl PhaseTimer {
    /// Create a stopped timer armed with `duration_secs`.
    ///
    /// # Errors
    /// Returns [`TimerError::InvalidDuration`] if `duration_secs` is zero.
    pub fn new(duration_secs: u64, clock: SharedClock) -> Result<Self, TimerError> {
        validate_duration(duration_secs)?;
        Ok(Self {
            clock,
            duration_secs,
            remaining_ms: secs_to_ms(duration_secs),
            running: false,
            start_wall_ms: None,
            paused_remaining_ms: None,
            callbacks_disabled: false,
            suppressed_until_ms: None,
            guard_ms: DEFAULT_GUARD_MS,
            expiry_pending: false,
            expired_at_ms: None,
            on_expire: None,
        })
    }

    pub fn with_guard_ms(mut self, guard_ms: u64) -> Self {
        self.guard_ms = guard_ms;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn guard_ms(&self) -> u64 {
        self.guard_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused_remaining_ms.is_some()
    }

    /// Stopped at zero and not yet re-armed.
    pub fn has_expired(&self) -> bool {
        !self.running && self.paused_remaining_ms.is_none() && self.remaining_ms == 0
    }

    pub fn has_pending_expiry(&self) -> bool {
        self.expiry_pending
    }

    /// When the countdown actually hit zero, which may be earlier than the
    /// tick that noticed it. `None` unless stopped at expiry.
    pub fn expired_at_ms(&self) -> Option<u64> {
        self.expired_at_ms
    }

    /// Remaining time in milliseconds, sampled from the clock while running.
    pub fn remaining_ms(&self) -> u64 {
        if self.running {
            self.sample()
        } else {
            self.remaining_ms
        }
    }

    /// Remaining time with sub-second precision.
    pub fn remaining_secs(&self) -> f64 {
        self.remaining_ms() as f64 / 1000.0
    }

    /// Remaining whole seconds, rounded up, for display.
    pub fn remaining_whole_secs(&self) -> u64 {
        self.remaining_ms().div_ceil(1000)
    }

    /// Time spent in this phase so far.
    pub fn elapsed_ms(&self) -> u64 {
        secs_to_ms(self.duration_secs).saturating_sub(self.remaining_ms())
    }

    /// Whether an expiry delivered right now would be swallowed.
    pub fn callbacks_suppressed(&self) -> bool {
        if self.callbacks_disabled {
            return true;
        }
        match self.suppressed_until_ms {
            Some(until) => self.clock.now_ms() < until,
            None => false,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume. Returns `false` if the timer was already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        let now = self.clock.now_ms() as i64;
        let duration_ms = secs_to_ms(self.duration_secs);
        self.expired_at_ms = None;
        match self.paused_remaining_ms.take() {
            Some(frozen) => {
                // Rewind the start so that `duration - (now - start) == frozen`.
                let already_elapsed = duration_ms.saturating_sub(frozen) as i64;
                self.start_wall_ms = Some(now - already_elapsed);
                self.remaining_ms = frozen;
            }
            None => {
                self.start_wall_ms = Some(now);
                self.remaining_ms = duration_ms;
            }
        }
        self.running = true;
        true
    }

    /// Run the full duration as if started at `at_ms`, which may lie in the
    /// past. Used when one phase hands over to the next at the instant the
    /// previous one ran out.
    ///
    /// Unlike [`reset`](Self::reset) this opens no guard window: the expiry
    /// that triggered the hand-off has already been delivered.
    pub fn start_at(&mut self, at_ms: u64) {
        self.suppressed_until_ms = None;
        self.paused_remaining_ms = None;
        self.expiry_pending = false;
        self.expired_at_ms = None;
        self.start_wall_ms = Some(at_ms as i64);
        self.running = true;
        self.remaining_ms = self.sample();
    }

    /// Freeze the remaining time. Returns `false` if the timer was not running
    /// (including the case where it expired at this very sample).
    pub fn pause(&mut self) -> bool {
        if !self.running || self.tick() {
            return false;
        }
        self.paused_remaining_ms = Some(self.remaining_ms);
        self.running = false;
        self.start_wall_ms = None;
        true
    }

    /// Stop and re-arm with the configured duration.
    ///
    /// Any expiry that is pending or already in flight is swallowed: the
    /// pending flag is dropped and callbacks stay suppressed for the guard
    /// window.
    pub fn reset(&mut self) {
        self.suppressed_until_ms = Some(self.clock.now_ms().saturating_add(self.guard_ms));
        self.running = false;
        self.start_wall_ms = None;
        self.paused_remaining_ms = None;
        self.expiry_pending = false;
        self.expired_at_ms = None;
        self.remaining_ms = secs_to_ms(self.duration_secs);
    }

    /// [`reset`](Self::reset) with a new duration.
    ///
    /// # Errors
    /// Returns [`TimerError::InvalidDuration`] for zero; the timer is left
    /// untouched in that case.
    pub fn reset_with(&mut self, new_duration: u64) -> Result<(), TimerError> {
        validate_duration(new_duration)?;
        self.duration_secs = new_duration;
        self.reset();
        Ok(())
    }

    /// Change the configured length. Only allowed while stopped.
    ///
    /// # Errors
    /// [`TimerError::Running`] while running, [`TimerError::InvalidDuration`]
    /// for zero.
    pub fn set_duration(&mut self, secs: u64) -> Result<(), TimerError> {
        if self.running {
            return Err(TimerError::Running);
        }
        validate_duration(secs)?;
        self.duration_secs = secs;
        self.remaining_ms = secs_to_ms(secs);
        self.paused_remaining_ms = None;
        Ok(())
    }

    pub fn set_on_expire<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_expire = Some(Box::new(callback));
    }

    pub fn disable_callbacks(&mut self) {
        self.callbacks_disabled = true;
    }

    pub fn enable_callbacks(&mut self) {
        self.callbacks_disabled = false;
    }

    /// Recompute remaining time. Returns `true` when the timer expired at this
    /// sample; the callback is left for [`run_pending`](Self::run_pending).
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.remaining_ms = self.sample();
        if self.remaining_ms > 0 {
            return false;
        }
        self.expired_at_ms = self
            .start_wall_ms
            .map(|start| (start + secs_to_ms(self.duration_secs) as i64).max(0) as u64);
        self.running = false;
        self.start_wall_ms = None;
        self.expiry_pending = true;
        true
    }

    /// Deliver an expiry detected by an earlier [`tick`](Self::tick).
    /// Returns `true` if the callback ran.
    pub fn run_pending(&mut self) -> bool {
        if !std::mem::take(&mut self.expiry_pending) {
            return false;
        }
        self.notify_expired()
    }

    /// Fire the expiry callback unless suppressed. Returns `true` if it ran.
    pub fn notify_expired(&mut self) -> bool {
        if self.callbacks_suppressed() {
            debug!(duration_secs = self.duration_secs, "expiry suppressed");
            return false;
        }
        match self.on_expire.as_mut() {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn sample(&self) -> u64 {
        let Some(start) = self.start_wall_ms else {
            return self.remaining_ms;
        };
        let elapsed = (self.clock.now_ms() as i64 - start).max(0) as u64;
        secs_to_ms(self.duration_secs).saturating_sub(elapsed)
    }
}

impl fmt::Debug for PhaseTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseTimer")
            .field("duration_secs", &self.duration_secs)
            .field("remaining_ms", &self.remaining_ms())
            .field("running", &self.running)
            .field("paused_remaining_ms", &self.paused_remaining_ms)
            .field("callbacks_disabled", &self.callbacks_disabled)
            .field("suppressed_until_ms", &self.suppressed_until_ms)
            .field("expiry_pending", &self.expiry_pending)
            .field("expired_at_ms", &self.expired_at_ms)
            .field("has_callback", &self.on_expire.is_some())
            .finish()
    }
}

fn validate_duration(secs: u64) -> Result<(), TimerError> {
    if secs == 0 {
        return Err(TimerError::InvalidDuration(secs));
    }
    Ok(())
}

fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn timer(secs: u64) -> (PhaseTimer, ManualClock, Arc<AtomicUsize>) {
        let clock = ManualClock::new();
        let mut t = PhaseTimer::new(secs, Arc::new(clock.clone())).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        t.set_on_expire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (t, clock, fired)
    }

    #[test]
    fn zero_duration_is_rejected() {
        let clock = ManualClock::new();
        let err = PhaseTimer::new(0, Arc::new(clock)).unwrap_err();
        assert_eq!(err, TimerError::InvalidDuration(0));
    }

    #[test]
    fn start_is_idempotent() {
        let (mut t, clock, _) = timer(10);
        assert!(t.start());
        clock.advance_secs(2);
        assert!(!t.start());
        assert_eq!(t.remaining_ms(), 8000);
    }

    #[test]
    fn pause_when_stopped_is_noop() {
        let (mut t, _, _) = timer(10);
        assert!(!t.pause());
        assert!(!t.is_paused());
        assert_eq!(t.remaining_ms(), 10_000);
    }

    #[test]
    fn pause_freezes_remaining() {
        let (mut t, clock, _) = timer(10);
        t.start();
        clock.advance_ms(3500);
        assert!(t.pause());
        clock.advance_secs(60);
        assert_eq!(t.remaining_ms(), 6500);
        assert!(!t.pause());
    }

    #[test]
    fn resume_continues_from_frozen_value() {
        let (mut t, clock, _) = timer(10);
        t.start();
        clock.advance_secs(4);
        t.pause();
        clock.advance_secs(100);
        t.start();
        clock.advance_secs(1);
        assert_eq!(t.remaining_ms(), 5000);
    }

    #[test]
    fn expiry_is_deferred_until_run_pending() {
        let (mut t, clock, fired) = timer(2);
        t.start();
        clock.advance_secs(2);
        assert!(t.tick());
        assert!(!t.is_running());
        assert_eq!(t.remaining_ms(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        assert!(t.run_pending());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!t.run_pending());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remaining_is_clamped_at_zero() {
        let (mut t, clock, _) = timer(1);
        t.start();
        clock.advance_secs(30);
        assert_eq!(t.remaining_ms(), 0);
        t.tick();
        assert_eq!(t.remaining_secs(), 0.0);
    }

    #[test]
    fn reset_swallows_pending_and_in_flight_expiry() {
        let (mut t, clock, fired) = timer(1);
        t.start();
        clock.advance_secs(1);
        assert!(t.tick());
        t.reset();
        assert!(!t.run_pending());
        // An expiry that was already on its way.
        assert!(!t.notify_expired());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(t.remaining_ms(), 1000);
    }

    #[test]
    fn expiry_fires_again_after_guard_window() {
        let (mut t, clock, fired) = timer(1);
        t.reset();
        assert!(t.callbacks_suppressed());
        clock.advance_ms(DEFAULT_GUARD_MS);
        assert!(!t.callbacks_suppressed());

        t.start();
        clock.advance_secs(1);
        t.tick();
        assert!(t.run_pending());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_with_new_duration_rearms() {
        let (mut t, clock, _) = timer(10);
        t.start();
        clock.advance_secs(3);
        t.reset_with(20).unwrap();
        assert_eq!(t.duration_secs(), 20);
        assert_eq!(t.remaining_ms(), 20_000);
        assert!(!t.is_running());
        assert!(t.reset_with(0).is_err());
        assert_eq!(t.duration_secs(), 20);
    }

    #[test]
    fn disabled_callbacks_block_expiry() {
        let (mut t, clock, fired) = timer(1);
        t.disable_callbacks();
        t.start();
        clock.advance_secs(1);
        t.tick();
        assert!(!t.run_pending());
        t.enable_callbacks();
        assert!(t.notify_expired());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duration_change_requires_stopped_timer() {
        let (mut t, _, _) = timer(10);
        t.start();
        assert_eq!(t.set_duration(30), Err(TimerError::Running));
        t.pause();
        t.set_duration(30).unwrap();
        assert!(!t.is_paused());
        assert_eq!(t.remaining_ms(), 30_000);
        assert_eq!(t.set_duration(0), Err(TimerError::InvalidDuration(0)));
    }

    #[test]
    fn set_on_expire_replaces_callback_while_running() {
        let (mut t, clock, fired) = timer(1);
        t.start();
        let second = Arc::new(AtomicUsize::new(0));
        let counter = second.clone();
        t.set_on_expire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        clock.advance_secs(1);
        t.tick();
        t.run_pending();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn starting_an_expired_timer_rearms_full_duration() {
        let (mut t, clock, _) = timer(2);
        t.start();
        clock.advance_secs(2);
        t.tick();
        assert!(t.has_expired());
        t.start();
        assert_eq!(t.remaining_ms(), 2000);
    }

    #[test]
    fn pause_at_expiry_reports_expiry_instead() {
        let (mut t, clock, _) = timer(1);
        t.start();
        clock.advance_secs(1);
        assert!(!t.pause());
        assert!(t.has_pending_expiry());
        assert!(!t.is_paused());
    }

    #[test]
    fn expiry_instant_is_start_plus_duration() {
        let (mut t, clock, _) = timer(2);
        clock.advance_ms(300);
        t.start();
        clock.advance_ms(2900);
        assert!(t.tick());
        assert_eq!(t.expired_at_ms(), Some(2300));
        t.start();
        assert_eq!(t.expired_at_ms(), None);
    }

    #[test]
    fn start_at_counts_from_a_past_instant() {
        let (mut t, clock, _) = timer(3);
        clock.advance_ms(5400);
        t.start_at(5000);
        assert!(t.is_running());
        assert_eq!(t.remaining_ms(), 2600);
        clock.advance_ms(2600);
        assert!(t.tick());
        assert_eq!(t.expired_at_ms(), Some(8000));
    }

    #[test]
    fn start_at_opens_no_guard_window() {
        let (mut t, clock, fired) = timer(1);
        let mut long_guard = PhaseTimer::new(1, Arc::new(clock.clone()))
            .unwrap()
            .with_guard_ms(MAX_GUARD_MS);
        long_guard.reset();
        assert!(long_guard.callbacks_suppressed());
        long_guard.start_at(clock.now_ms());
        assert!(!long_guard.callbacks_suppressed());

        t.reset();
        t.start_at(clock.now_ms());
        clock.advance_secs(1);
        t.tick();
        assert!(t.run_pending());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remaining_whole_secs_rounds_up() {
        let (mut t, clock, _) = timer(5);
        t.start();
        clock.advance_ms(1200);
        assert_eq!(t.remaining_whole_secs(), 4);
        assert_eq!(t.elapsed_ms(), 1200);
    }
}
