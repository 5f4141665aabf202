//! Monotonic time sources.
//!
//! All timing in the engine is expressed as milliseconds read from a
//! [`Clock`]. The production clock is backed by [`std::time::Instant`], so a
//! stopped or descheduled host process resumes with the correct (not
//! re-accelerated) countdown. Tests drive a [`ManualClock`] instead of
//! sleeping.
//!
//! System sleep is different. On Linux `Instant` reads `CLOCK_MONOTONIC`,
//! which does not advance while the machine is suspended, so a countdown
//! spanning a laptop sleep lags wall time by the length of the sleep.
//! `CLOCK_BOOTTIME` would include it; a [`Clock`] over it can be plugged in
//! without touching the timers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonically non-decreasing millisecond counter.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;
}

/// Elapsed time measured against a process-local [`Instant`].
///
/// Excludes time the system spent suspended on Linux; see the module docs.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs.saturating_mul(1000));
    }

    /// Move to an absolute time. Going backwards is ignored.
    pub fn set_ms(&self, ms: u64) {
        self.now.fetch_max(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Shared handle passed to timers and the controller.
pub type SharedClock = Arc<dyn Clock>;
