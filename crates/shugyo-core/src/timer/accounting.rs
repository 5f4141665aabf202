//! Session accounting: elapsed wall time, completed cycles and net active time.
//!
//! The accountant is purely in-memory and owned by the cycle controller. It
//! counts whole seconds of session time while any phase timer runs, and
//! derives the practice-only ("net active") time by subtracting rest periods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How rest time is deducted from the session total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestAccounting {
    /// Deduct every rest phase that ran to completion, plus the part of the
    /// current rest already spent.
    #[default]
    CompletedRests,
    /// Deduct `completed_cycles - 1` rest lengths plus the current partial
    /// rest. Undercounts once a rest has finished and practice resumed.
    PrecedingCycles,
}

/// Final figures of a session, read at finish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_cycles: u32,
    pub completed_rests: u32,
    pub elapsed_session_secs: u64,
    pub net_active_secs: f64,
}

impl SessionSummary {
    /// Net active time rounded to whole seconds, as stored in history.
    pub fn total_time_secs(&self) -> u64 {
        self.net_active_secs.round() as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAccountant {
    completed_cycles: u32,
    completed_rests: u32,
    session_start: Option<DateTime<Utc>>,
    elapsed_session_secs: u64,
    configured_rest_secs: u64,
    policy: RestAccounting,
    /// Clock reading of the last accrual; `None` while fully paused.
    #[serde(skip)]
    last_sample_ms: Option<u64>,
    /// Sub-second remainder not yet turned into a tick.
    #[serde(skip)]
    carry_ms: u64,
}

impl SessionAccountant {
    pub fn new(configured_rest_secs: u64, policy: RestAccounting) -> Self {
        Self {
            completed_cycles: 0,
            completed_rests: 0,
            session_start: None,
            elapsed_session_secs: 0,
            configured_rest_secs,
            policy,
            last_sample_ms: None,
            carry_ms: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    pub fn completed_rests(&self) -> u32 {
        self.completed_rests
    }

    pub fn elapsed_session_secs(&self) -> u64 {
        self.elapsed_session_secs
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session_start
    }

    pub fn configured_rest_secs(&self) -> u64 {
        self.configured_rest_secs
    }

    pub fn policy(&self) -> RestAccounting {
        self.policy
    }

    pub fn is_accruing(&self) -> bool {
        self.last_sample_ms.is_some()
    }

    /// Practice-only time.
    ///
    /// `partial_current_rest_secs` is the rest time already spent when the
    /// session is currently resting, zero otherwise. A session without a
    /// completed cycle earns nothing.
    pub fn net_active_secs(&self, partial_current_rest_secs: f64) -> f64 {
        if self.completed_cycles == 0 {
            return 0.0;
        }
        let rest = self.configured_rest_secs;
        let rest_portion = match self.policy {
            RestAccounting::CompletedRests => u64::from(self.completed_rests) * rest,
            RestAccounting::PrecedingCycles => {
                u64::from(self.completed_cycles.saturating_sub(1)) * rest
            }
        };
        let net = self.elapsed_session_secs as f64
            - rest_portion as f64
            - partial_current_rest_secs.max(0.0);
        net.max(0.0)
    }

    pub fn summary(&self, partial_current_rest_secs: f64) -> SessionSummary {
        SessionSummary {
            started_at: self.session_start,
            completed_cycles: self.completed_cycles,
            completed_rests: self.completed_rests,
            elapsed_session_secs: self.elapsed_session_secs,
            net_active_secs: self.net_active_secs(partial_current_rest_secs),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_rest_secs(&mut self, secs: u64) {
        self.configured_rest_secs = secs;
    }

    pub fn set_policy(&mut self, policy: RestAccounting) {
        self.policy = policy;
    }

    /// Zero all counters and start accruing from `now_ms`.
    pub fn begin(&mut self, now_ms: u64) {
        self.completed_cycles = 0;
        self.completed_rests = 0;
        self.elapsed_session_secs = 0;
        self.session_start = Some(Utc::now());
        self.last_sample_ms = Some(now_ms);
        self.carry_ms = 0;
    }

    /// One elapsed second of session time.
    pub fn tick(&mut self) {
        self.elapsed_session_secs += 1;
    }

    /// Turn the wall time since the last sample into whole-second ticks.
    /// Returns the number of ticks applied. Does nothing while suspended.
    pub fn accrue(&mut self, now_ms: u64) -> u64 {
        let Some(last) = self.last_sample_ms else {
            return 0;
        };
        let pending = now_ms.saturating_sub(last) + self.carry_ms;
        let whole = pending / 1000;
        for _ in 0..whole {
            self.tick();
        }
        self.carry_ms = pending % 1000;
        self.last_sample_ms = Some(now_ms);
        whole
    }

    /// Flush and stop accruing (every timer paused).
    pub fn suspend(&mut self, now_ms: u64) {
        self.accrue(now_ms);
        self.last_sample_ms = None;
    }

    pub fn resume(&mut self, now_ms: u64) {
        if self.last_sample_ms.is_none() {
            self.last_sample_ms = Some(now_ms);
        }
    }

    pub fn record_cycle_complete(&mut self) {
        self.completed_cycles += 1;
    }

    pub fn record_rest_complete(&mut self) {
        self.completed_rests += 1;
    }

    /// Discard the session. Configuration survives.
    pub fn clear(&mut self) {
        self.completed_cycles = 0;
        self.completed_rests = 0;
        self.elapsed_session_secs = 0;
        self.session_start = None;
        self.last_sample_ms = None;
        self.carry_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accountant_with(
        elapsed: u64,
        cycles: u32,
        rests: u32,
        policy: RestAccounting,
    ) -> SessionAccountant {
        let mut a = SessionAccountant::new(10, policy);
        a.begin(0);
        for _ in 0..elapsed {
            a.tick();
        }
        for _ in 0..cycles {
            a.record_cycle_complete();
        }
        for _ in 0..rests {
            a.record_rest_complete();
        }
        a
    }

    #[test]
    fn no_cycles_means_no_credit() {
        let a = accountant_with(3600, 0, 0, RestAccounting::CompletedRests);
        assert_eq!(a.net_active_secs(0.0), 0.0);
        let a = accountant_with(3600, 0, 0, RestAccounting::PrecedingCycles);
        assert_eq!(a.net_active_secs(5.0), 0.0);
    }

    #[test]
    fn preceding_cycles_formula() {
        let a = accountant_with(125, 3, 0, RestAccounting::PrecedingCycles);
        assert_eq!(a.net_active_secs(0.0), 105.0);
    }

    #[test]
    fn completed_rests_formula() {
        let a = accountant_with(125, 3, 2, RestAccounting::CompletedRests);
        assert_eq!(a.net_active_secs(0.0), 105.0);
        let a = accountant_with(125, 3, 3, RestAccounting::CompletedRests);
        assert_eq!(a.net_active_secs(0.0), 95.0);
    }

    #[test]
    fn policies_agree_while_resting() {
        let legacy = accountant_with(40, 2, 1, RestAccounting::PrecedingCycles);
        let current = accountant_with(40, 2, 1, RestAccounting::CompletedRests);
        assert_eq!(legacy.net_active_secs(4.0), 26.0);
        assert_eq!(current.net_active_secs(4.0), 26.0);
    }

    #[test]
    fn net_active_never_negative() {
        let a = accountant_with(5, 3, 3, RestAccounting::CompletedRests);
        assert_eq!(a.net_active_secs(2.5), 0.0);
    }

    #[test]
    fn accrue_carries_sub_second_remainder() {
        let mut a = SessionAccountant::new(10, RestAccounting::default());
        a.begin(0);
        assert_eq!(a.accrue(600), 0);
        assert_eq!(a.accrue(1200), 1);
        assert_eq!(a.accrue(2000), 1);
        assert_eq!(a.elapsed_session_secs(), 2);
    }

    #[test]
    fn no_accrual_while_suspended() {
        let mut a = SessionAccountant::new(10, RestAccounting::default());
        a.begin(0);
        a.suspend(3000);
        assert_eq!(a.elapsed_session_secs(), 3);
        assert_eq!(a.accrue(60_000), 0);
        a.resume(60_000);
        a.accrue(62_000);
        assert_eq!(a.elapsed_session_secs(), 5);
    }

    #[test]
    fn begin_zeroes_previous_session() {
        let mut a = accountant_with(50, 2, 1, RestAccounting::default());
        a.begin(100);
        assert_eq!(a.completed_cycles(), 0);
        assert_eq!(a.completed_rests(), 0);
        assert_eq!(a.elapsed_session_secs(), 0);
        assert!(a.session_start().is_some());
    }

    #[test]
    fn clear_keeps_configuration() {
        let mut a = accountant_with(50, 2, 1, RestAccounting::PrecedingCycles);
        a.clear();
        assert_eq!(a.completed_cycles(), 0);
        assert!(a.session_start().is_none());
        assert!(!a.is_accruing());
        assert_eq!(a.configured_rest_secs(), 10);
        assert_eq!(a.policy(), RestAccounting::PrecedingCycles);
    }

    #[test]
    fn summary_rounds_total_time() {
        let a = accountant_with(20, 1, 0, RestAccounting::default());
        let summary = a.summary(2.4);
        assert!((summary.net_active_secs - 17.6).abs() < 1e-9);
        assert_eq!(summary.total_time_secs(), 18);
    }
}
