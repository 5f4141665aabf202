//! # Shugyo Core Library
//!
//! Core logic for the Shugyo practice/rest interval timer. Everything here is
//! usable headless; the `shugyo` CLI is a thin layer over the same types.
//!
//! ## Architecture
//!
//! - **Phase timers**: countdown timers over a monotonic [`Clock`] that only
//!   advance when the host calls `tick()`
//! - **Cycle controller**: the practice/rest state machine, session accounting
//!   and the hand-off of finished sessions to history
//! - **Storage**: SQLite history and TOML configuration
//! - **History statistics**: per-day and per-month totals in a fixed offset
//!
//! ## Key Components
//!
//! - [`CycleController`]: session state machine
//! - [`PhaseTimer`]: single pausable countdown
//! - [`HistoryStore`]: persistence collaborator, backed by [`Database`] or
//!   [`MemoryHistory`]
//! - [`Config`]: application configuration

pub mod clock;
pub mod error;
pub mod events;
pub mod history;
pub mod input;
pub mod notify;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use error::{
    ConfigError, CoreError, DatabaseError, InputError, NotifyError, StoreError, TimerError,
};
pub use events::Event;
pub use history::{BodyPart, HistoryRecord, HistoryStore, MemoryHistory, NewHistoryRecord};
pub use notify::{BellNotifier, PhaseNotifier, SilentNotifier};
pub use storage::{Config, Database};
pub use timer::{
    ControllerConfig, CycleController, CycleState, FinishOutcome, Phase, PhaseTimer,
    RestAccounting, SessionSummary,
};
