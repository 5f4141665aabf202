//! Cooperative deferred-task queue.
//!
//! The engine runs on a single logical thread driven by the host calling
//! `tick()`. Work that must not run inside the current computation (guard
//! window expiry, re-enabling callbacks) is queued here with a due time and
//! picked up on a later turn.

#[derive(Debug, Clone)]
struct Deferred<T> {
    due_ms: u64,
    seq: u64,
    task: T,
}

#[derive(Debug, Clone)]
pub struct DeferredQueue<T> {
    tasks: Vec<Deferred<T>>,
    next_seq: u64,
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn schedule_after(&mut self, now_ms: u64, delay_ms: u64, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.push(Deferred {
            due_ms: now_ms.saturating_add(delay_ms),
            seq,
            task,
        });
    }

    /// Remove and return every task due at `now_ms`, earliest first; tasks
    /// with equal due times keep their scheduling order.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|d| d.due_ms <= now_ms);
        self.tasks = pending;
        due.sort_by_key(|d| (d.due_ms, d.seq));
        due.into_iter().map(|d| d.task).collect()
    }

    /// Drop queued tasks matching `pred`. Returns how many were removed.
    pub fn cancel_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.tasks.len();
        self.tasks.retain(|d| !pred(&d.task));
        before - self.tasks.len()
    }
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
