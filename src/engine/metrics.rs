//! Monotonic per-stage counters.
//!
//! Counters are plain integers owned by the stage and bumped under the stage
//! lock, in the same critical section as the set transition they describe, so
//! a snapshot can never disagree with the queue state it was taken with.

use serde::Serialize;

/// Counters accumulated over a stage's lifetime. All monotonic.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageMetrics {
    /// Tasks admitted via `submit`.
    pub total: u64,
    /// Tasks that reached a terminal state (`ok` or `final_exhausted`).
    pub completed: u64,
    /// Tasks that fetched and extracted successfully.
    pub ok: u64,
    /// Timed re-injections scheduled (at most 2 per task).
    pub retried: u64,
    /// Tasks parked for the final sweep.
    pub deferred: u64,
    /// Tasks that failed their final-sweep attempt.
    pub final_exhausted: u64,
}

/// Point-in-time copy of [`StageMetrics`], safe to read outside the lock.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub completed: u64,
    pub ok: u64,
    pub retried: u64,
    pub deferred: u64,
    pub final_exhausted: u64,
}

impl StageMetrics {
    #[must_use]
    pub const fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total: self.total,
            completed: self.completed,
            ok: self.ok,
            retried: self.retried,
            deferred: self.deferred,
            final_exhausted: self.final_exhausted,
        }
    }
}

impl MetricsSnapshot {
    /// Fraction of admitted work that reached a terminal state.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}
