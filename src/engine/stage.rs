//! Per-phase work container.
//!
//! A [`Stage`] owns four queues plus the completion sets for one harvest
//! phase: a FIFO ready queue workers pull from, a delayed min-heap keyed by
//! ready-time for timed retries, a deferred queue that feeds the final sweep,
//! and the in-flight/done key sets. Every transition and the counter that
//! describes it happen inside one critical section, so metric snapshots never
//! disagree with the queues.
//!
//! The stage itself never fails; it is a passive container. Nothing is
//! persisted: on process kill the queues are gone and only the audit and
//! output files remain.

use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use super::metrics::{MetricsSnapshot, StageMetrics};
use super::task::{Pass, Task, TaskKey};

/// Dispatcher poll cadence for the delayed heap.
const DISPATCH_TICK_MS: u64 = 500;

/// Upper bound on delayed entries released per dispatcher tick.
const DISPATCH_BATCH: usize = 100;

/// Entry on the delayed heap, ordered by ready time with insertion sequence
/// as the tie-breaker.
#[derive(Debug)]
struct DelayedEntry {
    ready_at: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl Eq for DelayedEntry {}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ready_at
            .cmp(&other.ready_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Default)]
struct StageInner {
    ready: VecDeque<Task>,
    delayed: BinaryHeap<Reverse<DelayedEntry>>,
    deferred: VecDeque<Task>,
    in_flight: HashSet<TaskKey>,
    done: HashSet<TaskKey>,
    deferred_keys: HashSet<TaskKey>,
    seq: u64,
    closed: bool,
    metrics: StageMetrics,
}

/// Shared work queue for one harvest phase.
pub struct Stage {
    name: &'static str,
    inner: Mutex<StageInner>,
    notify: Notify,
}

impl Stage {
    #[must_use]
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            inner: Mutex::new(StageInner::default()),
            notify: Notify::new(),
        })
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Admit a primary task. Silently rejected when its key is already
    /// done or in flight.
    pub fn submit(&self, task: Task) {
        let key = task.key();
        let mut inner = self.inner.lock();
        if inner.done.contains(&key) || inner.in_flight.contains(&key) {
            debug!(stage = self.name, %key, "submit rejected: key already tracked");
            return;
        }
        inner.metrics.total += 1;
        inner.ready.push_back(task);
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Blocking pop from the ready queue.
    ///
    /// The returned task's key has been moved into the in-flight set in the
    /// same critical section as the pop, so no observer can catch the key
    /// outside every set and no two workers can hold the same key. Returns
    /// `None` when `timeout` elapses with nothing ready, or immediately once
    /// the stage is closed and drained.
    pub async fn take(&self, timeout: Duration) -> Option<Task> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut inner = self.inner.lock();
                while let Some(task) = inner.ready.pop_front() {
                    let key = task.key();
                    if inner.done.contains(&key) || inner.in_flight.contains(&key) {
                        continue;
                    }
                    inner.in_flight.insert(key);
                    return Some(task);
                }
                if inner.closed {
                    return None;
                }
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }

    /// Move a key into the in-flight set. Returns false when the key is
    /// already done or in flight. `take` performs this transition itself;
    /// the operation is exposed for callers that admit work out of band.
    pub fn mark_in_flight(&self, key: &TaskKey) -> bool {
        let mut inner = self.inner.lock();
        if inner.done.contains(key) || inner.in_flight.contains(key) {
            return false;
        }
        inner.in_flight.insert(key.clone());
        true
    }

    /// Terminal success: key leaves in-flight and joins done.
    pub fn mark_done(&self, key: &TaskKey) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(key);
        if inner.done.insert(key.clone()) {
            inner.metrics.ok += 1;
            inner.metrics.completed += 1;
        }
    }

    /// Terminal failure after the final-sweep attempt: key leaves in-flight
    /// and joins done so it is never re-run.
    pub fn mark_failed_final(&self, key: &TaskKey) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(key);
        if inner.done.insert(key.clone()) {
            inner.metrics.final_exhausted += 1;
            inner.metrics.completed += 1;
        }
    }

    /// Park a task on the delayed heap; the dispatcher re-injects it once
    /// `delay` has elapsed.
    pub fn schedule_retry(&self, mut task: Task, delay: Duration) {
        let key = task.key();
        let ready_at = Instant::now() + delay;
        task.ready_at = Some(ready_at);
        let mut inner = self.inner.lock();
        inner.in_flight.remove(&key);
        inner.seq += 1;
        let seq = inner.seq;
        inner.metrics.retried += 1;
        inner.delayed.push(Reverse(DelayedEntry {
            ready_at,
            seq,
            task,
        }));
    }

    /// Park a task for the final sweep.
    pub fn defer(&self, mut task: Task) {
        let key = task.key();
        task.ready_at = None;
        let mut inner = self.inner.lock();
        inner.in_flight.remove(&key);
        inner.deferred_keys.insert(key);
        inner.metrics.deferred += 1;
        inner.deferred.push_back(task);
    }

    /// Re-inject every deferred task into the ready queue, tagged as the
    /// final sweep. Called by the sequencer once the primary queues drain.
    /// Returns how many tasks were re-injected.
    pub fn drain_deferred_into_ready(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut moved = 0;
        while let Some(mut task) = inner.deferred.pop_front() {
            let key = task.key();
            inner.deferred_keys.remove(&key);
            task.pass = Pass::FinalSweep;
            inner.ready.push_back(task);
            moved += 1;
        }
        drop(inner);
        if moved > 0 {
            self.notify.notify_waiters();
        }
        moved
    }

    /// True iff ready, delayed, in-flight and deferred are all empty, as one
    /// observation under the stage lock.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        let inner = self.inner.lock();
        inner.ready.is_empty()
            && inner.delayed.is_empty()
            && inner.in_flight.is_empty()
            && inner.deferred.is_empty()
    }

    /// True once the primary pass has nothing left to run: ready, delayed
    /// and in-flight are empty. Deferred tasks may still be parked; the
    /// sequencer uses this to decide when to start the final sweep.
    #[must_use]
    pub fn is_primary_drained(&self) -> bool {
        let inner = self.inner.lock();
        inner.ready.is_empty() && inner.delayed.is_empty() && inner.in_flight.is_empty()
    }

    /// Tell blocked `take` callers that no further work will arrive.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.lock().metrics.snapshot()
    }

    /// `(ready, delayed, deferred, in_flight)` depths for status reporting.
    #[must_use]
    pub fn depths(&self) -> (usize, usize, usize, usize) {
        let inner = self.inner.lock();
        (
            inner.ready.len(),
            inner.delayed.len(),
            inner.deferred.len(),
            inner.in_flight.len(),
        )
    }

    /// Move due delayed entries into ready, oldest ready-time first.
    /// Returns how many were released.
    pub fn release_due(&self, max: usize) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let mut released = 0;
        while released < max {
            match inner.delayed.peek() {
                Some(Reverse(entry)) if entry.ready_at <= now => {
                    let Some(Reverse(entry)) = inner.delayed.pop() else {
                        break;
                    };
                    let mut task = entry.task;
                    task.ready_at = None;
                    inner.ready.push_back(task);
                    released += 1;
                }
                _ => break,
            }
        }
        drop(inner);
        if released > 0 {
            debug!(stage = self.name, released, "delayed tasks re-injected");
            self.notify.notify_waiters();
        }
        released
    }

    /// Background loop that polls the delayed heap and feeds due entries
    /// back into ready. One dispatcher per stage; exits once the stage is
    /// closed and the heap is empty.
    pub fn spawn_dispatcher(self: &Arc<Self>) -> JoinHandle<()> {
        let stage = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(DISPATCH_TICK_MS));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                stage.release_due(DISPATCH_BATCH);
                let inner = stage.inner.lock();
                if inner.closed && inner.delayed.is_empty() {
                    break;
                }
            }
        })
    }
}
