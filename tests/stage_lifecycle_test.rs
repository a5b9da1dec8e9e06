//! Property tests for the stage lifecycle invariants.
//!
//! Each case scripts how many attempts every task fails before succeeding,
//! then drives the full policy against a real `Stage` (timed retries through
//! the delayed heap, deferral, final sweep, exhaustion) on a paused clock.
//! The counters must land exactly where the script predicts.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use propharvest::engine::{Intent, Pass, Segment, Stage, Task, TaskKey};

/// Drive every task to a terminal state, failing each one the scripted
/// number of times. Returns nothing; assertions happen on metrics.
async fn drive_to_completion(stage: &Stage, mut failures_left: HashMap<TaskKey, u8>) {
    let mut sweep_done = false;
    loop {
        stage.release_due(usize::MAX);

        if let Some(task) = stage.take(Duration::from_millis(1)).await {
            let key = task.key();
            let remaining = failures_left.get_mut(&key).expect("scripted task");
            if *remaining == 0 {
                stage.mark_done(&key);
            } else {
                *remaining -= 1;
                match task.attempt {
                    1 | 2 => {
                        let mut retry = task;
                        retry.attempt += 1;
                        stage.schedule_retry(retry, Duration::from_millis(2));
                    }
                    _ => {
                        if task.pass == Pass::FinalSweep {
                            stage.mark_failed_final(&key);
                        } else {
                            stage.defer(task);
                        }
                    }
                }
            }
            continue;
        }

        let (ready, delayed, deferred, in_flight) = stage.depths();
        assert_eq!(in_flight, 0, "nothing can be in flight while we idle");
        if delayed > 0 {
            tokio::time::sleep(Duration::from_millis(3)).await;
            continue;
        }
        if ready > 0 {
            continue;
        }
        if deferred > 0 {
            assert!(!sweep_done, "deferred tasks may be swept only once");
            sweep_done = true;
            stage.drain_deferred_into_ready();
            continue;
        }
        break;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For a task failing `f` scripted attempts before succeeding:
    /// - f <= 2: succeeds in the primary pass with `min(f, 2)` retries
    /// - f == 3: exhausts the primary attempts, succeeds on the final sweep
    /// - f >= 4: fails the final sweep too and is exhausted
    #[test]
    fn counters_land_exactly_where_the_failure_script_predicts(
        failure_counts in proptest::collection::vec(0u8..=5, 1..24)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        rt.block_on(async {
            tokio::time::pause();

            let stage = Stage::new("prop");
            let mut scripts = HashMap::new();
            for (i, f) in failure_counts.iter().enumerate() {
                let task = Task::list_page(Intent::Sale, Segment::Residential, i as u32 + 1);
                scripts.insert(task.key(), *f);
                stage.submit(task);
            }

            drive_to_completion(&stage, scripts).await;

            let m = stage.metrics();
            let total = failure_counts.len() as u64;
            let expected_ok = failure_counts.iter().filter(|f| **f <= 3).count() as u64;
            let expected_exhausted =
                failure_counts.iter().filter(|f| **f >= 4).count() as u64;
            let expected_retried: u64 =
                failure_counts.iter().map(|f| u64::from((*f).min(2))).sum();
            let expected_deferred =
                failure_counts.iter().filter(|f| **f >= 3).count() as u64;

            assert!(stage.is_quiescent(), "every task reached a terminal state");
            assert_eq!(m.total, total);
            assert_eq!(m.ok, expected_ok);
            assert_eq!(m.final_exhausted, expected_exhausted);
            assert_eq!(m.completed, m.ok + m.final_exhausted);
            assert_eq!(m.completed, total);
            assert_eq!(m.retried, expected_retried);
            assert_eq!(m.deferred, expected_deferred);
        });
    }

    /// Submitting duplicate keys never double-runs a task: the second
    /// admission is dropped at take time (or rejected outright when the
    /// first already finished).
    #[test]
    fn duplicate_submissions_never_double_run(pages in proptest::collection::vec(1u32..=6, 2..30)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        rt.block_on(async {
            tokio::time::pause();

            let stage = Stage::new("dupes");
            for page in &pages {
                stage.submit(Task::list_page(Intent::Rent, Segment::Commercial, *page));
            }

            let mut ran = std::collections::HashSet::new();
            while let Some(task) = stage.take(Duration::from_millis(1)).await {
                assert!(ran.insert(task.key()), "key ran twice");
                stage.mark_done(&task.key());
            }

            let distinct: std::collections::HashSet<_> = pages.iter().collect();
            assert_eq!(ran.len(), distinct.len());
            assert_eq!(stage.metrics().ok, distinct.len() as u64);
            assert!(stage.is_quiescent());
        });
    }
}
