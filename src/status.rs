//! Periodic live status reporting.
//!
//! A background task renders both stages' metric snapshots into one
//! dashboard message and edits it in place at a fixed cadence. Purely
//! observational: it holds no locks across awaits and cannot fail the run.

use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::engine::stage::Stage;
use crate::notify::Notifier;

/// Render one stage's line of the dashboard.
#[must_use]
pub fn render_stage_line(stage: &Stage) -> String {
    let m = stage.metrics();
    let (ready, delayed, deferred, in_flight) = stage.depths();
    format!(
        "{}: {}/{} done (ok {}, retried {}, deferred {}, exhausted {}) | q r{} d{} f{} i{}",
        stage.name(),
        m.completed,
        m.total,
        m.ok,
        m.retried,
        m.deferred,
        m.final_exhausted,
        ready,
        delayed,
        deferred,
        in_flight,
    )
}

/// Render the whole dashboard message.
#[must_use]
pub fn render_dashboard(phase_label: &str, stages: &[Arc<Stage>]) -> String {
    let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut out = format!("harvest status @ {ts}\nphase: {phase_label}\n");
    for stage in stages {
        out.push_str(&render_stage_line(stage));
        out.push('\n');
    }
    out
}

/// Spawn the reporter loop. Aborted by the sequencer at shutdown.
pub fn spawn_reporter(
    phase_label: &'static str,
    stages: Vec<Arc<Stage>>,
    notifier: Arc<Notifier>,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let message = render_dashboard(phase_label, &stages);
            notifier.edit_dashboard(&message).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::task::{Intent, Segment, Task};

    #[tokio::test]
    async fn dashboard_renders_metrics_and_depths() {
        let stage = Stage::new("adlist");
        stage.submit(Task::list_page(Intent::Sale, Segment::Residential, 1));
        let text = render_dashboard("ADLIST", &[stage]);
        assert!(text.contains("phase: ADLIST"));
        assert!(text.contains("adlist: 0/1 done"));
        assert!(text.contains("q r1 d0 f0 i0"));
    }
}
